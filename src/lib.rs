pub mod aggregate;
pub mod app;
pub mod branch;
pub mod classify;
pub mod config;
pub mod domain;
pub mod error;
pub mod graph;
pub mod node;
pub mod output;
pub mod paths;
pub mod pipeline;
pub mod store;
