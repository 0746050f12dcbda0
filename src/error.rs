use std::path::PathBuf;

use camino::Utf8PathBuf;
use miette::Diagnostic;
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
pub enum MoscaError {
    #[error("configuration lists no experiments")]
    NoExperiments,

    #[error("invalid data type for experiment {sample}: {value} (expected dna, mrna or protein)")]
    InvalidDataType { sample: String, value: String },

    #[error("experiment {0} lists no input files")]
    MissingFiles(String),

    #[error("invalid experiment name {name}: {reason}")]
    InvalidName { name: String, reason: String },

    #[error("duplicate sample id: {0}")]
    DuplicateSample(String),

    #[error("invalid value for \"{parameter}\": {value}")]
    InvalidParameter { parameter: String, value: String },

    #[error("binning can only run on assemblies (do_binning is set but do_assembly is not)")]
    BinningWithoutAssembly,

    #[error("unknown sample: {0}")]
    UnknownSample(String),

    #[error("duplicate node id: {0}")]
    DuplicateNode(String),

    #[error("input {path} of node {node} has no producer and is not a raw input")]
    UnresolvedDependency { path: Utf8PathBuf, node: String },

    #[error("output {path} is declared by both {first} and {second}")]
    AmbiguousOutput {
        path: Utf8PathBuf,
        first: String,
        second: String,
    },

    #[error("dependency cycle through node {0}")]
    DependencyCycle(String),

    #[error("missing config file config.json in current directory")]
    MissingConfig,

    #[error("failed to read config file at {0}")]
    ConfigRead(PathBuf),

    #[error("failed to parse config: {0}")]
    ConfigParse(String),

    #[error("filesystem error: {0}")]
    Filesystem(String),
}

/// Coarse classes of [`MoscaError`], used for exit codes and reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    UnknownSample,
    UnresolvedDependency,
    AmbiguousOutput,
    Io,
}

impl MoscaError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            MoscaError::NoExperiments
            | MoscaError::InvalidDataType { .. }
            | MoscaError::MissingFiles(_)
            | MoscaError::InvalidName { .. }
            | MoscaError::DuplicateSample(_)
            | MoscaError::InvalidParameter { .. }
            | MoscaError::BinningWithoutAssembly
            | MoscaError::DuplicateNode(_)
            | MoscaError::DependencyCycle(_) => ErrorKind::Validation,
            MoscaError::UnknownSample(_) => ErrorKind::UnknownSample,
            MoscaError::UnresolvedDependency { .. } => ErrorKind::UnresolvedDependency,
            MoscaError::AmbiguousOutput { .. } => ErrorKind::AmbiguousOutput,
            MoscaError::MissingConfig
            | MoscaError::ConfigRead(_)
            | MoscaError::ConfigParse(_)
            | MoscaError::Filesystem(_) => ErrorKind::Io,
        }
    }
}
