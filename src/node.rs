use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use camino::{Utf8Path, Utf8PathBuf};
use serde::Serialize;
use serde_json::Value;

use crate::error::MoscaError;

/// `step` or `step:key`, e.g. `assembly:s1`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct NodeId(String);

impl NodeId {
    pub fn new(step: &str) -> Self {
        Self(step.to_string())
    }

    pub fn keyed(step: &str, key: &str) -> Self {
        Self(format!("{step}:{key}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn step(&self) -> &str {
        self.0.split(':').next().unwrap_or(&self.0)
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Opaque name the external executor maps to a tool invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ExecutorHandle(String);

impl ExecutorHandle {
    pub fn new(tool: &str) -> Self {
        Self(tool.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum NodeKind {
    PerSample,
    PerGroup,
    Aggregate,
    /// One node for the whole run that is not a fan-in.
    Run,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TaskNode {
    pub id: NodeId,
    pub kind: NodeKind,
    pub executor: ExecutorHandle,
    pub inputs: Vec<Utf8PathBuf>,
    pub outputs: Vec<Utf8PathBuf>,
    pub params: BTreeMap<String, Value>,
    pub threads: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub memory_gb: Option<u32>,
}

impl TaskNode {
    pub fn new(id: NodeId, kind: NodeKind, executor: &str) -> Self {
        Self {
            id,
            kind,
            executor: ExecutorHandle::new(executor),
            inputs: Vec::new(),
            outputs: Vec::new(),
            params: BTreeMap::new(),
            threads: 1,
            memory_gb: None,
        }
    }

    pub fn input(mut self, path: impl Into<Utf8PathBuf>) -> Self {
        self.inputs.push(path.into());
        self
    }

    pub fn inputs<I, P>(mut self, paths: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<Utf8PathBuf>,
    {
        self.inputs.extend(paths.into_iter().map(Into::into));
        self
    }

    pub fn output(mut self, path: impl Into<Utf8PathBuf>) -> Self {
        self.outputs.push(path.into());
        self
    }

    pub fn outputs<I, P>(mut self, paths: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<Utf8PathBuf>,
    {
        self.outputs.extend(paths.into_iter().map(Into::into));
        self
    }

    pub fn param(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.params.insert(key.to_string(), value.into());
        self
    }

    pub fn threads(mut self, threads: usize) -> Self {
        self.threads = threads.max(1);
        self
    }

    pub fn memory_gb(mut self, memory: u32) -> Self {
        self.memory_gb = Some(memory);
        self
    }

    pub fn produces(&self, path: &Utf8Path) -> bool {
        self.outputs.iter().any(|output| output.as_path() == path)
    }
}

/// Nodes selected for a run plus the paths that exist before it starts.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NodeCatalog {
    nodes: Vec<TaskNode>,
    raw_inputs: BTreeSet<Utf8PathBuf>,
}

impl NodeCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, node: TaskNode) -> Result<(), MoscaError> {
        if self.nodes.iter().any(|existing| existing.id == node.id) {
            return Err(MoscaError::DuplicateNode(node.id.to_string()));
        }
        tracing::debug!(node = %node.id, inputs = node.inputs.len(), "registered node");
        self.nodes.push(node);
        Ok(())
    }

    pub fn declare_raw(&mut self, path: impl Into<Utf8PathBuf>) {
        self.raw_inputs.insert(path.into());
    }

    pub fn nodes(&self) -> &[TaskNode] {
        &self.nodes
    }

    pub fn raw_inputs(&self) -> &BTreeSet<Utf8PathBuf> {
        &self.raw_inputs
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn into_parts(self) -> (Vec<TaskNode>, BTreeSet<Utf8PathBuf>) {
        (self.nodes, self.raw_inputs)
    }
}
