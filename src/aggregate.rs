//! Fan-in nodes: one input per upstream sample or group, collected from the live
//! experiment set each time a catalog is built.

use camino::Utf8PathBuf;

use crate::classify::Sample;
use crate::node::{NodeKind, TaskNode};

/// Parameter recording how many upstream units an aggregator was built over.
pub const FAN_IN_PARAM: &str = "fan_in";

#[derive(Debug, Clone)]
pub struct FanIn {
    node: TaskNode,
    upstream: usize,
}

impl FanIn {
    pub fn new(node: TaskNode) -> Self {
        Self {
            node: TaskNode {
                kind: NodeKind::Aggregate,
                ..node
            },
            upstream: 0,
        }
    }

    /// Adds `path(sample)` for every sample, counting each as one upstream unit.
    pub fn over_samples<'s, F>(mut self, samples: impl IntoIterator<Item = &'s Sample>, path: F) -> Self
    where
        F: Fn(&Sample) -> Utf8PathBuf,
    {
        for sample in samples {
            self.node.inputs.push(path(sample));
            self.upstream += 1;
        }
        self
    }

    /// Adds every path of `paths(group)` for every group, counting each group once.
    pub fn over_groups<'g, F>(mut self, groups: impl IntoIterator<Item = &'g str>, paths: F) -> Self
    where
        F: Fn(&str) -> Vec<Utf8PathBuf>,
    {
        for group in groups {
            self.node.inputs.extend(paths(group));
            self.upstream += 1;
        }
        self
    }

    /// Adds an input that does not count toward the fan-in width, such as the
    /// output of another aggregator.
    pub fn with_input(mut self, path: impl Into<Utf8PathBuf>) -> Self {
        self.node.inputs.push(path.into());
        self
    }

    /// The finished node, or `None` when there was nothing to aggregate.
    pub fn build(self) -> Option<TaskNode> {
        if self.upstream == 0 {
            return None;
        }
        let upstream = self.upstream;
        Some(self.node.param(FAN_IN_PARAM, upstream))
    }
}

/// Fan-in width recorded on an aggregator node.
pub fn fan_in_width(node: &TaskNode) -> Option<usize> {
    node.params
        .get(FAN_IN_PARAM)
        .and_then(|value| value.as_u64())
        .map(|width| width as usize)
}
