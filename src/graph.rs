//! Graph assembly: links nodes by exact path equality between declared outputs and
//! inputs and rejects catalogs that an executor could not schedule.

use std::collections::{BTreeMap, BTreeSet, VecDeque};

use camino::{Utf8Path, Utf8PathBuf};
use serde::Serialize;

use crate::error::MoscaError;
use crate::node::{NodeCatalog, NodeId, TaskNode};

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub struct Edge {
    pub from: NodeId,
    pub to: NodeId,
    pub path: Utf8PathBuf,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TaskGraph {
    nodes: Vec<TaskNode>,
    raw_inputs: BTreeSet<Utf8PathBuf>,
    edges: Vec<Edge>,
    #[serde(skip)]
    producers: BTreeMap<Utf8PathBuf, usize>,
    order: Vec<NodeId>,
}

impl TaskGraph {
    pub fn assemble(catalog: NodeCatalog) -> Result<Self, MoscaError> {
        let (nodes, raw_inputs) = catalog.into_parts();

        let mut seen = BTreeSet::new();
        for node in &nodes {
            if !seen.insert(&node.id) {
                return Err(MoscaError::DuplicateNode(node.id.to_string()));
            }
        }

        let mut producers = BTreeMap::<Utf8PathBuf, usize>::new();
        for (idx, node) in nodes.iter().enumerate() {
            for output in &node.outputs {
                if let Some(&first) = producers.get(output) {
                    return Err(MoscaError::AmbiguousOutput {
                        path: output.clone(),
                        first: nodes[first].id.to_string(),
                        second: node.id.to_string(),
                    });
                }
                producers.insert(output.clone(), idx);
            }
        }

        let mut edges = Vec::new();
        for node in &nodes {
            for input in &node.inputs {
                match producers.get(input) {
                    Some(&producer) => edges.push(Edge {
                        from: nodes[producer].id.clone(),
                        to: node.id.clone(),
                        path: input.clone(),
                    }),
                    None if raw_inputs.contains(input) => {}
                    None => {
                        return Err(MoscaError::UnresolvedDependency {
                            path: input.clone(),
                            node: node.id.to_string(),
                        });
                    }
                }
            }
        }
        edges.sort();
        edges.dedup();

        let order = topological_order(&nodes, &edges)?;
        tracing::info!(
            nodes = nodes.len(),
            edges = edges.len(),
            raw_inputs = raw_inputs.len(),
            "task graph assembled"
        );

        Ok(Self {
            nodes,
            raw_inputs,
            edges,
            producers,
            order,
        })
    }

    pub fn nodes(&self) -> &[TaskNode] {
        &self.nodes
    }

    pub fn node(&self, id: &str) -> Option<&TaskNode> {
        self.nodes.iter().find(|node| node.id.as_str() == id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.node(id).is_some()
    }

    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    pub fn raw_inputs(&self) -> &BTreeSet<Utf8PathBuf> {
        &self.raw_inputs
    }

    pub fn producer_of(&self, path: &Utf8Path) -> Option<&NodeId> {
        self.producers.get(path).map(|&idx| &self.nodes[idx].id)
    }

    /// Distinct nodes whose outputs `id` consumes.
    pub fn dependencies(&self, id: &str) -> Vec<&NodeId> {
        let deps = self
            .edges
            .iter()
            .filter(|edge| edge.to.as_str() == id)
            .map(|edge| &edge.from)
            .collect::<BTreeSet<_>>();
        deps.into_iter().collect()
    }

    /// Distinct nodes consuming any output of `id`.
    pub fn dependents(&self, id: &str) -> Vec<&NodeId> {
        let dependents = self
            .edges
            .iter()
            .filter(|edge| edge.from.as_str() == id)
            .map(|edge| &edge.to)
            .collect::<BTreeSet<_>>();
        dependents.into_iter().collect()
    }

    /// Nodes that only read raw inputs.
    pub fn roots(&self) -> Vec<&NodeId> {
        let targets = self
            .edges
            .iter()
            .map(|edge| &edge.to)
            .collect::<BTreeSet<_>>();
        self.nodes
            .iter()
            .map(|node| &node.id)
            .filter(|id| !targets.contains(id))
            .collect()
    }

    /// Deterministic order in which every producer precedes its consumers.
    pub fn topological_order(&self) -> &[NodeId] {
        &self.order
    }
}

fn topological_order(nodes: &[TaskNode], edges: &[Edge]) -> Result<Vec<NodeId>, MoscaError> {
    let position = nodes
        .iter()
        .enumerate()
        .map(|(idx, node)| (&node.id, idx))
        .collect::<BTreeMap<_, _>>();

    let mut indegree = vec![0usize; nodes.len()];
    let mut successors = vec![BTreeSet::new(); nodes.len()];
    for edge in edges {
        let from = position[&edge.from];
        let to = position[&edge.to];
        if from == to {
            return Err(MoscaError::DependencyCycle(edge.to.to_string()));
        }
        if successors[from].insert(to) {
            indegree[to] += 1;
        }
    }

    let mut ready = (0..nodes.len())
        .filter(|&idx| indegree[idx] == 0)
        .collect::<VecDeque<_>>();
    let mut order = Vec::with_capacity(nodes.len());
    while let Some(idx) = ready.pop_front() {
        order.push(nodes[idx].id.clone());
        for &next in &successors[idx] {
            indegree[next] -= 1;
            if indegree[next] == 0 {
                ready.push_back(next);
            }
        }
    }

    if order.len() != nodes.len() {
        let stuck = indegree
            .iter()
            .position(|&degree| degree > 0)
            .map(|idx| nodes[idx].id.to_string())
            .unwrap_or_default();
        return Err(MoscaError::DependencyCycle(stuck));
    }
    Ok(order)
}
