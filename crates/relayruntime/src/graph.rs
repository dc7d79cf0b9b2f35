use petgraph::algo::toposort;
use petgraph::graph::DiGraph;
use relaycore::{NodeSpec, Workflow, WorkflowError, WorkflowId};
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Arc;

/// How cyclic graphs are treated
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CyclePolicy {
    /// Refuse to build a graph that contains a cycle
    #[default]
    Reject,
    /// Accept the graph; traversal fails when a node reappears on its own path
    Guard,
}

/// Read-only view over one workflow snapshot
///
/// Built once per execution and shared across concurrent readers.
#[derive(Debug, Clone)]
pub struct WorkflowGraph {
    workflow: Arc<Workflow>,
    index: HashMap<String, usize>,
    downstream: Vec<Vec<usize>>,
    entries: Vec<usize>,
}

impl WorkflowGraph {
    /// Validate the workflow and index it for traversal
    pub fn new(
        workflow: impl Into<Arc<Workflow>>,
        policy: CyclePolicy,
    ) -> Result<Self, WorkflowError> {
        let workflow = workflow.into();
        workflow.validate()?;

        let index: HashMap<String, usize> = workflow
            .nodes
            .iter()
            .enumerate()
            .map(|(i, node)| (node.id.clone(), i))
            .collect();

        // Declared connection order is the sibling order
        let mut downstream = vec![Vec::new(); workflow.nodes.len()];
        for conn in &workflow.connections {
            let from = index[&conn.source];
            let to = index[&conn.target];
            downstream[from].push(to);
        }

        let entries = workflow
            .nodes
            .iter()
            .enumerate()
            .filter(|(_, node)| node.is_trigger())
            .map(|(i, _)| i)
            .collect();

        let graph = Self {
            workflow,
            index,
            downstream,
            entries,
        };

        if policy == CyclePolicy::Reject && graph.is_cyclic() {
            return Err(WorkflowError::CyclicDependency);
        }

        Ok(graph)
    }

    pub fn workflow(&self) -> &Workflow {
        &self.workflow
    }

    pub fn workflow_id(&self) -> WorkflowId {
        self.workflow.id
    }

    pub fn node(&self, id: &str) -> Option<&NodeSpec> {
        self.index.get(id).map(|&i| &self.workflow.nodes[i])
    }

    /// Trigger-classified nodes in declared order
    pub fn entry_nodes(&self) -> Vec<&NodeSpec> {
        self.entries
            .iter()
            .map(|&i| &self.workflow.nodes[i])
            .collect()
    }

    /// Targets of every connection leaving `node_id`, in declared order
    ///
    /// A target reached through two connections appears twice.
    pub fn downstream_of(&self, node_id: &str) -> Vec<&NodeSpec> {
        self.index
            .get(node_id)
            .map(|&i| {
                self.downstream[i]
                    .iter()
                    .map(|&t| &self.workflow.nodes[t])
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn is_cyclic(&self) -> bool {
        let mut graph = DiGraph::<usize, ()>::new();
        let nodes: Vec<_> = (0..self.workflow.nodes.len())
            .map(|i| graph.add_node(i))
            .collect();
        for (from, targets) in self.downstream.iter().enumerate() {
            for &to in targets {
                graph.add_edge(nodes[from], nodes[to], ());
            }
        }
        toposort(&graph, None).is_err()
    }

    pub(crate) fn entry_indices(&self) -> &[usize] {
        &self.entries
    }

    pub(crate) fn downstream_indices(&self, index: usize) -> &[usize] {
        &self.downstream[index]
    }

    pub(crate) fn node_at(&self, index: usize) -> &NodeSpec {
        &self.workflow.nodes[index]
    }
}
