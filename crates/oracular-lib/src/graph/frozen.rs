//! The immutable runtime form of a context's DAG.
//!
//! At context close the `MergeGraph` is consumed into a [`FrozenGraph`]:
//! every node reachable from a root gets a dense index assigned by
//! deterministic BFS (root-index order, then child order), and the arena is
//! re-materialized so that a node's id *is* its index. Per-transaction
//! evaluation state is a flat array over these indices.

use std::sync::Arc;

use crate::calls::Call;
use crate::value::Value;

use super::{MergeGraph, NodeData, NodeId, NodePayload, bfs};

#[derive(Debug)]
pub(crate) enum FrozenPayload {
    Literal(Value),
    Call {
        name: String,
        behavior: Arc<dyn Call>,
    },
}

#[derive(Debug)]
pub struct FrozenNode {
    pub(crate) payload: FrozenPayload,
    pub(crate) children: Vec<NodeId>,
    pub(crate) sexpr: String,
    pub(crate) origins: Vec<String>,
}

/// A context's frozen node set, shared by reference across transactions.
#[derive(Debug)]
pub struct FrozenGraph {
    nodes: Vec<FrozenNode>,
    /// Distinct root representatives, in first-acquisition order.
    roots: Vec<NodeId>,
    /// Oracle (root) index → node index.
    oracle_to_root: Vec<NodeId>,
}

impl FrozenGraph {
    /// Consumes a lifecycled graph, assigning dense indices by BFS.
    pub(crate) fn freeze(graph: MergeGraph) -> FrozenGraph {
        let mut order: Vec<NodeId> = Vec::with_capacity(graph.len());
        bfs::bfs_down(&graph, graph.roots(), |id| order.push(id));

        let mut index_of = vec![NodeId::MAX; graph.arena_len()];
        for (index, &old) in order.iter().enumerate() {
            index_of[old as usize] = index as NodeId;
        }
        let roots = graph
            .roots()
            .iter()
            .map(|&r| index_of[r as usize])
            .collect();

        let (arena, root_indices) = graph.into_parts();
        let oracle_to_root = root_indices
            .iter()
            .map(|&r| index_of[r as usize])
            .collect();

        let mut slots: Vec<Option<NodeData>> = arena.into_iter().map(Some).collect();
        let nodes = order
            .iter()
            .map(|&old| {
                let data = slots[old as usize]
                    .take()
                    .expect("BFS visits each node exactly once");
                FrozenNode {
                    payload: match data.payload {
                        NodePayload::Literal(value) => FrozenPayload::Literal(value),
                        NodePayload::Call { name, behavior } => {
                            FrozenPayload::Call { name, behavior }
                        }
                    },
                    children: data
                        .children
                        .iter()
                        .map(|&c| index_of[c as usize])
                        .collect(),
                    sexpr: data.sexpr,
                    origins: data.origins,
                }
            })
            .collect();

        FrozenGraph {
            nodes,
            roots,
            oracle_to_root,
        }
    }

    /// One more than the largest node index.
    pub fn index_limit(&self) -> usize {
        self.nodes.len()
    }

    pub fn node(&self, id: NodeId) -> &FrozenNode {
        &self.nodes[id as usize]
    }

    pub(crate) fn node_mut(&mut self, id: NodeId) -> &mut FrozenNode {
        &mut self.nodes[id as usize]
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        &self.node(id).children
    }

    pub fn sexpr(&self, id: NodeId) -> &str {
        &self.node(id).sexpr
    }

    pub fn origins(&self, id: NodeId) -> &[String] {
        &self.node(id).origins
    }

    pub fn call_name(&self, id: NodeId) -> Option<&str> {
        match &self.node(id).payload {
            FrozenPayload::Call { name, .. } => Some(name),
            FrozenPayload::Literal(_) => None,
        }
    }

    pub fn literal(&self, id: NodeId) -> Option<&Value> {
        match &self.node(id).payload {
            FrozenPayload::Literal(value) => Some(value),
            FrozenPayload::Call { .. } => None,
        }
    }

    pub(crate) fn behavior(&self, id: NodeId) -> Option<&dyn Call> {
        match &self.node(id).payload {
            FrozenPayload::Call { behavior, .. } => Some(behavior.as_ref()),
            FrozenPayload::Literal(_) => None,
        }
    }

    /// Distinct root representatives.
    pub fn roots(&self) -> &[NodeId] {
        &self.roots
    }

    /// Resolves an oracle (root) index to its post-transform representative.
    pub fn oracle_root(&self, oracle_index: usize) -> Option<NodeId> {
        self.oracle_to_root.get(oracle_index).copied()
    }

    pub fn oracle_count(&self) -> usize {
        self.oracle_to_root.len()
    }

    /// True iff `target` is reachable from `from` through child edges
    /// (including `from == target`).
    pub fn reaches(&self, from: NodeId, target: NodeId) -> bool {
        if from == target {
            return true;
        }
        let mut visited = vec![false; self.nodes.len()];
        let mut stack = vec![from];
        while let Some(id) = stack.pop() {
            if visited[id as usize] {
                continue;
            }
            visited[id as usize] = true;
            for &child in self.children(id) {
                if child == target {
                    return true;
                }
                stack.push(child);
            }
        }
        false
    }
}
