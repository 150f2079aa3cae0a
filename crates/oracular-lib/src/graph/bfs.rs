//! Deterministic breadth-first traversals over the DAG.
//!
//! `bfs_down` walks child edges from a seed sequence, visiting each node
//! once, in seed order then child order; this is also the order used for
//! node indexing. `bfs_up` walks parent back-references from one node,
//! visiting the node itself first; parents iterate in id order.

use std::collections::VecDeque;

use super::{MergeGraph, NodeId};

/// Visits every node reachable from `seeds` through child edges, each
/// exactly once, parents before the children they introduce.
pub fn bfs_down(
    graph: &MergeGraph,
    seeds: impl IntoIterator<Item = NodeId>,
    mut visit: impl FnMut(NodeId),
) {
    let mut seen = vec![false; graph.arena_len()];
    let mut queue: VecDeque<NodeId> = VecDeque::new();
    for seed in seeds {
        if !seen[seed as usize] {
            seen[seed as usize] = true;
            queue.push_back(seed);
        }
    }
    while let Some(id) = queue.pop_front() {
        visit(id);
        for &child in graph.children(id) {
            if !seen[child as usize] {
                seen[child as usize] = true;
                queue.push_back(child);
            }
        }
    }
}

/// Visits `seed` and every node that transitively depends on it.
pub fn bfs_up(graph: &MergeGraph, seed: NodeId, mut visit: impl FnMut(NodeId)) {
    let mut seen = vec![false; graph.arena_len()];
    let mut queue: VecDeque<NodeId> = VecDeque::new();
    seen[seed as usize] = true;
    queue.push_back(seed);
    while let Some(id) = queue.pop_front() {
        visit(id);
        for parent in graph.parents(id) {
            if !seen[parent as usize] {
                seen[parent as usize] = true;
                queue.push_back(parent);
            }
        }
    }
}
