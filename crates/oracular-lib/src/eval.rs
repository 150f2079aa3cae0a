//! Per-transaction graph evaluation.
//!
//! A [`GraphEvalState`] holds one [`NodeEvalState`] per node index:
//! the value produced so far and a monotone finished flag. Evaluation is
//! on-demand, depth-first, and idempotent-safe: finished nodes return
//! immediately, and an unfinished node is entered at most once per
//! transaction phase, so a sub-expression shared by several roots is
//! computed once no matter how many oracles query it.

use crate::graph::NodeId;
use crate::graph::frozen::FrozenGraph;
use crate::transaction::TxData;
use crate::value::Value;

/// Evaluation state of a single node slot.
///
/// ```text
/// (value = none, finished = false)
///     → (value = partial, finished = false)   may repeat
///     → (value = final,   finished = true)    terminal
/// ```
#[derive(Debug, Default)]
pub struct NodeEvalState {
    value: Option<Value>,
    finished: bool,
    /// Phase this node was last entered in; bounds work per phase.
    last_phase: Option<u32>,
}

impl NodeEvalState {
    pub fn value(&self) -> Option<&Value> {
        self.value.as_ref()
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// True iff the node has produced a non-null value.
    pub fn is_truthy(&self) -> bool {
        self.value.as_ref().is_some_and(Value::is_truthy)
    }

    /// Marks the node finished with whatever value it has produced.
    pub fn finish(&mut self) {
        debug_assert!(!self.finished, "finish on a finished node");
        self.finished = true;
    }

    /// Sets the final value and marks the node finished.
    pub fn finish_with(&mut self, value: Value) {
        debug_assert!(!self.finished, "finish_with on a finished node");
        self.value = Some(value);
        self.finished = true;
    }

    /// Sets a partial value without finishing.
    pub fn set_value(&mut self, value: Value) {
        debug_assert!(!self.finished, "set_value on a finished node");
        self.value = Some(value);
    }

    /// Appends one element to this node's streaming list value.
    pub fn push_list_value(&mut self, value: Value) {
        debug_assert!(!self.finished, "push_list_value on a finished node");
        match &mut self.value {
            None => self.value = Some(Value::List(vec![value])),
            Some(Value::List(items)) => items.push(value),
            Some(_) => debug_assert!(false, "push_list_value on a scalar value"),
        }
    }
}

/// Parallel per-node evaluation state for one (context, transaction) pair.
#[derive(Debug)]
pub struct GraphEvalState {
    states: Vec<NodeEvalState>,
}

impl GraphEvalState {
    /// Initializes every slot; literal nodes finish immediately with their
    /// value.
    pub fn new(graph: &FrozenGraph) -> Self {
        let mut states: Vec<NodeEvalState> = Vec::with_capacity(graph.index_limit());
        for id in 0..graph.index_limit() as NodeId {
            let mut state = NodeEvalState::default();
            if let Some(value) = graph.literal(id) {
                state.finish_with(value.clone());
            }
            states.push(state);
        }
        Self { states }
    }

    /// Evaluates `node`, descending into children as its call requires.
    ///
    /// Cheap when the node is finished or was already entered this phase.
    pub fn eval(&mut self, graph: &FrozenGraph, env: &TxData, node: NodeId) {
        {
            let state = &mut self.states[node as usize];
            if state.finished || state.last_phase == Some(env.phase()) {
                return;
            }
            state.last_phase = Some(env.phase());
        }
        if let Some(behavior) = graph.behavior(node) {
            behavior.eval(graph, self, env, node);
        }
    }

    pub fn value(&self, node: NodeId) -> Option<&Value> {
        self.states[node as usize].value()
    }

    pub fn is_finished(&self, node: NodeId) -> bool {
        self.states[node as usize].is_finished()
    }

    pub fn is_truthy(&self, node: NodeId) -> bool {
        self.states[node as usize].is_truthy()
    }

    /// Mutable access to one slot, for call implementations.
    pub fn state_mut(&mut self, node: NodeId) -> &mut NodeEvalState {
        &mut self.states[node as usize]
    }

    pub fn state(&self, node: NodeId) -> &NodeEvalState {
        &self.states[node as usize]
    }
}
