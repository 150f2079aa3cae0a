//! Transaction-field calls: `field` and `streq`.
//!
//! Fields are set-once: a present field's value is final, a missing field
//! may still arrive until the transaction completes. Both calls therefore
//! stay pending on a missing field and only conclude falsy once the host
//! declares the transaction complete.

use crate::Result;
use crate::calls::{Call, CallFactory, ValidationPhase};
use crate::diagnostics::NodeReporter;
use crate::eval::GraphEvalState;
use crate::graph::frozen::FrozenGraph;
use crate::graph::{MergeGraph, NodeId};
use crate::transaction::TxData;
use crate::value::Value;

pub(super) fn load(factory: &mut CallFactory) -> Result<()> {
    factory.register("field", || Box::new(Field))?;
    factory.register("streq", || Box::new(StrEq))?;
    Ok(())
}

/// The name a child node has produced, if any.
fn name_of(state: &GraphEvalState, node: NodeId) -> Option<Vec<u8>> {
    state.value(node)?.as_bytes().map(<[u8]>::to_vec)
}

fn check_name_argument(graph: &MergeGraph, child: NodeId, reporter: &mut NodeReporter<'_>) {
    if let Some(value) = graph.literal(child) {
        if value.as_bytes().is_none() {
            reporter.error("field name must be a string literal");
        }
    }
}

/// `(field 'name')`: the named transaction field's value.
#[derive(Debug)]
pub struct Field;

impl Call for Field {
    fn name(&self) -> &str {
        "field"
    }

    fn validate(
        &self,
        graph: &MergeGraph,
        node: NodeId,
        _phase: ValidationPhase,
        reporter: &mut NodeReporter<'_>,
    ) {
        if graph.children(node).len() != 1 {
            reporter.error("`field` takes 1 argument (the field name)");
            return;
        }
        check_name_argument(graph, graph.children(node)[0], reporter);
    }

    fn eval(&self, graph: &FrozenGraph, state: &mut GraphEvalState, env: &TxData, node: NodeId) {
        let child = graph.children(node)[0];
        state.eval(graph, env, child);
        let Some(name) = name_of(state, child) else {
            if state.is_finished(child) {
                state.state_mut(node).finish();
            }
            return;
        };
        match env.field_bytes(&name) {
            Some(value) => {
                let value = value.clone();
                state.state_mut(node).finish_with(value);
            }
            None if env.is_complete() => state.state_mut(node).finish(),
            None => {}
        }
    }
}

/// `(streq name expected)`: truthy iff the transaction field named by the
/// first operand's value equals the expected bytes.
#[derive(Debug)]
pub struct StrEq;

impl Call for StrEq {
    fn name(&self) -> &str {
        "streq"
    }

    fn validate(
        &self,
        graph: &MergeGraph,
        node: NodeId,
        _phase: ValidationPhase,
        reporter: &mut NodeReporter<'_>,
    ) {
        if graph.children(node).len() != 2 {
            reporter.error("`streq` takes 2 arguments (field name, expected value)");
            return;
        }
        check_name_argument(graph, graph.children(node)[0], reporter);
    }

    fn eval(&self, graph: &FrozenGraph, state: &mut GraphEvalState, env: &TxData, node: NodeId) {
        let name_node = graph.children(node)[0];
        let expected_node = graph.children(node)[1];
        state.eval(graph, env, name_node);
        state.eval(graph, env, expected_node);

        let Some(name) = name_of(state, name_node) else {
            if state.is_finished(name_node) {
                state.state_mut(node).finish();
            }
            return;
        };
        let actual = match env.field_bytes(&name) {
            Some(value) => value.clone(),
            None if env.is_complete() => {
                state.state_mut(node).finish();
                return;
            }
            None => return,
        };
        match state.value(expected_node).cloned() {
            Some(expected) => {
                if actual == expected {
                    state.state_mut(node).finish_with(Value::Number(1));
                } else {
                    state.state_mut(node).finish();
                }
            }
            None if state.is_finished(expected_node) => state.state_mut(node).finish(),
            None => {}
        }
    }
}
