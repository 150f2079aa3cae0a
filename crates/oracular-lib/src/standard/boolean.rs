//! Boolean calls: `true`, `false`, `not`, `and`, `or`.
//!
//! Truth is monotone: a node with a non-null value is truthy and stays
//! truthy, a node that finishes without a value is falsy. `and`/`or`
//! exploit this to finish (and stop evaluating operands) as soon as their
//! outcome is determined, and they constant-fold at transform time so that
//! statically decidable sub-expressions vanish from the graph.

use crate::Result;
use crate::calls::{Call, CallFactory, ValidationPhase};
use crate::diagnostics::NodeReporter;
use crate::eval::GraphEvalState;
use crate::graph::frozen::FrozenGraph;
use crate::graph::{MergeGraph, NodeId};
use crate::parser::ast::Expr;
use crate::transaction::TxData;
use crate::value::Value;

pub(super) fn load(factory: &mut CallFactory) -> Result<()> {
    factory.register("true", || Box::new(True))?;
    factory.register("false", || Box::new(False))?;
    factory.register("not", || Box::new(Not))?;
    factory.register("and", || Box::new(And))?;
    factory.register("or", || Box::new(Or))?;
    Ok(())
}

/// The value truthy calls produce.
fn truthy_value() -> Value {
    Value::Number(1)
}

/// Compile-time truth of a node, where decidable: literals and the
/// constant calls.
fn constant_truth(graph: &MergeGraph, node: NodeId) -> Option<bool> {
    if let Some(value) = graph.literal(node) {
        return Some(value.is_truthy());
    }
    match graph.sexpr(node) {
        "(true)" => Some(true),
        "(false)" => Some(false),
        _ => None,
    }
}

fn expect_arity(
    graph: &MergeGraph,
    node: NodeId,
    name: &str,
    expected: usize,
    reporter: &mut NodeReporter<'_>,
) {
    let actual = graph.children(node).len();
    if actual != expected {
        reporter.error(format!(
            "`{name}` takes {expected} argument(s), got {actual}"
        ));
    }
}

#[derive(Debug)]
pub struct True;

impl Call for True {
    fn name(&self) -> &str {
        "true"
    }

    fn validate(
        &self,
        graph: &MergeGraph,
        node: NodeId,
        _phase: ValidationPhase,
        reporter: &mut NodeReporter<'_>,
    ) {
        expect_arity(graph, node, "true", 0, reporter);
    }

    fn eval(&self, _graph: &FrozenGraph, state: &mut GraphEvalState, _env: &TxData, node: NodeId) {
        state.state_mut(node).finish_with(truthy_value());
    }
}

#[derive(Debug)]
pub struct False;

impl Call for False {
    fn name(&self) -> &str {
        "false"
    }

    fn validate(
        &self,
        graph: &MergeGraph,
        node: NodeId,
        _phase: ValidationPhase,
        reporter: &mut NodeReporter<'_>,
    ) {
        expect_arity(graph, node, "false", 0, reporter);
    }

    fn eval(&self, _graph: &FrozenGraph, state: &mut GraphEvalState, _env: &TxData, node: NodeId) {
        state.state_mut(node).finish();
    }
}

#[derive(Debug)]
pub struct Not;

impl Call for Not {
    fn name(&self) -> &str {
        "not"
    }

    fn validate(
        &self,
        graph: &MergeGraph,
        node: NodeId,
        _phase: ValidationPhase,
        reporter: &mut NodeReporter<'_>,
    ) {
        expect_arity(graph, node, "not", 1, reporter);
    }

    fn transform(
        &self,
        graph: &mut MergeGraph,
        factory: &CallFactory,
        node: NodeId,
        _reporter: &mut NodeReporter<'_>,
    ) -> Result<bool> {
        let &[child] = graph.children(node) else {
            return Ok(false);
        };
        match constant_truth(graph, child) {
            Some(truth) => {
                let folded = if truth { "false" } else { "true" };
                graph.replace_with_expr(node, &Expr::call(folded, Vec::new()), factory)?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn eval(&self, graph: &FrozenGraph, state: &mut GraphEvalState, env: &TxData, node: NodeId) {
        let child = graph.children(node)[0];
        state.eval(graph, env, child);
        if state.is_truthy(child) {
            state.state_mut(node).finish();
        } else if state.is_finished(child) {
            state.state_mut(node).finish_with(truthy_value());
        }
    }
}

#[derive(Debug)]
pub struct And;

impl Call for And {
    fn name(&self) -> &str {
        "and"
    }

    fn validate(
        &self,
        graph: &MergeGraph,
        node: NodeId,
        _phase: ValidationPhase,
        reporter: &mut NodeReporter<'_>,
    ) {
        if graph.children(node).is_empty() {
            reporter.error("`and` requires at least one argument");
        }
    }

    fn transform(
        &self,
        graph: &mut MergeGraph,
        factory: &CallFactory,
        node: NodeId,
        _reporter: &mut NodeReporter<'_>,
    ) -> Result<bool> {
        fold_variadic(graph, factory, node, "and", false)
    }

    fn eval(&self, graph: &FrozenGraph, state: &mut GraphEvalState, env: &TxData, node: NodeId) {
        let mut all_truthy = true;
        for &child in graph.children(node) {
            state.eval(graph, env, child);
            if state.is_finished(child) && !state.is_truthy(child) {
                state.state_mut(node).finish();
                return;
            }
            if !state.is_truthy(child) {
                all_truthy = false;
            }
        }
        if all_truthy {
            state.state_mut(node).finish_with(truthy_value());
        }
    }
}

#[derive(Debug)]
pub struct Or;

impl Call for Or {
    fn name(&self) -> &str {
        "or"
    }

    fn validate(
        &self,
        graph: &MergeGraph,
        node: NodeId,
        _phase: ValidationPhase,
        reporter: &mut NodeReporter<'_>,
    ) {
        if graph.children(node).is_empty() {
            reporter.error("`or` requires at least one argument");
        }
    }

    fn transform(
        &self,
        graph: &mut MergeGraph,
        factory: &CallFactory,
        node: NodeId,
        _reporter: &mut NodeReporter<'_>,
    ) -> Result<bool> {
        fold_variadic(graph, factory, node, "or", true)
    }

    fn eval(&self, graph: &FrozenGraph, state: &mut GraphEvalState, env: &TxData, node: NodeId) {
        let mut all_finished = true;
        for &child in graph.children(node) {
            state.eval(graph, env, child);
            if state.is_truthy(child) {
                state.state_mut(node).finish_with(truthy_value());
                return;
            }
            if !state.is_finished(child) {
                all_finished = false;
            }
        }
        if all_finished {
            state.state_mut(node).finish();
        }
    }
}

/// Shared folding for `and`/`or`.
///
/// With `absorbing = true` this folds like `or`: a constant-true operand
/// absorbs the whole call, constant-false operands drop out. With
/// `absorbing = false` the dual (`and`). Single-operand forms collapse to
/// the operand.
fn fold_variadic(
    graph: &mut MergeGraph,
    factory: &CallFactory,
    node: NodeId,
    name: &str,
    absorbing: bool,
) -> Result<bool> {
    let children = graph.children(node).to_vec();
    if children.is_empty() {
        return Ok(false);
    }

    let absorb_call = if absorbing { "true" } else { "false" };
    let neutral_call = if absorbing { "false" } else { "true" };

    if children
        .iter()
        .any(|&c| constant_truth(graph, c) == Some(absorbing))
    {
        graph.replace_with_expr(node, &Expr::call(absorb_call, Vec::new()), factory)?;
        return Ok(true);
    }

    let kept: Vec<NodeId> = children
        .iter()
        .copied()
        .filter(|&c| constant_truth(graph, c) != Some(!absorbing))
        .collect();
    if kept.len() == children.len() && kept.len() > 1 {
        return Ok(false);
    }
    match kept.as_slice() {
        [] => {
            graph.replace_with_expr(node, &Expr::call(neutral_call, Vec::new()), factory)?;
        }
        &[only] => {
            graph.replace(node, only)?;
        }
        _ => {
            let args = kept.iter().map(|&c| graph.expr(c)).collect();
            graph.replace_with_expr(node, &Expr::call(name, args), factory)?;
        }
    }
    Ok(true)
}
