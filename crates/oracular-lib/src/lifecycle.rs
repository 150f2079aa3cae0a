//! The graph lifecycle, run once per context at close.
//!
//! Stages, in order: internal audit, validate (pre-transform), transform
//! to fixpoint, audit again, validate (post-transform), index + freeze,
//! pre-evaluate. Each stage gathers as many diagnostics as it can, then
//! aborts if any of them is an error; warnings never abort and are
//! returned alongside the frozen graph. A hard pass cap bounds
//! non-convergent transform sets.

use std::io::Write;
use std::sync::Arc;

use crate::calls::{CallFactory, PreEvalChild, ValidationPhase};
use crate::diagnostics::{Diagnostics, Reporter};
use crate::graph::frozen::{FrozenGraph, FrozenPayload};
use crate::graph::{MergeGraph, NodeId, bfs};
use crate::{Error, Result};

/// Upper bound on transform passes before giving up on convergence.
pub const TRANSFORM_PASS_LIMIT: usize = 1000;

/// Runs the full lifecycle, consuming the configuration-time graph.
///
/// `debug` receives the DAG dump before and after the transform stage
/// when set. On success, returns the frozen graph together with every
/// warning the stages produced.
pub fn run(
    mut graph: MergeGraph,
    factory: &CallFactory,
    mut debug: Option<&mut dyn Write>,
) -> Result<(FrozenGraph, Diagnostics)> {
    let mut warnings = Diagnostics::new();

    assert_valid(&graph)?;

    if let Some(w) = debug.as_deref_mut() {
        writeln!(w, "Before transform:")?;
        graph.write_debug_report(w)?;
    }

    validate(&graph, ValidationPhase::Pre, &mut warnings)?;
    transform_to_fixpoint(&mut graph, factory, &mut warnings)?;
    assert_valid(&graph)?;

    if let Some(w) = debug.as_deref_mut() {
        writeln!(w, "After transform:")?;
        graph.write_debug_report(w)?;
    }

    validate(&graph, ValidationPhase::Post, &mut warnings)?;

    let mut frozen = FrozenGraph::freeze(graph);
    pre_evaluate(&mut frozen, &mut warnings)?;

    Ok((frozen, warnings))
}

/// Nodes reachable from the roots, in indexing order.
fn reachable(graph: &MergeGraph) -> Vec<NodeId> {
    let mut order = Vec::with_capacity(graph.len());
    bfs::bfs_down(graph, graph.roots(), |id| order.push(id));
    order
}

fn assert_valid(graph: &MergeGraph) -> Result<()> {
    let mut report = Vec::new();
    let clean = graph
        .write_validation_report(&mut report)
        .expect("Vec write never fails");
    if clean {
        Ok(())
    } else {
        Err(Error::InvalidState(
            String::from_utf8_lossy(&report).into_owned(),
        ))
    }
}

fn validate(
    graph: &MergeGraph,
    phase: ValidationPhase,
    warnings: &mut Diagnostics,
) -> Result<()> {
    let mut reporter = Reporter::new();
    for id in reachable(graph) {
        let Some(behavior) = graph.behavior(id) else {
            continue;
        };
        let sexpr = graph.sexpr(id).to_string();
        behavior.validate(graph, id, phase, &mut reporter.node(id, &sexpr));
    }
    let diagnostics = reporter.resolve(graph);
    if reporter.has_errors() {
        return Err(Error::Validation { phase, diagnostics });
    }
    warnings.extend(diagnostics);
    Ok(())
}

fn transform_to_fixpoint(
    graph: &mut MergeGraph,
    factory: &CallFactory,
    warnings: &mut Diagnostics,
) -> Result<()> {
    let mut passes = 0;
    loop {
        let mut reporter = Reporter::new();
        let mut changed = false;
        for id in reachable(graph) {
            // A rewrite earlier in this pass may have collapsed the node.
            if !graph.is_live(id) {
                continue;
            }
            let Some(behavior) = graph.behavior(id) else {
                continue;
            };
            let sexpr = graph.sexpr(id).to_string();
            changed |= behavior.transform(graph, factory, id, &mut reporter.node(id, &sexpr))?;
        }
        let diagnostics = reporter.resolve(graph);
        if reporter.has_errors() {
            return Err(Error::Transform(diagnostics));
        }
        warnings.extend(diagnostics);

        if !changed {
            return Ok(());
        }
        passes += 1;
        if passes >= TRANSFORM_PASS_LIMIT {
            return Err(Error::TransformDivergence(passes));
        }
    }
}

fn pre_evaluate(frozen: &mut FrozenGraph, warnings: &mut Diagnostics) -> Result<()> {
    let mut reporter = Reporter::new();
    for id in 0..frozen.index_limit() as NodeId {
        let children: Vec<PreEvalChild> = frozen
            .children(id)
            .iter()
            .map(|&child| PreEvalChild {
                sexpr: frozen.sexpr(child).to_string(),
                literal: frozen.literal(child).cloned(),
            })
            .collect();
        let sexpr = frozen.sexpr(id).to_string();
        if let FrozenPayload::Call { behavior, .. } = &mut frozen.node_mut(id).payload {
            let behavior =
                Arc::get_mut(behavior).expect("frozen graph is unshared until close completes");
            behavior.pre_evaluate(&children, &mut reporter.node(id, &sexpr));
        }
    }
    let diagnostics = reporter.resolve_frozen(frozen);
    if reporter.has_errors() {
        return Err(Error::PreEvaluation(diagnostics));
    }
    warnings.extend(diagnostics);
    Ok(())
}
