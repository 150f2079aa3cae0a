use crate::calls::{Call, CallFactory, ValidationPhase};
use crate::diagnostics::NodeReporter;
use crate::eval::GraphEvalState;
use crate::graph::frozen::FrozenGraph;
use crate::graph::{MergeGraph, NodeId};
use crate::lifecycle::{self, TRANSFORM_PASS_LIMIT};
use crate::parser::parse_expression;
use crate::standard;
use crate::transaction::TxData;
use crate::{Error, Result};

fn factory() -> CallFactory {
    let mut factory = CallFactory::new();
    standard::load(&mut factory).unwrap();
    factory
}

fn graph_with(factory: &CallFactory, sources: &[&str]) -> MergeGraph {
    let mut graph = MergeGraph::new();
    for source in sources {
        let expr = parse_expression(source, factory, "test:1").unwrap();
        graph.add_root(&expr, factory).unwrap();
    }
    graph
}

#[test]
fn constant_folding_reduces_root_to_false() {
    let factory = factory();
    let graph = graph_with(&factory, &["(and (true) (true) (false))"]);
    let (frozen, warnings) = lifecycle::run(graph, &factory, None).unwrap();

    let root = frozen.oracle_root(0).unwrap();
    assert_eq!(frozen.sexpr(root), "(false)");
    assert!(warnings.is_empty());
}

#[test]
fn folding_cascades_through_nesting() {
    let factory = factory();
    let graph = graph_with(&factory, &["(or (and (true) (false)) (streq 'a' 'b'))"]);
    let (frozen, _) = lifecycle::run(graph, &factory, None).unwrap();

    let root = frozen.oracle_root(0).unwrap();
    assert_eq!(frozen.sexpr(root), "(streq 'a' 'b')");
}

#[test]
fn literal_operands_fold_too() {
    let factory = factory();
    let graph = graph_with(&factory, &["(and null (streq 'a' 'b'))"]);
    let (frozen, _) = lifecycle::run(graph, &factory, None).unwrap();
    assert_eq!(frozen.sexpr(frozen.oracle_root(0).unwrap()), "(false)");

    let graph = graph_with(&factory, &["(and 1 (streq 'a' 'b'))"]);
    let (frozen, _) = lifecycle::run(graph, &factory, None).unwrap();
    assert_eq!(
        frozen.sexpr(frozen.oracle_root(0).unwrap()),
        "(streq 'a' 'b')"
    );
}

#[test]
fn indices_are_dense_and_deterministic() {
    let factory = factory();
    let graph = graph_with(
        &factory,
        &[
            "(and (streq 'a' 'b') (streq 'c' 'd'))",
            "(or (streq 'a' 'b') (not (streq 'c' 'd')))",
        ],
    );
    let live = graph.len();
    let (frozen, _) = lifecycle::run(graph, &factory, None).unwrap();

    // Every reachable node got exactly one dense index.
    assert_eq!(frozen.index_limit(), live);
    for id in 0..frozen.index_limit() as NodeId {
        for &child in frozen.children(id) {
            assert!((child as usize) < frozen.index_limit());
        }
    }
    // Structural keys stay unique after freezing.
    let mut sexprs: Vec<&str> = (0..frozen.index_limit() as NodeId)
        .map(|id| frozen.sexpr(id))
        .collect();
    sexprs.sort_unstable();
    sexprs.dedup();
    assert_eq!(sexprs.len(), frozen.index_limit());
}

#[test]
fn shared_subexpressions_keep_one_index() {
    let factory = factory();
    let graph = graph_with(
        &factory,
        &["(not (streq 'a' 'b'))", "(and (streq 'a' 'b') (true))"],
    );
    let (frozen, _) = lifecycle::run(graph, &factory, None).unwrap();

    let not_root = frozen.oracle_root(0).unwrap();
    let and_root = frozen.oracle_root(1).unwrap();
    assert_eq!(frozen.children(not_root)[0], frozen.children(and_root)[0]);
}

#[test]
fn validation_errors_abort_before_transform() {
    let factory = factory();
    let graph = graph_with(&factory, &["(not)"]);
    let err = lifecycle::run(graph, &factory, None).unwrap_err();
    let Error::Validation { phase, diagnostics } = err else {
        panic!("expected Validation, got {err}");
    };
    assert_eq!(phase, ValidationPhase::Pre);
    assert_eq!(diagnostics.error_count(), 1);
}

#[test]
fn validation_is_idempotent() {
    let factory = factory();
    let graph = graph_with(&factory, &["(not)", "(and)"]);
    let copy = graph.copy(&factory).unwrap();

    let first = match lifecycle::run(graph, &factory, None).unwrap_err() {
        Error::Validation { diagnostics, .. } => diagnostics,
        other => panic!("expected Validation, got {other}"),
    };
    let second = match lifecycle::run(copy, &factory, None).unwrap_err() {
        Error::Validation { diagnostics, .. } => diagnostics,
        other => panic!("expected Validation, got {other}"),
    };
    assert_eq!(first.error_count(), second.error_count());
    let mut first: Vec<String> = first.iter().map(|d| d.to_string()).collect();
    let mut second: Vec<String> = second.iter().map(|d| d.to_string()).collect();
    first.sort();
    second.sort();
    assert_eq!(first, second);
}

#[test]
fn validation_blames_node_with_origins_and_roots() {
    let factory = factory();
    let mut graph = MergeGraph::new();
    let expr = parse_expression("(or (not) (true))", &factory, "test:1").unwrap();
    let index = graph.add_root(&expr, &factory).unwrap();
    graph.add_origin(graph.root_node(index).unwrap(), "rules.conf:12");

    let err = lifecycle::run(graph, &factory, None).unwrap_err();
    let Error::Validation { diagnostics, .. } = err else {
        panic!("expected Validation");
    };
    let diagnostic = diagnostics.iter().next().unwrap();
    let blame = diagnostic.blame.as_ref().unwrap();
    assert_eq!(blame.sexpr, "(not)");
    assert_eq!(blame.roots.len(), 1);
    assert_eq!(blame.roots[0].sexpr, "(or (not) (true))");
    assert_eq!(blame.roots[0].origins, ["rules.conf:12"]);
}

/// A transform that always claims it changed something.
#[derive(Debug)]
struct Restless;

impl Call for Restless {
    fn name(&self) -> &str {
        "restless"
    }

    fn transform(
        &self,
        _graph: &mut MergeGraph,
        _factory: &CallFactory,
        _node: NodeId,
        _reporter: &mut NodeReporter<'_>,
    ) -> Result<bool> {
        Ok(true)
    }

    fn eval(&self, _graph: &FrozenGraph, state: &mut GraphEvalState, _env: &TxData, node: NodeId) {
        state.state_mut(node).finish();
    }
}

#[test]
fn non_convergent_transform_hits_the_pass_cap() {
    let mut factory = factory();
    factory.register("restless", || Box::new(Restless)).unwrap();
    let graph = graph_with(&factory, &["(restless)"]);
    let err = lifecycle::run(graph, &factory, None).unwrap_err();
    assert!(
        matches!(err, Error::TransformDivergence(passes) if passes == TRANSFORM_PASS_LIMIT),
        "{err}"
    );
}

/// A call that validates with a warning but no error.
#[derive(Debug)]
struct Grumbling;

impl Call for Grumbling {
    fn name(&self) -> &str {
        "grumbling"
    }

    fn validate(
        &self,
        _graph: &MergeGraph,
        _node: NodeId,
        phase: ValidationPhase,
        reporter: &mut NodeReporter<'_>,
    ) {
        if phase == ValidationPhase::Pre {
            reporter.warning("this call is deprecated");
        }
    }

    fn eval(&self, _graph: &FrozenGraph, state: &mut GraphEvalState, _env: &TxData, node: NodeId) {
        state.state_mut(node).finish();
    }
}

#[test]
fn warnings_do_not_abort_the_lifecycle() {
    let mut factory = factory();
    factory
        .register("grumbling", || Box::new(Grumbling))
        .unwrap();
    let graph = graph_with(&factory, &["(grumbling)"]);
    let (_, warnings) = lifecycle::run(graph, &factory, None).unwrap();
    assert_eq!(warnings.warning_count(), 1);
    assert_eq!(warnings.error_count(), 0);
}

#[test]
fn debug_sink_receives_both_checkpoints() {
    let factory = factory();
    let graph = graph_with(&factory, &["(and (true) (false))"]);
    let mut sink = Vec::new();
    lifecycle::run(graph, &factory, Some(&mut sink)).unwrap();
    let report = String::from_utf8(sink).unwrap();
    assert!(report.contains("Before transform:"), "{report}");
    assert!(report.contains("After transform:"), "{report}");
    assert!(report.contains("(and (true) (false))"), "{report}");
    assert!(report.contains("root 0 -> "), "{report}");
}
