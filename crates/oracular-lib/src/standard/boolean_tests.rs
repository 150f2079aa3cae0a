use crate::calls::CallFactory;
use crate::context::Engine;
use crate::graph::MergeGraph;
use crate::lifecycle;
use crate::parser::parse_expression;
use crate::standard;
use crate::transaction::Transaction;
use crate::value::Value;

fn folded(source: &str) -> String {
    let mut factory = CallFactory::new();
    standard::load(&mut factory).unwrap();
    let mut graph = MergeGraph::new();
    let expr = parse_expression(source, &factory, "test:1").unwrap();
    graph.add_root(&expr, &factory).unwrap();
    let (frozen, _) = lifecycle::run(graph, &factory, None).unwrap();
    frozen.sexpr(frozen.oracle_root(0).unwrap()).to_string()
}

#[test]
fn negation_of_constants_folds() {
    assert_eq!(folded("(not (true))"), "(false)");
    assert_eq!(folded("(not (false))"), "(true)");
    assert_eq!(folded("(not 'text')"), "(false)");
    assert_eq!(folded("(not null)"), "(true)");
}

#[test]
fn conjunction_folding() {
    assert_eq!(folded("(and (true) (true))"), "(true)");
    assert_eq!(folded("(and (true) (false))"), "(false)");
    assert_eq!(folded("(and (streq 'a' 'b') (true))"), "(streq 'a' 'b')");
    assert_eq!(
        folded("(and (streq 'a' 'b') (streq 'c' 'd'))"),
        "(and (streq 'a' 'b') (streq 'c' 'd'))"
    );
}

#[test]
fn disjunction_folding() {
    assert_eq!(folded("(or (false) (false))"), "(false)");
    assert_eq!(folded("(or (false) (true))"), "(true)");
    assert_eq!(folded("(or (streq 'a' 'b') (false))"), "(streq 'a' 'b')");
    // A constant-true operand absorbs everything else, even pending calls.
    assert_eq!(folded("(or (streq 'a' 'b') (true))"), "(true)");
}

#[test]
fn single_operand_forms_collapse_to_the_operand() {
    assert_eq!(folded("(and (streq 'a' 'b'))"), "(streq 'a' 'b')");
    assert_eq!(folded("(or (streq 'a' 'b'))"), "(streq 'a' 'b')");
}

#[test]
fn deep_nesting_folds_to_a_constant() {
    assert_eq!(
        folded("(or (and (true) (not (true))) (not (and (true) (true))))"),
        "(false)"
    );
}

#[test]
fn conjunction_finishes_truthy_when_every_operand_is_truthy() {
    let engine = Engine::new();
    let mut context = engine.new_context();
    let oracle = engine
        .acquire(
            &mut context,
            "(and (streq 'a' 'x') (streq 'b' 'y'))",
            "r:1",
        )
        .unwrap();
    engine.close_context(&mut context).unwrap();

    let mut tx = Transaction::new();
    tx.set_field("a", Value::bytes("x"));
    let partial = oracle.query(&context, &mut tx).unwrap();
    assert!(!partial.finished);

    tx.set_field("b", Value::bytes("y"));
    tx.advance_phase();
    let full = oracle.query(&context, &mut tx).unwrap();
    assert!(full.is_truthy() && full.finished);
}

#[test]
fn disjunction_stays_pending_until_an_operand_decides() {
    let engine = Engine::new();
    let mut context = engine.new_context();
    let oracle = engine
        .acquire(&mut context, "(or (streq 'a' 'x') (streq 'b' 'y'))", "r:1")
        .unwrap();
    engine.close_context(&mut context).unwrap();

    let mut tx = Transaction::new();
    let pending = oracle.query(&context, &mut tx).unwrap();
    assert!(!pending.finished && pending.value.is_none());

    tx.set_field("b", Value::bytes("y"));
    tx.advance_phase();
    let decided = oracle.query(&context, &mut tx).unwrap();
    assert!(decided.is_truthy() && decided.finished);
}
