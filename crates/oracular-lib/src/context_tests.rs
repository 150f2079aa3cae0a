use crate::Error;
use crate::context::Engine;
use crate::graph::NodeId;
use crate::transaction::Transaction;
use crate::value::Value;

#[test]
fn template_instantiates_and_evaluates() {
    let mut engine = Engine::new();
    engine
        .define_template(
            "is_bad",
            &["x"],
            "(or (streq (ref 'x') 'evil') (streq (ref 'x') 'bad'))",
            "rules.conf:2",
        )
        .unwrap();

    let mut context = engine.new_context();
    let oracle = engine
        .acquire(&mut context, "(is_bad 'user-agent')", "rules.conf:9")
        .unwrap();
    engine.close_context(&mut context).unwrap();

    let frozen = context.frozen().unwrap();
    let root = frozen.oracle_root(oracle.index()).unwrap();
    assert_eq!(
        frozen.sexpr(root),
        "(or (streq 'user-agent' 'evil') (streq 'user-agent' 'bad'))"
    );
    // No call in the graph still carries the template's name.
    for id in 0..frozen.index_limit() as NodeId {
        assert_ne!(frozen.call_name(id), Some("is_bad"));
    }

    let mut tx = Transaction::new();
    tx.set_field("user-agent", Value::bytes("evil"));
    let result = oracle.query(&context, &mut tx).unwrap();
    assert!(result.value.is_some());
    assert!(result.finished);
}

#[test]
fn template_instantiations_share_structure_with_plain_rules() {
    let mut engine = Engine::new();
    engine
        .define_template("bad_ua", &["x"], "(streq (ref 'x') 'evil')", "t:1")
        .unwrap();

    let mut context = engine.new_context();
    let templated = engine
        .acquire(&mut context, "(bad_ua 'ua')", "r:1")
        .unwrap();
    let plain = engine
        .acquire(&mut context, "(streq 'ua' 'evil')", "r:2")
        .unwrap();
    engine.close_context(&mut context).unwrap();

    let frozen = context.frozen().unwrap();
    assert_eq!(
        frozen.oracle_root(templated.index()),
        frozen.oracle_root(plain.index())
    );
}

#[test]
fn template_redefinition_is_rejected() {
    let mut engine = Engine::new();
    engine
        .define_template("twice", &["x"], "(not (ref 'x'))", "t:1")
        .unwrap();
    let err = engine
        .define_template("twice", &["x"], "(not (ref 'x'))", "t:2")
        .unwrap_err();
    assert!(matches!(err, Error::InvalidTemplate { .. }), "{err}");

    let err = engine
        .define_template("and", &["x"], "(not (ref 'x'))", "t:3")
        .unwrap_err();
    assert!(matches!(err, Error::InvalidTemplate { .. }), "{err}");
}

#[test]
fn template_body_must_reference_declared_parameters() {
    let mut engine = Engine::new();
    let err = engine
        .define_template("broken", &["x"], "(not (ref 'y'))", "t:1")
        .unwrap_err();
    let Error::InvalidTemplate { name, message } = err else {
        panic!("expected InvalidTemplate");
    };
    assert_eq!(name, "broken");
    assert!(message.contains("'y'"), "{message}");
}

#[test]
fn template_argument_count_mismatch_fails_post_validation() {
    let mut engine = Engine::new();
    engine
        .define_template("one_arg", &["x"], "(not (ref 'x'))", "t:1")
        .unwrap();

    let mut context = engine.new_context();
    engine
        .acquire(&mut context, "(one_arg (true) (false))", "r:1")
        .unwrap();
    let err = engine.close_context(&mut context).unwrap_err();
    let Error::Validation { phase, diagnostics } = err else {
        panic!("expected Validation, got {err}");
    };
    assert_eq!(phase, crate::ValidationPhase::Post);
    assert_eq!(diagnostics.error_count(), 1);
}

#[test]
fn directive_form_defines_templates() {
    let mut engine = Engine::new();
    engine
        .define_template_directive(
            &["either_bad", "a b", "(or (streq (ref 'a') 'evil') (streq (ref 'b') 'evil'))"],
            "conf:4",
        )
        .unwrap();

    let mut context = engine.new_context();
    engine
        .acquire(&mut context, "(either_bad 'ua' 'referer')", "conf:9")
        .unwrap();
    engine.close_context(&mut context).unwrap();
}

#[test]
fn directive_form_requires_three_arguments() {
    let mut engine = Engine::new();
    let err = engine
        .define_template_directive(&["name", "x"], "conf:1")
        .unwrap_err();
    assert!(matches!(err, Error::Directive(_)), "{err}");
}

#[test]
fn ref_outside_a_template_fails_post_validation() {
    let engine = Engine::new();
    let mut context = engine.new_context();
    engine.acquire(&mut context, "(ref 'x')", "r:1").unwrap();
    let err = engine.close_context(&mut context).unwrap_err();
    assert!(
        matches!(err, Error::Validation { phase: crate::ValidationPhase::Post, .. }),
        "{err}"
    );
}

#[test]
fn query_before_close_is_refused() {
    let engine = Engine::new();
    let mut context = engine.new_context();
    let oracle = engine.acquire(&mut context, "(true)", "r:1").unwrap();
    let mut tx = Transaction::new();
    let err = oracle.query(&context, &mut tx).unwrap_err();
    assert!(matches!(err, Error::QueryBeforeClose), "{err}");
}

#[test]
fn configuration_after_close_is_refused() {
    let engine = Engine::new();
    let mut context = engine.new_context();
    engine.acquire(&mut context, "(true)", "r:1").unwrap();
    engine.close_context(&mut context).unwrap();

    let err = engine.acquire(&mut context, "(false)", "r:2").unwrap_err();
    assert!(matches!(err, Error::ConfigAfterClose), "{err}");
    let err = engine.open_context(&context).unwrap_err();
    assert!(matches!(err, Error::ConfigAfterClose), "{err}");
    let err = context.set_debug_report("-").unwrap_err();
    assert!(matches!(err, Error::ConfigAfterClose), "{err}");
}

#[test]
fn equal_expressions_get_distinct_oracles_sharing_a_root() {
    let engine = Engine::new();
    let mut context = engine.new_context();
    let first = engine
        .acquire(&mut context, "(streq 'a' 'b')", "r:1")
        .unwrap();
    let second = engine
        .acquire(&mut context, "(streq 'a' 'b')", "r:2")
        .unwrap();
    assert_ne!(first.index(), second.index());
    engine.close_context(&mut context).unwrap();

    let frozen = context.frozen().unwrap();
    assert_eq!(
        frozen.oracle_root(first.index()),
        frozen.oracle_root(second.index())
    );
    // Both acquisition origins survive on the shared representative.
    let root = frozen.oracle_root(first.index()).unwrap();
    assert_eq!(frozen.origins(root), ["r:1", "r:2"]);
}

#[test]
fn child_context_inherits_and_diverges() {
    let engine = Engine::new();
    let mut parent = engine.new_context();
    let parent_oracle = engine
        .acquire(&mut parent, "(streq 'ua' 'evil')", "p:1")
        .unwrap();

    let mut child = engine.open_context(&parent).unwrap();
    let child_oracle = engine
        .acquire(&mut child, "(streq 'ua' 'bad')", "c:1")
        .unwrap();

    engine.close_context(&mut child).unwrap();
    engine.close_context(&mut parent).unwrap();

    // The parent never saw the child's acquisition.
    assert_eq!(parent.frozen().unwrap().oracle_count(), 1);
    assert_eq!(child.frozen().unwrap().oracle_count(), 2);

    // A parent-acquired oracle is valid against the child context.
    let mut tx = Transaction::new();
    tx.set_field("ua", Value::bytes("evil"));
    let via_child = parent_oracle.query(&child, &mut tx).unwrap();
    assert!(via_child.is_truthy() && via_child.finished);

    // But a child-acquired oracle does not resolve in the parent.
    let err = child_oracle.query(&parent, &mut tx).unwrap_err();
    assert!(matches!(err, Error::InvalidState(_)), "{err}");
}

#[test]
fn sibling_transactions_do_not_share_state() {
    let engine = Engine::new();
    let mut context = engine.new_context();
    let oracle = engine
        .acquire(&mut context, "(streq 'ua' 'evil')", "r:1")
        .unwrap();
    engine.close_context(&mut context).unwrap();

    let mut evil = Transaction::new();
    evil.set_field("ua", Value::bytes("evil"));
    let mut benign = Transaction::new();
    benign.set_field("ua", Value::bytes("ok"));

    assert!(oracle.query(&context, &mut evil).unwrap().is_truthy());
    assert!(!oracle.query(&context, &mut benign).unwrap().is_truthy());
    assert!(oracle.query(&context, &mut evil).unwrap().is_truthy());
}

#[test]
fn debug_report_appends_to_a_file() {
    let engine = Engine::new();
    let mut context = engine.new_context();
    context.set_debug_report(
        std::env::temp_dir()
            .join(format!("oracular-debug-{}.log", std::process::id()))
            .display()
            .to_string(),
    )
    .unwrap();
    let path = std::env::temp_dir().join(format!("oracular-debug-{}.log", std::process::id()));

    engine.acquire(&mut context, "(not (true))", "r:1").unwrap();
    engine.close_context(&mut context).unwrap();

    let report = std::fs::read_to_string(&path).unwrap();
    std::fs::remove_file(&path).ok();
    assert!(report.contains("Before transform:"), "{report}");
    assert!(report.contains("After transform:"), "{report}");
}
