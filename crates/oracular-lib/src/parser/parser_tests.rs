use crate::Error;
use crate::calls::CallFactory;
use crate::parser::ast::Expr;
use crate::parser::{parse_at, parse_expression};
use crate::standard;
use crate::value::Value;

fn factory() -> CallFactory {
    let mut factory = CallFactory::new();
    standard::load(&mut factory).unwrap();
    factory
}

fn parse(source: &str) -> crate::Result<Expr> {
    parse_expression(source, &factory(), "test:1")
}

#[test]
fn parses_string_literal() {
    assert_eq!(
        parse("'hello'").unwrap(),
        Expr::Literal(Value::bytes("hello"))
    );
}

#[test]
fn parses_escaped_string() {
    assert_eq!(
        parse(r"'it\'s \\ here'").unwrap(),
        Expr::Literal(Value::bytes("it's \\ here"))
    );
}

#[test]
fn parses_numbers() {
    assert_eq!(parse("42").unwrap(), Expr::Literal(Value::Number(42)));
    assert_eq!(parse("-7").unwrap(), Expr::Literal(Value::Number(-7)));
    assert_eq!(parse("+3").unwrap(), Expr::Literal(Value::Number(3)));
    assert_eq!(parse("2.5").unwrap(), Expr::Literal(Value::Float(2.5)));
    assert_eq!(parse("-0.25").unwrap(), Expr::Literal(Value::Float(-0.25)));
}

#[test]
fn parses_null() {
    assert_eq!(parse("null").unwrap(), Expr::Literal(Value::Null));
}

#[test]
fn parses_lists() {
    assert_eq!(parse("[]").unwrap(), Expr::Literal(Value::List(vec![])));
    assert_eq!(
        parse("[1 'x' null]").unwrap(),
        Expr::Literal(Value::List(vec![
            Value::Number(1),
            Value::bytes("x"),
            Value::Null,
        ]))
    );
    assert_eq!(
        parse("[[1] []]").unwrap(),
        Expr::Literal(Value::List(vec![
            Value::List(vec![Value::Number(1)]),
            Value::List(vec![]),
        ]))
    );
}

#[test]
fn parses_nested_calls() {
    let expr = parse("(and (streq 'x' 'y') (true))").unwrap();
    let Expr::Call { name, args } = &expr else {
        panic!("expected call, got {expr:?}");
    };
    assert_eq!(name, "and");
    assert_eq!(args.len(), 2);
    assert_eq!(args[0].name(), Some("streq"));
    assert_eq!(args[1].name(), Some("true"));
}

#[test]
fn round_trips_canonical_text() {
    for source in [
        "null",
        "42",
        "-7",
        "2.5",
        "'hello'",
        r"'it\'s'",
        "[1 2 'x']",
        "[[null] []]",
        "(true)",
        "(and (streq 'a' 'b') (not (false)))",
    ] {
        let expr = parse(source).unwrap();
        assert_eq!(expr.to_sexpr(), source);
        assert_eq!(parse(&expr.to_sexpr()).unwrap(), expr);
    }
}

#[test]
fn float_text_survives_reprinting() {
    let expr = parse("1.0").unwrap();
    assert_eq!(expr.to_sexpr(), "1.0");
    assert_eq!(parse(&expr.to_sexpr()).unwrap(), expr);
}

#[test]
fn rejects_unknown_call() {
    let err = parse("(bogus 'x')").unwrap_err();
    let Error::UnknownCall { name, origin } = err else {
        panic!("expected UnknownCall, got {err}");
    };
    assert_eq!(name, "bogus");
    assert_eq!(origin, "test:1");
}

#[test]
fn reports_missing_close_paren_at_end_of_input() {
    let source = "(and (streq 'x' 'x')";
    let err = parse(source).unwrap_err();
    let Error::Parse {
        offset,
        excerpt,
        origin,
        ..
    } = err
    else {
        panic!("expected Parse, got {err}");
    };
    assert_eq!(offset, source.len());
    assert!(excerpt.contains("--ERROR--"), "excerpt: {excerpt}");
    assert_eq!(origin, "test:1");
}

#[test]
fn excerpt_window_is_ten_chars_each_side() {
    let source = "(and (streq 'aaaaaaaaaaaaaaaaaaaa'";
    let err = parse(source).unwrap_err();
    let Error::Parse { excerpt, .. } = err else {
        panic!("expected Parse");
    };
    assert_eq!(excerpt, "aaaaaaaaa' --ERROR-- ");
}

#[test]
fn rejects_leading_whitespace() {
    let err = parse(" (true)").unwrap_err();
    assert!(matches!(err, Error::Parse { offset: 0, .. }), "{err}");
}

#[test]
fn tolerates_a_single_trailing_byte() {
    assert!(parse("(true) ").is_ok());
    assert!(parse("(true))").is_ok());
}

#[test]
fn rejects_longer_trailing_garbage() {
    let err = parse("(true) x").unwrap_err();
    assert!(matches!(err, Error::Parse { offset: 6, .. }), "{err}");
}

#[test]
fn rejects_bare_word() {
    assert!(parse("foo").is_err());
}

#[test]
fn rejects_missing_separator_between_args() {
    assert!(parse("(and(true))").is_err());
}

#[test]
fn rejects_call_inside_list() {
    let err = parse("[(true)]").unwrap_err();
    let Error::Parse { message, .. } = err else {
        panic!("expected Parse");
    };
    assert!(message.contains("literal"), "{message}");
}

#[test]
fn rejects_empty_input() {
    let err = parse("").unwrap_err();
    assert!(matches!(err, Error::Parse { offset: 0, .. }));
}

#[test]
fn parse_at_reports_consumed_length() {
    let (expr, consumed) = parse_at("xx(not (true))yy", 2, &factory(), "test:1").unwrap();
    assert_eq!(expr.to_sexpr(), "(not (true))");
    assert_eq!(consumed, 12);
}
