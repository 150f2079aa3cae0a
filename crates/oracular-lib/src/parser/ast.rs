//! Expression trees produced by the parser.
//!
//! `Expr` is the graph-free form of an expression: the parser builds one,
//! template bodies are stored as one, and transforms that rewrite the graph
//! build replacement fragments as one before re-entering the `MergeGraph`.

use std::fmt;

use crate::value::Value;

/// A parsed expression: a literal value or a named call with arguments.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Literal(Value),
    Call { name: String, args: Vec<Expr> },
}

impl Expr {
    pub fn literal(value: Value) -> Self {
        Expr::Literal(value)
    }

    pub fn call(name: impl Into<String>, args: Vec<Expr>) -> Self {
        Expr::Call {
            name: name.into(),
            args,
        }
    }

    pub fn is_literal(&self) -> bool {
        matches!(self, Expr::Literal(_))
    }

    /// The call name, if this is a call.
    pub fn name(&self) -> Option<&str> {
        match self {
            Expr::Call { name, .. } => Some(name),
            Expr::Literal(_) => None,
        }
    }

    /// Writes the canonical S-expression form: `(name arg arg ...)` with
    /// single spaces and no trailing whitespace.
    pub fn write_sexpr(&self, w: &mut impl fmt::Write) -> fmt::Result {
        match self {
            Expr::Literal(value) => value.write_sexpr(w),
            Expr::Call { name, args } => {
                write!(w, "({name}")?;
                for arg in args {
                    w.write_char(' ')?;
                    arg.write_sexpr(w)?;
                }
                w.write_char(')')
            }
        }
    }

    pub fn to_sexpr(&self) -> String {
        let mut out = String::new();
        self.write_sexpr(&mut out)
            .expect("String write never fails");
        out
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.write_sexpr(f)
    }
}
