//! Runtime and literal values.
//!
//! The same `Value` enum backs literal nodes in expressions and the values
//! produced by graph evaluation. Inspection data is byte-oriented, so quoted
//! literals are byte strings rather than UTF-8 strings.

use std::fmt;

use crate::escape::escape_bytes;

/// A literal or evaluated value.
///
/// `Null` is a real value that a node may produce to signal "no result";
/// truthiness treats it the same as producing nothing at all.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Number(i64),
    Float(f64),
    Bytes(Vec<u8>),
    List(Vec<Value>),
}

impl Value {
    /// Convenience constructor for byte-string values.
    pub fn bytes(b: impl AsRef<[u8]>) -> Self {
        Value::Bytes(b.as_ref().to_vec())
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Value::Bytes(b) => Some(b),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(items) => Some(items),
            _ => None,
        }
    }

    /// A `Null` value is falsy; every other value is truthy.
    pub fn is_truthy(&self) -> bool {
        !matches!(self, Value::Null)
    }

    /// Writes the canonical S-expression form of this value.
    pub fn write_sexpr(&self, w: &mut impl fmt::Write) -> fmt::Result {
        match self {
            Value::Null => w.write_str("null"),
            Value::Number(n) => write!(w, "{n}"),
            Value::Float(f) => {
                // Keep the decimal point so the text re-lexes as a float.
                if f.fract() == 0.0 && f.is_finite() {
                    write!(w, "{f:.1}")
                } else {
                    write!(w, "{f}")
                }
            }
            Value::Bytes(b) => write!(w, "'{}'", escape_bytes(b)),
            Value::List(items) => {
                w.write_char('[')?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        w.write_char(' ')?;
                    }
                    item.write_sexpr(w)?;
                }
                w.write_char(']')
            }
        }
    }

    /// The canonical S-expression form as a `String`.
    pub fn to_sexpr(&self) -> String {
        let mut out = String::new();
        self.write_sexpr(&mut out)
            .expect("String write never fails");
        out
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.write_sexpr(f)
    }
}
