//! Oracular: a predicate-DAG compilation and evaluation engine.
//!
//! Rule authors express inspection logic as S-expressions. Every acquired
//! expression is merged into one shared DAG per configuration context with
//! full common-sub-expression elimination, so overlapping logic across
//! many rules is computed exactly once per transaction. Closing a context
//! validates the graph, rewrites it to a fixpoint (constant folding,
//! template instantiation), assigns dense node indices, and freezes the
//! result; per-transaction evaluation then fills a flat value/finished
//! array on demand, with streaming values and monotone finished flags.
//!
//! # Example
//!
//! ```
//! use oracular_lib::{Engine, Transaction, Value};
//!
//! let engine = Engine::new();
//! let mut context = engine.new_context();
//! let oracle = engine
//!     .acquire(&mut context, "(streq 'user-agent' 'evil')", "rules.conf:7")
//!     .unwrap();
//! engine.close_context(&mut context).unwrap();
//!
//! let mut tx = Transaction::new();
//! tx.set_field("user-agent", Value::bytes("evil"));
//! let result = oracle.query(&context, &mut tx).unwrap();
//! assert!(result.is_truthy() && result.finished);
//! ```
//!
//! Module map, roughly pipeline order:
//! - `parser`: lexer and recursive-descent parser producing `Expr` trees
//! - `calls`: the `Call` capability trait and the `CallFactory` registry
//! - `graph`: the `MergeGraph` CSE DAG, traversals, reports, freezing
//! - `lifecycle`: validate, transform to fixpoint, index, freeze,
//!   pre-evaluate
//! - `eval`: per-transaction value/finished arrays and on-demand descent
//! - `standard`: bundled calls (`true`/`false`/`not`/`and`/`or`,
//!   `field`/`streq`) and the template machinery
//! - `context`: engine, configuration contexts, oracles
//! - `diagnostics`: node-blamed messages, collection, rendering

pub mod calls;
pub mod context;
pub mod diagnostics;
pub mod escape;
pub mod eval;
pub mod graph;
pub mod lifecycle;
pub mod parser;
pub mod standard;
pub mod transaction;
pub mod value;

#[cfg(test)]
mod context_tests;
#[cfg(test)]
mod lifecycle_tests;

pub use calls::{Call, CallFactory, ValidationPhase};
pub use context::{Context, Engine, Oracle, QueryResult};
pub use diagnostics::{Diagnostics, DiagnosticsPrinter, Severity};
pub use graph::{MergeGraph, NodeId};
pub use parser::ast::Expr;
pub use parser::{parse_at, parse_expression};
pub use transaction::{Transaction, TxData};
pub use value::Value;

use calls::ValidationPhase as Phase;

/// Errors from configuration-time processing and oracle misuse.
///
/// Runtime evaluation is infallible by contract; a call that needs to
/// signal failure does so through its value.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Malformed S-expression.
    #[error("parse error at offset {offset}: {message}: {excerpt} [{origin}]")]
    Parse {
        offset: usize,
        message: String,
        excerpt: String,
        origin: String,
    },

    /// A call name the factory cannot construct.
    #[error("unknown call `{name}`{}", origin_suffix(origin))]
    UnknownCall { name: String, origin: String },

    /// A template body referenced an undeclared parameter, or the template
    /// redefines an existing call.
    #[error("invalid template `{name}`: {message}")]
    InvalidTemplate { name: String, message: String },

    /// A call name was registered twice.
    #[error("call `{0}` is already registered")]
    DuplicateCall(String),

    /// A malformed configuration directive.
    #[error("directive error: {0}")]
    Directive(String),

    /// A validation pass reported errors.
    #[error("{} validation failed with {} error(s)", phase_name(*phase), diagnostics.error_count())]
    Validation {
        phase: Phase,
        diagnostics: Diagnostics,
    },

    /// A transform reported errors.
    #[error("transform failed with {} error(s)", .0.error_count())]
    Transform(Diagnostics),

    /// The transform fixpoint iteration cap was reached.
    #[error("transforms did not converge after {0} passes")]
    TransformDivergence(usize),

    /// Pre-evaluation reported errors.
    #[error("pre-evaluation failed with {} error(s)", .0.error_count())]
    PreEvaluation(Diagnostics),

    /// An internal consistency check failed, or a graph mutation was
    /// refused (cycle, dead node, foreign oracle).
    #[error("invalid state: {0}")]
    InvalidState(String),

    /// An oracle was queried before its context was closed.
    #[error("oracle queried before its context was closed")]
    QueryBeforeClose,

    /// A configuration operation (acquire, define, open) after close.
    #[error("configuration operation on a closed context")]
    ConfigAfterClose,

    /// A debug-report sink could not be written.
    #[error("debug report i/o: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for configuration-time operations.
pub type Result<T> = std::result::Result<T, Error>;

fn phase_name(phase: Phase) -> &'static str {
    match phase {
        Phase::Pre => "pre-transform",
        Phase::Post => "post-transform",
    }
}

fn origin_suffix(origin: &str) -> String {
    if origin.is_empty() {
        String::new()
    } else {
        format!(" [{origin}]")
    }
}
