//! Diagnostics infrastructure for the graph lifecycle.
//!
//! Lifecycle stages collect node-blamed messages through a [`Reporter`];
//! once a stage ends the raw entries are resolved into [`Diagnostic`]
//! records that carry everything needed to blame the rule author: the
//! node's text form, its origins, and every root that depends on it
//! together with those roots' origins.

mod collection;
mod message;
mod printer;
mod reporter;


pub use collection::Diagnostics;
pub use message::{Diagnostic, NodeBlame, RootBlame, Severity};
pub use printer::DiagnosticsPrinter;
pub use reporter::{NodeReporter, Reporter};
