//! Engine, configuration contexts, and oracles.
//!
//! The [`Engine`] owns the call factory and template definitions. Each
//! configuration context owns a [`MergeGraph`] while open; a child context
//! inherits its parent's graph by deep copy, so later transforms in the
//! child never touch the parent. Closing a context runs the graph
//! lifecycle and freezes the result; oracles acquired during configuration
//! then resolve their root index against the frozen oracle table.

use std::fs::OpenOptions;
use std::io::Write;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::diagnostics::Diagnostics;
use crate::graph::MergeGraph;
use crate::graph::frozen::FrozenGraph;
use crate::parser::ast::Expr;
use crate::parser::parse_expression;
use crate::standard;
use crate::transaction::Transaction;
use crate::value::Value;
use crate::{Error, Result, calls::CallFactory, eval::GraphEvalState, lifecycle};

static NEXT_CONTEXT_ID: AtomicU64 = AtomicU64::new(0);

/// The predicate engine: call registry plus template definitions.
pub struct Engine {
    factory: CallFactory,
}

impl Default for Engine {
    fn default() -> Self {
        Self::new()
    }
}

impl Engine {
    /// Creates an engine with the standard call library loaded.
    pub fn new() -> Self {
        let mut factory = CallFactory::new();
        standard::load(&mut factory).expect("standard call names are distinct");
        Self { factory }
    }

    pub fn call_factory(&self) -> &CallFactory {
        &self.factory
    }

    /// Mutable factory access, for hosts registering their own calls.
    pub fn call_factory_mut(&mut self) -> &mut CallFactory {
        &mut self.factory
    }

    /// Creates the top-level configuration context.
    pub fn new_context(&self) -> Context {
        Context::new()
    }

    /// Opens a child context inheriting `parent`'s graph by copy.
    pub fn open_context(&self, parent: &Context) -> Result<Context> {
        parent.child(&self.factory)
    }

    /// Parses `expr` and acquires an oracle for it in `context`.
    ///
    /// Valid only during configuration (before the context closes). The
    /// returned oracle becomes queryable once the context is closed.
    pub fn acquire(&self, context: &mut Context, expr: &str, origin: &str) -> Result<Oracle> {
        let expr = parse_expression(expr, &self.factory, origin)?;
        self.acquire_expr(context, &expr, origin)
    }

    /// Acquires an oracle for an already-built expression tree.
    pub fn acquire_expr(
        &self,
        context: &mut Context,
        expr: &Expr,
        origin: &str,
    ) -> Result<Oracle> {
        context.acquire(expr, &self.factory, origin)
    }

    /// Defines a template. Valid only during configuration.
    pub fn define_template(
        &mut self,
        name: &str,
        params: &[&str],
        body: &str,
        origin: &str,
    ) -> Result<()> {
        let body = parse_expression(body, &self.factory, origin)?;
        standard::define_template(
            &mut self.factory,
            name,
            params.iter().map(|p| p.to_string()).collect(),
            body,
            origin,
        )
    }

    /// Handles the raw 3-argument directive form: name, space-separated
    /// parameter list, body text.
    pub fn define_template_directive(&mut self, params: &[&str], origin: &str) -> Result<()> {
        let [name, args, body] = params else {
            return Err(Error::Directive(
                "template definition takes three arguments: name, args, and body".to_string(),
            ));
        };
        let args: Vec<&str> = args.split(' ').filter(|arg| !arg.is_empty()).collect();
        self.define_template(name, &args, body, origin)
    }

    /// Closes `context`: runs the graph lifecycle and freezes the result.
    pub fn close_context(&self, context: &mut Context) -> Result<()> {
        context.close(&self.factory)
    }
}

#[derive(Debug)]
enum ContextState {
    Config {
        graph: MergeGraph,
        debug_report: Option<String>,
    },
    Closed {
        frozen: Arc<FrozenGraph>,
        warnings: Diagnostics,
    },
    /// A lifecycle error aborted the close; the context is unusable.
    Failed,
}

/// One configuration context and, once closed, its frozen graph.
#[derive(Debug)]
pub struct Context {
    id: u64,
    ancestors: Vec<u64>,
    state: ContextState,
}

impl Context {
    fn new() -> Self {
        Self {
            id: NEXT_CONTEXT_ID.fetch_add(1, Ordering::Relaxed),
            ancestors: Vec::new(),
            state: ContextState::Config {
                graph: MergeGraph::new(),
                debug_report: None,
            },
        }
    }

    fn child(&self, factory: &CallFactory) -> Result<Context> {
        let ContextState::Config {
            graph,
            debug_report,
        } = &self.state
        else {
            return Err(Error::ConfigAfterClose);
        };
        let mut ancestors = self.ancestors.clone();
        ancestors.push(self.id);
        Ok(Context {
            id: NEXT_CONTEXT_ID.fetch_add(1, Ordering::Relaxed),
            ancestors,
            state: ContextState::Config {
                graph: graph.copy(factory)?,
                debug_report: debug_report.clone(),
            },
        })
    }

    /// Requests a debug report at each lifecycle checkpoint. An empty
    /// string or `-` writes to stderr, anything else appends to that file.
    pub fn set_debug_report(&mut self, to: impl Into<String>) -> Result<()> {
        match &mut self.state {
            ContextState::Config { debug_report, .. } => {
                *debug_report = Some(to.into());
                Ok(())
            }
            _ => Err(Error::ConfigAfterClose),
        }
    }

    pub fn is_closed(&self) -> bool {
        matches!(self.state, ContextState::Closed { .. })
    }

    /// Warnings gathered while closing, once closed.
    pub fn warnings(&self) -> Option<&Diagnostics> {
        match &self.state {
            ContextState::Closed { warnings, .. } => Some(warnings),
            _ => None,
        }
    }

    /// The frozen graph, once closed.
    pub fn frozen(&self) -> Result<&Arc<FrozenGraph>> {
        match &self.state {
            ContextState::Closed { frozen, .. } => Ok(frozen),
            ContextState::Config { .. } => Err(Error::QueryBeforeClose),
            ContextState::Failed => Err(Error::InvalidState(
                "context close failed; the context is unusable".to_string(),
            )),
        }
    }

    /// Read access to the configuration-time graph, while open.
    pub fn merge_graph(&self) -> Option<&MergeGraph> {
        match &self.state {
            ContextState::Config { graph, .. } => Some(graph),
            _ => None,
        }
    }

    fn acquire(&mut self, expr: &Expr, factory: &CallFactory, origin: &str) -> Result<Oracle> {
        let ContextState::Config { graph, .. } = &mut self.state else {
            return Err(Error::ConfigAfterClose);
        };
        let index = graph.add_root(expr, factory)?;
        if let Some(root) = graph.root_node(index) {
            graph.add_origin(root, origin);
        }
        Ok(Oracle {
            context_id: self.id,
            index,
        })
    }

    fn close(&mut self, factory: &CallFactory) -> Result<()> {
        let state = std::mem::replace(&mut self.state, ContextState::Failed);
        let (graph, debug_report) = match state {
            ContextState::Config {
                graph,
                debug_report,
            } => (graph, debug_report),
            other => {
                self.state = other;
                return Err(Error::ConfigAfterClose);
            }
        };

        let outcome = match debug_report.as_deref() {
            None => lifecycle::run(graph, factory, None),
            Some("") | Some("-") => {
                let mut err = std::io::stderr();
                lifecycle::run(graph, factory, Some(&mut err))
            }
            Some(path) => {
                let mut file = OpenOptions::new()
                    .create(true)
                    .append(true)
                    .open(path)
                    .map_err(Error::Io)?;
                let result = lifecycle::run(graph, factory, Some(&mut file));
                file.flush().map_err(Error::Io)?;
                result
            }
        };

        let (frozen, warnings) = outcome?;
        self.state = ContextState::Closed {
            frozen: Arc::new(frozen),
            warnings,
        };
        Ok(())
    }
}

/// The result of querying an oracle: the root's value so far and whether
/// it will produce more.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryResult {
    pub value: Option<Value>,
    pub finished: bool,
}

impl QueryResult {
    pub fn is_truthy(&self) -> bool {
        self.value.as_ref().is_some_and(Value::is_truthy)
    }
}

/// A handle to an acquired root: (context, root index).
///
/// Acquired during configuration; queryable against the acquiring context
/// or any of its descendants once that context has closed.
#[derive(Debug, Clone)]
pub struct Oracle {
    context_id: u64,
    index: usize,
}

impl Oracle {
    /// The stable root index backing this oracle.
    pub fn index(&self) -> usize {
        self.index
    }

    /// Evaluates this oracle's root for `tx`, creating the per-transaction
    /// evaluation state on first use.
    pub fn query(&self, context: &Context, tx: &mut Transaction) -> Result<QueryResult> {
        if context.id != self.context_id && !context.ancestors.contains(&self.context_id) {
            return Err(Error::InvalidState(
                "oracle was acquired in an unrelated context".to_string(),
            ));
        }
        let frozen = context.frozen()?;
        let root = frozen.oracle_root(self.index).ok_or_else(|| {
            Error::InvalidState(format!("oracle index {} is out of range", self.index))
        })?;
        let state = tx
            .states
            .entry(context.id)
            .or_insert_with(|| GraphEvalState::new(frozen));
        state.eval(frozen, &tx.data, root);
        Ok(QueryResult {
            value: state.value(root).cloned(),
            finished: state.is_finished(root),
        })
    }
}
