//! The call capability trait and the name registry.
//!
//! Every call node's behavior lives behind the object-safe [`Call`] trait;
//! the [`CallFactory`] maps a call name to a generator that produces a
//! fresh, unbound instance. The factory is populated once at engine
//! construction (and extended by template definitions); registering a name
//! twice is refused.

use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;

use crate::diagnostics::NodeReporter;
use crate::eval::GraphEvalState;
use crate::graph::frozen::FrozenGraph;
use crate::graph::{MergeGraph, NodeId};
use crate::transaction::TxData;
use crate::value::Value;
use crate::{Error, Result};

/// Which validation pass is running.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationPhase {
    /// Before transforms.
    Pre,
    /// After transforms have reached fixpoint.
    Post,
}

/// Snapshot of one argument handed to [`Call::pre_evaluate`].
#[derive(Debug, Clone)]
pub struct PreEvalChild {
    pub sexpr: String,
    /// The argument's value when it is a literal node.
    pub literal: Option<Value>,
}

/// Behavior of a call node.
///
/// `validate`, `transform`, and `pre_evaluate` run at configuration time;
/// `eval` runs per transaction and is contractually infallible: a call that
/// needs to signal failure does so through its value (e.g. finishing with
/// no value, or a null value).
pub trait Call: fmt::Debug + Send + Sync {
    /// The registered name this instance answers to.
    fn name(&self) -> &str;

    /// Reports structural problems with this node (arity, argument shape).
    fn validate(
        &self,
        _graph: &MergeGraph,
        _node: NodeId,
        _phase: ValidationPhase,
        _reporter: &mut NodeReporter<'_>,
    ) {
    }

    /// Rewrites the graph around this node. Returns true iff the graph
    /// changed. Must mutate only through the graph's public primitives.
    fn transform(
        &self,
        _graph: &mut MergeGraph,
        _factory: &CallFactory,
        _node: NodeId,
        _reporter: &mut NodeReporter<'_>,
    ) -> Result<bool> {
        Ok(false)
    }

    /// One-shot preparation after the graph is frozen, before any
    /// transaction evaluates.
    fn pre_evaluate(&mut self, _children: &[PreEvalChild], _reporter: &mut NodeReporter<'_>) {}

    /// Produces this node's (partial) value into the per-transaction state.
    ///
    /// Called through [`GraphEvalState::eval`], which already skips finished
    /// nodes; implementations evaluate their children through the same
    /// entry point and may leave themselves unfinished.
    fn eval(&self, graph: &FrozenGraph, state: &mut GraphEvalState, env: &TxData, node: NodeId);
}

type CallGenerator = Arc<dyn Fn() -> Box<dyn Call> + Send + Sync>;

/// Registry mapping call names to instance generators.
#[derive(Clone, Default)]
pub struct CallFactory {
    generators: IndexMap<String, CallGenerator>,
}

impl CallFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a generator under `name`. Fails if the name is taken.
    pub fn register(
        &mut self,
        name: impl Into<String>,
        generator: impl Fn() -> Box<dyn Call> + Send + Sync + 'static,
    ) -> Result<()> {
        let name = name.into();
        if self.generators.contains_key(&name) {
            return Err(Error::DuplicateCall(name));
        }
        self.generators.insert(name, Arc::new(generator));
        Ok(())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.generators.contains_key(name)
    }

    /// Produces a fresh, unbound instance of the named call.
    pub fn create(&self, name: &str) -> Result<Box<dyn Call>> {
        match self.generators.get(name) {
            Some(generator) => Ok(generator()),
            None => Err(Error::UnknownCall {
                name: name.to_string(),
                origin: String::new(),
            }),
        }
    }

    /// Registered names, in registration order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.generators.keys().map(String::as_str)
    }
}

impl fmt::Debug for CallFactory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CallFactory")
            .field("names", &self.generators.keys().collect::<Vec<_>>())
            .finish()
    }
}
