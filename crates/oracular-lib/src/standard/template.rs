//! User-defined templates and the `ref` parameter marker.
//!
//! A template is (name, parameter list, body expression). Defining one
//! registers a new call under the template's name; at transform time each
//! call node with that name replaces itself with a clone of the body in
//! which every `(ref 'x')` has been substituted by the corresponding
//! actual argument. Substitution re-enters the merge graph, so shared
//! structure across instantiations is deduplicated like any other.

use std::sync::Arc;

use crate::calls::{Call, CallFactory, ValidationPhase};
use crate::diagnostics::NodeReporter;
use crate::eval::GraphEvalState;
use crate::graph::frozen::FrozenGraph;
use crate::graph::{MergeGraph, NodeId};
use crate::parser::ast::Expr;
use crate::transaction::TxData;
use crate::{Error, Result};

pub(super) fn load(factory: &mut CallFactory) -> Result<()> {
    factory.register("ref", || Box::new(Ref))
}

/// Defines a template, registering it as a new call.
///
/// Fails with `InvalidTemplate` if the body references an undeclared
/// parameter or if a call named `name` already exists.
pub fn define_template(
    factory: &mut CallFactory,
    name: &str,
    params: Vec<String>,
    body: Expr,
    origin: &str,
) -> Result<()> {
    check_refs(name, &params, &body)?;

    let template_name = name.to_string();
    let params = Arc::new(params);
    let body = Arc::new(body);
    let origin = origin.to_string();
    factory
        .register(name, move || {
            Box::new(Template {
                name: template_name.clone(),
                params: Arc::clone(&params),
                body: Arc::clone(&body),
                origin: origin.clone(),
            })
        })
        .map_err(|error| match error {
            Error::DuplicateCall(name) => Error::InvalidTemplate {
                name,
                message: "a call with this name already exists".to_string(),
            },
            other => other,
        })
}

/// Verifies that every `(ref 'x')` in `body` names a declared parameter.
fn check_refs(template: &str, params: &[String], body: &Expr) -> Result<()> {
    let Expr::Call { name, args } = body else {
        return Ok(());
    };
    if name == "ref" {
        let param = ref_param(args);
        return match param {
            Some(param) if params.iter().any(|p| p == &param) => Ok(()),
            Some(param) => Err(Error::InvalidTemplate {
                name: template.to_string(),
                message: format!("`(ref '{param}')` does not name a declared parameter"),
            }),
            None => Err(Error::InvalidTemplate {
                name: template.to_string(),
                message: "`ref` takes a single string argument".to_string(),
            }),
        };
    }
    for arg in args {
        check_refs(template, params, arg)?;
    }
    Ok(())
}

/// The parameter named by a `ref` argument list, if well-formed.
fn ref_param(args: &[Expr]) -> Option<String> {
    let [Expr::Literal(value)] = args else {
        return None;
    };
    let bytes = value.as_bytes()?;
    String::from_utf8(bytes.to_vec()).ok()
}

/// An instantiable template call.
pub struct Template {
    name: String,
    params: Arc<Vec<String>>,
    body: Arc<Expr>,
    origin: String,
}

impl std::fmt::Debug for Template {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Template")
            .field("name", &self.name)
            .field("params", &self.params)
            .field("origin", &self.origin)
            .finish_non_exhaustive()
    }
}

impl Call for Template {
    fn name(&self) -> &str {
        &self.name
    }

    fn validate(
        &self,
        graph: &MergeGraph,
        node: NodeId,
        phase: ValidationPhase,
        reporter: &mut NodeReporter<'_>,
    ) {
        // An argument-count mismatch leaves the call uninstantiated; it is
        // reported once transforms are done.
        if phase == ValidationPhase::Post {
            let actual = graph.children(node).len();
            reporter.error(format!(
                "template `{}` (defined at {}) expects {} argument(s), got {actual}",
                self.name,
                self.origin,
                self.params.len(),
            ));
        }
    }

    fn transform(
        &self,
        graph: &mut MergeGraph,
        factory: &CallFactory,
        node: NodeId,
        _reporter: &mut NodeReporter<'_>,
    ) -> Result<bool> {
        let actuals = graph.children(node).to_vec();
        if actuals.len() != self.params.len() {
            return Ok(false);
        }
        let substituted = substitute(&self.body, &|param| {
            self.params
                .iter()
                .position(|p| p == param)
                .map(|index| graph_expr(graph, actuals[index]))
        });
        graph.replace_with_expr(node, &substituted, factory)?;
        Ok(true)
    }

    fn eval(&self, _graph: &FrozenGraph, state: &mut GraphEvalState, _env: &TxData, node: NodeId) {
        // Unreachable on a successfully closed context: instantiation
        // removes every template call before evaluation.
        state.state_mut(node).finish();
    }
}

fn graph_expr(graph: &MergeGraph, node: NodeId) -> Expr {
    graph.expr(node)
}

/// Clones `body`, replacing each well-formed `(ref 'x')` via `lookup`.
fn substitute(body: &Expr, lookup: &dyn Fn(&str) -> Option<Expr>) -> Expr {
    match body {
        Expr::Literal(_) => body.clone(),
        Expr::Call { name, args } => {
            if name == "ref" {
                if let Some(replacement) = ref_param(args).and_then(|param| lookup(&param)) {
                    return replacement;
                }
            }
            Expr::call(
                name.clone(),
                args.iter().map(|arg| substitute(arg, lookup)).collect(),
            )
        }
    }
}

/// The `(ref 'x')` marker; only meaningful inside a template body.
#[derive(Debug)]
pub struct Ref;

impl Call for Ref {
    fn name(&self) -> &str {
        "ref"
    }

    fn validate(
        &self,
        graph: &MergeGraph,
        node: NodeId,
        phase: ValidationPhase,
        reporter: &mut NodeReporter<'_>,
    ) {
        match phase {
            ValidationPhase::Pre => {
                let children = graph.children(node);
                if children.len() != 1
                    || graph
                        .literal(children[0])
                        .is_none_or(|value| value.as_bytes().is_none())
                {
                    reporter.error("`ref` takes a single string argument");
                }
            }
            ValidationPhase::Post => {
                reporter.error("`ref` may only appear inside a template body");
            }
        }
    }

    fn eval(&self, _graph: &FrozenGraph, state: &mut GraphEvalState, _env: &TxData, node: NodeId) {
        state.state_mut(node).finish();
    }
}
