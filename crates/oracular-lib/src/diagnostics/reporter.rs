//! Message sink handed to call nodes during lifecycle stages.
//!
//! A [`Reporter`] records raw (severity, message, node) entries while a
//! stage runs; blame enrichment (origins, dependent roots) happens after
//! the stage via [`Reporter::resolve`], so mutating stages never fight the
//! borrow of the graph they are rewriting.

use super::collection::Diagnostics;
use super::message::{Diagnostic, NodeBlame, RootBlame, Severity};
use crate::graph::frozen::FrozenGraph;
use crate::graph::{MergeGraph, NodeId, bfs};

#[derive(Debug, Clone)]
struct RawEntry {
    severity: Severity,
    message: String,
    /// Node id plus its text form at report time; the text survives even if
    /// a later rewrite removes the node before resolution.
    node: Option<(NodeId, String)>,
}

/// Collects raw diagnostics for one lifecycle stage.
#[derive(Debug, Default)]
pub struct Reporter {
    entries: Vec<RawEntry>,
}

impl Reporter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Scopes this reporter to a node; stage drivers bind the node so call
    /// implementations cannot misattribute messages.
    pub fn node<'r>(&'r mut self, id: NodeId, sexpr: &str) -> NodeReporter<'r> {
        NodeReporter {
            reporter: self,
            id,
            sexpr: sexpr.to_string(),
        }
    }

    pub fn error(&mut self, message: impl Into<String>) {
        self.entries.push(RawEntry {
            severity: Severity::Error,
            message: message.into(),
            node: None,
        });
    }

    pub fn has_errors(&self) -> bool {
        self.entries.iter().any(|e| e.severity == Severity::Error)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Resolves raw entries against a configuration-time graph.
    pub fn resolve(&self, graph: &MergeGraph) -> Diagnostics {
        self.entries
            .iter()
            .map(|entry| Diagnostic {
                severity: entry.severity,
                message: entry.message.clone(),
                blame: entry.node.as_ref().map(|(id, sexpr)| {
                    if graph.is_live(*id) {
                        NodeBlame {
                            sexpr: graph.sexpr(*id).to_string(),
                            origins: graph.origins(*id).to_vec(),
                            roots: containing_roots(graph, *id),
                        }
                    } else {
                        NodeBlame {
                            sexpr: sexpr.clone(),
                            ..NodeBlame::default()
                        }
                    }
                }),
            })
            .collect()
    }

    /// Resolves raw entries against a frozen graph (pre-evaluation stage).
    pub fn resolve_frozen(&self, graph: &FrozenGraph) -> Diagnostics {
        self.entries
            .iter()
            .map(|entry| Diagnostic {
                severity: entry.severity,
                message: entry.message.clone(),
                blame: entry.node.as_ref().map(|(id, _)| {
                    let node = graph.node(*id);
                    NodeBlame {
                        sexpr: node.sexpr.clone(),
                        origins: node.origins.clone(),
                        roots: graph
                            .roots()
                            .iter()
                            .filter(|&&root| graph.reaches(root, *id))
                            .map(|&root| RootBlame {
                                sexpr: graph.node(root).sexpr.clone(),
                                origins: graph.node(root).origins.clone(),
                            })
                            .collect(),
                    }
                }),
            })
            .collect()
    }
}

fn containing_roots(graph: &MergeGraph, id: NodeId) -> Vec<RootBlame> {
    let mut roots = Vec::new();
    bfs::bfs_up(graph, id, |above| {
        if graph.is_root(above) {
            roots.push(RootBlame {
                sexpr: graph.sexpr(above).to_string(),
                origins: graph.origins(above).to_vec(),
            });
        }
    });
    roots
}

/// A [`Reporter`] bound to one node.
pub struct NodeReporter<'r> {
    reporter: &'r mut Reporter,
    id: NodeId,
    sexpr: String,
}

impl NodeReporter<'_> {
    pub fn error(&mut self, message: impl Into<String>) {
        self.push(Severity::Error, message.into());
    }

    pub fn warning(&mut self, message: impl Into<String>) {
        self.push(Severity::Warning, message.into());
    }

    fn push(&mut self, severity: Severity, message: String) {
        self.reporter.entries.push(RawEntry {
            severity,
            message,
            node: Some((self.id, self.sexpr.clone())),
        });
    }
}
