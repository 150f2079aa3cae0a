//! The configuration-time expression DAG.
//!
//! A [`MergeGraph`] holds every expression acquired in a context, fully
//! deduplicated: no two live nodes are ever structurally equal. Nodes live
//! in a flat arena addressed by [`NodeId`]; parent back-references are
//! non-owning id sets. The cached canonical S-expression text of a node is
//! also its structural-equality key, so interning and collision detection
//! are string-map lookups.
//!
//! Mutation goes through `replace`, `add_edge`, and `remove_edge`. Each of
//! them re-keys every affected ancestor and collapses any ancestor that
//! becomes structurally equal to an existing node, so the uniqueness
//! invariant holds after every public call. All three refuse to create a
//! cycle and leave the graph untouched when they do.

pub mod bfs;
pub mod dump;
pub mod frozen;


use std::collections::BTreeSet;
use std::sync::Arc;

use indexmap::IndexMap;

use crate::calls::{Call, CallFactory};
use crate::parser::ast::Expr;
use crate::value::Value;
use crate::{Error, Result};

/// Index into the graph's node arena.
pub type NodeId = u32;

#[derive(Debug)]
pub(crate) enum NodePayload {
    Literal(Value),
    Call {
        name: String,
        behavior: Arc<dyn Call>,
    },
}

#[derive(Debug)]
pub(crate) struct NodeData {
    pub(crate) payload: NodePayload,
    pub(crate) children: Vec<NodeId>,
    pub(crate) parents: BTreeSet<NodeId>,
    pub(crate) origins: Vec<String>,
    /// Canonical S-expression text; doubles as the structural key.
    pub(crate) sexpr: String,
    pub(crate) live: bool,
}

/// The CSE-deduplicating DAG of acquired expressions.
#[derive(Debug)]
pub struct MergeGraph {
    nodes: Vec<NodeData>,
    by_key: IndexMap<String, NodeId>,
    /// Root index → representative node. Entries are rewritten in place
    /// when a representative is replaced, so a root index stays valid for
    /// the lifetime of the graph.
    roots: Vec<NodeId>,
}

impl Default for MergeGraph {
    fn default() -> Self {
        Self::new()
    }
}

impl MergeGraph {
    pub fn new() -> Self {
        Self {
            nodes: Vec::new(),
            by_key: IndexMap::new(),
            roots: Vec::new(),
        }
    }

    // ------------------------------------------------------------------
    // Interning

    /// Merges `expr` into the graph and marks the representative as a
    /// root. Returns the new root index; structurally equal expressions
    /// added twice get distinct indices naming the same representative.
    pub fn add_root(&mut self, expr: &Expr, factory: &CallFactory) -> Result<usize> {
        let id = self.merge(expr, factory)?;
        self.roots.push(id);
        Ok(self.roots.len() - 1)
    }

    /// Merges `expr` into the graph, reusing structurally equal nodes, and
    /// returns the representative.
    pub fn merge(&mut self, expr: &Expr, factory: &CallFactory) -> Result<NodeId> {
        match expr {
            Expr::Literal(value) => {
                let key = value.to_sexpr();
                if let Some(&id) = self.by_key.get(&key) {
                    return Ok(id);
                }
                Ok(self.new_node(
                    NodePayload::Literal(value.clone()),
                    Vec::new(),
                    key,
                ))
            }
            Expr::Call { name, args } => {
                let children = args
                    .iter()
                    .map(|arg| self.merge(arg, factory))
                    .collect::<Result<Vec<_>>>()?;
                let key = self.call_key(name, &children);
                if let Some(&id) = self.by_key.get(&key) {
                    return Ok(id);
                }
                let behavior = factory.create(name)?.into();
                let id = self.new_node(
                    NodePayload::Call {
                        name: name.clone(),
                        behavior,
                    },
                    children.clone(),
                    key,
                );
                for child in children {
                    self.node_mut(child).parents.insert(id);
                }
                Ok(id)
            }
        }
    }

    fn new_node(&mut self, payload: NodePayload, children: Vec<NodeId>, key: String) -> NodeId {
        let id = self.nodes.len() as NodeId;
        self.nodes.push(NodeData {
            payload,
            children,
            parents: BTreeSet::new(),
            origins: Vec::new(),
            sexpr: key.clone(),
            live: true,
        });
        self.by_key.insert(key, id);
        id
    }

    fn call_key(&self, name: &str, children: &[NodeId]) -> String {
        let mut key = format!("({name}");
        for &child in children {
            key.push(' ');
            key.push_str(&self.node(child).sexpr);
        }
        key.push(')');
        key
    }

    // ------------------------------------------------------------------
    // Mutation primitives

    /// Substitutes `old` with `new` in every parent's child list, moving
    /// `old`'s root indices and origins onto `new`. Ancestors whose
    /// structure now equals an existing node are collapsed into it.
    /// Refuses (and leaves the graph unchanged) if the substitution would
    /// create a cycle.
    pub fn replace(&mut self, old: NodeId, new: NodeId) -> Result<()> {
        self.ensure_live(old)?;
        self.ensure_live(new)?;
        if old == new {
            return Ok(());
        }
        for &parent in &self.node(old).parents {
            if parent == new || self.reaches(new, parent) {
                return Err(Error::InvalidState(format!(
                    "replacing {} with {} would create a cycle",
                    self.node(old).sexpr,
                    self.node(new).sexpr,
                )));
            }
        }

        let parents: Vec<NodeId> = self.node(old).parents.iter().copied().collect();
        for &parent in &parents {
            for slot in self.node_mut(parent).children.iter_mut() {
                if *slot == old {
                    *slot = new;
                }
            }
            self.node_mut(new).parents.insert(parent);
        }
        self.node_mut(old).parents.clear();

        for root in self.roots.iter_mut() {
            if *root == old {
                *root = new;
            }
        }
        let origins = std::mem::take(&mut self.node_mut(old).origins);
        self.node_mut(new).origins.extend(origins);

        self.remove_orphan(old);
        self.reindex_ancestors(parents);
        Ok(())
    }

    /// Merges `expr` and replaces `node` with the result. Returns the
    /// representative; when `expr` is structurally equal to `node` this is
    /// a no-op returning `node` itself.
    pub fn replace_with_expr(
        &mut self,
        node: NodeId,
        expr: &Expr,
        factory: &CallFactory,
    ) -> Result<NodeId> {
        let new = self.merge(expr, factory)?;
        if new != node {
            self.replace(node, new)?;
        }
        Ok(new)
    }

    /// Appends `child` to `parent`'s argument list.
    pub fn add_edge(&mut self, parent: NodeId, child: NodeId) -> Result<()> {
        self.ensure_live(parent)?;
        self.ensure_live(child)?;
        if matches!(self.node(parent).payload, NodePayload::Literal(_)) {
            return Err(Error::InvalidState(format!(
                "literal {} cannot take arguments",
                self.node(parent).sexpr,
            )));
        }
        if child == parent || self.reaches(child, parent) {
            return Err(Error::InvalidState(format!(
                "adding edge {} -> {} would create a cycle",
                self.node(parent).sexpr,
                self.node(child).sexpr,
            )));
        }
        self.node_mut(parent).children.push(child);
        self.node_mut(child).parents.insert(parent);
        self.reindex_ancestors(vec![parent]);
        Ok(())
    }

    /// Removes one `parent` → `child` slot (the first occurrence).
    pub fn remove_edge(&mut self, parent: NodeId, child: NodeId) -> Result<()> {
        self.ensure_live(parent)?;
        self.ensure_live(child)?;
        let position = self
            .node(parent)
            .children
            .iter()
            .position(|&c| c == child)
            .ok_or_else(|| {
                Error::InvalidState(format!(
                    "no edge {} -> {}",
                    self.node(parent).sexpr,
                    self.node(child).sexpr,
                ))
            })?;
        self.node_mut(parent).children.remove(position);
        if !self.node(parent).children.contains(&child) {
            self.node_mut(child).parents.remove(&parent);
        }
        self.reindex_ancestors(vec![parent]);
        self.remove_orphan(child);
        Ok(())
    }

    /// Appends an origin tag to a node.
    pub fn add_origin(&mut self, node: NodeId, origin: impl Into<String>) {
        self.node_mut(node).origins.push(origin.into());
    }

    // ------------------------------------------------------------------
    // Re-keying

    /// Recomputes the structural keys of every ancestor of `seeds`
    /// (children before parents) and collapses nodes whose new key
    /// matches an existing representative.
    fn reindex_ancestors(&mut self, seeds: Vec<NodeId>) {
        let mut set = BTreeSet::new();
        let mut stack = seeds;
        while let Some(id) = stack.pop() {
            if self.node(id).live && set.insert(id) {
                stack.extend(self.node(id).parents.iter().copied());
            }
        }

        // Children-first order within the affected set; the child relation
        // is acyclic, so every pass makes progress.
        let mut pending: Vec<NodeId> = set.iter().copied().collect();
        let mut done: BTreeSet<NodeId> = BTreeSet::new();
        let mut order = Vec::with_capacity(pending.len());
        while !pending.is_empty() {
            let mut rest = Vec::new();
            for id in pending {
                let ready = self
                    .node(id)
                    .children
                    .iter()
                    .all(|c| !set.contains(c) || done.contains(c));
                if ready {
                    done.insert(id);
                    order.push(id);
                } else {
                    rest.push(id);
                }
            }
            pending = rest;
        }

        for id in order {
            self.rekey(id);
        }
    }

    fn rekey(&mut self, id: NodeId) {
        if !self.node(id).live {
            return;
        }
        let old_key = self.node(id).sexpr.clone();
        let new_key = match &self.node(id).payload {
            NodePayload::Literal(value) => value.to_sexpr(),
            NodePayload::Call { name, .. } => {
                let name = name.clone();
                self.call_key(&name, &self.node(id).children.clone())
            }
        };
        if new_key == old_key {
            return;
        }
        if self.by_key.get(&old_key) == Some(&id) {
            self.by_key.shift_remove(&old_key);
        }
        if let Some(&existing) = self.by_key.get(&new_key) {
            if existing != id {
                self.collapse(id, existing);
                return;
            }
        }
        self.node_mut(id).sexpr = new_key.clone();
        self.by_key.insert(new_key, id);
    }

    /// Folds `dup` into the structurally equal `rep`: incoming edges, root
    /// indices, and origins move over, then `dup` is dropped.
    fn collapse(&mut self, dup: NodeId, rep: NodeId) {
        let parents: Vec<NodeId> = self.node(dup).parents.iter().copied().collect();
        for &parent in &parents {
            for slot in self.node_mut(parent).children.iter_mut() {
                if *slot == dup {
                    *slot = rep;
                }
            }
            self.node_mut(rep).parents.insert(parent);
        }
        self.node_mut(dup).parents.clear();
        for root in self.roots.iter_mut() {
            if *root == dup {
                *root = rep;
            }
        }
        let origins = std::mem::take(&mut self.node_mut(dup).origins);
        self.node_mut(rep).origins.extend(origins);

        // dup and rep have identical child lists, so the children keep rep
        // as a parent and never become orphans here.
        self.node_mut(dup).live = false;
        for child in self.node(dup).children.clone() {
            self.node_mut(child).parents.remove(&dup);
        }
    }

    /// Garbage-collects `id` if nothing references it, then its children.
    fn remove_orphan(&mut self, id: NodeId) {
        if !self.node(id).live
            || self.is_root(id)
            || !self.node(id).parents.is_empty()
        {
            return;
        }
        if self.by_key.get(&self.node(id).sexpr) == Some(&id) {
            let key = self.node(id).sexpr.clone();
            self.by_key.shift_remove(&key);
        }
        self.node_mut(id).live = false;
        for child in self.node(id).children.clone() {
            self.node_mut(child).parents.remove(&id);
            self.remove_orphan(child);
        }
    }

    // ------------------------------------------------------------------
    // Queries

    /// Distinct root representatives in first-acquisition order.
    pub fn roots(&self) -> Vec<NodeId> {
        let mut seen = BTreeSet::new();
        self.roots
            .iter()
            .copied()
            .filter(|&id| seen.insert(id))
            .collect()
    }

    /// Root indices currently naming `node`.
    pub fn root_indices(&self, node: NodeId) -> Vec<usize> {
        self.roots
            .iter()
            .enumerate()
            .filter(|&(_, &id)| id == node)
            .map(|(index, _)| index)
            .collect()
    }

    pub fn is_root(&self, node: NodeId) -> bool {
        self.roots.contains(&node)
    }

    /// Representative currently backing a root index.
    pub fn root_node(&self, root_index: usize) -> Option<NodeId> {
        self.roots.get(root_index).copied()
    }

    pub fn root_count(&self) -> usize {
        self.roots.len()
    }

    pub fn is_live(&self, node: NodeId) -> bool {
        self.nodes
            .get(node as usize)
            .is_some_and(|data| data.live)
    }

    pub fn sexpr(&self, node: NodeId) -> &str {
        &self.node(node).sexpr
    }

    pub fn children(&self, node: NodeId) -> &[NodeId] {
        &self.node(node).children
    }

    pub fn parents(&self, node: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        self.node(node).parents.iter().copied()
    }

    pub fn origins(&self, node: NodeId) -> &[String] {
        &self.node(node).origins
    }

    pub fn call_name(&self, node: NodeId) -> Option<&str> {
        match &self.node(node).payload {
            NodePayload::Call { name, .. } => Some(name),
            NodePayload::Literal(_) => None,
        }
    }

    pub fn literal(&self, node: NodeId) -> Option<&Value> {
        match &self.node(node).payload {
            NodePayload::Literal(value) => Some(value),
            NodePayload::Call { .. } => None,
        }
    }

    pub(crate) fn behavior(&self, node: NodeId) -> Option<Arc<dyn Call>> {
        match &self.node(node).payload {
            NodePayload::Call { behavior, .. } => Some(Arc::clone(behavior)),
            NodePayload::Literal(_) => None,
        }
    }

    /// Reconstructs the expression tree rooted at `node`.
    pub fn expr(&self, node: NodeId) -> Expr {
        match &self.node(node).payload {
            NodePayload::Literal(value) => Expr::Literal(value.clone()),
            NodePayload::Call { name, .. } => Expr::call(
                name.clone(),
                self.node(node)
                    .children
                    .iter()
                    .map(|&child| self.expr(child))
                    .collect(),
            ),
        }
    }

    /// Number of live nodes.
    pub fn len(&self) -> usize {
        self.nodes.iter().filter(|data| data.live).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub(crate) fn live_ids(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.nodes
            .iter()
            .enumerate()
            .filter(|(_, data)| data.live)
            .map(|(id, _)| id as NodeId)
    }

    /// True iff `target` is reachable from `from` through child edges
    /// (including `from == target`).
    pub fn reaches(&self, from: NodeId, target: NodeId) -> bool {
        if from == target {
            return true;
        }
        let mut visited = vec![false; self.nodes.len()];
        let mut stack = vec![from];
        while let Some(id) = stack.pop() {
            if visited[id as usize] {
                continue;
            }
            visited[id as usize] = true;
            for &child in &self.node(id).children {
                if child == target {
                    return true;
                }
                stack.push(child);
            }
        }
        false
    }

    // ------------------------------------------------------------------
    // Copying

    /// Deep copy with fresh call instances from `factory`. Used when a
    /// child configuration context inherits its parent's graph.
    pub fn copy(&self, factory: &CallFactory) -> Result<MergeGraph> {
        // Two passes: edges may point at arena slots in either direction
        // after replacements, so the full id remap must exist first.
        let mut remap = vec![NodeId::MAX; self.nodes.len()];
        let mut next: NodeId = 0;
        for id in self.live_ids() {
            remap[id as usize] = next;
            next += 1;
        }

        let mut copied = MergeGraph::new();
        for (id, data) in self.nodes.iter().enumerate() {
            if !data.live {
                continue;
            }
            let payload = match &data.payload {
                NodePayload::Literal(value) => NodePayload::Literal(value.clone()),
                NodePayload::Call { name, .. } => NodePayload::Call {
                    name: name.clone(),
                    behavior: factory.create(name)?.into(),
                },
            };
            copied.nodes.push(NodeData {
                payload,
                children: data.children.iter().map(|&c| remap[c as usize]).collect(),
                parents: data.parents.iter().map(|&p| remap[p as usize]).collect(),
                origins: data.origins.clone(),
                sexpr: data.sexpr.clone(),
                live: true,
            });
            copied.by_key.insert(data.sexpr.clone(), remap[id]);
        }
        copied.roots = self.roots.iter().map(|&r| remap[r as usize]).collect();
        Ok(copied)
    }

    // ------------------------------------------------------------------
    // Audit

    /// Internal consistency audit; returns one message per violation.
    pub(crate) fn audit(&self) -> Vec<String> {
        let mut failures = Vec::new();

        for id in self.live_ids() {
            for &child in &self.node(id).children {
                if !self.is_live(child) {
                    failures.push(format!(
                        "node {} references dead child {}",
                        self.node(id).sexpr,
                        child,
                    ));
                } else if !self.node(child).parents.contains(&id) {
                    failures.push(format!(
                        "child {} does not list {} as a parent",
                        self.node(child).sexpr,
                        self.node(id).sexpr,
                    ));
                }
            }
            for &parent in &self.node(id).parents {
                if !self.is_live(parent) {
                    failures.push(format!(
                        "node {} references dead parent {}",
                        self.node(id).sexpr,
                        parent,
                    ));
                } else if !self.node(parent).children.contains(&id) {
                    failures.push(format!(
                        "parent {} does not list {} as an argument",
                        self.node(parent).sexpr,
                        self.node(id).sexpr,
                    ));
                }
            }
        }

        for id in self.live_ids() {
            let expected = match &self.node(id).payload {
                NodePayload::Literal(value) => value.to_sexpr(),
                NodePayload::Call { name, .. } => self.call_key(name, &self.node(id).children),
            };
            if expected != self.node(id).sexpr {
                failures.push(format!(
                    "stale structural key: {} vs {}",
                    self.node(id).sexpr,
                    expected,
                ));
            }
            if self.by_key.get(&self.node(id).sexpr) != Some(&id) {
                failures.push(format!(
                    "node {} is not its key's representative",
                    self.node(id).sexpr,
                ));
            }
        }
        if self.by_key.len() != self.len() {
            failures.push(format!(
                "key index has {} entries for {} live nodes",
                self.by_key.len(),
                self.len(),
            ));
        }

        for &root in &self.roots {
            if !self.is_live(root) {
                failures.push(format!("root index names dead node {root}"));
            }
        }

        if let Some(cycle) = self.find_cycle() {
            failures.push(format!("cycle through {}", self.node(cycle).sexpr));
        }

        failures
    }

    /// Three-color DFS; returns a node on a cycle, if any.
    fn find_cycle(&self) -> Option<NodeId> {
        const WHITE: u8 = 0;
        const GRAY: u8 = 1;
        const BLACK: u8 = 2;
        let mut color = vec![WHITE; self.nodes.len()];
        let starts: Vec<NodeId> = self.live_ids().collect();
        for start in starts {
            if color[start as usize] != WHITE {
                continue;
            }
            let mut stack: Vec<(NodeId, usize)> = vec![(start, 0)];
            color[start as usize] = GRAY;
            while let Some(top) = stack.len().checked_sub(1) {
                let (id, next) = stack[top];
                if next < self.node(id).children.len() {
                    stack[top].1 += 1;
                    let child = self.node(id).children[next];
                    match color[child as usize] {
                        WHITE => {
                            color[child as usize] = GRAY;
                            stack.push((child, 0));
                        }
                        GRAY => return Some(child),
                        _ => {}
                    }
                } else {
                    color[id as usize] = BLACK;
                    stack.pop();
                }
            }
        }
        None
    }

    // ------------------------------------------------------------------
    // Internal access

    fn ensure_live(&self, node: NodeId) -> Result<()> {
        if self.is_live(node) {
            Ok(())
        } else {
            Err(Error::InvalidState(format!("node {node} is not in the graph")))
        }
    }

    pub(crate) fn node(&self, id: NodeId) -> &NodeData {
        &self.nodes[id as usize]
    }

    fn node_mut(&mut self, id: NodeId) -> &mut NodeData {
        &mut self.nodes[id as usize]
    }

    pub(crate) fn arena_len(&self) -> usize {
        self.nodes.len()
    }

    pub(crate) fn into_parts(self) -> (Vec<NodeData>, Vec<NodeId>) {
        (self.nodes, self.roots)
    }
}
