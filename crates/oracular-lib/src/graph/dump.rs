//! Debug and validation reports for graph inspection.

use std::io::{self, Write};

use super::{MergeGraph, NodeId};

impl MergeGraph {
    /// Writes a human-readable dump of the DAG: root table first, then one
    /// line per live node with its arguments, parents, and origins.
    pub fn write_debug_report(&self, w: &mut dyn Write) -> io::Result<()> {
        for (index, root) in (0..self.root_count()).filter_map(|i| {
            self.root_node(i).map(|r| (i, r))
        }) {
            writeln!(w, "root {index} -> N{root} {}", self.sexpr(root))?;
        }
        for id in self.live_ids() {
            write!(w, "N{id}: {}", self.sexpr(id))?;
            if !self.children(id).is_empty() {
                write!(w, " args={}", format_ids(self.children(id).iter().copied()))?;
            }
            let parents = format_ids(self.parents(id));
            if parents != "[]" {
                write!(w, " parents={parents}")?;
            }
            for origin in self.origins(id) {
                write!(w, " origin={origin:?}")?;
            }
            writeln!(w)?;
        }
        Ok(())
    }

    /// Runs the internal audits (parent consistency, acyclicity,
    /// uniqueness), writing one line per failure. Returns true iff the
    /// graph is consistent.
    pub fn write_validation_report(&self, w: &mut dyn Write) -> io::Result<bool> {
        let failures = self.audit();
        for failure in &failures {
            writeln!(w, "{failure}")?;
        }
        Ok(failures.is_empty())
    }
}

fn format_ids(ids: impl Iterator<Item = NodeId>) -> String {
    let mut out = String::from("[");
    for (i, id) in ids.enumerate() {
        if i > 0 {
            out.push(' ');
        }
        out.push_str(&format!("N{id}"));
    }
    out.push(']');
    out
}
