//! The per-transaction environment boundary.
//!
//! The host owns a [`Transaction`] per HTTP transaction, feeding it fields
//! as they become available and advancing its phase as the transaction
//! progresses. Call evaluation reads the [`TxData`] view; the evaluation
//! state for each queried context lives inside the transaction and dies
//! with it.

use std::collections::HashMap;

use indexmap::IndexMap;

use crate::eval::GraphEvalState;
use crate::value::Value;

/// What call evaluation sees of a transaction.
#[derive(Debug, Default)]
pub struct TxData {
    fields: IndexMap<String, Value>,
    phase: u32,
    complete: bool,
}

impl TxData {
    pub fn field(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    pub fn field_bytes(&self, name: &[u8]) -> Option<&Value> {
        std::str::from_utf8(name)
            .ok()
            .and_then(|name| self.fields.get(name))
    }

    pub fn phase(&self) -> u32 {
        self.phase
    }

    /// True once the host has declared that no further data will arrive.
    pub fn is_complete(&self) -> bool {
        self.complete
    }
}

/// One inspected transaction: its data plus the lazily-created evaluation
/// state per queried context.
#[derive(Debug, Default)]
pub struct Transaction {
    pub(crate) data: TxData,
    pub(crate) states: HashMap<u64, GraphEvalState>,
}

impl Transaction {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets a field. Fields are set-once: evaluation treats a present
    /// field's value as final. If a query already ran in the current
    /// phase, call [`advance_phase`](Self::advance_phase) so unfinished
    /// nodes see the new data.
    pub fn set_field(&mut self, name: impl Into<String>, value: Value) {
        self.data.fields.insert(name.into(), value);
    }

    /// Moves to the next phase, re-arming evaluation of unfinished nodes.
    pub fn advance_phase(&mut self) {
        self.data.phase += 1;
    }

    /// Declares that no further data will arrive, and advances the phase
    /// so pending nodes can finish on the next query.
    pub fn complete(&mut self) {
        self.data.complete = true;
        self.data.phase += 1;
    }

    pub fn data(&self) -> &TxData {
        &self.data
    }
}
