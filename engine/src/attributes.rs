//! AttributeStore - confirmed and pending field values for one record.
//!
//! Confirmed values only ever come from server responses. Local writes land in
//! the pending layer and shadow the confirmed value until a successful round
//! trip folds them in.

use crate::value::{OBJECT_ID, PROTECTED_KEYS};
use crate::Attributes;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeSet;

/// Two-layer attribute storage.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttributeStore {
    confirmed: Attributes,
    pending: Attributes,
}

impl AttributeStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store whose confirmed layer is already populated.
    pub fn from_confirmed(confirmed: Attributes) -> Self {
        Self {
            confirmed,
            pending: Attributes::new(),
        }
    }

    /// Pending value if present, else the confirmed value.
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.pending.get(field).or_else(|| self.confirmed.get(field))
    }

    /// Record a local write and return the stored value.
    pub fn set(&mut self, field: impl Into<String>, value: Value) -> &Value {
        let field = field.into();
        self.pending.insert(field.clone(), value);
        &self.pending[&field]
    }

    /// Confirmed value only.
    pub fn confirmed(&self, field: &str) -> Option<&Value> {
        self.confirmed.get(field)
    }

    /// All pending writes.
    pub fn pending(&self) -> &Attributes {
        &self.pending
    }

    /// Whether any write is waiting for a round trip.
    pub fn has_pending(&self) -> bool {
        !self.pending.is_empty()
    }

    /// Pending writes minus the server-owned keys.
    pub fn pending_payload(&self) -> Attributes {
        self.pending
            .iter()
            .filter(|(k, _)| !PROTECTED_KEYS.contains(&k.as_str()))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    /// Copy server-returned fields into the confirmed layer.
    ///
    /// An `objectId` already confirmed is kept.
    pub fn merge_confirmed(&mut self, fields: &Attributes) {
        for (key, value) in fields {
            if key == OBJECT_ID && self.confirmed.contains_key(OBJECT_ID) {
                continue;
            }
            self.confirmed.insert(key.clone(), value.clone());
        }
    }

    /// Fold pending writes into the confirmed layer and clear them.
    pub fn commit_pending(&mut self) {
        let pending = std::mem::take(&mut self.pending);
        for (key, value) in pending {
            if PROTECTED_KEYS.contains(&key.as_str()) {
                continue;
            }
            self.confirmed.insert(key, value);
        }
    }

    /// Replace the confirmed layer wholesale, keeping pending writes.
    pub fn replace_confirmed(&mut self, confirmed: Attributes) {
        self.confirmed = confirmed;
    }

    /// Drop all pending writes.
    pub fn clear_pending(&mut self) {
        self.pending.clear();
    }

    /// Drop both layers.
    pub fn clear(&mut self) {
        self.confirmed.clear();
        self.pending.clear();
    }

    /// Every key present in either layer.
    pub fn keys(&self) -> BTreeSet<&str> {
        self.confirmed
            .keys()
            .chain(self.pending.keys())
            .map(String::as_str)
            .collect()
    }
}
