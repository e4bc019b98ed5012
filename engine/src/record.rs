//! Record types for mapped objects.

use crate::attributes::AttributeStore;
use crate::schema::ClassSchema;
use crate::value::{Pointer, CREATED_AT, OBJECT_ID, UPDATED_AT};
use crate::{error::Result, Attributes, Error};
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Where a record stands relative to the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordState {
    /// Never saved
    New,
    /// Backed by a remote object
    Created,
    /// Remote object deleted, local values dropped
    Destroyed,
}

/// Field-keyed validation messages.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Errors {
    entries: BTreeMap<String, Vec<String>>,
}

impl Errors {
    /// Create an empty error list.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a message for a field.
    pub fn add(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.entries
            .entry(field.into())
            .or_default()
            .push(message.into());
    }

    /// Messages recorded for a field.
    pub fn on(&self, field: &str) -> &[String] {
        self.entries.get(field).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.values().map(Vec::len).sum()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Iterate `(field, message)` pairs.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries
            .iter()
            .flat_map(|(f, msgs)| msgs.iter().map(move |m| (f.as_str(), m.as_str())))
    }

    /// Messages prefixed with their field, e.g. `"username must be unique"`.
    pub fn full_messages(&self) -> Vec<String> {
        self.iter().map(|(f, m)| format!("{f} {m}")).collect()
    }
}

/// One local instance of a remote object.
#[derive(Debug, Clone)]
pub struct Record {
    schema: Arc<ClassSchema>,
    attributes: AttributeStore,
    errors: Errors,
    destroyed: bool,
}

impl Record {
    /// Create an unsaved record.
    pub fn new(schema: Arc<ClassSchema>) -> Self {
        Self {
            schema,
            attributes: AttributeStore::new(),
            errors: Errors::new(),
            destroyed: false,
        }
    }

    /// Create an unsaved record with initial pending values.
    pub fn with_attributes(schema: Arc<ClassSchema>, attributes: Attributes) -> Self {
        let mut record = Self::new(schema);
        record.set_all(attributes);
        record
    }

    /// Build a record from fields the server returned.
    pub fn from_confirmed(schema: Arc<ClassSchema>, confirmed: Attributes) -> Self {
        Self {
            schema,
            attributes: AttributeStore::from_confirmed(confirmed),
            errors: Errors::new(),
            destroyed: false,
        }
    }

    pub fn class_name(&self) -> &str {
        &self.schema.name
    }

    pub fn schema(&self) -> &Arc<ClassSchema> {
        &self.schema
    }

    /// Server-assigned id, once created.
    pub fn id(&self) -> Option<&str> {
        self.attributes.confirmed(OBJECT_ID).and_then(Value::as_str)
    }

    pub fn created_at(&self) -> Option<&str> {
        self.attributes.confirmed(CREATED_AT).and_then(Value::as_str)
    }

    pub fn updated_at(&self) -> Option<&str> {
        self.attributes.confirmed(UPDATED_AT).and_then(Value::as_str)
    }

    pub fn is_persisted(&self) -> bool {
        self.id().is_some()
    }

    pub fn state(&self) -> RecordState {
        if self.destroyed {
            RecordState::Destroyed
        } else if self.is_persisted() {
            RecordState::Created
        } else {
            RecordState::New
        }
    }

    /// Raw stored value of a field.
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.attributes.get(field)
    }

    /// Write a field locally; it is sent on the next save.
    pub fn set(&mut self, field: impl Into<String>, value: impl Into<Value>) -> &Value {
        self.attributes.set(field, value.into())
    }

    /// Write several fields at once.
    pub fn set_all(&mut self, attributes: Attributes) {
        for (field, value) in attributes {
            self.attributes.set(field, value);
        }
    }

    pub fn attributes(&self) -> &AttributeStore {
        &self.attributes
    }

    pub fn errors(&self) -> &Errors {
        &self.errors
    }

    pub fn errors_mut(&mut self) -> &mut Errors {
        &mut self.errors
    }

    /// Declared fields followed by any other key the record holds.
    pub fn field_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.schema.declared_fields().map(str::to_string).collect();
        for key in self.attributes.keys() {
            if !names.iter().any(|n| n == key) {
                names.push(key.to_string());
            }
        }
        names
    }

    /// A pointer to this record. Fails while unsaved.
    pub fn to_pointer(&self) -> Result<Pointer> {
        self.id()
            .map(|id| Pointer::new(self.class_name(), id))
            .ok_or_else(|| Error::NotPersisted(self.class_name().to_string()))
    }

    /// Run field definitions and custom validators, filling `errors`.
    ///
    /// Returns whether the record is valid.
    pub fn validate(&mut self) -> bool {
        let mut errors = Errors::new();
        self.schema.validate(self, &mut errors);
        self.errors = errors;
        self.errors.is_empty()
    }

    /// Apply a successful create/update response: the body is merged into the
    /// confirmed layer, then pending writes are folded on top and cleared.
    pub fn apply_response(&mut self, body: &Attributes) {
        self.attributes.merge_confirmed(body);
        self.attributes.commit_pending();
        self.destroyed = false;
    }

    /// Replace the confirmed layer with a fresh server copy, keeping pending writes.
    pub fn refresh(&mut self, confirmed: Attributes) {
        let id = self.attributes.confirmed(OBJECT_ID).cloned();
        self.attributes.replace_confirmed(confirmed);
        if let Some(id) = id {
            self.attributes
                .merge_confirmed(&Attributes::from_iter([(OBJECT_ID.to_string(), id)]));
        }
    }

    /// Drop all values after the remote object was deleted.
    pub fn mark_destroyed(&mut self) {
        self.attributes.clear();
        self.destroyed = true;
    }
}
