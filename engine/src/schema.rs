//! Class schemas and the class registry.
//!
//! A [`ClassSchema`] is fixed when a class is defined: its declared fields,
//! relationship descriptors, validators and lifecycle hooks. The [`Registry`]
//! maps class names (including the backend's `_User` alias) to schemas so a
//! pointer's `className` can be turned into a record without reflection.

use crate::record::{Errors, Record};
use crate::value::{is_date, is_pointer, local_class_name};
use crate::{error::Result, Attributes, ClassName, Error, FieldName};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Field types supported in schemas.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    String,
    Number,
    Bool,
    /// `{"__type": "Date"}` composite
    Date,
    /// `{"__type": "Pointer"}` composite
    Pointer,
    Array,
    /// Arbitrary JSON
    Json,
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldType::String => write!(f, "String"),
            FieldType::Number => write!(f, "Number"),
            FieldType::Bool => write!(f, "Bool"),
            FieldType::Date => write!(f, "Date"),
            FieldType::Pointer => write!(f, "Pointer"),
            FieldType::Array => write!(f, "Array"),
            FieldType::Json => write!(f, "Json"),
        }
    }
}

/// Definition of a field in a class.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldDef {
    /// Field name
    pub name: FieldName,
    /// Field type
    pub field_type: FieldType,
    /// Whether this field is required
    pub required: bool,
}

impl FieldDef {
    /// Create a new required field definition.
    pub fn required(name: impl Into<FieldName>, field_type: FieldType) -> Self {
        Self {
            name: name.into(),
            field_type,
            required: true,
        }
    }

    /// Create a new optional field definition.
    pub fn optional(name: impl Into<FieldName>, field_type: FieldType) -> Self {
        Self {
            name: name.into(),
            field_type,
            required: false,
        }
    }

    /// Validate a JSON value against this field definition.
    pub fn validate(&self, value: Option<&serde_json::Value>) -> Result<()> {
        match value {
            None if self.required => Err(Error::MissingRequiredField(self.name.clone())),
            None => Ok(()),
            Some(serde_json::Value::Null) if self.required => {
                Err(Error::MissingRequiredField(self.name.clone()))
            }
            Some(serde_json::Value::Null) => Ok(()),
            Some(v) => self.validate_type(v),
        }
    }

    fn validate_type(&self, value: &serde_json::Value) -> Result<()> {
        let valid = match self.field_type {
            FieldType::String => value.is_string(),
            FieldType::Number => value.is_number(),
            FieldType::Bool => value.is_boolean(),
            FieldType::Date => is_date(value),
            FieldType::Pointer => is_pointer(value),
            FieldType::Array => value.is_array(),
            FieldType::Json => true,
        };

        if valid {
            Ok(())
        } else {
            Err(Error::TypeMismatch {
                field: self.name.clone(),
                expected: self.field_type.to_string(),
                got: json_type_name(value).to_string(),
            })
        }
    }
}

fn json_type_name(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "Null",
        serde_json::Value::Bool(_) => "Bool",
        serde_json::Value::Number(_) => "Number",
        serde_json::Value::String(_) => "String",
        serde_json::Value::Array(_) => "Array",
        v if is_date(v) => "Date",
        v if is_pointer(v) => "Pointer",
        serde_json::Value::Object(_) => "Object",
    }
}

/// Relationship metadata recorded when a class is defined.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RelationshipDescriptor {
    /// `field` holds a pointer to one `target_class` record.
    BelongsTo {
        field: FieldName,
        target_class: ClassName,
    },
    /// `target_class` records point back at the owner through `foreign_key`.
    HasMany {
        field: FieldName,
        owner_class: ClassName,
        target_class: ClassName,
        foreign_key: FieldName,
    },
}

impl RelationshipDescriptor {
    pub fn field(&self) -> &str {
        match self {
            RelationshipDescriptor::BelongsTo { field, .. }
            | RelationshipDescriptor::HasMany { field, .. } => field,
        }
    }

    pub fn target_class(&self) -> &str {
        match self {
            RelationshipDescriptor::BelongsTo { target_class, .. }
            | RelationshipDescriptor::HasMany { target_class, .. } => target_class,
        }
    }
}

/// Fixed points at which lifecycle hooks run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HookPoint {
    BeforeSave,
    AfterSave,
    BeforeCreate,
    AfterCreate,
    BeforeUpdate,
    AfterUpdate,
    BeforeDestroy,
    AfterDestroy,
}

/// Lifecycle callback.
pub type Hook = Arc<dyn Fn(&mut Record) + Send + Sync>;

/// Custom validation callback.
pub type Validator = Arc<dyn Fn(&Record, &mut Errors) + Send + Sync>;

/// Everything known about a class before any record of it exists.
#[derive(Clone)]
pub struct ClassSchema {
    /// Local class name
    pub name: ClassName,
    fields: Vec<FieldDef>,
    relationships: Vec<RelationshipDescriptor>,
    validators: Vec<Validator>,
    hooks: Vec<(HookPoint, Hook)>,
}

impl fmt::Debug for ClassSchema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClassSchema")
            .field("name", &self.name)
            .field("fields", &self.fields)
            .field("relationships", &self.relationships)
            .field("validators", &self.validators.len())
            .field("hooks", &self.hooks.len())
            .finish()
    }
}

impl ClassSchema {
    /// Create a schema with no fields.
    pub fn new(name: impl Into<ClassName>) -> Self {
        Self {
            name: name.into(),
            fields: Vec::new(),
            relationships: Vec::new(),
            validators: Vec::new(),
            hooks: Vec::new(),
        }
    }

    /// Add a typed field definition, replacing an earlier one of the same name.
    pub fn field(mut self, def: FieldDef) -> Self {
        match self.fields.iter_mut().find(|f| f.name == def.name) {
            Some(existing) => *existing = def,
            None => self.fields.push(def),
        }
        self
    }

    /// Declare an untyped optional field. Declaring twice is a no-op.
    pub fn declare(mut self, name: impl Into<FieldName>) -> Self {
        let name = name.into();
        if !self.is_declared(&name) {
            self.fields.push(FieldDef::optional(name, FieldType::Json));
        }
        self
    }

    /// Declare several untyped fields.
    pub fn declare_all<I, S>(self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<FieldName>,
    {
        names.into_iter().fold(self, |schema, name| schema.declare(name))
    }

    /// `field` holds a pointer to a `target` record.
    pub fn belongs_to(self, field: impl Into<FieldName>, target: impl Into<ClassName>) -> Self {
        let field = field.into();
        let mut schema = self.declare(field.clone());
        schema.relationships.retain(|r| r.field() != field);
        schema.relationships.push(RelationshipDescriptor::BelongsTo {
            field,
            target_class: target.into(),
        });
        schema
    }

    /// `target` records point back at this class through a field named after it,
    /// lowercased.
    pub fn has_many(self, field: impl Into<FieldName>, target: impl Into<ClassName>) -> Self {
        let foreign_key = self.name.to_lowercase();
        self.has_many_via(field, target, foreign_key)
    }

    /// Like [`ClassSchema::has_many`] with an explicit foreign key.
    pub fn has_many_via(
        mut self,
        field: impl Into<FieldName>,
        target: impl Into<ClassName>,
        foreign_key: impl Into<FieldName>,
    ) -> Self {
        let field = field.into();
        self.relationships.retain(|r| r.field() != field);
        self.relationships.push(RelationshipDescriptor::HasMany {
            field,
            owner_class: self.name.clone(),
            target_class: target.into(),
            foreign_key: foreign_key.into(),
        });
        self
    }

    /// Append a custom validator.
    pub fn validate_with<F>(mut self, validator: F) -> Self
    where
        F: Fn(&Record, &mut Errors) + Send + Sync + 'static,
    {
        self.validators.push(Arc::new(validator));
        self
    }

    /// Append a lifecycle hook. Hooks at the same point run in insertion order.
    pub fn hook<F>(mut self, point: HookPoint, hook: F) -> Self
    where
        F: Fn(&mut Record) + Send + Sync + 'static,
    {
        self.hooks.push((point, Arc::new(hook)));
        self
    }

    pub fn fields(&self) -> &[FieldDef] {
        &self.fields
    }

    /// Names of declared fields, in declaration order.
    pub fn declared_fields(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|f| f.name.as_str())
    }

    pub fn is_declared(&self, name: &str) -> bool {
        self.fields.iter().any(|f| f.name == name)
    }

    pub fn relationships(&self) -> &[RelationshipDescriptor] {
        &self.relationships
    }

    /// Relationship declared under `field`.
    pub fn relationship(&self, field: &str) -> Result<&RelationshipDescriptor> {
        self.relationships
            .iter()
            .find(|r| r.field() == field)
            .ok_or_else(|| Error::UnknownRelationship {
                class: self.name.clone(),
                field: field.to_string(),
            })
    }

    /// Hooks registered for a point, in order.
    pub fn hooks_at(&self, point: HookPoint) -> Vec<Hook> {
        self.hooks
            .iter()
            .filter(|(p, _)| *p == point)
            .map(|(_, h)| Arc::clone(h))
            .collect()
    }

    /// Check a record against the field definitions and validators.
    pub fn validate(&self, record: &Record, errors: &mut Errors) {
        for field in &self.fields {
            match field.validate(record.get(&field.name)) {
                Ok(()) => {}
                Err(Error::MissingRequiredField(name)) => errors.add(name, "can't be blank"),
                Err(Error::TypeMismatch { field, expected, .. }) => {
                    errors.add(field, format!("must be a {expected}"))
                }
                Err(other) => errors.add(field.name.clone(), other.to_string()),
            }
        }
        for validator in &self.validators {
            validator(record, errors);
        }
    }
}

/// Class name to schema lookup.
#[derive(Debug, Clone, Default)]
pub struct Registry {
    classes: HashMap<ClassName, Arc<ClassSchema>>,
}

impl Registry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a schema, replacing any earlier one of the same name.
    pub fn register(&mut self, schema: ClassSchema) -> Arc<ClassSchema> {
        let schema = Arc::new(schema);
        self.classes.insert(schema.name.clone(), Arc::clone(&schema));
        schema
    }

    /// Builder-style registration.
    pub fn with_class(mut self, schema: ClassSchema) -> Self {
        self.register(schema);
        self
    }

    /// Look up a schema by local or wire class name.
    pub fn get(&self, class_name: &str) -> Result<Arc<ClassSchema>> {
        self.classes
            .get(local_class_name(class_name))
            .cloned()
            .ok_or_else(|| Error::ClassNotRegistered(class_name.to_string()))
    }

    pub fn contains(&self, class_name: &str) -> bool {
        self.classes.contains_key(local_class_name(class_name))
    }

    /// A new, unsaved record of the class.
    pub fn construct(&self, class_name: &str) -> Result<Record> {
        Ok(Record::new(self.get(class_name)?))
    }

    /// A record of the class built from server-confirmed fields.
    pub fn instantiate(&self, class_name: &str, confirmed: Attributes) -> Result<Record> {
        Ok(Record::from_confirmed(self.get(class_name)?, confirmed))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::date;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn test_schema() -> ClassSchema {
        ClassSchema::new("User")
            .field(FieldDef::required("username", FieldType::String))
            .field(FieldDef::optional("age", FieldType::Number))
            .field(FieldDef::optional("born", FieldType::Date))
    }

    #[test]
    fn validate_missing_required_field() {
        let def = FieldDef::required("username", FieldType::String);
        assert!(matches!(def.validate(None), Err(Error::MissingRequiredField(f)) if f == "username"));
        assert!(def.validate(Some(&json!(null))).is_err());
        assert!(def.validate(Some(&json!("bob"))).is_ok());
    }

    #[test]
    fn validate_wrong_type() {
        let def = FieldDef::optional("age", FieldType::Number);
        let result = def.validate(Some(&json!("thirty")));
        assert!(matches!(result, Err(Error::TypeMismatch { field, .. }) if field == "age"));
    }

    #[test]
    fn typed_composites() {
        let born = FieldDef::optional("born", FieldType::Date);
        assert!(born.validate(Some(&date("2024-01-01T00:00:00Z"))).is_ok());
        assert!(born.validate(Some(&json!("2024-01-01"))).is_err());

        let pointer = FieldDef::optional("post", FieldType::Pointer);
        let raw = json!({"__type": "Pointer", "className": "Post", "objectId": "p1"});
        assert!(pointer.validate(Some(&raw)).is_ok());
        assert!(matches!(
            FieldDef::optional("n", FieldType::Number).validate(Some(&raw)),
            Err(Error::TypeMismatch { got, .. }) if got == "Pointer"
        ));
    }

    #[test]
    fn declare_is_idempotent() {
        let schema = test_schema()
            .declare("bio")
            .declare("bio")
            .declare_all(["bio", "site"])
            .declare("username");
        let names: Vec<_> = schema.declared_fields().collect();
        assert_eq!(names, vec!["username", "age", "born", "bio", "site"]);
        assert_eq!(schema.fields()[0].field_type, FieldType::String);
    }

    #[test]
    fn belongs_to_declares_field() {
        let schema = ClassSchema::new("Comment").belongs_to("post", "Post");
        assert!(schema.is_declared("post"));
        assert_eq!(
            schema.relationship("post").unwrap(),
            &RelationshipDescriptor::BelongsTo {
                field: "post".into(),
                target_class: "Post".into(),
            }
        );
    }

    #[test]
    fn has_many_uses_lowercased_owner() {
        let schema = ClassSchema::new("BlogPost").has_many("comments", "Comment");
        assert_eq!(
            schema.relationship("comments").unwrap(),
            &RelationshipDescriptor::HasMany {
                field: "comments".into(),
                owner_class: "BlogPost".into(),
                target_class: "Comment".into(),
                foreign_key: "blogpost".into(),
            }
        );
        // has_many does not create a stored field on the owner
        assert!(!schema.is_declared("comments"));
    }

    #[test]
    fn unknown_relationship() {
        let schema = ClassSchema::new("Post");
        assert!(matches!(
            schema.relationship("author"),
            Err(Error::UnknownRelationship { .. })
        ));
    }

    #[test]
    fn hooks_keep_order_per_point() {
        let calls = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&calls);
        let schema = ClassSchema::new("Post")
            .hook(HookPoint::BeforeSave, |r| {
                r.set("step", 1);
            })
            .hook(HookPoint::AfterSave, move |_| {
                seen.fetch_add(1, Ordering::SeqCst);
            })
            .hook(HookPoint::BeforeSave, |r| {
                r.set("step", 2);
            });

        let schema = Arc::new(schema);
        let mut record = Record::new(Arc::clone(&schema));
        for hook in schema.hooks_at(HookPoint::BeforeSave) {
            hook(&mut record);
        }
        assert_eq!(record.get("step"), Some(&json!(2)));
        assert_eq!(schema.hooks_at(HookPoint::AfterSave).len(), 1);
        assert!(schema.hooks_at(HookPoint::AfterDestroy).is_empty());
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn custom_validators_run_after_fields() {
        let schema = Arc::new(test_schema().validate_with(|record, errors| {
            if record.get("age").and_then(|v| v.as_i64()).unwrap_or(0) < 0 {
                errors.add("age", "must be positive");
            }
        }));

        let mut record = Record::new(schema);
        record.set("username", "bob");
        record.set("age", -1);
        assert!(!record.validate());
        assert_eq!(record.errors().on("age"), ["must be positive"]);
    }

    #[test]
    fn registry_resolves_user_alias() {
        let registry = Registry::new().with_class(test_schema());
        assert!(registry.contains("_User"));
        assert_eq!(registry.get("_User").unwrap().name, "User");
        assert!(matches!(
            registry.construct("Comment"),
            Err(Error::ClassNotRegistered(c)) if c == "Comment"
        ));

        let record = registry
            .instantiate("_User", json!({"objectId": "u1"}).as_object().unwrap().clone())
            .unwrap();
        assert_eq!(record.id(), Some("u1"));
        assert_eq!(record.class_name(), "User");
    }

    #[test]
    fn field_type_display() {
        assert_eq!(FieldType::String.to_string(), "String");
        assert_eq!(FieldType::Pointer.to_string(), "Pointer");
        assert_eq!(FieldType::Json.to_string(), "Json");
    }
}
