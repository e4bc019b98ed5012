//! # Restmap Engine
//!
//! The IO-free core of an object mapper for REST document backends.
//!
//! This crate owns everything about a mapped record that can be decided without
//! talking to the network: which values are confirmed by the server and which are
//! still local, how typed values travel on the wire, which fields and relationships
//! a class declares, and how backend error codes read as field errors.
//!
//! ## Design Principles
//!
//! - **No IO**: the engine never performs a request; `restmap-client` does
//! - **Two-layer state**: confirmed server values are never touched by setters
//! - **Explicit schemas**: fields, relationships and hooks are declared up front,
//!   and classes are resolved through a [`Registry`], never by reflection
//!
//! ## Core Concepts
//!
//! ### Records
//!
//! A [`Record`] is one local instance of a remote object. Reads go through its
//! [`AttributeStore`]: a pending write shadows the confirmed value until the next
//! successful round trip folds it into the confirmed layer.
//!
//! ### Typed values
//!
//! [`TypedValue::decode`] reads the backend's `__type` convention:
//! - [`TypedValue::Scalar`] - anything without a known discriminator
//! - [`TypedValue::Date`] - `{"__type": "Date", "iso": ...}`
//! - [`TypedValue::Pointer`] - a [`Pointer`] to another object, optionally
//!   carrying the target's fields inline (eager inclusion)
//!
//! ### Schemas
//!
//! A [`ClassSchema`] lists declared fields, `belongs_to`/`has_many`
//! [`RelationshipDescriptor`]s, validators and lifecycle hooks.
//!
//! ## Quick Start
//!
//! ```rust
//! use restmap_engine::{ClassSchema, FieldDef, FieldType, Registry, TypedValue};
//! use serde_json::json;
//!
//! let mut registry = Registry::new();
//! registry.register(
//!     ClassSchema::new("Post")
//!         .field(FieldDef::required("title", FieldType::String))
//!         .has_many("comments", "Comment"),
//! );
//! registry.register(ClassSchema::new("Comment").belongs_to("post", "Post"));
//!
//! let mut post = registry.construct("Post").unwrap();
//! post.set("title", "Hello");
//! assert_eq!(post.get("title"), Some(&json!("Hello")));
//! assert!(post.id().is_none());
//!
//! let raw = json!({"__type": "Pointer", "className": "Post", "objectId": "abc123"});
//! match TypedValue::decode(&raw).unwrap() {
//!     TypedValue::Pointer(pointer) => assert_eq!(pointer.object_id, "abc123"),
//!     other => panic!("unexpected {other:?}"),
//! }
//! ```

pub mod attributes;
pub mod error;
pub mod record;
pub mod schema;
pub mod translate;
pub mod value;

// Re-export main types at crate root
pub use attributes::AttributeStore;
pub use error::Error;
pub use record::{Errors, Record, RecordState};
pub use schema::{
    ClassSchema, FieldDef, FieldType, Hook, HookPoint, Registry, RelationshipDescriptor, Validator,
};
pub use translate::{BackendError, FieldError};
pub use value::{Pointer, TypedValue};

/// Type aliases for clarity
pub type ClassName = String;
pub type ObjectId = String;
pub type FieldName = String;
pub type Attributes = serde_json::Map<String, serde_json::Value>;
