//! Error types for the restmap engine.

use crate::{ClassName, FieldName};
use thiserror::Error;

/// All possible errors from the restmap engine.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum Error {
    // Schema errors
    #[error("class not registered: {0}")]
    ClassNotRegistered(ClassName),

    #[error("no relationship '{field}' declared on {class}")]
    UnknownRelationship { class: ClassName, field: FieldName },

    #[error("relationship '{field}' on {class} is not a {expected} relationship")]
    WrongRelationshipKind {
        class: ClassName,
        field: FieldName,
        expected: &'static str,
    },

    // Wire errors
    #[error("invalid pointer: {0}")]
    InvalidPointer(String),

    #[error("invalid payload: {0}")]
    InvalidPayload(String),

    // Validation errors
    #[error("missing required field: {0}")]
    MissingRequiredField(FieldName),

    #[error("type mismatch for field '{field}': expected {expected}, got {got}")]
    TypeMismatch {
        field: FieldName,
        expected: String,
        got: String,
    },

    // State errors
    #[error("{0} record has not been saved")]
    NotPersisted(ClassName),
}

/// Result type for engine operations.
pub type Result<T> = std::result::Result<T, Error>;
