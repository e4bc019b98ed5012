//! Backend error codes read as field errors.
//!
//! A rejected write comes back as status 400 with `{"code": n, "error": "..."}`.
//! Codes in the table below become a message on a field; anything else is
//! reported as `None` and the caller must treat it as fatal.

use serde::{Deserialize, Serialize};

/// Structured rejection body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackendError {
    pub code: i64,
    #[serde(rename = "error", default)]
    pub message: String,
}

/// A validation failure attached to one field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

impl FieldError {
    fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

pub const OBJECT_NOT_FOUND: i64 = 101;
pub const INCORRECT_TYPE: i64 = 111;
pub const INVALID_EMAIL: i64 = 125;
pub const USERNAME_MISSING: i64 = 200;
pub const PASSWORD_MISSING: i64 = 201;
pub const USERNAME_TAKEN: i64 = 202;
pub const EMAIL_TAKEN: i64 = 203;

impl BackendError {
    pub fn new(code: i64, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    /// The field error for this code, if the code is known.
    pub fn translate(&self) -> Option<FieldError> {
        let error = match self.code {
            OBJECT_NOT_FOUND => FieldError::new("user", "could not be found"),
            INCORRECT_TYPE => {
                FieldError::new(mistyped_key(&self.message).unwrap_or("base"), "has an invalid type")
            }
            INVALID_EMAIL => FieldError::new("email", "must be valid"),
            USERNAME_MISSING => FieldError::new("username", "is missing"),
            PASSWORD_MISSING => FieldError::new("password", "is missing"),
            USERNAME_TAKEN => FieldError::new("username", "must be unique"),
            EMAIL_TAKEN => FieldError::new("email", "has already been taken"),
            _ => return None,
        };
        Some(error)
    }
}

// "invalid type for key score, expected number, but got string"
fn mistyped_key(message: &str) -> Option<&str> {
    let rest = &message[message.find("for key ")? + "for key ".len()..];
    let key = rest
        .split(|c: char| c == ',' || c.is_whitespace())
        .next()
        .filter(|k| !k.is_empty())?;
    Some(key)
}
