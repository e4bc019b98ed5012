//! Error types for the restmap client.

use crate::config::ConfigError;
use crate::transport::TransportError;
use thiserror::Error;

/// All errors surfaced by persistence, lookup and relationship calls.
///
/// Validation failures and known backend rejection codes are not errors:
/// they land on the record's error list and the call reports `false`.
#[derive(Debug, Error)]
pub enum Error {
    #[error("engine error: {0}")]
    Engine(#[from] restmap_engine::Error),

    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    /// A 400 response whose code has no field mapping.
    #[error("backend rejected request with unmapped code {code}: {message}")]
    Backend { code: i64, message: String },

    /// A non-success status other than a structured 400.
    #[error("unexpected status {status}: {body}")]
    UnexpectedStatus { status: u16, body: String },

    #[error("{class} {id} not found")]
    NotFound { class: String, id: String },

    /// A cascading save or relationship write was rejected.
    #[error("{class} rejected: {}", messages.join(", "))]
    Rejected {
        class: String,
        messages: Vec<String>,
    },

    #[error("invalid response: {0}")]
    InvalidResponse(String),
}

impl From<reqwest::Error> for TransportError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            TransportError::Timeout
        } else if err.is_connect() {
            TransportError::Connect(err.to_string())
        } else if err.is_decode() {
            TransportError::InvalidBody(err.to_string())
        } else {
            TransportError::Other(err.to_string())
        }
    }
}

/// Result type alias for client operations.
pub type Result<T> = std::result::Result<T, Error>;
