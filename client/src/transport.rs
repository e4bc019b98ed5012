//! The REST transport seam.
//!
//! Everything the mapper sends goes through [`RemoteResource::execute`]: one
//! request, one blocking round trip, one [`Response`] or a [`TransportError`].

use restmap_engine::value::{local_class_name, USER_CLASS};
use serde_json::Value;
use std::fmt;

/// HTTP verb used by the mapper.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    Get,
    Post,
    Put,
    Delete,
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Method::Get => write!(f, "GET"),
            Method::Post => write!(f, "POST"),
            Method::Put => write!(f, "PUT"),
            Method::Delete => write!(f, "DELETE"),
        }
    }
}

/// A request against a class or object endpoint.
#[derive(Debug, Clone, PartialEq)]
pub struct Request {
    pub method: Method,
    /// Path below the base URL, e.g. `/classes/Post/abc123`
    pub path: String,
    pub query: Vec<(String, String)>,
    pub body: Option<Value>,
}

impl Request {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: Vec::new(),
            body: None,
        }
    }

    pub fn with_body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    /// Value of a query parameter.
    pub fn param(&self, key: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

/// Status and decoded JSON body. An empty body decodes to `Null`.
#[derive(Debug, Clone, PartialEq)]
pub struct Response {
    pub status: u16,
    pub body: Value,
}

impl Response {
    pub fn new(status: u16, body: Value) -> Self {
        Self { status, body }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// The request never produced a usable response.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    #[error("connection failed: {0}")]
    Connect(String),

    #[error("request timed out")]
    Timeout,

    #[error("invalid response body: {0}")]
    InvalidBody(String),

    #[error("transport failure: {0}")]
    Other(String),
}

/// Performs single HTTP calls against the backend.
pub trait RemoteResource {
    fn execute(&self, request: &Request) -> Result<Response, TransportError>;
}

impl<R: RemoteResource + ?Sized> RemoteResource for &R {
    fn execute(&self, request: &Request) -> Result<Response, TransportError> {
        (**self).execute(request)
    }
}

impl<R: RemoteResource + ?Sized> RemoteResource for Box<R> {
    fn execute(&self, request: &Request) -> Result<Response, TransportError> {
        (**self).execute(request)
    }
}

/// Collection endpoint for a class. The user class has its own root.
pub fn class_path(class_name: &str) -> String {
    let class_name = local_class_name(class_name);
    if class_name == USER_CLASS {
        "/users".to_string()
    } else {
        format!("/classes/{class_name}")
    }
}

/// Endpoint for one object.
pub fn object_path(class_name: &str, object_id: &str) -> String {
    format!("{}/{object_id}", class_path(class_name))
}
