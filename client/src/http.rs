//! Blocking reqwest transport.

use crate::config::Config;
use crate::error::Result;
use crate::transport::{Method, RemoteResource, Request, Response, TransportError};
use reqwest::blocking::Client;
use serde_json::Value;
use std::sync::Arc;

/// Tracing target for HTTP transport operations.
pub const TRACING_TARGET: &str = "restmap_client::http";

const APP_ID_HEADER: &str = "X-Parse-Application-Id";
const MASTER_KEY_HEADER: &str = "X-Parse-Master-Key";

struct HttpResourceInner {
    http: Client,
    config: Config,
}

/// Sends requests to the backend over HTTPS with the configured credentials.
#[derive(Clone)]
pub struct HttpResource {
    inner: Arc<HttpResourceInner>,
}

impl std::fmt::Debug for HttpResource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpResource")
            .field("config", &self.inner.config)
            .finish_non_exhaustive()
    }
}

impl HttpResource {
    /// Creates a transport for the given configuration.
    pub fn new(config: Config) -> Result<Self> {
        let timeout = config.effective_timeout();
        tracing::debug!(
            target: TRACING_TARGET,
            base_url = %config.base_url,
            timeout_ms = timeout.as_millis(),
            "Creating HTTP transport"
        );

        let http = Client::builder()
            .timeout(timeout)
            .user_agent(format!("restmap/{}", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(TransportError::from)?;

        Ok(Self {
            inner: Arc::new(HttpResourceInner { http, config }),
        })
    }

    /// Creates a transport from `.env` and the environment.
    pub fn from_env() -> Result<Self> {
        Self::new(Config::load()?)
    }

    pub fn config(&self) -> &Config {
        &self.inner.config
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.inner.config.base_url.trim_end_matches('/'), path)
    }
}

impl RemoteResource for HttpResource {
    fn execute(&self, request: &Request) -> std::result::Result<Response, TransportError> {
        let url = self.url(&request.path);
        let method = match request.method {
            Method::Get => reqwest::Method::GET,
            Method::Post => reqwest::Method::POST,
            Method::Put => reqwest::Method::PUT,
            Method::Delete => reqwest::Method::DELETE,
        };

        tracing::debug!(target: TRACING_TARGET, method = %request.method, %url, "Sending request");

        let credentials = &self.inner.config.credentials;
        let mut builder = self
            .inner
            .http
            .request(method, &url)
            .header(APP_ID_HEADER, &credentials.app_id)
            .header(MASTER_KEY_HEADER, &credentials.master_key);
        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let response = builder.send()?;
        let status = response.status().as_u16();
        let text = response.text()?;
        let body = if text.trim().is_empty() {
            Value::Null
        } else {
            serde_json::from_str(&text).map_err(|e| TransportError::InvalidBody(e.to_string()))?
        };

        tracing::debug!(target: TRACING_TARGET, status, %url, "Received response");
        Ok(Response::new(status, body))
    }
}
