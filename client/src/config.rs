//! Configuration management for the client.

use std::env;
use std::fmt;
use std::time::Duration;

/// Base URL used when none is configured.
pub const DEFAULT_BASE_URL: &str = "https://api.parse.com/1";

/// Default timeout for HTTP requests: 30 seconds.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Static backend credentials.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub app_id: String,
    pub master_key: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("app_id", &self.app_id)
            .field("master_key", &"<redacted>")
            .finish()
    }
}

/// Client configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Backend root, e.g. `https://api.parse.com/1`
    pub base_url: String,
    pub credentials: Credentials,
    /// Per-request timeout
    pub timeout: Duration,
}

impl Config {
    /// Configure explicitly in process.
    pub fn new(
        base_url: impl Into<String>,
        app_id: impl Into<String>,
        master_key: impl Into<String>,
    ) -> Self {
        Self {
            base_url: base_url.into(),
            credentials: Credentials {
                app_id: app_id.into(),
                master_key: master_key.into(),
            },
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Load `.env` if present, then read the environment.
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_env()
    }

    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration through an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let base_url = lookup("RESTMAP_BASE_URL").unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
        reqwest::Url::parse(&base_url).map_err(|_| ConfigError::InvalidBaseUrl(base_url.clone()))?;

        let app_id = lookup("RESTMAP_APP_ID").ok_or(ConfigError::MissingAppId)?;
        let master_key = lookup("RESTMAP_MASTER_KEY").ok_or(ConfigError::MissingMasterKey)?;

        let timeout = match lookup("RESTMAP_TIMEOUT_SECS") {
            Some(raw) => Duration::from_secs(raw.parse().map_err(|_| ConfigError::InvalidTimeout)?),
            None => DEFAULT_TIMEOUT,
        };

        Ok(Self::new(base_url, app_id, master_key).with_timeout(timeout))
    }

    /// Returns the effective timeout, using default if zero.
    pub fn effective_timeout(&self) -> Duration {
        if self.timeout.is_zero() {
            DEFAULT_TIMEOUT
        } else {
            self.timeout
        }
    }
}

/// Configuration errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("RESTMAP_APP_ID environment variable is required")]
    MissingAppId,

    #[error("RESTMAP_MASTER_KEY environment variable is required")]
    MissingMasterKey,

    #[error("Invalid RESTMAP_TIMEOUT_SECS value")]
    InvalidTimeout,

    #[error("Invalid base URL: {0}")]
    InvalidBaseUrl(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn loads_credentials() {
        let config = Config::from_lookup(lookup(&[
            ("RESTMAP_APP_ID", "app"),
            ("RESTMAP_MASTER_KEY", "secret"),
        ]))
        .unwrap();
        assert_eq!(config.base_url, DEFAULT_BASE_URL);
        assert_eq!(config.credentials.app_id, "app");
        assert_eq!(config.credentials.master_key, "secret");
        assert_eq!(config.timeout, DEFAULT_TIMEOUT);
    }

    #[test]
    fn missing_keys() {
        assert_eq!(
            Config::from_lookup(lookup(&[])).unwrap_err(),
            ConfigError::MissingAppId
        );
        assert_eq!(
            Config::from_lookup(lookup(&[("RESTMAP_APP_ID", "app")])).unwrap_err(),
            ConfigError::MissingMasterKey
        );
    }

    #[test]
    fn invalid_values() {
        let err = Config::from_lookup(lookup(&[
            ("RESTMAP_APP_ID", "app"),
            ("RESTMAP_MASTER_KEY", "secret"),
            ("RESTMAP_TIMEOUT_SECS", "soon"),
        ]))
        .unwrap_err();
        assert_eq!(err, ConfigError::InvalidTimeout);

        let err = Config::from_lookup(lookup(&[("RESTMAP_BASE_URL", "not a url")])).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidBaseUrl(_)));
    }

    #[test]
    fn master_key_is_redacted() {
        let config = Config::new("http://localhost:1337/parse", "app", "secret");
        let printed = format!("{config:?}");
        assert!(printed.contains("app"));
        assert!(!printed.contains("secret"));
    }

    #[test]
    fn effective_timeout_uses_default_when_zero() {
        let config = Config::new(DEFAULT_BASE_URL, "a", "k").with_timeout(Duration::ZERO);
        assert_eq!(config.effective_timeout(), DEFAULT_TIMEOUT);
    }
}
