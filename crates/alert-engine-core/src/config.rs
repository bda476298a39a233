//! Configuration management for the alert engine
//!
//! Sources are layered: built-in defaults, then an optional config file
//! (format picked from its extension), then `ALERT_ENGINE__*` environment
//! variables such as `ALERT_ENGINE__BACKEND__BASE_URL`.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{Error, Result};
use crate::retry::BackoffSchedule;

/// Environment variable prefix
pub const ENV_PREFIX: &str = "ALERT_ENGINE";

/// Main configuration struct
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Alert backend connection
    pub backend: BackendConfig,

    /// Which remote calls are retried, and how
    pub retry: RetryConfig,

    /// Logging configuration
    pub logging: LoggingConfig,
}

impl Config {
    /// Load and validate configuration from all sources
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder =
            config::Config::builder().add_source(config::Config::try_from(&Config::default())?);

        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path).required(true));
        }

        let config: Config = builder
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true)
                    .list_separator(",")
                    .with_list_parse_key("retry.backoff_ms"),
            )
            .build()?
            .try_deserialize()?;

        config.validate()?;
        Ok(config)
    }

    /// Check cross-field invariants
    pub fn validate(&self) -> Result<()> {
        self.backend.url()?;
        if self.backend.max_concurrent_requests == Some(0) {
            return Err(Error::config(
                "backend.max_concurrent_requests must be at least 1",
            ));
        }
        if self.retry.backoff_ms.is_empty() {
            return Err(Error::config("retry.backoff_ms must not be empty"));
        }
        Ok(())
    }
}

/// Alert backend configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendConfig {
    /// Base URL of the alerting API
    pub base_url: String,
    /// Cap on concurrently in-flight requests; `None` disables the gate
    pub max_concurrent_requests: Option<usize>,
    /// Per-request timeout
    #[serde(with = "humantime_serde")]
    pub request_timeout: Duration,
}

impl BackendConfig {
    /// Parsed base URL, with a trailing slash so endpoint paths append to it
    pub fn url(&self) -> Result<Url> {
        let mut url = Url::parse(&self.base_url)?;
        if !url.path().ends_with('/') {
            let path = format!("{}/", url.path());
            url.set_path(&path);
        }
        Ok(url)
    }
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:9001".to_string(),
            max_concurrent_requests: Some(3),
            request_timeout: Duration::from_secs(30),
        }
    }
}

/// Retry configuration.
///
/// An enabled call retries transient failures (connection errors, 5xx, 408,
/// 429) with no attempt limit; notify and resolve stop once their reporter is
/// superseded. Permanent failures (other 4xx, undecodable bodies) are never
/// retried. With `fetch_alerts` enabled the engine waits for the alert list
/// while the API is unreachable instead of failing at startup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Backoff delays in milliseconds; the last one repeats
    pub backoff_ms: Vec<u64>,
    /// Retry the startup alert list fetch
    pub fetch_alerts: bool,
    /// Retry metric queries
    pub query: bool,
    /// Retry notify calls until the reporter is superseded
    pub notify: bool,
    /// Retry resolve calls until the reporter is superseded
    pub resolve: bool,
}

impl RetryConfig {
    /// Configuration with no call retried
    pub fn never() -> Self {
        Self {
            fetch_alerts: false,
            query: false,
            notify: false,
            resolve: false,
            ..Self::default()
        }
    }

    /// A fresh schedule for one retry session
    pub fn schedule(&self) -> Result<BackoffSchedule> {
        BackoffSchedule::from_millis(&self.backoff_ms)
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            backoff_ms: BackoffSchedule::DEFAULT_MILLIS.to_vec(),
            fetch_alerts: true,
            query: false,
            notify: true,
            resolve: true,
        }
    }
}

/// Log output format
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level or `EnvFilter` directive
    pub level: String,
    /// Log format
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Pretty,
        }
    }
}
