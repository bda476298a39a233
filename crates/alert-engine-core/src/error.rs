//! Error types for the alert engine

use thiserror::Error;

/// Result type alias using the engine's Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for alert engine operations
#[derive(Error, Debug)]
pub enum Error {
    /// HTTP transport error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The backend answered with a non-2xx status
    #[error("{endpoint} returned status {status}")]
    Status { endpoint: String, status: u16 },

    /// The backend answered with a body we could not parse
    #[error("Cannot parse {endpoint} response: {source}")]
    Decode {
        endpoint: String,
        #[source]
        source: serde_json::Error,
    },

    /// Invalid URL
    #[error("Invalid URL: {0}")]
    Url(#[from] url::ParseError),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Validation error
    #[error("Validation error: {0}")]
    Validation(String),

    /// A retrying operation was told to stop before it succeeded
    #[error("{operation} aborted before it succeeded")]
    Aborted { operation: String },

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl Error {
    /// Create a config error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a validation error
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Create an aborted error
    pub fn aborted(operation: impl Into<String>) -> Self {
        Self::Aborted {
            operation: operation.into(),
        }
    }

    /// Whether this error only reports that a retry session was cancelled
    pub fn is_aborted(&self) -> bool {
        matches!(self, Self::Aborted { .. })
    }

    /// Whether repeating the same request cannot succeed.
    ///
    /// Client errors other than 408 and 429, undecodable bodies and local
    /// setup errors are permanent; connection failures and 5xx are not.
    pub fn is_permanent(&self) -> bool {
        match self {
            Self::Status { status, .. } => {
                (400..500).contains(status) && *status != 408 && *status != 429
            }
            Self::Decode { .. }
            | Self::Url(_)
            | Self::Config(_)
            | Self::Validation(_)
            | Self::Serialization(_) => true,
            Self::Http(_) | Self::Aborted { .. } | Self::Io(_) => false,
        }
    }
}

impl From<config::ConfigError> for Error {
    fn from(e: config::ConfigError) -> Self {
        Self::Config(e.to_string())
    }
}
