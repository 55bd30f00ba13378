//! Structured error types for dbkit-core.
//!
//! Configuration problems are reported before any I/O happens. Errors raised
//! by sqlx after construction are carried verbatim in `Database`.

use std::time::Duration;
use thiserror::Error;

/// Main error type for dbkit-core operations
#[derive(Error, Debug)]
pub enum DbKitError {
    /// Driver name is not one of the supported kinds
    #[error("unsupported driver: {name}")]
    UnsupportedDriver { name: String },

    /// Configuration is incomplete or malformed
    #[error("configuration error: {reason}")]
    Config { reason: String },

    /// Every connection attempt failed
    #[error("failed to connect after {attempts} attempt(s): {source}")]
    Connect {
        attempts: u32,
        #[source]
        source: sqlx::Error,
    },

    /// The post-open liveness check failed
    #[error("ping failed: {source}")]
    Ping {
        #[source]
        source: sqlx::Error,
    },

    /// The post-open liveness check did not finish in time
    #[error("ping timed out after {timeout:?}")]
    PingTimeout { timeout: Duration },

    /// Error raised by sqlx after construction
    #[error(transparent)]
    Database(#[from] sqlx::Error),

    /// The caller's context deadline passed
    #[error("context deadline exceeded")]
    DeadlineExceeded,

    /// The caller's context was cancelled
    #[error("context cancelled")]
    Cancelled,

    /// Reading a config file failed
    #[error("I/O error: {source}")]
    Io {
        #[from]
        source: std::io::Error,
    },

    /// A config file could not be parsed
    #[error("invalid config file: {source}")]
    Toml {
        #[from]
        source: toml::de::Error,
    },
}

/// Result type alias for dbkit-core operations
pub type Result<T> = std::result::Result<T, DbKitError>;

impl DbKitError {
    /// Create an unsupported driver error
    pub fn unsupported_driver(name: impl Into<String>) -> Self {
        Self::UnsupportedDriver { name: name.into() }
    }

    /// Create a config error
    pub fn config(reason: impl Into<String>) -> Self {
        Self::Config {
            reason: reason.into(),
        }
    }

    /// True for errors raised by an expired or cancelled context.
    pub fn is_context(&self) -> bool {
        matches!(self, Self::DeadlineExceeded | Self::Cancelled)
    }
}
