//! Error types for the agent framework.

use thiserror::Error;

/// Result type alias using [`AgentError`].
pub type Result<T> = std::result::Result<T, AgentError>;

/// Errors that can occur in an agent outside the per-tag read path.
///
/// Per-tag failures never surface here; they become bad-quality readings.
#[derive(Error, Debug)]
pub enum AgentError {
    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Configuration file not found.
    #[error("Configuration file not found: {path}")]
    ConfigNotFound { path: String },

    /// Configuration parse error.
    #[error("Failed to parse configuration: {0}")]
    ConfigParse(String),

    /// Configuration validation error (e.g. missing API key).
    #[error("Configuration validation failed: {0}")]
    ConfigValidation(String),

    /// Tag registry fetch failed or returned no tags. Fatal at startup.
    #[error("Tag registry error: {0}")]
    Registry(String),

    /// Transport-level HTTP failure (unreachable, timeout, non-2xx, bad body).
    #[error("HTTP error during {action}: {message}")]
    Http {
        action: &'static str,
        message: String,
    },

    /// The central API answered with `success: false`.
    #[error("API rejected {action}: {message}")]
    Api {
        action: &'static str,
        message: String,
    },

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic error with context.
    #[error("{context}: {source}")]
    WithContext {
        context: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

impl AgentError {
    /// Create a configuration error.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a configuration validation error.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::ConfigValidation(msg.into())
    }

    /// Create a registry error.
    pub fn registry(msg: impl Into<String>) -> Self {
        Self::Registry(msg.into())
    }

    /// Wrap an error with context.
    pub fn with_context<E>(context: impl Into<String>, source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::WithContext {
            context: context.into(),
            source: Box::new(source),
        }
    }

    /// Whether this error must stop the agent before the poll loop starts.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::Config(_)
                | Self::ConfigNotFound { .. }
                | Self::ConfigParse(_)
                | Self::ConfigValidation(_)
                | Self::Registry(_)
        )
    }
}

impl From<json5::Error> for AgentError {
    fn from(err: json5::Error) -> Self {
        Self::ConfigParse(err.to_string())
    }
}

impl From<scadalink_common::Error> for AgentError {
    fn from(err: scadalink_common::Error) -> Self {
        Self::Config(err.to_string())
    }
}
