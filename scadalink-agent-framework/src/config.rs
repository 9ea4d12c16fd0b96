//! Configuration traits and utilities.

use std::path::Path;

use serde::de::DeserializeOwned;

use crate::error::{AgentError, Result};
use crate::{ApiConfig, LoggingConfig};

/// Trait for agent configuration types.
///
/// Implement this trait for your agent's configuration struct to get
/// automatic loading, validation, and access to common config fields.
///
/// # Example
///
/// ```ignore
/// use serde::Deserialize;
/// use scadalink_agent_framework::{AgentConfig, ApiConfig, LoggingConfig};
///
/// #[derive(Debug, Deserialize)]
/// pub struct MyAgentConfig {
///     pub api: ApiConfig,
///     pub logging: LoggingConfig,
/// }
///
/// impl AgentConfig for MyAgentConfig {
///     fn api(&self) -> &ApiConfig {
///         &self.api
///     }
///
///     fn logging(&self) -> &LoggingConfig {
///         &self.logging
///     }
/// }
/// ```
pub trait AgentConfig: Sized + DeserializeOwned {
    /// Get the central API configuration.
    fn api(&self) -> &ApiConfig;

    /// Get the logging configuration.
    fn logging(&self) -> &LoggingConfig;

    /// Validate the configuration.
    ///
    /// Called automatically after loading. The default checks the API
    /// section; override and call [`validate_api`] to extend it.
    fn validate(&self) -> Result<()> {
        validate_api(self.api())
    }

    /// Load configuration from a file path.
    ///
    /// Supports JSON5 format. Calls [`validate`](Self::validate) after loading.
    fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(AgentError::ConfigNotFound {
                path: path.display().to_string(),
            });
        }

        let content = std::fs::read_to_string(path)?;
        let config: Self = json5::from_str(&content)?;

        config.validate()?;

        Ok(config)
    }
}

/// Check the settings every agent needs to reach the central API.
pub fn validate_api(api: &ApiConfig) -> Result<()> {
    if api.api_key.trim().is_empty() {
        return Err(AgentError::validation(
            "api.api_key is required (set api_key in the api section)",
        ));
    }
    if api.url.trim().is_empty() {
        return Err(AgentError::validation("api.url cannot be empty"));
    }
    if api.request_timeout_secs == 0 || api.submit_timeout_secs == 0 {
        return Err(AgentError::validation("api timeouts must be at least 1s"));
    }
    Ok(())
}
