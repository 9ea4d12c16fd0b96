//! Configuration for the Modbus agent.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use scadalink_agent_framework::{
    AgentConfig, AgentError, ApiConfig, LoggingConfig, Result, validate_api,
};

use crate::decoder::UnknownClassPolicy;

/// Complete agent configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModbusAgentConfig {
    /// Central collection API settings
    #[serde(default)]
    pub api: ApiConfig,

    /// Controller connection settings
    #[serde(default)]
    pub plc: PlcConfig,

    /// Poll loop settings
    #[serde(default)]
    pub agent: PollingConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// The single Modbus/TCP controller this agent polls.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlcConfig {
    /// Host address (IP or hostname)
    #[serde(default = "default_host")]
    pub host: String,

    /// TCP port (default: 502)
    #[serde(default = "default_modbus_port")]
    pub port: u16,

    /// Controller identifier used by the tag registry and submissions
    #[serde(default = "default_plc_id")]
    pub plc_id: u32,

    /// Modbus unit/slave ID (1-247)
    #[serde(default = "default_unit_id")]
    pub unit_id: u8,

    /// Bound on connection establishment and on each read, in milliseconds
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

fn default_host() -> String {
    "192.168.1.100".to_string()
}

fn default_modbus_port() -> u16 {
    502
}

fn default_plc_id() -> u32 {
    1
}

fn default_unit_id() -> u8 {
    1
}

fn default_timeout_ms() -> u64 {
    5000
}

impl Default for PlcConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_modbus_port(),
            plc_id: default_plc_id(),
            unit_id: default_unit_id(),
            timeout_ms: default_timeout_ms(),
        }
    }
}

impl PlcConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// `host:port` string for connecting and logging.
    pub fn endpoint(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Poll/batch/heartbeat cadence.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PollingConfig {
    /// Target cycle cadence in seconds
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,

    /// Minimum spacing between heartbeats in seconds
    #[serde(default = "default_heartbeat_interval")]
    pub heartbeat_interval_secs: u64,

    /// Maximum readings per submission
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// How to report tags whose class is not AI/AO/DI/DO
    #[serde(default)]
    pub unknown_tag_class: UnknownClassPolicy,
}

fn default_poll_interval() -> u64 {
    5
}

fn default_heartbeat_interval() -> u64 {
    60
}

fn default_batch_size() -> usize {
    100
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: default_poll_interval(),
            heartbeat_interval_secs: default_heartbeat_interval(),
            batch_size: default_batch_size(),
            unknown_tag_class: UnknownClassPolicy::default(),
        }
    }
}

impl AgentConfig for ModbusAgentConfig {
    fn api(&self) -> &ApiConfig {
        &self.api
    }

    fn logging(&self) -> &LoggingConfig {
        &self.logging
    }

    fn validate(&self) -> Result<()> {
        validate_api(&self.api)?;

        if self.plc.host.trim().is_empty() {
            return Err(AgentError::validation("plc.host cannot be empty"));
        }
        if self.plc.port == 0 {
            return Err(AgentError::validation("plc.port must be 1-65535"));
        }
        if self.plc.unit_id == 0 {
            return Err(AgentError::validation("plc.unit_id must be 1-247"));
        }
        if self.plc.timeout_ms == 0 {
            return Err(AgentError::validation("plc.timeout_ms must be positive"));
        }
        if self.agent.poll_interval_secs == 0 {
            return Err(AgentError::validation(
                "agent.poll_interval_secs must be at least 1",
            ));
        }
        if self.agent.batch_size == 0 {
            return Err(AgentError::validation("agent.batch_size must be at least 1"));
        }

        Ok(())
    }
}
