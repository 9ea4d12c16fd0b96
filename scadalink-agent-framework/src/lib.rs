//! ScadaLink Agent Framework
//!
//! Common abstractions for building field agents that relay controller data
//! to the central ScadaLink collection API.
//!
//! # Overview
//!
//! This framework provides:
//! - [`AgentConfig`] trait for configuration loading and validation
//! - [`AgentRunner`] for managing agent lifecycle (logging, shutdown signalling)
//! - [`CentralApi`] / [`HttpApiClient`] for the tag registry, heartbeats and data submission
//! - [`SystemProbe`] and [`HeartbeatSchedule`] for liveness reporting
//! - [`AgentArgs`] for common CLI argument parsing
//!
//! # Example
//!
//! ```ignore
//! use scadalink_agent_framework::run_agent;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     run_agent::<MyAgentConfig, _, _>("myagent", "myagent.json5", |config, shutdown| async move {
//!         // Poll until shutdown is flagged
//!         Ok(())
//!     })
//!     .await
//! }
//! ```

mod args;
mod client;
mod config;
mod error;
mod heartbeat;
mod runner;

pub use args::AgentArgs;
pub use client::{
    API_KEY_HEADER, ApiEnvelope, CentralApi, HttpApiClient, SubmitReport, TagList,
};
pub use config::{AgentConfig, validate_api};
pub use error::{AgentError, Result};
pub use heartbeat::{Heartbeat, HeartbeatSchedule, SystemInfo, SystemProbe};
pub use runner::{AgentRunner, run_agent, wait_for_signal};

// Re-export commonly used types from scadalink-common
pub use scadalink_common::{
    ApiConfig, Encoding, LoggingConfig, Quality, Reading, Tag, TagClass,
};
