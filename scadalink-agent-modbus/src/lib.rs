//! Field agent for Modbus/TCP controllers.
//!
//! The agent polls one controller on a fixed cadence and relays every tag
//! reading to the central collection API in batches.
//!
//! # Tag Addressing
//!
//! ```text
//! AI / AO   40001-49999   two holding registers, decoded per data type
//! DI        10001-19999   one discrete input
//! DO        1-9999        one coil
//! ```
//!
//! Reads never abort a cycle: a failed or undecodable read becomes a
//! bad-quality reading and the loop moves on to the next tag.

pub mod config;
pub mod decoder;
pub mod point;
pub mod scheduler;
pub mod transport;

pub use config::{ModbusAgentConfig, PlcConfig, PollingConfig};
pub use decoder::{DecodeError, RawPayload, UnknownClassPolicy, decode, read_tag};
pub use point::{AddressBand, ModbusPoint};
pub use scheduler::{AgentState, CycleReport, PollSettings, Scheduler};
pub use transport::{ModbusTransport, TcpTransport, TransportError};
