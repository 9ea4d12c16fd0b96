//! Turning tag reads into readings.
//!
//! [`decode`] is pure: given a tag, the outcome of its read and a
//! timestamp, it produces exactly one [`Reading`]. [`read_tag`] wraps it
//! with the transport round-trip. Neither ever fails; every problem is
//! reported as a bad-quality reading carrying the error text.

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use scadalink_common::Reading;
use scadalink_common::Tag;
use scadalink_common::telemetry::now;

use crate::point::ModbusPoint;
use crate::transport::{ModbusTransport, TransportError};

/// Raw data returned by the controller for one point.
#[derive(Debug, Clone, PartialEq)]
pub enum RawPayload {
    Registers(Vec<u16>),
    Bits(Vec<bool>),
    /// No read was performed.
    Empty,
}

/// Why a payload could not be turned into a value.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum DecodeError {
    #[error("Tag has no Modbus address")]
    MissingAddress,

    #[error("Address {address} is outside the {band} range")]
    AddressOutOfBand { address: u32, band: &'static str },

    #[error("Malformed payload: expected {expected} values, got {actual}")]
    MalformedPayload { expected: usize, actual: usize },

    #[error("Payload kind does not match tag class")]
    PayloadKindMismatch,

    #[error("Unsupported tag class: {0}")]
    UnsupportedClass(String),
}

/// Reporting policy for tags whose class is not AI/AO/DI/DO.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UnknownClassPolicy {
    /// Report value 0.0 with good quality, logging a warning.
    #[default]
    Zero,
    /// Report a bad reading naming the class.
    Bad,
}

/// Produce the reading for one tag from its resolved point and read outcome.
pub fn decode(
    tag: &Tag,
    point: &ModbusPoint,
    outcome: Result<RawPayload, TransportError>,
    policy: UnknownClassPolicy,
    timestamp: DateTime<Local>,
) -> Reading {
    let payload = match outcome {
        Ok(payload) => payload,
        Err(e) => return Reading::bad(&tag.name, e.to_string(), timestamp),
    };

    match point.decode(&payload) {
        Ok(value) => Reading::good(&tag.name, value, timestamp),
        Err(DecodeError::UnsupportedClass(class)) if policy == UnknownClassPolicy::Zero => {
            warn!(tag = %tag.name, class = %class, "Unknown tag class, reporting 0");
            Reading::good(&tag.name, 0.0, timestamp)
        }
        Err(e) => Reading::bad(&tag.name, e.to_string(), timestamp),
    }
}

/// Read one tag from the controller and decode it.
///
/// The timestamp is taken when the read starts.
pub async fn read_tag<T: ModbusTransport>(
    transport: &mut T,
    tag: &Tag,
    policy: UnknownClassPolicy,
) -> Reading {
    let timestamp = now();

    let point = match ModbusPoint::resolve(tag) {
        Ok(point) => point,
        Err(e) => {
            warn!(tag = %tag.name, address = ?tag.address, error = %e, "Cannot map tag");
            return Reading::bad(&tag.name, e.to_string(), timestamp);
        }
    };

    let outcome = point.read(transport).await;
    if let Err(e) = &outcome {
        warn!(tag = %tag.name, address = ?tag.address, error = %e, "Tag read failed");
    }

    let reading = decode(tag, &point, outcome, policy, timestamp);
    debug!(tag = %tag.name, value = ?reading.value, quality = %reading.quality.as_str(), "Read tag");
    reading
}
