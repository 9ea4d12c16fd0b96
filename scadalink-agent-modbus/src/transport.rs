//! Modbus transport abstraction and the TCP implementation.
//!
//! The scheduler only talks to [`ModbusTransport`], so tests can drive it
//! with a scripted in-memory controller.

use std::future::Future;
use std::time::Duration;

use tokio_modbus::client::Context;
use tokio_modbus::prelude::*;
use tracing::{debug, info};

use crate::config::PlcConfig;

/// Error type for transport operations.
///
/// The `Display` text of each variant is what ends up in a bad reading's
/// `error` field, so keep it short and operator-readable.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum TransportError {
    #[error("Connection failed: {0}")]
    Connect(String),

    #[error("{operation} timed out after {}ms", .after.as_millis())]
    Timeout {
        operation: &'static str,
        after: Duration,
    },

    #[error("Modbus exception: {0}")]
    Exception(String),

    #[error("Read failed: {0}")]
    Io(String),

    #[error("Not connected")]
    NotConnected,
}

/// Client-side access to one Modbus controller.
///
/// Offsets are zero-based protocol addresses. A connection lives for one
/// poll cycle: `connect` at the start, `close` at the end.
pub trait ModbusTransport {
    /// Open the connection.
    fn connect(&mut self) -> impl Future<Output = Result<(), TransportError>> + Send;

    /// Read `count` holding registers starting at `offset`.
    fn read_holding_registers(
        &mut self,
        offset: u16,
        count: u16,
    ) -> impl Future<Output = Result<Vec<u16>, TransportError>> + Send;

    /// Read `count` discrete inputs starting at `offset`.
    fn read_discrete_inputs(
        &mut self,
        offset: u16,
        count: u16,
    ) -> impl Future<Output = Result<Vec<bool>, TransportError>> + Send;

    /// Read `count` coils starting at `offset`.
    fn read_coils(
        &mut self,
        offset: u16,
        count: u16,
    ) -> impl Future<Output = Result<Vec<bool>, TransportError>> + Send;

    /// Close the connection. Calling this while already closed is a no-op.
    fn close(&mut self) -> impl Future<Output = ()> + Send;

    fn is_connected(&self) -> bool;
}

/// Modbus/TCP transport backed by `tokio-modbus`.
///
/// Connection establishment and every read are bounded by the configured
/// timeout.
pub struct TcpTransport {
    endpoint: String,
    slave: Slave,
    timeout: Duration,
    ctx: Option<Context>,
}

impl TcpTransport {
    pub fn new(endpoint: impl Into<String>, unit_id: u8, timeout: Duration) -> Self {
        Self {
            endpoint: endpoint.into(),
            slave: Slave(unit_id),
            timeout,
            ctx: None,
        }
    }

    pub fn from_config(config: &PlcConfig) -> Self {
        Self::new(config.endpoint(), config.unit_id, config.timeout())
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn context(&mut self) -> Result<&mut Context, TransportError> {
        self.ctx.as_mut().ok_or(TransportError::NotConnected)
    }

}

/// Resolve `endpoint` and open a Modbus/TCP context for `slave`.
async fn open(endpoint: &str, slave: Slave) -> Result<Context, TransportError> {
    let addr = tokio::net::lookup_host(endpoint)
        .await
        .map_err(|e| TransportError::Connect(format!("{}: {}", endpoint, e)))?
        .next()
        .ok_or_else(|| TransportError::Connect(format!("{}: no address resolved", endpoint)))?;

    tcp::connect_slave(addr, slave)
        .await
        .map_err(|e| TransportError::Connect(format!("{}: {}", endpoint, e)))
}

impl ModbusTransport for TcpTransport {
    async fn connect(&mut self) -> Result<(), TransportError> {
        // Drop any stale context left over from an interrupted cycle
        self.close().await;

        let ctx = tokio::time::timeout(self.timeout, open(&self.endpoint, self.slave))
            .await
            .map_err(|_| TransportError::Timeout {
                operation: "connect",
                after: self.timeout,
            })??;

        info!(endpoint = %self.endpoint, unit_id = self.slave.0, "Connected to controller");
        self.ctx = Some(ctx);
        Ok(())
    }

    async fn read_holding_registers(
        &mut self,
        offset: u16,
        count: u16,
    ) -> Result<Vec<u16>, TransportError> {
        let timeout = self.timeout;
        let ctx = self.context()?;
        tokio::time::timeout(timeout, ctx.read_holding_registers(offset, count))
            .await
            .map_err(|_| TransportError::Timeout {
                operation: "read_holding_registers",
                after: timeout,
            })?
            .map_err(|e| TransportError::Io(e.to_string()))?
            .map_err(|e| TransportError::Exception(format!("{:?}", e)))
    }

    async fn read_discrete_inputs(
        &mut self,
        offset: u16,
        count: u16,
    ) -> Result<Vec<bool>, TransportError> {
        let timeout = self.timeout;
        let ctx = self.context()?;
        tokio::time::timeout(timeout, ctx.read_discrete_inputs(offset, count))
            .await
            .map_err(|_| TransportError::Timeout {
                operation: "read_discrete_inputs",
                after: timeout,
            })?
            .map_err(|e| TransportError::Io(e.to_string()))?
            .map_err(|e| TransportError::Exception(format!("{:?}", e)))
    }

    async fn read_coils(&mut self, offset: u16, count: u16) -> Result<Vec<bool>, TransportError> {
        let timeout = self.timeout;
        let ctx = self.context()?;
        tokio::time::timeout(timeout, ctx.read_coils(offset, count))
            .await
            .map_err(|_| TransportError::Timeout {
                operation: "read_coils",
                after: timeout,
            })?
            .map_err(|e| TransportError::Io(e.to_string()))?
            .map_err(|e| TransportError::Exception(format!("{:?}", e)))
    }

    async fn close(&mut self) {
        if let Some(mut ctx) = self.ctx.take() {
            match tokio::time::timeout(self.timeout, ctx.disconnect()).await {
                Ok(Ok(_)) => debug!(endpoint = %self.endpoint, "Disconnected from controller"),
                Ok(Err(e)) => debug!(endpoint = %self.endpoint, error = %e, "Disconnect failed"),
                Err(_) => debug!(endpoint = %self.endpoint, "Disconnect timed out"),
            }
        }
    }

    fn is_connected(&self) -> bool {
        self.ctx.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        assert_eq!(
            TransportError::Timeout {
                operation: "read_coils",
                after: Duration::from_millis(5000),
            }
            .to_string(),
            "read_coils timed out after 5000ms"
        );
        assert_eq!(
            TransportError::Exception("IllegalDataAddress".into()).to_string(),
            "Modbus exception: IllegalDataAddress"
        );
    }

    #[test]
    fn test_from_config() {
        let config = PlcConfig {
            host: "10.1.2.3".to_string(),
            port: 1502,
            ..PlcConfig::default()
        };
        let transport = TcpTransport::from_config(&config);
        assert_eq!(transport.endpoint(), "10.1.2.3:1502");
        assert!(!transport.is_connected());
    }

    fn assert_send<F: Send>(_: F) {}

    #[test]
    fn test_futures_are_send() {
        let mut transport = TcpTransport::new("127.0.0.1:502", 1, Duration::from_secs(1));
        assert_send(transport.connect());
        assert_send(transport.read_holding_registers(0, 2));
        assert_send(transport.read_discrete_inputs(0, 1));
        assert_send(transport.read_coils(0, 1));
        assert_send(transport.close());
    }

    #[tokio::test]
    async fn test_read_without_connect() {
        let mut transport = TcpTransport::new("127.0.0.1:502", 1, Duration::from_secs(1));
        let err = transport.read_holding_registers(0, 2).await.unwrap_err();
        assert_eq!(err, TransportError::NotConnected);

        // Closing an unopened transport is harmless
        transport.close().await;
        transport.close().await;
        assert!(!transport.is_connected());
    }
}
