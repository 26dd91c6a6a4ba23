//! Byte transport over the point-to-point serial link.
//!
//! The rest of the driver only sees the [`Transport`] trait: write a frame,
//! then read until the terminator or a timeout. [`SerialTransport`] is the
//! hardware-backed implementation on top of `tokio-serial`; tests use the
//! scripted transport from [`crate::mock`].

use std::io::ErrorKind;
use std::time::Duration;

use async_trait::async_trait;
use log::debug;
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio_serial::{SerialPortBuilderExt, SerialStream};

use crate::error::{LaserError, Result};

/// Serial parity setting for the laser link.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Parity {
    /// No parity bit (the head's default).
    None,
    /// Even parity.
    Even,
    /// Odd parity.
    Odd,
    /// Mark parity. Not supported by the serial backend.
    Mark,
    /// Space parity. Not supported by the serial backend.
    Space,
}

/// A byte-oriented, timeout-capable channel to the laser.
#[async_trait]
pub trait Transport: Send {
    /// Write all of `bytes` to the device.
    async fn write_all(&mut self, bytes: &[u8]) -> Result<()>;

    /// Read until `terminator` (inclusive). Returns `Ok(None)` when the
    /// timeout elapses without a complete frame; callers treat that as a
    /// transport-level failure distinct from a protocol error response.
    async fn read_until(&mut self, terminator: u8, timeout: Duration) -> Result<Option<Vec<u8>>>;
}

/// RS-232 transport backed by `tokio-serial`.
pub struct SerialTransport {
    stream: SerialStream,
}

impl SerialTransport {
    /// Whether `port` appears in the system's enumerated serial ports.
    pub fn is_port_available(port: &str) -> bool {
        serialport::available_ports()
            .map(|ports| ports.iter().any(|p| p.port_name == port))
            .unwrap_or(false)
    }

    /// Open `port` with the given line settings.
    ///
    /// Validates the timeout and parity before touching the port, then
    /// requires the port to be among the enumerated available ports.
    pub fn open(port: &str, baud_rate: u32, timeout: Duration, parity: Parity) -> Result<Self> {
        if timeout.is_zero() {
            return Err(LaserError::Validation(
                "read timeout must be greater than zero".to_string(),
            ));
        }
        let parity = map_parity(parity)?;

        if !Self::is_port_available(port) {
            return Err(LaserError::PortUnavailable(port.to_string()));
        }

        let stream = tokio_serial::new(port, baud_rate)
            .data_bits(tokio_serial::DataBits::Eight)
            .stop_bits(tokio_serial::StopBits::One)
            .flow_control(tokio_serial::FlowControl::None)
            .parity(parity)
            .open_native_async()?;

        debug!("serial port '{port}' opened at {baud_rate} baud");
        Ok(Self { stream })
    }
}

fn map_parity(parity: Parity) -> Result<tokio_serial::Parity> {
    match parity {
        Parity::None => Ok(tokio_serial::Parity::None),
        Parity::Even => Ok(tokio_serial::Parity::Even),
        Parity::Odd => Ok(tokio_serial::Parity::Odd),
        Parity::Mark | Parity::Space => Err(LaserError::Validation(
            "mark and space parity are not supported by the serial backend".to_string(),
        )),
    }
}

#[async_trait]
impl Transport for SerialTransport {
    async fn write_all(&mut self, bytes: &[u8]) -> Result<()> {
        self.stream.write_all(bytes).await?;
        self.stream.flush().await?;
        Ok(())
    }

    async fn read_until(&mut self, terminator: u8, timeout: Duration) -> Result<Option<Vec<u8>>> {
        let deadline = tokio::time::Instant::now() + timeout;
        let mut response = Vec::with_capacity(16);
        let mut byte = [0u8; 1];

        loop {
            let remaining = deadline.saturating_duration_since(tokio::time::Instant::now());
            if remaining.is_zero() {
                return Ok(None);
            }

            match tokio::time::timeout(remaining, self.stream.read(&mut byte)).await {
                Ok(Ok(0)) => {
                    return Err(LaserError::Io(std::io::Error::new(
                        ErrorKind::UnexpectedEof,
                        "serial port closed",
                    )))
                }
                Ok(Ok(_)) => {
                    response.push(byte[0]);
                    if byte[0] == terminator {
                        return Ok(Some(response));
                    }
                }
                // The port's own short timeout fired; keep polling until our
                // deadline.
                Ok(Err(e)) if e.kind() == ErrorKind::TimedOut => continue,
                Ok(Err(e)) => return Err(e.into()),
                Err(_) => return Ok(None),
            }
        }
    }
}
