//! Serialized command/response exchanges over the shared transport.
//!
//! Exactly one exchange is ever in flight: the channel holds its mutex
//! across write, settle delay and read, so frames from foreground commands
//! and the watchdog kicker can never interleave. Exchanges are totally
//! ordered by lock acquisition; no FIFO fairness is guaranteed between
//! concurrent callers.

use std::time::Duration;

use log::debug;
use tokio::sync::Mutex;

use crate::error::{LaserError, Result};
use crate::protocol;
use crate::transport::Transport;

const DEFAULT_READ_TIMEOUT: Duration = Duration::from_secs(1);

struct Inner {
    transport: Option<Box<dyn Transport>>,
    read_timeout: Duration,
}

/// Owner of the transport and the single mutual-exclusion lock around it.
pub struct CommandChannel {
    inner: Mutex<Inner>,
    address: String,
}

impl CommandChannel {
    /// Create a channel for the device at `address` (e.g. `"LA"`), not yet
    /// attached to a transport.
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            inner: Mutex::new(Inner {
                transport: None,
                read_timeout: DEFAULT_READ_TIMEOUT,
            }),
            address: address.into(),
        }
    }

    /// Attach (or replace) the transport and its read timeout.
    pub async fn attach(&self, transport: Box<dyn Transport>, read_timeout: Duration) {
        let mut inner = self.inner.lock().await;
        inner.transport = Some(transport);
        inner.read_timeout = read_timeout;
    }

    /// Drop the transport; subsequent sends fail with `NotConnected`.
    pub async fn detach(&self) {
        self.inner.lock().await.transport = None;
    }

    /// Whether a transport is currently attached.
    pub async fn is_attached(&self) -> bool {
        self.inner.lock().await.transport.is_some()
    }

    /// Perform one complete command/response exchange.
    ///
    /// Frames `command`, writes it, waits the device's documented
    /// turnaround time, then reads until the terminator. Returns `Ok(None)`
    /// when the read times out. Fails with `NotConnected` before any write
    /// if no transport is attached.
    pub async fn send(&self, command: &str) -> Result<Option<Vec<u8>>> {
        let frame = protocol::frame(&self.address, command)?;

        let mut inner = self.inner.lock().await;
        let read_timeout = inner.read_timeout;
        let transport = inner.transport.as_mut().ok_or(LaserError::NotConnected)?;

        debug!("-> {command}");
        transport.write_all(&frame).await?;
        tokio::time::sleep(protocol::SETTLE_DELAY).await;
        let response = transport
            .read_until(protocol::TERMINATOR, read_timeout)
            .await?;

        match &response {
            Some(bytes) => debug!("<- {:?}", String::from_utf8_lossy(bytes)),
            None => debug!("<- (timeout)"),
        }
        Ok(response)
    }
}
