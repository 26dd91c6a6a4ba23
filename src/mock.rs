//! Scripted transport for testing without laser hardware.
//!
//! Replies are keyed by the command text inside the frame (e.g. `"EN 1"`,
//! `"SS?"`), so interleaved traffic from the watchdog kicker resolves
//! correctly. One-shot replies queue in order and take precedence over
//! repeating defaults; a command with no scripted reply reads as a timeout.
//!
//! Every frame written is recorded; grab the log handle with
//! [`MockTransport::write_log`] before handing the transport to the driver.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use crate::error::Result;
use crate::transport::Transport;

/// In-memory [`Transport`] with scripted, per-command replies.
#[derive(Default)]
pub struct MockTransport {
    replies: HashMap<String, VecDeque<Vec<u8>>>,
    defaults: HashMap<String, Vec<u8>>,
    writes: Arc<Mutex<Vec<String>>>,
    pending: Option<String>,
}

impl MockTransport {
    /// Create a transport with no scripted replies.
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a one-shot reply for `command`.
    pub fn reply(mut self, command: &str, response: &[u8]) -> Self {
        self.replies
            .entry(command.to_string())
            .or_default()
            .push_back(response.to_vec());
        self
    }

    /// Set a repeating reply for `command`, used whenever its one-shot
    /// queue is empty.
    pub fn reply_always(mut self, command: &str, response: &[u8]) -> Self {
        self.defaults.insert(command.to_string(), response.to_vec());
        self
    }

    /// Shared handle to the recorded outbound frames.
    pub fn write_log(&self) -> Arc<Mutex<Vec<String>>> {
        Arc::clone(&self.writes)
    }
}

/// Extract the command text from a full frame (`;LA:EN 1\r` -> `EN 1`).
fn command_of(frame: &str) -> String {
    frame
        .split_once(':')
        .map(|(_, rest)| rest.trim_end_matches('\r').to_string())
        .unwrap_or_else(|| frame.to_string())
}

#[async_trait]
impl Transport for MockTransport {
    async fn write_all(&mut self, bytes: &[u8]) -> Result<()> {
        let frame = String::from_utf8_lossy(bytes).into_owned();
        self.pending = Some(command_of(&frame));
        if let Ok(mut log) = self.writes.lock() {
            log.push(frame);
        }
        Ok(())
    }

    async fn read_until(&mut self, _terminator: u8, _timeout: Duration) -> Result<Option<Vec<u8>>> {
        let Some(command) = self.pending.take() else {
            return Ok(None);
        };
        if let Some(queue) = self.replies.get_mut(&command) {
            if let Some(response) = queue.pop_front() {
                return Ok(Some(response));
            }
        }
        Ok(self.defaults.get(&command).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn one_shot_replies_drain_in_order_then_fall_back() {
        let mut mock = MockTransport::new()
            .reply("EN?", b"1\r")
            .reply("EN?", b"0\r")
            .reply_always("EN?", b"0\r");

        for expected in [b"1\r", b"0\r", b"0\r"] {
            mock.write_all(b";LA:EN?\r").await.unwrap();
            let response = mock.read_until(b'\r', Duration::from_secs(1)).await.unwrap();
            assert_eq!(response.as_deref(), Some(expected.as_slice()));
        }
    }

    #[tokio::test]
    async fn unscripted_commands_time_out() {
        let mut mock = MockTransport::new();
        mock.write_all(b";LA:SS?\r").await.unwrap();
        let response = mock.read_until(b'\r', Duration::from_secs(1)).await.unwrap();
        assert_eq!(response, None);
    }

    #[test]
    fn command_extraction_handles_frames_and_bare_text() {
        assert_eq!(command_of(";LA:FL 1\r"), "FL 1");
        assert_eq!(command_of("raw"), "raw");
    }
}
