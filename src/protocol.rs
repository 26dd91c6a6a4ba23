//! Frame codec for the MicroJewel ASCII protocol.
//!
//! Protocol overview:
//! - Outbound frame: `;<address>:<command>\r` (prefix, device address,
//!   delimiter, command text, terminator), 7-bit ASCII only.
//! - Inbound frame: payload bytes up to and including the `\r` terminator.
//! - Acknowledgement literal: `OK\r`.
//! - Error frames: `?<digit>\r`, mapped by [`crate::error::ProtocolError`].
//!
//! An absent response (read timeout) is a transport-level failure and is
//! reported separately from protocol-level `?` errors.

use std::time::Duration;

use crate::error::{LaserError, ProtocolError, Result};

/// Response terminator byte (`<CR>`).
pub const TERMINATOR: u8 = b'\r';

/// Acknowledgement frame returned for accepted commands.
pub const ACK: &[u8] = b"OK\r";

/// Turnaround time the head needs between receiving a command and
/// starting its reply, per the control manual.
pub const SETTLE_DELAY: Duration = Duration::from_millis(10);

/// Build a complete outbound frame for `command`.
///
/// Fails if the command text cannot be encoded as 7-bit ASCII; nothing is
/// written to the wire in that case.
pub fn frame(address: &str, command: &str) -> Result<Vec<u8>> {
    if !command.is_ascii() {
        return Err(LaserError::NonAsciiCommand(command.to_string()));
    }
    Ok(format!(";{address}:{command}\r").into_bytes())
}

/// View a raw response as its text payload, with the terminator stripped.
pub fn payload(response: &[u8]) -> Result<&str> {
    let body = response.strip_suffix(&[TERMINATOR]).unwrap_or(response);
    std::str::from_utf8(body)
        .map_err(|_| LaserError::Malformed(String::from_utf8_lossy(response).into_owned()))
}

/// Like [`payload`], but converts a `?`-coded error frame into the mapped
/// protocol error.
pub fn expect_payload(response: &[u8]) -> Result<&str> {
    let payload = payload(response)?;
    if payload.starts_with('?') {
        return Err(ProtocolError::from_response(payload).into());
    }
    Ok(payload)
}
