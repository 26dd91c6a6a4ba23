//! Error types for the MicroJewel driver.
//!
//! The driver distinguishes four broad failure classes, all surfaced through
//! [`LaserError`]:
//!
//! - connection/transport failures (`NotConnected`, `PortUnavailable`,
//!   `Timeout`, `Serial`, `Io`),
//! - protocol errors reported by the laser head itself (`Protocol`, wrapping
//!   the `?1`..`?8` codes from the control manual),
//! - locally rejected input (`Validation`, raised before any frame is
//!   written to the wire),
//! - safety failures during the fire sequence (`Policy`, `FailedToFire`,
//!   `Aborted`).
//!
//! Nothing is retried internally; every failure propagates to the caller.

use thiserror::Error;

/// Convenience alias for results using the driver error type.
pub type Result<T> = std::result::Result<T, LaserError>;

/// Errors produced by the MicroJewel driver.
#[derive(Error, Debug)]
pub enum LaserError {
    /// A command was issued before `connect()` succeeded.
    #[error("not connected to the laser; call connect() before issuing commands")]
    NotConnected,

    /// The requested serial port is not among the enumerated ports.
    #[error("serial port '{0}' is not available")]
    PortUnavailable(String),

    /// A caller-supplied parameter was outside its documented domain.
    /// Rejected locally; no frame reaches the transport.
    #[error("invalid parameter: {0}")]
    Validation(String),

    /// The laser answered with a `?`-coded error frame.
    #[error("laser returned an error: {0}")]
    Protocol(#[from] ProtocolError),

    /// Command text could not be encoded as 7-bit ASCII.
    #[error("command contains non-ASCII characters: {0:?}")]
    NonAsciiCommand(String),

    /// The read side of a command/response exchange timed out.
    #[error("timed out waiting for a response from the laser")]
    Timeout,

    /// A software-enforced safety rule was broken even though the device
    /// itself did not object.
    #[error("safety policy violation: {0}")]
    Policy(&'static str),

    /// Status verification after `FL 1` did not match a known nominal
    /// firing code. The driver has already sent the abort command.
    #[error("laser failed to fire (status word {status})")]
    FailedToFire {
        /// The encoded status word observed during verification.
        status: u32,
    },

    /// An emergency stop interrupted an in-progress firing wait.
    #[error("firing aborted by emergency stop")]
    Aborted,

    /// The laser answered with bytes the driver could not interpret.
    #[error("malformed response from laser: {0}")]
    Malformed(String),

    /// Serial transport setup or I/O failure.
    #[error("serial transport error: {0}")]
    Serial(#[from] tokio_serial::Error),

    /// Underlying I/O failure on the transport.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// The laser's documented error codes, reported as `?<digit>` response
/// frames. Anything unrecognized is kept verbatim for diagnostics.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    /// `?1`
    #[error("command not recognized")]
    CommandNotRecognized,
    /// `?2`
    #[error("missing command keyword")]
    MissingKeyword,
    /// `?3`
    #[error("invalid command keyword")]
    InvalidKeyword,
    /// `?4`
    #[error("missing parameter")]
    MissingParameter,
    /// `?5`
    #[error("invalid parameter")]
    InvalidParameter,
    /// `?6`
    #[error("query only; command needs a question mark")]
    QueryOnly,
    /// `?7`
    #[error("command does not have a query function")]
    NoQuery,
    /// `?8`
    #[error("command unavailable in current system state")]
    UnavailableInState,
    /// Any other `?`-prefixed or otherwise unexpected payload.
    #[error("unrecognized error response: {0:?}")]
    Unrecognized(String),
}

impl ProtocolError {
    /// Map a raw response payload (terminator stripped) to an error kind.
    pub fn from_response(payload: &str) -> Self {
        match payload {
            "?1" => Self::CommandNotRecognized,
            "?2" => Self::MissingKeyword,
            "?3" => Self::InvalidKeyword,
            "?4" => Self::MissingParameter,
            "?5" => Self::InvalidParameter,
            "?6" => Self::QueryOnly,
            "?7" => Self::NoQuery,
            "?8" => Self::UnavailableInState,
            other => Self::Unrecognized(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_all_documented_codes() {
        assert_eq!(
            ProtocolError::from_response("?1"),
            ProtocolError::CommandNotRecognized
        );
        assert_eq!(
            ProtocolError::from_response("?4"),
            ProtocolError::MissingParameter
        );
        assert_eq!(
            ProtocolError::from_response("?5"),
            ProtocolError::InvalidParameter
        );
        assert_eq!(
            ProtocolError::from_response("?8"),
            ProtocolError::UnavailableInState
        );
    }

    #[test]
    fn unknown_codes_keep_the_raw_payload() {
        let err = ProtocolError::from_response("?9");
        assert_eq!(err, ProtocolError::Unrecognized("?9".to_string()));
        assert!(err.to_string().contains("?9"));

        let err = ProtocolError::from_response("garbage");
        assert_eq!(err, ProtocolError::Unrecognized("garbage".to_string()));
    }

    #[test]
    fn error_display_is_human_readable() {
        let err = LaserError::Protocol(ProtocolError::InvalidParameter);
        assert_eq!(err.to_string(), "laser returned an error: invalid parameter");

        let err = LaserError::FailedToFire { status: 1 };
        assert!(err.to_string().contains("status word 1"));
    }
}
