use std::time::Duration;

use thiserror::Error;

/// Error type for every LAN operation in this crate.
///
/// Only [`LanError::Transport`], [`LanError::Encode`] and
/// [`LanError::MissingTarget`] ever reach the caller of a device operation.
/// [`LanError::Timeout`] and [`LanError::MalformedResponse`] are raised by the
/// transport and the envelope decoder, and discovery and status queries turn
/// them into "no reply" outcomes.
#[derive(Debug, Error)]
pub enum LanError {
    /// Socket creation, bind, send or receive failed at the OS level.
    #[error("UDP transport error: {0}")]
    Transport(#[from] std::io::Error),

    /// No datagram arrived within the receive deadline.
    #[error("Timed out after {0:?} waiting for a datagram")]
    Timeout(Duration),

    /// A datagram arrived but was not a usable envelope.
    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    /// A device operation was attempted without a device IP.
    #[error("No device IP set. Run discovery or pass the device IP explicitly")]
    MissingTarget,

    /// Serializing an outbound envelope failed.
    #[error("Failed to encode command: {0}")]
    Encode(#[source] serde_json::Error),
}

impl LanError {
    /// Whether this error is an expected "nothing usable came back" outcome
    /// rather than a failure of the local socket.
    pub fn is_no_reply(&self) -> bool {
        matches!(self, LanError::Timeout(_) | LanError::MalformedResponse(_))
    }
}

pub type Result<T> = std::result::Result<T, LanError>;
