//! Error types for the dial-up link.

use std::fmt;

use thiserror::Error;

/// Stable failure taxonomy reported to lifecycle observers.
///
/// Raw engine codes never leave the link facade; they are collapsed onto
/// one of these kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Code outside the documented table.
    Unknown,
    /// Peer dead, idle, connect-time or loopback timeout.
    ConnectionTimeout,
    /// Peer terminated the link.
    PeerDisconnected,
    /// Authentication challenge failed.
    AuthenticationFailure,
    /// Peer violated the protocol.
    ProtocolFailure,
}

impl ErrorKind {
    /// Short lowercase label used in log fields.
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Unknown => "unknown",
            ErrorKind::ConnectionTimeout => "connection timeout",
            ErrorKind::PeerDisconnected => "peer disconnected",
            ErrorKind::AuthenticationFailure => "authentication failure",
            ErrorKind::ProtocolFailure => "protocol failure",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors reported synchronously by a protocol engine.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EngineError {
    /// Engine could not allocate a session.
    #[error("session allocation failed")]
    SessionAllocation,

    /// Engine refused to enter listen mode.
    #[error("listen failed: {0}")]
    Listen(String),

    /// Engine-specific failure.
    #[error("engine failure: {0}")]
    Other(String),
}

/// Top-level dialer errors.
#[derive(Debug, Error)]
pub enum DialerError {
    /// Engine error.
    #[error("engine error: {0}")]
    Engine(#[from] EngineError),

    /// Seed bytes exceed the configured maximum.
    #[error("seed of {len} bytes exceeds maximum of {max}")]
    SeedTooLarge {
        /// Supplied length.
        len: usize,
        /// Accepted maximum.
        max: usize,
    },

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    /// Runtime driver has stopped.
    #[error("dialer runtime closed")]
    RuntimeClosed,
}

/// Result type for dialer operations.
pub type DialerResult<T> = Result<T, DialerError>;
