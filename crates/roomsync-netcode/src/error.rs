//! Error types for roomsync-netcode

use thiserror::Error;

/// Netcode error type
#[derive(Debug, Error)]
pub enum Error {
    /// Connect, send or receive failure
    #[error("Transport error: {0}")]
    Transport(String),

    /// Malformed or unexpected message
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// No room lock or no CVR frame; the send is skipped
    #[error("Calibration error: {0}")]
    Calibration(#[from] roomsync_core::Error),

    /// Persisted identity could not be read or written
    #[error("Identity store error: {0}")]
    Store(String),

    #[error("Invalid server URL: {0}")]
    InvalidUrl(String),

    /// Main channel is not open
    #[error("Not connected")]
    NotConnected,
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Protocol(e.to_string())
    }
}

impl From<url::ParseError> for Error {
    fn from(e: url::ParseError) -> Self {
        Error::InvalidUrl(e.to_string())
    }
}

/// Result type for netcode operations
pub type Result<T> = std::result::Result<T, Error>;
