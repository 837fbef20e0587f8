//! Error types for roomsync-core

use crate::ItemId;
use thiserror::Error;

/// Core error type
#[derive(Error, Debug)]
pub enum Error {
    /// The room has not been locked yet, so there is no room space
    #[error("No room lock: confirm the floor before syncing")]
    NoRoomLock,

    /// CVR is enabled but no calibration frame exists for the current anchor
    #[error("CVR frame not calibrated for the current room anchor")]
    NotCalibrated,

    /// Calibration frames need a finite, positive scale
    #[error("Invalid calibration scale: {0}")]
    InvalidScale(f32),

    /// The item id is not present in the registry
    #[error("Item not found: {0}")]
    UnknownItem(ItemId),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;
