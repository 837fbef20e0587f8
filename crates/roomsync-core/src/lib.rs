//! Roomsync Core - Shared-space math and state for co-located AR/VR peers
//!
//! This crate holds everything that does not touch the network:
//! - Room lock (`RoomCalibrator`, `RoomAnchor`, `AnchorSlot`)
//! - Room-space pose sampling (`RoomPoseTracker`, `LocalPoseSample`)
//! - The CVR transform (`CalibrationFrame`, `CoordinateTransformer`)
//! - Item ownership (`ItemRecord`, `ItemOwnershipArbiter`, `ItemRegistry`)
//! - The next-tick task queue and RON configuration
//!
//! ## Spaces
//!
//! ```text
//!  world (device tracking)          room (per device)           CVR (shared)
//! ┌────────────────────┐  anchor  ┌──────────────────┐  frame  ┌────────────┐
//! │ DevicePose         │─────────▶│ LocalPoseSample  │────────▶│ wire pose  │
//! │ item positions     │◀─────────│ hand, items      │◀────────│ snapshots  │
//! └────────────────────┘          └──────────────────┘         └────────────┘
//! ```
//!
//! Each device locks its own room anchor on the floor, then takes a CVR
//! calibration frame from where it stands. Poses cross the network in CVR.

mod anchor;
mod calibration;
pub mod config;
mod error;
mod identity;
mod item;
pub mod math;
mod ownership;
mod registry;
mod room_pose;
pub mod scheduler;
mod transform;

pub use anchor::{AnchorSlot, DevicePose, RoomAnchor, TrackingState};
pub use calibration::{
    estimate_floor_height, CalibrationStage, FloorPlane, FloorSource, LockOutcome, RoomCalibrator,
};
pub use config::{Config, RoomConfig, SessionConfig, SyncConfig};
pub use error::{Error, Result};
pub use identity::{ItemId, PlayerId, SessionId, SessionIdentity};
pub use item::{ItemRecord, OwnershipState};
pub use ownership::{ItemOwnershipArbiter, RemoteClaims};
pub use registry::{ItemRegistry, SceneItems};
pub use room_pose::{LocalPoseSample, RoomPoseTracker};
pub use scheduler::{DeferredQueue, Tick};
pub use transform::{CalibrationFrame, CoordinateTransformer};
