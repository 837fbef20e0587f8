//! Roomsync Netcode - Session, pose sync and item ownership over WebSocket
//!
//! This crate connects co-located devices through a relay server:
//!
//! - **Session**: resume with a stored identity, or handshake for a new one
//! - **Pose sync**: rate-limited pose messages in the shared CVR frame
//! - **Snapshots**: remote players interpolated, ghosts removed, claims applied
//! - **Items**: one streamed item at a time until it settles
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                        SyncContext                           │
//! │  ┌────────────────┐   ┌────────────────┐   ┌──────────────┐  │
//! │  │ RoomCalibrator │──▶│ RoomPoseTracker│──▶│PoseSyncEngine│  │
//! │  └────────────────┘   └────────────────┘   └──────────────┘  │
//! │                                               │      ▲       │
//! │                                        outbound│      │snapshots
//! │                                               ▼      │       │
//! │  ┌────────────────┐   ┌────────────────────────────────────┐ │
//! │  │ KeyValueStore  │◀──│         ConnectionSession          │ │
//! │  └────────────────┘   └────────────────────────────────────┘ │
//! └───────────────────────────────────│──────────────────────────┘
//!                                     ▼
//!                         Connector / Channel (WebSocket)
//! ```
//!
//! # Example
//!
//! ```rust,ignore
//! use roomsync_core::{Config, DevicePose};
//! use roomsync_netcode::{FrameInput, SyncContext, WsConnector};
//!
//! let config = Config::load("roomsync.ron")?;
//! let mut ctx = SyncContext::from_config(&config, Box::new(WsConnector::current()?))?;
//! ctx.connect();
//!
//! loop {
//!     let frame = FrameInput::new(read_device_pose());
//!     if user_pressed_fix() {
//!         ctx.confirm_room(&frame.device, &tracked_planes());
//!     }
//!     ctx.tick(frame_dt(), &frame);
//!     for agent in ctx.engine().agents().values() {
//!         draw_avatar(agent);
//!     }
//! }
//! ```

mod context;
mod engine;
mod error;
mod protocol;
mod remote_agent;
mod session;
mod store;
mod transport;
mod ws;

#[cfg(test)]
mod testing;

pub use context::{FrameInput, SyncContext};
pub use engine::{PoseSyncEngine, SnapshotReport};
pub use error::{Error, Result};
pub use protocol::{
    decode_snapshot, encode, Coordinate, HandshakeReply, Hello, ItemEntry, ItemPoseMessage,
    PlayerEntry, PoseMessage, ServerSnapshot, TaggedMessage, WireHand,
};
pub use remote_agent::{HandAgent, RemoteAgent};
pub use session::{ConnectionSession, Endpoints, SessionEvent, SessionPhase};
pub use store::{
    clear_identity, load_identity, persist_identity, KeyValueStore, MemoryStore, RonFileStore,
    SESSION_KEY, SLOT_KEY,
};
pub use transport::{Channel, ChannelEvent, Connector};
pub use ws::{WsChannel, WsConnector};
