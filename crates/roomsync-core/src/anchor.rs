//! Room anchors and raw device poses
//!
//! A [`RoomAnchor`] fixes the origin and yaw of "room space" on one device.
//! It is created once per floor lock and never mutated; a re-calibration
//! publishes a brand new anchor with a higher epoch. Dependents hold an
//! [`AnchorSlot`] handle and read the current anchor by reference.

use crate::math::{from_xz, normalize_yaw_deg, rotate_xz, xz};
use glam::Vec3;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Tracking quality reported by the device alongside a pose
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub enum TrackingState {
    /// Pose is reliable
    #[default]
    Tracking,
    /// Positional tracking is lost
    Lost {
        /// Yaw from a secondary sensor (gyro), in world degrees
        fallback_yaw_deg: Option<f32>,
    },
}

impl TrackingState {
    /// Check if tracking is currently good
    pub fn is_tracking(&self) -> bool {
        matches!(self, TrackingState::Tracking)
    }
}

/// Raw device pose in world (tracking) space
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DevicePose {
    /// Camera position in world space (meters)
    pub position: Vec3,
    /// Heading in degrees
    pub yaw_deg: f32,
    /// Pitch in degrees
    pub pitch_deg: f32,
    /// Tracking quality
    pub tracking: TrackingState,
}

impl DevicePose {
    /// Create a tracked pose with zero pitch
    pub fn new(position: Vec3, yaw_deg: f32) -> Self {
        Self {
            position,
            yaw_deg,
            pitch_deg: 0.0,
            tracking: TrackingState::Tracking,
        }
    }

    /// Set the pitch
    pub fn with_pitch(mut self, pitch_deg: f32) -> Self {
        self.pitch_deg = pitch_deg;
        self
    }

    /// Set the tracking state
    pub fn with_tracking(mut self, tracking: TrackingState) -> Self {
        self.tracking = tracking;
        self
    }
}

/// World-space origin and yaw that define room space
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RoomAnchor {
    origin: Vec3,
    yaw_deg: f32,
    epoch: u64,
}

impl RoomAnchor {
    /// Create a new anchor
    ///
    /// `epoch` identifies the calibration event that produced this anchor.
    pub fn new(origin: Vec3, yaw_deg: f32, epoch: u64) -> Self {
        Self {
            origin,
            yaw_deg: normalize_yaw_deg(yaw_deg),
            epoch,
        }
    }

    /// World-space origin (floor point under the device at lock time)
    pub fn origin(&self) -> Vec3 {
        self.origin
    }

    /// Locked yaw in degrees, `(-180, 180]`
    pub fn yaw_deg(&self) -> f32 {
        self.yaw_deg
    }

    /// Calibration event counter, strictly increasing per calibrator
    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    /// Convert a world-space point into room space
    pub fn world_to_room(&self, world: Vec3) -> Vec3 {
        let rel = world - self.origin;
        from_xz(rotate_xz(xz(rel), -self.yaw_deg.to_radians()), rel.y)
    }

    /// Convert a room-space point into world space
    pub fn room_to_world(&self, room: Vec3) -> Vec3 {
        from_xz(rotate_xz(xz(room), self.yaw_deg.to_radians()), room.y) + self.origin
    }

    /// Convert a world yaw into a room yaw, `(-180, 180]`
    pub fn yaw_world_to_room(&self, yaw_deg: f32) -> f32 {
        normalize_yaw_deg(yaw_deg - self.yaw_deg)
    }

    /// Convert a room yaw into a world yaw, `(-180, 180]`
    pub fn yaw_room_to_world(&self, yaw_deg: f32) -> f32 {
        normalize_yaw_deg(yaw_deg + self.yaw_deg)
    }
}

/// Shared handle to the current room anchor
///
/// Publishing swaps the whole anchor under a lock, so readers never observe
/// an origin without its yaw. Cloning the slot clones the handle, not the
/// anchor.
#[derive(Debug, Clone, Default)]
pub struct AnchorSlot {
    inner: Arc<RwLock<Option<Arc<RoomAnchor>>>>,
}

impl AnchorSlot {
    /// Create an empty slot
    pub fn new() -> Self {
        Self::default()
    }

    /// Publish a new anchor, replacing any previous one
    pub fn publish(&self, anchor: RoomAnchor) -> Arc<RoomAnchor> {
        let anchor = Arc::new(anchor);
        *self.inner.write() = Some(Arc::clone(&anchor));
        anchor
    }

    /// Remove the current anchor
    pub fn clear(&self) {
        *self.inner.write() = None;
    }

    /// Get the current anchor, if the room is locked
    pub fn current(&self) -> Option<Arc<RoomAnchor>> {
        self.inner.read().clone()
    }

    /// Check if an anchor is published
    pub fn is_locked(&self) -> bool {
        self.inner.read().is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f32 = 1e-4;

    #[test]
    fn test_world_room_round_trip() {
        let anchor = RoomAnchor::new(Vec3::new(1.2, 0.05, -0.4), 37.0, 1);
        let p = Vec3::new(-2.0, 1.1, 3.5);
        let back = anchor.room_to_world(anchor.world_to_room(p));
        assert!((back - p).length() < EPS);
    }

    #[test]
    fn test_world_to_room_axis() {
        let anchor = RoomAnchor::new(Vec3::ZERO, 90.0, 1);
        // Room +X points along world +Z when the anchor yaw is 90 degrees
        let room = anchor.world_to_room(Vec3::new(0.0, 0.0, 1.0));
        assert!((room - Vec3::new(1.0, 0.0, 0.0)).length() < EPS);
    }

    #[test]
    fn test_yaw_conversion_normalizes() {
        let anchor = RoomAnchor::new(Vec3::ZERO, 170.0, 1);
        assert!((anchor.yaw_world_to_room(-170.0) - 20.0).abs() < EPS);
        assert!((anchor.yaw_room_to_world(20.0) - -170.0).abs() < EPS);
    }

    #[test]
    fn test_slot_publish_and_clear() {
        let slot = AnchorSlot::new();
        let reader = slot.clone();
        assert!(!reader.is_locked());

        slot.publish(RoomAnchor::new(Vec3::ONE, 10.0, 3));
        let anchor = reader.current().unwrap();
        assert_eq!(anchor.epoch(), 3);
        assert_eq!(anchor.origin(), Vec3::ONE);

        slot.clear();
        assert!(reader.current().is_none());
    }
}
