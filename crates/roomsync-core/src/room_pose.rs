//! Room-space pose sampling
//!
//! Turns the raw device pose into a [`LocalPoseSample`] relative to the
//! current room anchor, holding the last stable values while tracking is
//! lost and smoothing the output.

use crate::anchor::{DevicePose, RoomAnchor, TrackingState};
use crate::math::{lerp_angle_deg, normalize_yaw_360, normalize_yaw_deg, xz};
use glam::{Vec2, Vec3};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Device pose expressed in room space, recomputed every tick
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LocalPoseSample {
    /// Room-space XZ position (meters)
    pub xz: Vec2,
    /// Height above the room floor (meters)
    pub height: f32,
    /// Room-space yaw, `[0, 360)`
    pub yaw_deg: f32,
    /// Pitch, `(-180, 180]`
    pub pitch_deg: f32,
    /// Hand position in room space, if a hand is tracked
    pub hand: Option<Vec3>,
}

/// Tracks the device pose in room space
#[derive(Debug, Clone)]
pub struct RoomPoseTracker {
    /// 0 = no smoothing; values toward 0.9 smooth harder
    smoothing: f32,
    anchor_epoch: Option<u64>,
    last_stable_xz: Vec2,
    last_stable_height: f32,
    last_stable_yaw: f32,
    latest: Option<LocalPoseSample>,
}

impl RoomPoseTracker {
    /// Create a tracker; `smoothing` is clamped to `[0, 0.9]`
    pub fn new(smoothing: f32) -> Self {
        Self {
            smoothing: smoothing.clamp(0.0, 0.9),
            anchor_epoch: None,
            last_stable_xz: Vec2::ZERO,
            last_stable_height: 0.0,
            last_stable_yaw: 0.0,
            latest: None,
        }
    }

    /// The most recent sample, if any was computed for the current anchor
    pub fn latest(&self) -> Option<&LocalPoseSample> {
        self.latest.as_ref()
    }

    /// Forget all state (used when the room lock is reset)
    pub fn reset(&mut self) {
        self.anchor_epoch = None;
        self.latest = None;
    }

    /// Compute this tick's sample
    pub fn update(
        &mut self,
        anchor: &RoomAnchor,
        device: &DevicePose,
        hand_world: Option<Vec3>,
    ) -> LocalPoseSample {
        if self.anchor_epoch != Some(anchor.epoch()) {
            debug!(epoch = anchor.epoch(), "pose tracker rebased on new anchor");
            self.anchor_epoch = Some(anchor.epoch());
            self.latest = None;
        }

        let room = anchor.world_to_room(device.position);
        let raw_yaw = normalize_yaw_360(anchor.yaw_world_to_room(device.yaw_deg));

        let (raw_xz, raw_height, raw_yaw) = match device.tracking {
            TrackingState::Tracking => {
                self.last_stable_xz = xz(room);
                self.last_stable_height = room.y;
                self.last_stable_yaw = raw_yaw;
                (xz(room), room.y, raw_yaw)
            }
            TrackingState::Lost { fallback_yaw_deg } => {
                let yaw = fallback_yaw_deg
                    .map(|yaw| normalize_yaw_360(anchor.yaw_world_to_room(yaw)))
                    .unwrap_or(self.last_stable_yaw);
                (self.last_stable_xz, self.last_stable_height, yaw)
            }
        };

        let t = 1.0 - self.smoothing;
        let (xz_out, height_out, yaw_out) = match &self.latest {
            Some(prev) => (
                prev.xz.lerp(raw_xz, t),
                prev.height + (raw_height - prev.height) * t,
                normalize_yaw_360(lerp_angle_deg(prev.yaw_deg, raw_yaw, t)),
            ),
            None => (raw_xz, raw_height, raw_yaw),
        };

        let sample = LocalPoseSample {
            xz: xz_out,
            height: height_out,
            yaw_deg: yaw_out,
            pitch_deg: normalize_yaw_deg(device.pitch_deg),
            hand: hand_world.map(|hand| anchor.world_to_room(hand)),
        };
        self.latest = Some(sample);
        sample
    }
}

impl Default for RoomPoseTracker {
    fn default() -> Self {
        Self::new(0.2)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f32 = 1e-4;

    #[test]
    fn test_first_sample_is_unsmoothed() {
        let anchor = RoomAnchor::new(Vec3::new(1.2, 0.05, -0.4), 0.0, 1);
        let mut tracker = RoomPoseTracker::new(0.5);
        let sample = tracker.update(&anchor, &DevicePose::new(Vec3::new(1.7, 1.6, -0.4), 0.0), None);
        assert!((sample.xz - Vec2::new(0.5, 0.0)).length() < EPS);
        assert!((sample.height - 1.55).abs() < EPS);
        assert!(sample.yaw_deg.abs() < EPS);
    }

    #[test]
    fn test_smoothing_moves_part_way() {
        let anchor = RoomAnchor::new(Vec3::ZERO, 0.0, 1);
        let mut tracker = RoomPoseTracker::new(0.5);
        tracker.update(&anchor, &DevicePose::new(Vec3::ZERO, 0.0), None);
        let sample = tracker.update(&anchor, &DevicePose::new(Vec3::new(2.0, 0.0, 0.0), 0.0), None);
        assert!((sample.xz.x - 1.0).abs() < EPS);
    }

    #[test]
    fn test_tracking_loss_holds_position() {
        let anchor = RoomAnchor::new(Vec3::ZERO, 0.0, 1);
        let mut tracker = RoomPoseTracker::new(0.0);
        tracker.update(&anchor, &DevicePose::new(Vec3::new(1.0, 1.0, 2.0), 30.0), None);

        let lost = DevicePose::new(Vec3::new(50.0, 1.0, 50.0), 200.0)
            .with_tracking(TrackingState::Lost { fallback_yaw_deg: None });
        let held = tracker.update(&anchor, &lost, None);
        assert!((held.xz - Vec2::new(1.0, 2.0)).length() < EPS);
        assert!((held.yaw_deg - 30.0).abs() < EPS);

        let gyro = DevicePose::new(Vec3::new(50.0, 1.0, 50.0), 200.0)
            .with_tracking(TrackingState::Lost { fallback_yaw_deg: Some(75.0) });
        let gyro_sample = tracker.update(&anchor, &gyro, None);
        assert!((gyro_sample.xz - Vec2::new(1.0, 2.0)).length() < EPS);
        assert!((gyro_sample.yaw_deg - 75.0).abs() < EPS);
    }

    #[test]
    fn test_hand_converted_to_room() {
        let anchor = RoomAnchor::new(Vec3::new(1.0, 0.0, 1.0), 0.0, 1);
        let mut tracker = RoomPoseTracker::new(0.0);
        let sample = tracker.update(
            &anchor,
            &DevicePose::new(Vec3::new(1.0, 1.5, 1.0), 0.0),
            Some(Vec3::new(1.3, 1.2, 1.0)),
        );
        let hand = sample.hand.unwrap();
        assert!((hand - Vec3::new(0.3, 1.2, 0.0)).length() < EPS);
    }

    #[test]
    fn test_new_anchor_resets_smoothing() {
        let mut tracker = RoomPoseTracker::new(0.9);
        let first = RoomAnchor::new(Vec3::ZERO, 0.0, 1);
        tracker.update(&first, &DevicePose::new(Vec3::new(5.0, 0.0, 5.0), 0.0), None);

        let second = RoomAnchor::new(Vec3::new(5.0, 0.0, 5.0), 0.0, 2);
        let sample = tracker.update(&second, &DevicePose::new(Vec3::new(5.0, 0.0, 5.0), 0.0), None);
        assert!(sample.xz.length() < EPS);
    }
}
