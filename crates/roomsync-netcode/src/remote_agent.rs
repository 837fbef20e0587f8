//! Remote player interpolation
//!
//! Snapshots arrive at the peers' send rate, well below the frame rate. Each
//! remote player keeps a target pose from the latest snapshot and eases its
//! rendered pose toward it every frame with frame-rate independent
//! exponential smoothing.

use glam::Vec3;
use roomsync_core::math::{lerp_angle_deg, normalize_yaw_deg, smoothing_factor};
use roomsync_core::{PlayerId, RoomAnchor};

/// Interpolated hand of a remote player
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HandAgent {
    pub position: Vec3,
    pub target: Vec3,
}

/// Rendered state of one remote player, in room space
#[derive(Debug, Clone, PartialEq)]
pub struct RemoteAgent {
    id: PlayerId,
    position: Vec3,
    yaw_deg: f32,
    target_position: Vec3,
    target_yaw_deg: f32,
    hand: Option<HandAgent>,
}

impl RemoteAgent {
    /// Create an agent already at its first snapshot pose
    pub fn new(id: PlayerId, position: Vec3, yaw_deg: f32, hand: Option<Vec3>) -> Self {
        let yaw_deg = normalize_yaw_deg(yaw_deg);
        Self {
            id,
            position,
            yaw_deg,
            target_position: position,
            target_yaw_deg: yaw_deg,
            hand: hand.map(|h| HandAgent {
                position: h,
                target: h,
            }),
        }
    }

    pub fn id(&self) -> &PlayerId {
        &self.id
    }

    /// Current interpolated position
    pub fn position(&self) -> Vec3 {
        self.position
    }

    /// Current interpolated yaw, `(-180, 180]`
    pub fn yaw_deg(&self) -> f32 {
        self.yaw_deg
    }

    pub fn target_position(&self) -> Vec3 {
        self.target_position
    }

    pub fn target_yaw_deg(&self) -> f32 {
        self.target_yaw_deg
    }

    pub fn hand(&self) -> Option<&HandAgent> {
        self.hand.as_ref()
    }

    /// Update the target from a snapshot
    ///
    /// The hand appears the first time a snapshot carries one; snapshots
    /// without hand data leave the last hand target in place.
    pub fn set_target(&mut self, position: Vec3, yaw_deg: f32, hand: Option<Vec3>) {
        self.target_position = position;
        self.target_yaw_deg = normalize_yaw_deg(yaw_deg);
        if let Some(h) = hand {
            match self.hand.as_mut() {
                Some(agent) => agent.target = h,
                None => {
                    self.hand = Some(HandAgent {
                        position: h,
                        target: h,
                    })
                }
            }
        }
    }

    /// Advance interpolation by `dt` seconds
    pub fn tick(&mut self, dt: f32, move_rate: f32, rot_rate: f32) {
        let a = smoothing_factor(move_rate, dt);
        let b = smoothing_factor(rot_rate, dt);
        self.position = self.position.lerp(self.target_position, a);
        self.yaw_deg = normalize_yaw_deg(lerp_angle_deg(self.yaw_deg, self.target_yaw_deg, b));
        if let Some(hand) = self.hand.as_mut() {
            hand.position = hand.position.lerp(hand.target, a);
        }
    }

    /// Interpolated position in this device's world space
    pub fn world_position(&self, anchor: &RoomAnchor) -> Vec3 {
        anchor.room_to_world(self.position)
    }

    /// Interpolated yaw in this device's world space
    pub fn world_yaw_deg(&self, anchor: &RoomAnchor) -> f32 {
        anchor.yaw_room_to_world(self.yaw_deg)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f32 = 1e-4;

    #[test]
    fn test_new_agent_starts_at_target() {
        let agent = RemoteAgent::new(PlayerId::new("p2"), Vec3::new(1.0, 0.0, 2.0), 90.0, None);
        assert_eq!(agent.position(), agent.target_position());
        assert!((agent.yaw_deg() - 90.0).abs() < EPS);
        assert!(agent.hand().is_none());
    }

    #[test]
    fn test_tick_moves_toward_target() {
        let mut agent = RemoteAgent::new(PlayerId::new("p2"), Vec3::ZERO, 0.0, None);
        agent.set_target(Vec3::new(1.0, 0.0, 0.0), 90.0, None);

        agent.tick(1.0 / 60.0, 12.0, 12.0);
        let x = agent.position().x;
        assert!(x > 0.0 && x < 1.0);
        assert!(agent.yaw_deg() > 0.0 && agent.yaw_deg() < 90.0);

        for _ in 0..600 {
            agent.tick(1.0 / 60.0, 12.0, 12.0);
        }
        assert!((agent.position().x - 1.0).abs() < EPS);
        assert!((agent.yaw_deg() - 90.0).abs() < 1e-2);
    }

    #[test]
    fn test_yaw_takes_short_way_round() {
        let mut agent = RemoteAgent::new(PlayerId::new("p2"), Vec3::ZERO, 170.0, None);
        agent.set_target(Vec3::ZERO, -170.0, None);
        agent.tick(0.05, 12.0, 12.0);
        // Moving from 170 toward 190 (== -170), never through 0
        assert!(agent.yaw_deg().abs() > 170.0 - EPS);
    }

    #[test]
    fn test_hand_created_on_first_hand_data() {
        let mut agent = RemoteAgent::new(PlayerId::new("p2"), Vec3::ZERO, 0.0, None);
        agent.set_target(Vec3::ZERO, 0.0, Some(Vec3::new(0.3, 1.2, 0.1)));
        let hand = agent.hand().unwrap();
        assert_eq!(hand.position, Vec3::new(0.3, 1.2, 0.1));

        agent.set_target(Vec3::ZERO, 0.0, None);
        assert_eq!(agent.hand().unwrap().target, Vec3::new(0.3, 1.2, 0.1));

        agent.set_target(Vec3::ZERO, 0.0, Some(Vec3::new(0.5, 1.2, 0.1)));
        assert_eq!(agent.hand().unwrap().target, Vec3::new(0.5, 1.2, 0.1));
    }

    #[test]
    fn test_world_position_uses_anchor() {
        let anchor = RoomAnchor::new(Vec3::new(1.0, 0.05, 1.0), 0.0, 1);
        let agent = RemoteAgent::new(PlayerId::new("p2"), Vec3::new(1.0, 0.0, 2.0), 0.0, None);
        assert!((agent.world_position(&anchor) - Vec3::new(2.0, 0.05, 3.0)).length() < EPS);
    }
}
