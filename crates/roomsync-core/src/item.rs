//! Interactive scene items

use crate::identity::{ItemId, PlayerId};
use glam::Vec3;
use serde::{Deserialize, Serialize};
use tracing::trace;

/// Who is allowed to drive an item's motion
///
/// ```text
/// Free ──grab──▶ LocallyHeld ──release──▶ Settling ──at rest──▶ Free
/// Free ──remote claim──▶ RemotelyHeld ──claim gone──▶ Free
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum OwnershipState {
    /// No one owns the item; local physics integrates it
    #[default]
    Free,
    /// Grabbed on this device; pose follows the hand
    LocallyHeld,
    /// Another peer holds it; pose follows the network stream
    RemotelyHeld,
    /// Released locally and still moving; this device keeps streaming it
    Settling,
}

/// Sync-relevant state of one interactive item
///
/// Positions are world space on this device.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemRecord {
    id: ItemId,
    state: OwnershipState,
    position: Vec3,
    velocity: Vec3,
    target: Option<Vec3>,
    /// Target moved since the item last reached it
    #[serde(default)]
    target_fresh: bool,
    remote_holder: Option<PlayerId>,
}

/// Squared distance at which a free item counts as arrived at its target
const ARRIVE_DISTANCE_SQ: f32 = 1e-6;

impl ItemRecord {
    /// Create a free item at rest
    pub fn new(id: impl Into<ItemId>, position: Vec3) -> Self {
        Self {
            id: id.into(),
            state: OwnershipState::Free,
            position,
            velocity: Vec3::ZERO,
            target: None,
            target_fresh: false,
            remote_holder: None,
        }
    }

    pub fn id(&self) -> &ItemId {
        &self.id
    }

    pub fn state(&self) -> OwnershipState {
        self.state
    }

    pub fn position(&self) -> Vec3 {
        self.position
    }

    pub fn velocity(&self) -> Vec3 {
        self.velocity
    }

    /// Last position received from the network, if any
    pub fn target(&self) -> Option<Vec3> {
        self.target
    }

    /// Peer currently attributed with the item while `RemotelyHeld`
    pub fn remote_holder(&self) -> Option<&PlayerId> {
        self.remote_holder.as_ref()
    }

    /// Whether local physics integrates this item
    pub fn physics_driven(&self) -> bool {
        matches!(self.state, OwnershipState::Free | OwnershipState::Settling)
    }

    /// Owner predicate: squared speed above `epsilon`
    pub fn is_moving(&self, epsilon: f32) -> bool {
        self.velocity.length_squared() > epsilon
    }

    /// Write back the result of a local physics step
    ///
    /// Ignored unless the item is physics driven.
    pub fn set_physics_state(&mut self, position: Vec3, velocity: Vec3) {
        if !self.physics_driven() {
            trace!(item = %self.id, state = ?self.state, "physics update ignored");
            return;
        }
        self.position = position;
        self.velocity = velocity;
    }

    /// Drive the item from the local hand while `LocallyHeld`
    pub fn set_held_pose(&mut self, position: Vec3) {
        if self.state == OwnershipState::LocallyHeld {
            self.position = position;
        }
    }

    /// Record an inbound position
    ///
    /// Jumps straight to the target on first sight or when the correction is
    /// larger than `snap_distance`. Returns true when it snapped.
    pub fn set_target(&mut self, target: Vec3, snap_distance: f32) -> bool {
        let snap = self.target.is_none() || self.position.distance(target) > snap_distance;
        let moved = self
            .target
            .map_or(true, |prev| prev.distance_squared(target) > ARRIVE_DISTANCE_SQ);
        self.target = Some(target);
        if snap {
            self.position = target;
            self.target_fresh = false;
        } else if moved {
            self.target_fresh = true;
        }
        snap
    }

    /// Move a fraction `alpha` of the way to the current target
    ///
    /// A remotely held item always follows its target. Any other item only
    /// follows a target that moved, until it arrives; after that local
    /// physics owns it again.
    pub fn approach_target(&mut self, alpha: f32) {
        let Some(target) = self.target else {
            return;
        };
        if self.state != OwnershipState::RemotelyHeld && !self.target_fresh {
            return;
        }
        self.position = self.position.lerp(target, alpha.clamp(0.0, 1.0));
        if self.position.distance_squared(target) < ARRIVE_DISTANCE_SQ {
            self.target_fresh = false;
        }
    }

    pub(crate) fn set_state(&mut self, state: OwnershipState) {
        self.state = state;
        if state != OwnershipState::RemotelyHeld {
            self.remote_holder = None;
        }
    }

    pub(crate) fn set_remote_holder(&mut self, holder: PlayerId) {
        self.state = OwnershipState::RemotelyHeld;
        self.remote_holder = Some(holder);
    }

    pub(crate) fn set_velocity(&mut self, velocity: Vec3) {
        self.velocity = velocity;
    }

    pub(crate) fn clear_target(&mut self) {
        self.target = None;
        self.target_fresh = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_item_is_free() {
        let item = ItemRecord::new("sword1", Vec3::ZERO);
        assert_eq!(item.state(), OwnershipState::Free);
        assert!(item.physics_driven());
        assert!(!item.is_moving(1e-3));
    }

    #[test]
    fn test_reached_target_releases_free_item() {
        let mut item = ItemRecord::new("cup", Vec3::ZERO);
        item.set_target(Vec3::new(0.2, 1.0, 0.0), 1.0);

        // Local physics drops it; the old network position no longer pulls
        item.set_physics_state(Vec3::new(0.2, 0.3, 0.0), Vec3::ZERO);
        item.approach_target(0.5);
        assert_eq!(item.position(), Vec3::new(0.2, 0.3, 0.0));

        // Repeating the same position is not a new target
        item.set_target(Vec3::new(0.2, 1.0, 0.0), 1.0);
        item.approach_target(0.5);
        assert_eq!(item.position(), Vec3::new(0.2, 0.3, 0.0));

        // A remote holder keeps it on the stream
        item.set_remote_holder(PlayerId::new("p2"));
        item.approach_target(0.5);
        assert!((item.position().y - 0.65).abs() < 1e-5);
    }

    #[test]
    fn test_first_target_snaps_then_smooths() {
        let mut item = ItemRecord::new("cup", Vec3::ZERO);
        assert!(item.set_target(Vec3::new(0.2, 0.0, 0.0), 1.0));
        assert_eq!(item.position(), Vec3::new(0.2, 0.0, 0.0));

        assert!(!item.set_target(Vec3::new(0.6, 0.0, 0.0), 1.0));
        item.approach_target(0.5);
        assert!((item.position().x - 0.4).abs() < 1e-5);

        assert!(item.set_target(Vec3::new(5.0, 0.0, 0.0), 1.0));
        assert_eq!(item.position().x, 5.0);
    }

    #[test]
    fn test_physics_ignored_while_remotely_held() {
        let mut item = ItemRecord::new("ball", Vec3::ZERO);
        item.set_remote_holder(PlayerId::new("p2"));
        item.set_physics_state(Vec3::ONE, Vec3::ONE);
        assert_eq!(item.position(), Vec3::ZERO);
        assert_eq!(item.remote_holder().map(|p| p.as_str()), Some("p2"));

        item.set_state(OwnershipState::Free);
        assert!(item.remote_holder().is_none());
        item.set_physics_state(Vec3::ONE, Vec3::ONE);
        assert_eq!(item.position(), Vec3::ONE);
    }
}
