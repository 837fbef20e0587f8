//! Item ownership arbitration
//!
//! The arbiter tracks the one item this device may stream (the "held item")
//! and applies the ownership transitions to records in an [`ItemRegistry`].
//! Local grabs always preempt remote claims. Remote claims between peers are
//! resolved by whichever snapshot arrived last.

use crate::error::{Error, Result};
use crate::identity::{ItemId, PlayerId};
use crate::item::OwnershipState;
use crate::registry::ItemRegistry;
use glam::Vec3;
use indexmap::IndexMap;
use tracing::{debug, info};

/// Claims from one snapshot: item -> claiming peer
pub type RemoteClaims = IndexMap<ItemId, PlayerId>;

#[derive(Debug, Clone)]
pub struct ItemOwnershipArbiter {
    settle_epsilon: f32,
    held: Option<ItemId>,
}

impl ItemOwnershipArbiter {
    /// Create an arbiter; `settle_epsilon` is compared against squared speed
    pub fn new(settle_epsilon: f32) -> Self {
        Self {
            settle_epsilon: settle_epsilon.max(0.0),
            held: None,
        }
    }

    /// The item this device currently claims (held or settling)
    pub fn held_item(&self) -> Option<&ItemId> {
        self.held.as_ref()
    }

    /// Whether inbound positions for `id` must be ignored
    pub fn is_authoritative_for(&self, id: &ItemId) -> bool {
        self.held.as_ref() == Some(id)
    }

    /// Local grab: `Free | RemotelyHeld | Settling -> LocallyHeld`
    ///
    /// Grabbing a second item drops the claim on the previous one.
    pub fn grab<R: ItemRegistry + ?Sized>(&mut self, registry: &mut R, id: &ItemId) -> Result<()> {
        if registry.lookup(id).is_none() {
            return Err(Error::UnknownItem(id.clone()));
        }

        if let Some(previous) = self.held.take() {
            if &previous != id {
                if let Some(record) = registry.lookup_mut(&previous) {
                    if matches!(
                        record.state(),
                        OwnershipState::LocallyHeld | OwnershipState::Settling
                    ) {
                        record.set_state(OwnershipState::Free);
                    }
                }
                debug!(item = %previous, "previous claim dropped by new grab");
            }
        }

        let record = registry
            .lookup_mut(id)
            .ok_or_else(|| Error::UnknownItem(id.clone()))?;
        if let Some(holder) = record.remote_holder() {
            debug!(item = %id, holder = %holder, "local grab preempts remote claim");
        }
        record.set_state(OwnershipState::LocallyHeld);
        record.set_velocity(Vec3::ZERO);
        record.clear_target();
        self.held = Some(id.clone());

        info!(item = %id, "item grabbed");
        Ok(())
    }

    /// Local release: `LocallyHeld -> Settling` with the throw velocity
    ///
    /// The claim is kept; [`streaming_item`](Self::streaming_item) clears it
    /// once the item comes to rest.
    pub fn release<R: ItemRegistry + ?Sized>(
        &mut self,
        registry: &mut R,
        id: &ItemId,
        velocity: Vec3,
    ) -> Result<()> {
        let record = registry
            .lookup_mut(id)
            .ok_or_else(|| Error::UnknownItem(id.clone()))?;
        if record.state() != OwnershipState::LocallyHeld {
            debug!(item = %id, state = ?record.state(), "release ignored: not locally held");
            return Ok(());
        }
        record.set_state(OwnershipState::Settling);
        record.set_velocity(velocity);
        info!(item = %id, speed = velocity.length(), "item released");
        Ok(())
    }

    /// Resolve which item to stream this tick
    ///
    /// Runs the owner predicate: a settling item that is no longer moving
    /// goes `Free` and the claim is cleared in the same call.
    pub fn streaming_item<R: ItemRegistry + ?Sized>(&mut self, registry: &mut R) -> Option<ItemId> {
        let id = self.held.clone()?;
        let Some(record) = registry.lookup_mut(&id) else {
            debug!(item = %id, "held item left the scene");
            self.held = None;
            return None;
        };

        match record.state() {
            OwnershipState::LocallyHeld => Some(id),
            OwnershipState::Settling if record.is_moving(self.settle_epsilon) => Some(id),
            OwnershipState::Settling => {
                record.set_state(OwnershipState::Free);
                self.held = None;
                info!(item = %id, "item settled, claim cleared");
                None
            }
            state => {
                debug!(item = %id, ?state, "claim lost");
                self.held = None;
                None
            }
        }
    }

    /// Apply the remote claims carried by one snapshot
    ///
    /// Claimed items become `RemotelyHeld` unless locally held. Items that
    /// were remotely held but are absent from `claims` go back to `Free`.
    pub fn apply_remote_claims<R: ItemRegistry + ?Sized>(
        &mut self,
        registry: &mut R,
        claims: &RemoteClaims,
    ) {
        for (id, holder) in claims {
            let Some(record) = registry.lookup_mut(id) else {
                debug!(item = %id, "claim for unknown item ignored");
                continue;
            };
            match record.state() {
                OwnershipState::LocallyHeld => {
                    debug!(item = %id, holder = %holder, "ownership conflict: local hold wins");
                }
                OwnershipState::RemotelyHeld if record.remote_holder() == Some(holder) => {}
                state => {
                    if state == OwnershipState::Settling {
                        debug!(item = %id, holder = %holder, "ownership conflict: remote claim takes settling item");
                        if self.held.as_ref() == Some(id) {
                            self.held = None;
                        }
                    }
                    record.set_remote_holder(holder.clone());
                    record.set_velocity(Vec3::ZERO);
                    debug!(item = %id, holder = %holder, "item remotely held");
                }
            }
        }

        for id in registry.ids() {
            if claims.contains_key(&id) {
                continue;
            }
            if let Some(record) = registry.lookup_mut(&id) {
                if record.state() == OwnershipState::RemotelyHeld {
                    record.set_state(OwnershipState::Free);
                    debug!(item = %id, "remote claim ended");
                }
            }
        }
    }
}

impl Default for ItemOwnershipArbiter {
    fn default() -> Self {
        Self::new(1e-3)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::item::ItemRecord;
    use crate::registry::SceneItems;

    fn scene() -> SceneItems {
        let mut items = SceneItems::new();
        items.register(ItemRecord::new("sword1", Vec3::ZERO));
        items.register(ItemRecord::new("cup", Vec3::ONE));
        items
    }

    fn state(items: &SceneItems, id: &str) -> OwnershipState {
        items.lookup(&ItemId::new(id)).unwrap().state()
    }

    fn claims(pairs: &[(&str, &str)]) -> RemoteClaims {
        pairs
            .iter()
            .map(|(item, player)| (ItemId::new(*item), PlayerId::new(*player)))
            .collect()
    }

    #[test]
    fn test_grab_release_settle() {
        let mut items = scene();
        let mut arbiter = ItemOwnershipArbiter::default();
        let sword = ItemId::new("sword1");

        arbiter.grab(&mut items, &sword).unwrap();
        assert_eq!(state(&items, "sword1"), OwnershipState::LocallyHeld);
        assert!(!items.lookup(&sword).unwrap().physics_driven());
        assert_eq!(arbiter.streaming_item(&mut items), Some(sword.clone()));

        arbiter
            .release(&mut items, &sword, Vec3::new(2.0, 0.0, 0.0))
            .unwrap();
        assert_eq!(state(&items, "sword1"), OwnershipState::Settling);
        assert_eq!(arbiter.streaming_item(&mut items), Some(sword.clone()));

        // Velocity decays below epsilon: Free within the same call
        let mut v = 2.0_f32;
        let mut ticks = 0;
        loop {
            v *= 0.5;
            ticks += 1;
            let pos = items.lookup(&sword).unwrap().position();
            items
                .lookup_mut(&sword)
                .unwrap()
                .set_physics_state(pos, Vec3::new(v, 0.0, 0.0));
            let streaming = arbiter.streaming_item(&mut items);
            if v * v > 1e-3 {
                assert_eq!(streaming, Some(sword.clone()));
            } else {
                assert_eq!(streaming, None);
                break;
            }
            assert!(ticks < 64);
        }
        assert_eq!(state(&items, "sword1"), OwnershipState::Free);
        assert!(arbiter.held_item().is_none());
        assert_eq!(arbiter.streaming_item(&mut items), None);
    }

    #[test]
    fn test_grab_unknown_item() {
        let mut items = scene();
        let mut arbiter = ItemOwnershipArbiter::default();
        assert!(matches!(
            arbiter.grab(&mut items, &ItemId::new("nope")),
            Err(Error::UnknownItem(_))
        ));
    }

    #[test]
    fn test_local_grab_preempts_remote() {
        let mut items = scene();
        let mut arbiter = ItemOwnershipArbiter::default();
        arbiter.apply_remote_claims(&mut items, &claims(&[("sword1", "p2")]));
        assert_eq!(state(&items, "sword1"), OwnershipState::RemotelyHeld);

        arbiter.grab(&mut items, &ItemId::new("sword1")).unwrap();
        assert_eq!(state(&items, "sword1"), OwnershipState::LocallyHeld);

        // The next snapshot still attributes it to p2; the local hold wins
        arbiter.apply_remote_claims(&mut items, &claims(&[("sword1", "p2")]));
        assert_eq!(state(&items, "sword1"), OwnershipState::LocallyHeld);
        assert!(arbiter.is_authoritative_for(&ItemId::new("sword1")));
    }

    #[test]
    fn test_missing_claim_frees_item() {
        let mut items = scene();
        let mut arbiter = ItemOwnershipArbiter::default();
        arbiter.apply_remote_claims(&mut items, &claims(&[("sword1", "p2"), ("cup", "p3")]));
        assert_eq!(state(&items, "cup"), OwnershipState::RemotelyHeld);

        arbiter.apply_remote_claims(&mut items, &claims(&[("sword1", "p2")]));
        assert_eq!(state(&items, "sword1"), OwnershipState::RemotelyHeld);
        assert_eq!(state(&items, "cup"), OwnershipState::Free);
    }

    #[test]
    fn test_last_claim_wins_between_peers() {
        let mut items = scene();
        let mut arbiter = ItemOwnershipArbiter::default();
        arbiter.apply_remote_claims(&mut items, &claims(&[("cup", "p2")]));
        arbiter.apply_remote_claims(&mut items, &claims(&[("cup", "p3")]));
        let cup = items.lookup(&ItemId::new("cup")).unwrap();
        assert_eq!(cup.remote_holder().map(|p| p.as_str()), Some("p3"));
    }

    #[test]
    fn test_remote_claim_takes_settling_item() {
        let mut items = scene();
        let mut arbiter = ItemOwnershipArbiter::default();
        let cup = ItemId::new("cup");
        arbiter.grab(&mut items, &cup).unwrap();
        arbiter.release(&mut items, &cup, Vec3::X).unwrap();

        arbiter.apply_remote_claims(&mut items, &claims(&[("cup", "p2")]));
        assert_eq!(state(&items, "cup"), OwnershipState::RemotelyHeld);
        assert!(arbiter.held_item().is_none());
        assert_eq!(arbiter.streaming_item(&mut items), None);
    }

    #[test]
    fn test_second_grab_frees_first() {
        let mut items = scene();
        let mut arbiter = ItemOwnershipArbiter::default();
        arbiter.grab(&mut items, &ItemId::new("sword1")).unwrap();
        arbiter.grab(&mut items, &ItemId::new("cup")).unwrap();
        assert_eq!(state(&items, "sword1"), OwnershipState::Free);
        assert_eq!(state(&items, "cup"), OwnershipState::LocallyHeld);
        assert_eq!(arbiter.held_item(), Some(&ItemId::new("cup")));
    }

    #[test]
    fn test_held_item_removed_from_scene() {
        let mut items = scene();
        let mut arbiter = ItemOwnershipArbiter::default();
        let sword = ItemId::new("sword1");
        arbiter.grab(&mut items, &sword).unwrap();
        items.unregister(&sword);
        assert_eq!(arbiter.streaming_item(&mut items), None);
        assert!(arbiter.held_item().is_none());
    }
}
