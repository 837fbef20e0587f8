//! Pose sync engine
//!
//! Outbound: at the configured rate, turn the latest room-space pose into a
//! CVR pose message, followed by the position of the item this device is
//! streaming. Inbound: apply each snapshot atomically to the remote agent
//! table, the remote item claims and the item targets.
//!
//! The engine never talks to the transport. Outbound messages are returned
//! to the caller and inbound text is handed in, so a snapshot can never be
//! half-applied while a send is being built.

use crate::error::{Error, Result};
use crate::protocol::{
    decode_snapshot, encode, Coordinate, ItemPoseMessage, PoseMessage, ServerSnapshot,
    TaggedMessage, WireHand,
};
use crate::remote_agent::RemoteAgent;
use glam::Vec3;
use indexmap::IndexMap;
use roomsync_core::math::{from_xz, smoothing_factor};
use roomsync_core::{
    CalibrationFrame, CoordinateTransformer, ItemId, ItemOwnershipArbiter, ItemRegistry,
    LocalPoseSample, OwnershipState, PlayerId, RemoteClaims, RoomAnchor, SessionIdentity,
    SyncConfig,
};
use std::collections::HashSet;
use tracing::{debug, info, trace};

/// Agents created and removed by one snapshot
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SnapshotReport {
    pub spawned: Vec<PlayerId>,
    pub removed: Vec<PlayerId>,
}

/// Sends local poses and applies server snapshots
#[derive(Debug)]
pub struct PoseSyncEngine {
    config: SyncConfig,
    transformer: CoordinateTransformer,
    arbiter: ItemOwnershipArbiter,
    agents: IndexMap<PlayerId, RemoteAgent>,
    send_interval: f32,
    send_timer: f32,
    syncing: bool,
}

impl PoseSyncEngine {
    pub fn new(config: SyncConfig) -> Self {
        let send_interval = 1.0 / config.effective_send_hz();
        Self {
            transformer: CoordinateTransformer::new(config.use_cvr),
            arbiter: ItemOwnershipArbiter::new(config.settle_velocity_epsilon),
            agents: IndexMap::new(),
            send_interval,
            send_timer: 0.0,
            syncing: false,
            config,
        }
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    pub fn transformer(&self) -> &CoordinateTransformer {
        &self.transformer
    }

    pub fn arbiter(&self) -> &ItemOwnershipArbiter {
        &self.arbiter
    }

    /// Remote agents keyed by snapshot id
    pub fn agents(&self) -> &IndexMap<PlayerId, RemoteAgent> {
        &self.agents
    }

    pub fn agent(&self, id: &str) -> Option<&RemoteAgent> {
        self.agents.get(&PlayerId::new(id))
    }

    /// Whether the send loop is running
    pub fn is_syncing(&self) -> bool {
        self.syncing
    }

    /// Start the send loop; the first message goes out on the next send tick
    ///
    /// Refused while CVR is on without a frame if `require_calibration` is
    /// set. Returns whether the loop is running.
    pub fn request_sync(&mut self) -> bool {
        if self.config.require_calibration
            && self.config.use_cvr
            && !self.transformer.is_calibrated()
        {
            debug!("sync request deferred: CVR not calibrated");
            return self.syncing;
        }
        if !self.syncing {
            info!(send_hz = self.config.effective_send_hz(), "sync started");
        }
        self.syncing = true;
        self.send_timer = 0.0;
        true
    }

    pub fn stop_sync(&mut self) {
        if self.syncing {
            info!("sync stopped");
        }
        self.syncing = false;
    }

    /// Take the CVR frame from the current room pose (once per anchor)
    pub fn calibrate(&mut self, sample: &LocalPoseSample, anchor_epoch: u64) -> CalibrationFrame {
        self.transformer.calibrate(sample, anchor_epoch)
    }

    /// Drop the CVR frame if it belongs to another anchor
    pub fn sync_anchor(&mut self, anchor_epoch: Option<u64>) -> bool {
        self.transformer.sync_anchor(anchor_epoch)
    }

    pub fn invalidate_calibration(&mut self) {
        self.transformer.invalidate();
    }

    /// Local grab of an item
    pub fn grab<R: ItemRegistry + ?Sized>(&mut self, registry: &mut R, id: &ItemId) -> Result<()> {
        Ok(self.arbiter.grab(registry, id)?)
    }

    /// Local release of an item with its throw velocity
    pub fn release<R: ItemRegistry + ?Sized>(
        &mut self,
        registry: &mut R,
        id: &ItemId,
        velocity: Vec3,
    ) -> Result<()> {
        Ok(self.arbiter.release(registry, id, velocity)?)
    }

    /// Run the send loop for one frame
    ///
    /// Returns the messages to send this frame, possibly none. Errors mean
    /// this frame's send was skipped; nothing is queued for later.
    pub fn tick_send<R: ItemRegistry + ?Sized>(
        &mut self,
        dt: f32,
        link_ready: bool,
        anchor: Option<&RoomAnchor>,
        sample: Option<&LocalPoseSample>,
        registry: &mut R,
    ) -> Result<Vec<String>> {
        // Settle check runs every frame so a resting item stops streaming
        // on the first frame it is at rest.
        let streaming = self.arbiter.streaming_item(registry);

        if !self.syncing {
            return Ok(Vec::new());
        }
        self.send_timer -= dt.max(0.0);
        if self.send_timer > 0.0 {
            return Ok(Vec::new());
        }
        self.send_timer += self.send_interval;
        if self.send_timer <= 0.0 {
            self.send_timer = self.send_interval;
        }

        if !link_ready {
            return Err(Error::NotConnected);
        }
        let (anchor, sample) = match (anchor, sample) {
            (Some(anchor), Some(sample)) => (anchor, sample),
            _ => return Err(roomsync_core::Error::NoRoomLock.into()),
        };

        let hand = match sample.hand.filter(|_| self.config.include_hand) {
            Some(hand) => Some(WireHand::from(self.transformer.to_wire_point(hand)?)),
            None => None,
        };
        let pose = PoseMessage {
            coordinate: Coordinate::new(
                self.transformer.to_wire_xz(sample.xz)?,
                self.transformer.to_wire_yaw(sample.yaw_deg)?,
            ),
            hand,
            grabbed_item_id: streaming.clone(),
        };
        let mut out = vec![encode(&pose)?];

        if let Some(id) = streaming {
            if let Some(record) = registry.lookup(&id) {
                let room = anchor.world_to_room(record.position());
                let wire = self.transformer.to_wire_point(room)?;
                let msg = TaggedMessage::ItemPose(ItemPoseMessage::new(id, wire));
                out.push(encode(&msg)?);
            }
        }

        trace!(count = out.len(), "pose tick");
        Ok(out)
    }

    /// Decode and apply one main-channel message
    pub fn apply_message<R: ItemRegistry + ?Sized>(
        &mut self,
        text: &str,
        identity: Option<&SessionIdentity>,
        anchor: Option<&RoomAnchor>,
        registry: &mut R,
    ) -> Result<SnapshotReport> {
        let snapshot = decode_snapshot(text)?;
        Ok(self.apply_snapshot(&snapshot, identity, anchor, registry))
    }

    /// Apply one snapshot: agents, ghost cleanup, claims, then items
    pub fn apply_snapshot<R: ItemRegistry + ?Sized>(
        &mut self,
        snapshot: &ServerSnapshot,
        identity: Option<&SessionIdentity>,
        anchor: Option<&RoomAnchor>,
        registry: &mut R,
    ) -> SnapshotReport {
        let mut report = SnapshotReport::default();
        let mut seen: HashSet<PlayerId> = HashSet::new();
        let mut claims = RemoteClaims::new();

        for entry in &snapshot.players {
            if entry.id.is_empty() {
                continue;
            }
            let is_self = identity.is_some_and(|me| me.matches(&entry.id));
            let id = PlayerId::new(entry.id.as_str());

            if !is_self {
                if let Some(item) = &entry.grabbed_item_id {
                    claims.insert(item.clone(), id.clone());
                }
            }
            if is_self && !self.config.render_self_from_server {
                continue;
            }

            let coordinate = entry.coordinate();
            let position = from_xz(self.transformer.from_wire_xz(coordinate.xz()), 0.0);
            let yaw = self.transformer.from_wire_yaw(coordinate.r);
            let hand = entry
                .hand
                .map(|h| self.transformer.from_wire_point(Vec3::from(h)));

            match self.agents.get_mut(&id) {
                Some(agent) => agent.set_target(position, yaw, hand),
                None => {
                    debug!(player = %id, x = position.x, z = position.z, "remote agent spawned");
                    self.agents
                        .insert(id.clone(), RemoteAgent::new(id.clone(), position, yaw, hand));
                    report.spawned.push(id.clone());
                }
            }
            seen.insert(id);
        }

        self.agents.retain(|id, _| {
            let keep = seen.contains(id);
            if !keep {
                debug!(player = %id, "remote agent removed");
                report.removed.push(id.clone());
            }
            keep
        });

        self.arbiter.apply_remote_claims(registry, &claims);

        if !snapshot.items.is_empty() {
            match anchor {
                Some(anchor) => self.apply_items(snapshot, anchor, registry),
                None => debug!(count = snapshot.items.len(), "item positions skipped: no room lock"),
            }
        }

        report
    }

    fn apply_items<R: ItemRegistry + ?Sized>(
        &mut self,
        snapshot: &ServerSnapshot,
        anchor: &RoomAnchor,
        registry: &mut R,
    ) {
        for entry in &snapshot.items {
            if self.arbiter.is_authoritative_for(&entry.id) {
                continue;
            }
            let Some(record) = registry.lookup_mut(&entry.id) else {
                trace!(item = %entry.id, "snapshot item not in scene");
                continue;
            };
            if record.state() == OwnershipState::LocallyHeld {
                continue;
            }
            let world = anchor.room_to_world(self.transformer.from_wire_point(entry.position()));
            if record.set_target(world, self.config.snap_distance) {
                trace!(item = %entry.id, "item snapped to network position");
            }
        }
    }

    /// Ease remote agents toward their targets
    pub fn tick_agents(&mut self, dt: f32) {
        for agent in self.agents.values_mut() {
            agent.tick(dt, self.config.move_lerp, self.config.rot_lerp);
        }
    }

    /// Ease network-driven items toward their targets
    pub fn tick_items<R: ItemRegistry + ?Sized>(&mut self, dt: f32, registry: &mut R) {
        let alpha = smoothing_factor(self.config.item_lerp, dt);
        if alpha <= 0.0 {
            return;
        }
        for id in registry.ids() {
            if self.arbiter.is_authoritative_for(&id) {
                continue;
            }
            if let Some(record) = registry.lookup_mut(&id) {
                if record.state() != OwnershipState::LocallyHeld {
                    record.approach_target(alpha);
                }
            }
        }
    }

    /// Forget every remote agent and remote claim (connection lost)
    pub fn clear_remote<R: ItemRegistry + ?Sized>(&mut self, registry: &mut R) {
        if !self.agents.is_empty() {
            debug!(count = self.agents.len(), "remote agents cleared");
        }
        self.agents.clear();
        self.arbiter.apply_remote_claims(registry, &RemoteClaims::new());
    }
}
