//! Sync context: owns every component and runs the per-frame order
//!
//! ```text
//! tick(dt, frame)
//!   1. deferred tasks      (post-lock wiring: CVR calibration, sync start)
//!   2. room pose           (LocalPoseSample against the current anchor)
//!   3. session poll        (snapshots applied one message at a time)
//!   4. send loop           (pose, then streamed item)
//!   5. interpolation       (remote agents, network-driven items)
//! ```
//!
//! Everything runs on the caller's thread; the transport only feeds events
//! that step 3 drains.

use crate::engine::PoseSyncEngine;
use crate::error::Result;
use crate::session::{ConnectionSession, SessionEvent};
use crate::store::{KeyValueStore, MemoryStore, RonFileStore};
use crate::transport::Connector;
use glam::Vec3;
use roomsync_core::{
    AnchorSlot, Config, DeferredQueue, DevicePose, FloorPlane, ItemId, LocalPoseSample,
    LockOutcome, RoomAnchor, RoomCalibrator, RoomPoseTracker, SceneItems,
};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Device input for one frame
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameInput {
    pub device: DevicePose,
    /// Tracked hand in world space
    pub hand: Option<Vec3>,
}

impl FrameInput {
    pub fn new(device: DevicePose) -> Self {
        Self { device, hand: None }
    }

    pub fn with_hand(mut self, hand: Vec3) -> Self {
        self.hand = Some(hand);
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Deferred {
    PostLockWiring,
}

pub struct SyncContext {
    calibrator: RoomCalibrator,
    tracker: RoomPoseTracker,
    session: ConnectionSession,
    engine: PoseSyncEngine,
    items: SceneItems,
    deferred: DeferredQueue<Deferred>,
    sample: Option<LocalPoseSample>,
}

impl SyncContext {
    pub fn new(
        config: &Config,
        connector: Box<dyn Connector>,
        store: Box<dyn KeyValueStore>,
    ) -> Result<Self> {
        Ok(Self {
            calibrator: RoomCalibrator::new(config.room.clone()),
            tracker: RoomPoseTracker::new(config.room.pose_smoothing),
            session: ConnectionSession::new(&config.session, connector, store)?,
            engine: PoseSyncEngine::new(config.sync.clone()),
            items: SceneItems::new(),
            deferred: DeferredQueue::new(),
            sample: None,
        })
    }

    /// Build with the identity store named by `session.identity_path`
    pub fn from_config(config: &Config, connector: Box<dyn Connector>) -> Result<Self> {
        let store: Box<dyn KeyValueStore> = match &config.session.identity_path {
            Some(path) => Box::new(RonFileStore::open(path)),
            None => Box::new(MemoryStore::new()),
        };
        Self::new(config, connector, store)
    }

    pub fn calibrator(&self) -> &RoomCalibrator {
        &self.calibrator
    }

    /// Handle for components that read the room anchor
    pub fn anchor_slot(&self) -> AnchorSlot {
        self.calibrator.slot()
    }

    /// Current anchor, if the room is locked
    pub fn anchor(&self) -> Option<Arc<RoomAnchor>> {
        self.calibrator.anchor()
    }

    pub fn session(&self) -> &ConnectionSession {
        &self.session
    }

    pub fn session_mut(&mut self) -> &mut ConnectionSession {
        &mut self.session
    }

    pub fn engine(&self) -> &PoseSyncEngine {
        &self.engine
    }

    pub fn items(&self) -> &SceneItems {
        &self.items
    }

    /// Scene items, for registering items and writing back physics
    pub fn items_mut(&mut self) -> &mut SceneItems {
        &mut self.items
    }

    /// This frame's room-space pose
    pub fn sample(&self) -> Option<&LocalPoseSample> {
        self.sample.as_ref()
    }

    /// Start connecting; no-op while connected or connecting
    pub fn connect(&mut self) {
        self.session.connect();
    }

    /// The "Fix" action: lock the room at the current device pose
    ///
    /// CVR calibration and sync start follow on a later tick.
    pub fn confirm_room(&mut self, device: &DevicePose, planes: &[FloorPlane]) -> Option<LockOutcome> {
        let outcome = self.calibrator.confirm(device, planes)?;
        self.engine.invalidate_calibration();
        self.tracker.reset();
        self.sample = None;
        self.deferred.cancel(|task| *task == Deferred::PostLockWiring);
        self.deferred.schedule_next_tick(Deferred::PostLockWiring);
        Some(outcome)
    }

    /// Withdraw the room lock and stop sending
    pub fn reset_room(&mut self) {
        self.calibrator.reset();
        self.engine.invalidate_calibration();
        self.engine.stop_sync();
        self.tracker.reset();
        self.sample = None;
        self.deferred.cancel(|task| *task == Deferred::PostLockWiring);
    }

    pub fn grab(&mut self, id: &ItemId) -> Result<()> {
        self.engine.grab(&mut self.items, id)
    }

    pub fn release(&mut self, id: &ItemId, velocity: Vec3) -> Result<()> {
        self.engine.release(&mut self.items, id, velocity)
    }

    /// Run one frame
    pub fn tick(&mut self, dt: f32, frame: &FrameInput) {
        for task in self.deferred.advance() {
            match task {
                Deferred::PostLockWiring => self.wire_after_lock(),
            }
        }

        let anchor = self.calibrator.anchor();
        self.engine.sync_anchor(anchor.as_ref().map(|a| a.epoch()));
        self.sample = anchor
            .as_ref()
            .map(|a| self.tracker.update(a, &frame.device, frame.hand));

        for event in self.session.poll(dt) {
            match event {
                SessionEvent::MainOpened(identity) => {
                    info!(%identity, "sync ready");
                    self.try_calibrate(anchor.as_deref());
                    self.engine.request_sync();
                }
                SessionEvent::Message(text) => {
                    let identity = self.session.identity();
                    match self
                        .engine
                        .apply_message(&text, identity, anchor.as_deref(), &mut self.items)
                    {
                        Ok(report) if !report.spawned.is_empty() || !report.removed.is_empty() => {
                            debug!(spawned = ?report.spawned, removed = ?report.removed, "snapshot applied");
                        }
                        Ok(_) => {}
                        Err(e) => debug!(error = %e, raw = %text, "dropped main-channel message"),
                    }
                }
                SessionEvent::Closed => {
                    self.engine.clear_remote(&mut self.items);
                }
            }
        }

        match self.engine.tick_send(
            dt,
            self.session.is_ready(),
            anchor.as_deref(),
            self.sample.as_ref(),
            &mut self.items,
        ) {
            Ok(messages) => {
                for text in messages {
                    if let Err(e) = self.session.send(&text) {
                        warn!(error = %e, "send failed");
                    }
                }
            }
            Err(e) => debug!(reason = %e, "send skipped"),
        }

        self.engine.tick_agents(dt);
        self.engine.tick_items(dt, &mut self.items);
    }

    fn wire_after_lock(&mut self) {
        let anchor = self.calibrator.anchor();
        if anchor.is_some() && self.sample.is_none() {
            // No pose against the new anchor yet
            self.deferred.schedule_next_tick(Deferred::PostLockWiring);
            return;
        }
        if self.session.is_ready() {
            self.try_calibrate(anchor.as_deref());
            self.engine.request_sync();
        }
    }

    fn try_calibrate(&mut self, anchor: Option<&RoomAnchor>) {
        match (anchor, self.sample.as_ref()) {
            (Some(anchor), Some(sample)) => {
                self.engine.calibrate(sample, anchor.epoch());
            }
            _ => debug!("CVR calibration deferred until the room is locked"),
        }
    }
}
