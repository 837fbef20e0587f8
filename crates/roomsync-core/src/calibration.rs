//! Floor lock state machine
//!
//! ```text
//! AwaitConfirm ──Fix──▶ Locked   (terminal until reset)
//! ```
//!
//! Confirming captures the device pose, resolves the floor height and
//! publishes a new [`RoomAnchor`]. Calibration never blocks on perfect floor
//! detection: without usable planes the device height is used, and even an
//! implausible device height still yields an anchor.

use crate::anchor::{AnchorSlot, DevicePose, RoomAnchor};
use crate::config::RoomConfig;
use glam::Vec3;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Calibrator stage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum CalibrationStage {
    /// Waiting for the user to confirm the floor position
    #[default]
    AwaitConfirm,
    /// Room anchor fixed
    Locked,
}

/// A tracked planar surface reported by the AR session
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FloorPlane {
    /// World-space height of the plane
    pub height: f32,
    /// Plane normal (world space)
    pub normal: Vec3,
}

impl FloorPlane {
    /// Create a horizontal, upward-facing plane
    pub fn horizontal(height: f32) -> Self {
        Self {
            height,
            normal: Vec3::Y,
        }
    }
}

/// Where the locked floor height came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FloorSource {
    /// Lowest near-horizontal tracked plane
    TrackedPlane,
    /// Device height minus the lens offset
    DeviceHeight,
    /// Device height was implausible; accuracy is degraded
    Degraded,
}

/// Result of a successful confirm
#[derive(Debug, Clone)]
pub struct LockOutcome {
    pub anchor: Arc<RoomAnchor>,
    pub floor_source: FloorSource,
}

/// Owns the floor-lock state and the published room anchor
#[derive(Debug)]
pub struct RoomCalibrator {
    config: RoomConfig,
    stage: CalibrationStage,
    slot: AnchorSlot,
    next_epoch: u64,
}

impl RoomCalibrator {
    /// Create a calibrator with its own anchor slot
    pub fn new(config: RoomConfig) -> Self {
        Self::with_slot(config, AnchorSlot::new())
    }

    /// Create a calibrator publishing into an existing slot
    pub fn with_slot(config: RoomConfig, slot: AnchorSlot) -> Self {
        Self {
            config,
            stage: CalibrationStage::AwaitConfirm,
            slot,
            next_epoch: 1,
        }
    }

    /// Handle for dependents that read the anchor
    pub fn slot(&self) -> AnchorSlot {
        self.slot.clone()
    }

    pub fn stage(&self) -> CalibrationStage {
        self.stage
    }

    pub fn is_locked(&self) -> bool {
        self.stage == CalibrationStage::Locked
    }

    /// The current anchor, if locked
    pub fn anchor(&self) -> Option<Arc<RoomAnchor>> {
        self.slot.current()
    }

    /// Handle the "Fix" action
    ///
    /// Returns `None` when already locked; repeated confirms are no-ops.
    pub fn confirm(&mut self, device: &DevicePose, planes: &[FloorPlane]) -> Option<LockOutcome> {
        if self.stage == CalibrationStage::Locked {
            debug!("confirm ignored: room already locked");
            return None;
        }

        let mut position = device.position;
        let mut degraded = false;
        if !position.x.is_finite() || !position.z.is_finite() {
            warn!("device XZ not finite at confirm, anchoring at world origin");
            position.x = 0.0;
            position.z = 0.0;
            degraded = true;
        }

        let (floor_y, mut source) = estimate_floor_height(planes, position.y, &self.config);
        if degraded {
            source = FloorSource::Degraded;
        }

        let yaw_deg = if device.yaw_deg.is_finite() {
            device.yaw_deg
        } else {
            0.0
        };

        let epoch = self.next_epoch;
        self.next_epoch += 1;

        let anchor = self
            .slot
            .publish(RoomAnchor::new(Vec3::new(position.x, floor_y, position.z), yaw_deg, epoch));
        self.stage = CalibrationStage::Locked;

        info!(
            x = anchor.origin().x,
            y = anchor.origin().y,
            z = anchor.origin().z,
            yaw_deg = anchor.yaw_deg(),
            epoch,
            ?source,
            "room locked"
        );

        Some(LockOutcome {
            anchor,
            floor_source: source,
        })
    }

    /// Return to `AwaitConfirm` and withdraw the anchor
    pub fn reset(&mut self) {
        if self.stage == CalibrationStage::Locked {
            info!("room lock reset");
        }
        self.stage = CalibrationStage::AwaitConfirm;
        self.slot.clear();
    }
}

/// Resolve the floor height for a lock
///
/// Uses the minimum height among planes whose normal is within the
/// configured angle of vertical; otherwise the device height minus a lens
/// offset clamped to `[0, 0.05]`.
pub fn estimate_floor_height(
    planes: &[FloorPlane],
    device_y: f32,
    config: &RoomConfig,
) -> (f32, FloorSource) {
    let best = planes
        .iter()
        .filter(|plane| plane.height.is_finite())
        .filter(|plane| {
            let n = plane.normal.normalize_or_zero();
            n.dot(Vec3::Y) >= config.floor_normal_min_dot
        })
        .map(|plane| plane.height)
        .fold(None, |min: Option<f32>, h| Some(min.map_or(h, |m| m.min(h))));

    if let Some(height) = best {
        return (height, FloorSource::TrackedPlane);
    }

    let offset = config.lens_offset.clamp(0.0, 0.05);
    if !device_y.is_finite() {
        warn!("device height not finite, assuming floor at 0");
        return (0.0, FloorSource::Degraded);
    }
    let floor = device_y - offset;
    if device_y.abs() > config.max_plausible_device_height {
        warn!(device_y, "implausible device height, floor estimate degraded");
        return (floor, FloorSource::Degraded);
    }
    (floor, FloorSource::DeviceHeight)
}
