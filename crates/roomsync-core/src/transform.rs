//! Room space <-> Common Virtual Reference (CVR) space
//!
//! Every device derives a [`CalibrationFrame`] from its own room pose at the
//! moment the connection and the room lock both exist. Poses are sent in CVR
//! space and converted back into room space on receipt:
//!
//! ```text
//! to_cvr(p)  = Rot(-yaw) · (p - origin) · scale
//! to_room(c) = Rot(yaw) · c / scale + origin
//! ```
//!
//! Heights (Y) pass through unchanged.

use crate::error::{Error, Result};
use crate::math::{from_xz, normalize_yaw_deg, normalize_yaw_rad, rotate_xz, xz};
use crate::room_pose::LocalPoseSample;
use glam::{Vec2, Vec3};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Calibration frame for the CVR transform
///
/// Immutable once created. A new room lock invalidates it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CalibrationFrame {
    origin: Vec2,
    yaw_rad: f32,
    scale: f32,
    anchor_epoch: u64,
}

impl CalibrationFrame {
    /// Create a frame from explicit parameters
    pub fn new(origin: Vec2, yaw_rad: f32, scale: f32, anchor_epoch: u64) -> Result<Self> {
        if !scale.is_finite() || scale <= 0.0 {
            return Err(Error::InvalidScale(scale));
        }
        Ok(Self {
            origin,
            yaw_rad: normalize_yaw_rad(yaw_rad),
            scale,
            anchor_epoch,
        })
    }

    /// Derive a frame from the current room pose (scale fixed at 1)
    pub fn from_sample(sample: &LocalPoseSample, anchor_epoch: u64) -> Self {
        Self {
            origin: sample.xz,
            yaw_rad: normalize_yaw_rad(sample.yaw_deg.to_radians()),
            scale: 1.0,
            anchor_epoch,
        }
    }

    /// Room-space origin of the frame
    pub fn origin(&self) -> Vec2 {
        self.origin
    }

    /// Frame yaw in radians, `(-PI, PI]`
    pub fn yaw_rad(&self) -> f32 {
        self.yaw_rad
    }

    /// Frame yaw in degrees
    pub fn yaw_deg(&self) -> f32 {
        self.yaw_rad.to_degrees()
    }

    pub fn scale(&self) -> f32 {
        self.scale
    }

    /// Epoch of the room anchor this frame was taken against
    pub fn anchor_epoch(&self) -> u64 {
        self.anchor_epoch
    }

    /// Room XZ -> CVR XZ
    pub fn to_cvr(&self, room: Vec2) -> Vec2 {
        rotate_xz((room - self.origin) * self.scale, -self.yaw_rad)
    }

    /// CVR XZ -> room XZ
    pub fn to_room(&self, cvr: Vec2) -> Vec2 {
        rotate_xz(cvr, self.yaw_rad) / self.scale + self.origin
    }

    /// Room yaw -> CVR yaw, `(-180, 180]`
    pub fn yaw_to_cvr(&self, yaw_deg: f32) -> f32 {
        normalize_yaw_deg(yaw_deg - self.yaw_deg())
    }

    /// CVR yaw -> room yaw, `(-180, 180]`
    pub fn yaw_to_room(&self, yaw_deg: f32) -> f32 {
        normalize_yaw_deg(yaw_deg + self.yaw_deg())
    }

    /// Room point -> CVR point, keeping the height
    pub fn point_to_cvr(&self, room: Vec3) -> Vec3 {
        from_xz(self.to_cvr(xz(room)), room.y)
    }

    /// CVR point -> room point, keeping the height
    pub fn point_to_room(&self, cvr: Vec3) -> Vec3 {
        from_xz(self.to_room(xz(cvr)), cvr.y)
    }
}

/// Converts between room space and the space used on the wire
///
/// With CVR disabled the wire carries raw room coordinates. With CVR enabled
/// outbound conversion fails with [`Error::NotCalibrated`] until a frame
/// exists; inbound conversion without a frame treats the payload as room
/// space.
#[derive(Debug, Clone)]
pub struct CoordinateTransformer {
    use_cvr: bool,
    frame: Option<CalibrationFrame>,
}

impl CoordinateTransformer {
    pub fn new(use_cvr: bool) -> Self {
        Self {
            use_cvr,
            frame: None,
        }
    }

    /// Whether CVR conversion is enabled
    pub fn uses_cvr(&self) -> bool {
        self.use_cvr
    }

    /// The active calibration frame
    pub fn frame(&self) -> Option<&CalibrationFrame> {
        self.frame.as_ref()
    }

    pub fn is_calibrated(&self) -> bool {
        self.frame.is_some()
    }

    /// Calibrate against the current room pose
    ///
    /// Runs once per room anchor: if a frame already exists for
    /// `anchor_epoch` it is kept and returned unchanged.
    pub fn calibrate(&mut self, sample: &LocalPoseSample, anchor_epoch: u64) -> CalibrationFrame {
        if let Some(frame) = self.frame {
            if frame.anchor_epoch == anchor_epoch {
                debug!(anchor_epoch, "CVR frame already calibrated for anchor");
                return frame;
            }
        }
        let frame = CalibrationFrame::from_sample(sample, anchor_epoch);
        info!(
            origin_x = frame.origin.x,
            origin_z = frame.origin.y,
            yaw_deg = frame.yaw_deg(),
            anchor_epoch,
            "CVR calibrated"
        );
        self.frame = Some(frame);
        frame
    }

    /// Drop the current frame
    pub fn invalidate(&mut self) {
        if self.frame.take().is_some() {
            info!("CVR frame invalidated");
        }
    }

    /// Invalidate the frame if it belongs to a different anchor
    ///
    /// Returns true when the frame was dropped.
    pub fn sync_anchor(&mut self, anchor_epoch: Option<u64>) -> bool {
        match (self.frame, anchor_epoch) {
            (Some(frame), Some(epoch)) if frame.anchor_epoch == epoch => false,
            (Some(_), _) => {
                self.invalidate();
                true
            }
            (None, _) => false,
        }
    }

    fn outbound_frame(&self) -> Result<Option<&CalibrationFrame>> {
        if !self.use_cvr {
            return Ok(None);
        }
        self.frame.as_ref().map(Some).ok_or(Error::NotCalibrated)
    }

    fn inbound_frame(&self) -> Option<&CalibrationFrame> {
        if self.use_cvr {
            self.frame.as_ref()
        } else {
            None
        }
    }

    /// Room XZ -> wire XZ
    pub fn to_wire_xz(&self, room: Vec2) -> Result<Vec2> {
        Ok(match self.outbound_frame()? {
            Some(frame) => frame.to_cvr(room),
            None => room,
        })
    }

    /// Room yaw -> wire yaw
    pub fn to_wire_yaw(&self, yaw_deg: f32) -> Result<f32> {
        Ok(match self.outbound_frame()? {
            Some(frame) => frame.yaw_to_cvr(yaw_deg),
            None => normalize_yaw_deg(yaw_deg),
        })
    }

    /// Room point -> wire point
    pub fn to_wire_point(&self, room: Vec3) -> Result<Vec3> {
        Ok(match self.outbound_frame()? {
            Some(frame) => frame.point_to_cvr(room),
            None => room,
        })
    }

    /// Wire XZ -> room XZ
    pub fn from_wire_xz(&self, wire: Vec2) -> Vec2 {
        match self.inbound_frame() {
            Some(frame) => frame.to_room(wire),
            None => wire,
        }
    }

    /// Wire yaw -> room yaw
    pub fn from_wire_yaw(&self, yaw_deg: f32) -> f32 {
        match self.inbound_frame() {
            Some(frame) => frame.yaw_to_room(yaw_deg),
            None => normalize_yaw_deg(yaw_deg),
        }
    }

    /// Wire point -> room point
    pub fn from_wire_point(&self, wire: Vec3) -> Vec3 {
        match self.inbound_frame() {
            Some(frame) => frame.point_to_room(wire),
            None => wire,
        }
    }
}
