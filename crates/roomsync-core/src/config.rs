//! RON configuration for a syncing device
//!
//! Every field has a default, so an empty `()` document is a valid config:
//!
//! ```ron
//! (
//!     sync: (send_hz: 20.0, use_cvr: true),
//!     room: (lens_offset: 0.03),
//!     session: (server_url: "ws://192.168.1.20:8080/ws", display_name: "quest-2"),
//! )
//! ```

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Lowest accepted send rate
pub const MIN_SEND_HZ: f32 = 5.0;
/// Highest accepted send rate
pub const MAX_SEND_HZ: f32 = 30.0;

/// Root configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub sync: SyncConfig,
    #[serde(default)]
    pub room: RoomConfig,
    #[serde(default)]
    pub session: SessionConfig,
}

impl Config {
    /// Parse a configuration from a RON document
    pub fn from_ron_str(content: &str) -> Result<Self> {
        ron::from_str(content).map_err(|e| Error::Config(e.to_string()))
    }

    /// Load configuration from a RON file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = fs::read_to_string(path.as_ref())?;
        Self::from_ron_str(&content)
    }
}

/// Pose and item sync tuning
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SyncConfig {
    /// Outbound pose messages per second, clamped to `[5, 30]`
    #[serde(default = "default_send_hz")]
    pub send_hz: f32,
    /// Remote avatar position smoothing rate (1/s)
    #[serde(default = "default_lerp")]
    pub move_lerp: f32,
    /// Remote avatar rotation smoothing rate (1/s)
    #[serde(default = "default_lerp")]
    pub rot_lerp: f32,
    /// Remote item smoothing rate (1/s)
    #[serde(default = "default_lerp")]
    pub item_lerp: f32,
    /// Send poses in the shared CVR frame instead of raw room space
    #[serde(default = "default_true")]
    pub use_cvr: bool,
    /// With CVR on, start the send loop only once a CVR frame exists
    #[serde(default = "default_true")]
    pub require_calibration: bool,
    /// Render this device's own snapshot entry as a remote agent
    #[serde(default)]
    pub render_self_from_server: bool,
    /// Attach the tracked hand position to pose messages
    #[serde(default = "default_true")]
    pub include_hand: bool,
    /// Squared speed below which a released item counts as settled
    #[serde(default = "default_settle_epsilon")]
    pub settle_velocity_epsilon: f32,
    /// Item corrections larger than this (meters) snap instead of smoothing
    #[serde(default = "default_snap_distance")]
    pub snap_distance: f32,
}

impl SyncConfig {
    /// Send rate after clamping
    pub fn effective_send_hz(&self) -> f32 {
        if self.send_hz.is_finite() {
            self.send_hz.clamp(MIN_SEND_HZ, MAX_SEND_HZ)
        } else {
            default_send_hz()
        }
    }

    /// Time between two pose messages
    pub fn send_interval(&self) -> Duration {
        Duration::from_secs_f32(1.0 / self.effective_send_hz())
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            send_hz: default_send_hz(),
            move_lerp: default_lerp(),
            rot_lerp: default_lerp(),
            item_lerp: default_lerp(),
            use_cvr: true,
            require_calibration: true,
            render_self_from_server: false,
            include_hand: true,
            settle_velocity_epsilon: default_settle_epsilon(),
            snap_distance: default_snap_distance(),
        }
    }
}

/// Floor lock and room pose settings
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RoomConfig {
    /// Camera-above-floor correction used without tracked planes (meters)
    #[serde(default = "default_lens_offset")]
    pub lens_offset: f32,
    /// Minimum `dot(normal, up)` for a plane to count as floor
    #[serde(default = "default_floor_normal_min_dot")]
    pub floor_normal_min_dot: f32,
    /// Device heights beyond this are logged as degraded
    #[serde(default = "default_max_device_height")]
    pub max_plausible_device_height: f32,
    /// Room pose smoothing, `[0, 0.9]`
    #[serde(default = "default_pose_smoothing")]
    pub pose_smoothing: f32,
}

impl Default for RoomConfig {
    fn default() -> Self {
        Self {
            lens_offset: default_lens_offset(),
            floor_normal_min_dot: default_floor_normal_min_dot(),
            max_plausible_device_height: default_max_device_height(),
            pose_smoothing: default_pose_smoothing(),
        }
    }
}

/// Server connection settings
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SessionConfig {
    /// Server base URL; a trailing `/ws` is accepted
    #[serde(default = "default_server_url")]
    pub server_url: String,
    /// Name sent in the handshake hello
    #[serde(default = "default_display_name")]
    pub display_name: String,
    #[serde(default = "default_resume_timeout")]
    pub resume_timeout_secs: f32,
    #[serde(default = "default_handshake_timeout")]
    pub handshake_timeout_secs: f32,
    /// Where the slot/session identity is persisted; in-memory when unset
    #[serde(default)]
    pub identity_path: Option<PathBuf>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            server_url: default_server_url(),
            display_name: default_display_name(),
            resume_timeout_secs: default_resume_timeout(),
            handshake_timeout_secs: default_handshake_timeout(),
            identity_path: None,
        }
    }
}

fn default_send_hz() -> f32 {
    15.0
}

fn default_lerp() -> f32 {
    12.0
}

fn default_true() -> bool {
    true
}

fn default_settle_epsilon() -> f32 {
    1e-3
}

fn default_snap_distance() -> f32 {
    1.0
}

fn default_lens_offset() -> f32 {
    0.02
}

fn default_floor_normal_min_dot() -> f32 {
    0.9
}

fn default_max_device_height() -> f32 {
    3.0
}

fn default_pose_smoothing() -> f32 {
    0.2
}

fn default_server_url() -> String {
    "ws://127.0.0.1:8080/ws".to_string()
}

fn default_display_name() -> String {
    "roomsync".to_string()
}

fn default_resume_timeout() -> f32 {
    3.0
}

fn default_handshake_timeout() -> f32 {
    5.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_document_uses_defaults() {
        let config = Config::from_ron_str("()").unwrap();
        assert_eq!(config.sync.send_hz, 15.0);
        assert!(config.sync.use_cvr);
        assert!(!config.sync.render_self_from_server);
        assert_eq!(config.room.lens_offset, 0.02);
        assert_eq!(config.session.server_url, "ws://127.0.0.1:8080/ws");
        assert!(config.session.identity_path.is_none());
    }

    #[test]
    fn test_partial_sections() {
        let config = Config::from_ron_str(
            r#"(
                sync: (send_hz: 20.0, use_cvr: false),
                session: (display_name: "quest-2", identity_path: Some("/tmp/id.ron")),
            )"#,
        )
        .unwrap();
        assert_eq!(config.sync.send_hz, 20.0);
        assert!(!config.sync.use_cvr);
        assert_eq!(config.sync.move_lerp, 12.0);
        assert_eq!(config.session.display_name, "quest-2");
        assert_eq!(
            config.session.identity_path.as_deref(),
            Some(Path::new("/tmp/id.ron"))
        );
    }

    #[test]
    fn test_send_hz_clamped() {
        let mut sync = SyncConfig {
            send_hz: 120.0,
            ..SyncConfig::default()
        };
        assert_eq!(sync.effective_send_hz(), 30.0);

        sync.send_hz = 1.0;
        assert_eq!(sync.effective_send_hz(), 5.0);
        assert_eq!(sync.send_interval(), Duration::from_secs_f32(0.2));

        sync.send_hz = f32::NAN;
        assert_eq!(sync.effective_send_hz(), 15.0);
    }

    #[test]
    fn test_malformed_config_is_error() {
        assert!(matches!(
            Config::from_ron_str("(sync: (send_hz: \"fast\"))"),
            Err(Error::Config(_))
        ));
    }
}
