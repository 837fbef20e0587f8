//! JSON wire messages
//!
//! Handshake endpoint:
//! - client: `{"name": "<display name>"}`
//! - server: `{"player": "<slot id>", "id": "<session id>"}`
//!
//! Main endpoint:
//! - client pose: `{"coordinate": {"x", "z", "r"}, "hand": {"x", "y", "z"} | null, "grabbedItemId": string | null}`
//! - client item pose: `{"type": "item_pose", "id", "px", "py", "pz"}`
//! - server snapshot: `{"players": [...], "items": [...]}`
//!
//! Positions on the main endpoint are CVR space when CVR is enabled.

use crate::error::{Error, Result};
use glam::{Vec2, Vec3};
use roomsync_core::{ItemId, PlayerId, SessionId, SessionIdentity};
use serde::{Deserialize, Deserializer, Serialize};

/// Phase-1 identification message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Hello {
    pub name: String,
}

/// Phase-1 reply assigning the identity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HandshakeReply {
    pub player: String,
    pub id: String,
}

impl HandshakeReply {
    /// Parse a reply; both ids must be present and non-empty
    pub fn parse(text: &str) -> Result<SessionIdentity> {
        let reply: HandshakeReply = serde_json::from_str(text)?;
        if reply.player.is_empty() || reply.id.is_empty() {
            return Err(Error::Protocol(format!("incomplete handshake reply: {}", text)));
        }
        Ok(SessionIdentity::new(
            PlayerId::new(reply.player),
            SessionId::new(reply.id),
        ))
    }
}

/// Planar pose: position on the floor plane plus yaw in degrees
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    pub x: f32,
    pub z: f32,
    pub r: f32,
}

impl Coordinate {
    pub fn new(xz: Vec2, yaw_deg: f32) -> Self {
        Self {
            x: xz.x,
            z: xz.y,
            r: yaw_deg,
        }
    }

    pub fn xz(&self) -> Vec2 {
        Vec2::new(self.x, self.z)
    }
}

/// Hand position
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WireHand {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl From<Vec3> for WireHand {
    fn from(v: Vec3) -> Self {
        Self {
            x: v.x,
            y: v.y,
            z: v.z,
        }
    }
}

impl From<WireHand> for Vec3 {
    fn from(h: WireHand) -> Self {
        Vec3::new(h.x, h.y, h.z)
    }
}

/// Periodic pose message sent on the main channel
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PoseMessage {
    pub coordinate: Coordinate,
    pub hand: Option<WireHand>,
    #[serde(rename = "grabbedItemId", default, deserialize_with = "non_empty_item")]
    pub grabbed_item_id: Option<ItemId>,
}

/// Position of the item this device is streaming
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemPoseMessage {
    pub id: ItemId,
    pub px: f32,
    pub py: f32,
    pub pz: f32,
}

impl ItemPoseMessage {
    pub fn new(id: ItemId, position: Vec3) -> Self {
        Self {
            id,
            px: position.x,
            py: position.y,
            pz: position.z,
        }
    }

    pub fn position(&self) -> Vec3 {
        Vec3::new(self.px, self.py, self.pz)
    }
}

/// Messages that carry a `"type"` discriminator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TaggedMessage {
    ItemPose(ItemPoseMessage),
}

/// One player entry of a server snapshot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerEntry {
    pub id: String,
    pub x: f32,
    pub z: f32,
    #[serde(default)]
    pub r: f32,
    #[serde(default)]
    pub hand: Option<WireHand>,
    #[serde(rename = "grabbedItemId", default, deserialize_with = "non_empty_item")]
    pub grabbed_item_id: Option<ItemId>,
}

impl PlayerEntry {
    pub fn coordinate(&self) -> Coordinate {
        Coordinate {
            x: self.x,
            z: self.z,
            r: self.r,
        }
    }
}

/// One item entry of a server snapshot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemEntry {
    pub id: ItemId,
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl ItemEntry {
    pub fn position(&self) -> Vec3 {
        Vec3::new(self.x, self.y, self.z)
    }
}

/// Snapshot broadcast by the server
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerSnapshot {
    pub players: Vec<PlayerEntry>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub items: Vec<ItemEntry>,
}

/// Decode a main-channel message as a snapshot
///
/// Messages without a `players` array are rejected.
pub fn decode_snapshot(text: &str) -> Result<ServerSnapshot> {
    Ok(serde_json::from_str(text)?)
}

/// Serialize any outbound message
pub fn encode<T: Serialize>(message: &T) -> Result<String> {
    Ok(serde_json::to_string(message)?)
}

fn non_empty_item<'de, D>(deserializer: D) -> std::result::Result<Option<ItemId>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    Ok(raw.filter(|s| !s.is_empty()).map(ItemId::new))
}

fn null_as_empty<'de, D, T>(deserializer: D) -> std::result::Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Ok(Option::<Vec<T>>::deserialize(deserializer)?.unwrap_or_default())
}
