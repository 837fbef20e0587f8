//! Identity types for players, sessions and items

use serde::{Deserialize, Serialize};
use std::fmt;

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            /// Create a new ID
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            /// Get the ID as a string slice
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self::new(s)
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }
    };
}

string_id! {
    /// Player slot identifier assigned by the handshake (e.g. `"p1"`)
    ///
    /// Snapshot player entries are keyed by this type as well.
    PlayerId
}

string_id! {
    /// Session / user identifier assigned by the handshake
    SessionId
}

string_id! {
    /// Globally unique identifier of an interactive item (e.g. `"sword1"`)
    ItemId
}

/// The identity a device holds once the handshake has completed
///
/// Both ids are stable for the lifetime of the installation unless the
/// identity is explicitly reset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionIdentity {
    /// Player slot id, used to parameterize the main channel URL
    pub slot: PlayerId,
    /// Session / user id
    pub session: SessionId,
}

impl SessionIdentity {
    /// Create a new identity
    pub fn new(slot: impl Into<PlayerId>, session: impl Into<SessionId>) -> Self {
        Self {
            slot: slot.into(),
            session: session.into(),
        }
    }

    /// Whether a snapshot entry id refers to this device
    ///
    /// Servers key player entries by either the slot or the session id, so
    /// both are accepted.
    pub fn matches(&self, id: &str) -> bool {
        self.slot.as_str() == id || self.session.as_str() == id
    }
}

impl fmt::Display for SessionIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.slot, self.session)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_item_id() {
        let id = ItemId::new("sword1");
        assert_eq!(id.as_str(), "sword1");
        assert_eq!(format!("{}", id), "sword1");
    }

    #[test]
    fn test_identity_matches_slot_or_session() {
        let identity = SessionIdentity::new("p7", "abc123");
        assert!(identity.matches("p7"));
        assert!(identity.matches("abc123"));
        assert!(!identity.matches("p2"));
        assert_eq!(identity.to_string(), "p7/abc123");
    }

    #[test]
    fn test_ids_serialize_transparently() {
        let json = ron::to_string(&PlayerId::new("p2")).unwrap();
        assert_eq!(json, "\"p2\"");
    }
}
