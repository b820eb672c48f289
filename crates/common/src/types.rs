//! Identifier types shared by the signaling components.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Unique identifier for one authenticated client connection.
///
/// Minted by the server when a connection is admitted; never supplied by
/// clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConnectionId(pub Uuid);

impl ConnectionId {
    /// Create a new time-ordered connection ID.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Identifier of a call room, chosen by clients (usually derived from the
/// appointment, e.g. `appt-42`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct RoomId(String);

impl RoomId {
    /// Maximum accepted length of a room identifier, in characters.
    pub const MAX_LEN: usize = 128;

    /// Parse a client-supplied room identifier.
    ///
    /// Returns `None` for empty, whitespace-only, or over-long values.
    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() || trimmed.chars().count() > Self::MAX_LEN {
            return None;
        }
        Some(Self(trimmed.to_string()))
    }

    /// Borrow the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RoomId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_connection_ids_are_unique() {
        assert_ne!(ConnectionId::new(), ConnectionId::new());
    }

    #[test]
    fn test_room_id_parse_trims() {
        let id = RoomId::parse("  appt-42 ").unwrap();
        assert_eq!(id.as_str(), "appt-42");
        assert_eq!(id.to_string(), "appt-42");
    }

    #[test]
    fn test_room_id_rejects_empty_and_oversized() {
        assert!(RoomId::parse("").is_none());
        assert!(RoomId::parse("   ").is_none());
        assert!(RoomId::parse(&"r".repeat(RoomId::MAX_LEN + 1)).is_none());
        assert!(RoomId::parse(&"r".repeat(RoomId::MAX_LEN)).is_some());
    }

    #[test]
    fn test_room_id_serializes_as_plain_string() {
        let id = RoomId::parse("appt-7").unwrap();
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"appt-7\"");
    }
}
