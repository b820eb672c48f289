//! Session identities and roles.

use common::jwt::UserClaims;
use common::types::ConnectionId;
use serde::{Serialize, Serializer};
use std::fmt;

/// Role carried in a client bearer token.
///
/// Unrecognised roles still authenticate but cannot join rooms.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Role {
    Patient,
    Doctor,
    Admin,
    /// Any other role string, lowercased.
    Other(String),
}

impl Role {
    /// Parse a role claim (case-insensitive, surrounding whitespace ignored).
    #[must_use]
    pub fn parse(raw: &str) -> Self {
        let normalized = raw.trim().to_ascii_lowercase();
        match normalized.as_str() {
            "patient" => Role::Patient,
            "doctor" => Role::Doctor,
            "admin" => Role::Admin,
            _ => Role::Other(normalized),
        }
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Role::Patient => "patient",
            Role::Doctor => "doctor",
            Role::Admin => "admin",
            Role::Other(other) => other,
        }
    }

    /// Whether this role may join call rooms.
    ///
    /// Any of patient, doctor or admin may join any room; there is no
    /// per-appointment assignment check.
    #[must_use]
    pub fn can_join_rooms(&self) -> bool {
        matches!(self, Role::Patient | Role::Doctor | Role::Admin)
    }

    /// Whether this role may use the operational read API.
    #[must_use]
    pub fn is_admin(&self) -> bool {
        matches!(self, Role::Admin)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for Role {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

/// Identity of one admitted connection.
///
/// Created once at handshake and immutable for the connection's lifetime.
/// Shared by reference (`Arc`) with the rooms the connection joins.
#[derive(Clone, PartialEq, Eq)]
pub struct SessionIdentity {
    pub connection_id: ConnectionId,
    pub user_id: String,
    pub role: Role,
    pub display_name: String,
}

impl SessionIdentity {
    /// Build an identity for a new connection from verified claims.
    #[must_use]
    pub fn from_claims(connection_id: ConnectionId, claims: &UserClaims) -> Self {
        Self {
            connection_id,
            user_id: claims.user.id.clone(),
            role: Role::parse(&claims.user.role),
            display_name: claims.user.display_name(),
        }
    }
}

/// Custom Debug implementation that redacts the user ID.
impl fmt::Debug for SessionIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionIdentity")
            .field("connection_id", &self.connection_id)
            .field("user_id", &"[REDACTED]")
            .field("role", &self.role)
            .field("display_name", &self.display_name)
            .finish()
    }
}
