//! Message types for actor communication.
//!
//! All inter-actor communication uses strongly-typed message passing via `tokio::sync::mpsc`.
//! Response patterns use `tokio::sync::oneshot` for request-reply semantics.

use super::connection::ConnectionHandle;
use super::room::RoomActorHandle;
use crate::audit::AuditEvent;
use crate::auth::SessionIdentity;
use crate::errors::SignalingError;
use crate::protocol::{ParticipantInfo, SignalBody};
use common::types::{ConnectionId, RoomId};
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::oneshot;

/// Messages sent to `RoomRegistryActor`.
#[derive(Debug)]
pub enum RegistryMessage {
    /// Find or create the room and enqueue a join on it.
    ///
    /// The registry replies as soon as the join is queued; the join outcome
    /// arrives on the receiver inside [`PendingJoin`].
    Join {
        room_id: RoomId,
        appointment_id: String,
        member: Arc<SessionIdentity>,
        outbound: ConnectionHandle,
        respond_to: oneshot::Sender<Result<PendingJoin, SignalingError>>,
    },

    /// Look up a live room.
    GetRoom {
        room_id: RoomId,
        respond_to: oneshot::Sender<Option<RoomActorHandle>>,
    },

    /// Sent by a room actor whose last participant left.
    RoomEmptied {
        room_id: RoomId,
        /// Instance number of the reporting room, so a stale report cannot
        /// remove a newer room with the same id.
        instance: u64,
        respond_to: oneshot::Sender<()>,
    },

    /// Registry statistics for the admin API.
    GetStats {
        respond_to: oneshot::Sender<RegistryStats>,
    },

    /// Close every room and stop.
    Shutdown { respond_to: oneshot::Sender<()> },
}

/// A join that the registry has queued on a room actor.
#[derive(Debug)]
pub struct PendingJoin {
    pub room: RoomActorHandle,
    pub outcome: oneshot::Receiver<Result<JoinOutcome, SignalingError>>,
}

/// Messages sent to `RoomActor`.
#[derive(Debug)]
pub enum RoomMessage {
    /// Add a connection to the room (idempotent per connection).
    Join {
        member: Arc<SessionIdentity>,
        outbound: ConnectionHandle,
        respond_to: oneshot::Sender<Result<JoinOutcome, SignalingError>>,
    },

    /// Remove a connection. Not being a member is a silent no-op.
    Leave {
        connection_id: ConnectionId,
        respond_to: oneshot::Sender<Result<(), SignalingError>>,
    },

    /// Relay a negotiation message to the other members.
    Relay {
        from: ConnectionId,
        target_user_id: String,
        body: SignalBody,
        respond_to: oneshot::Sender<Result<(), SignalingError>>,
    },

    /// Update one of the sender's media flags and tell the others.
    Toggle {
        from: ConnectionId,
        toggle: MediaToggle,
        respond_to: oneshot::Sender<Result<(), SignalingError>>,
    },

    /// Append a chat message and broadcast it to everyone.
    Chat {
        from: ConnectionId,
        message: String,
        message_type: Option<String>,
        respond_to: oneshot::Sender<Result<(), SignalingError>>,
    },

    /// Tell the others the call ended, then leave.
    EndCall {
        from: ConnectionId,
        reason: Option<String>,
        respond_to: oneshot::Sender<Result<(), SignalingError>>,
    },

    /// Audit records, oldest first.
    GetAuditEvents {
        respond_to: oneshot::Sender<Vec<AuditEvent>>,
    },

    /// Snapshot of the room (for tests and debugging).
    GetState { respond_to: oneshot::Sender<RoomState> },
}

/// Media flag change requested by a participant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaToggle {
    Video(bool),
    Audio(bool),
    ScreenShare(bool),
}

impl MediaToggle {
    #[must_use]
    pub fn enabled(&self) -> bool {
        match self {
            MediaToggle::Video(enabled)
            | MediaToggle::Audio(enabled)
            | MediaToggle::ScreenShare(enabled) => *enabled,
        }
    }
}

/// Result of a successful join.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinOutcome {
    /// Participants after the join.
    pub participant_count: usize,
    /// The connection was already a member; only `room-joined` was resent.
    pub rejoined: bool,
}

/// Room state snapshot.
#[derive(Debug, Clone)]
pub struct RoomState {
    pub room_id: RoomId,
    pub appointment_id: String,
    pub participants: Vec<ParticipantInfo>,
    pub transcript_len: usize,
    pub audit_len: usize,
    pub is_recording: bool,
}

/// Registry statistics, as served by `GET /api/v1/rooms/stats`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistryStats {
    pub active_rooms: usize,
    pub total_connections: usize,
    pub total_participants: usize,
    pub rooms: Vec<RoomSummary>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomSummary {
    pub room_id: RoomId,
    pub appointment_id: String,
    pub participant_count: usize,
    pub created_at: String,
    pub age_seconds: i64,
}
