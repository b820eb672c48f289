//! Per-room audit trail.
//!
//! Each room keeps an append-only list of [`AuditEvent`]s for its lifetime.
//! Every record is also emitted as a structured tracing event on the
//! `signaling.audit` target so log shipping can retain it past the room.
//!
//! # Privacy
//!
//! Records carry identifiers and flags only. Chat text, SDP and ICE payloads
//! never appear in an audit record.

use common::types::RoomId;
use serde::Serialize;
use serde_json::Value;
use std::fmt;
use uuid::Uuid;

/// Kind of auditable action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditEventType {
    Joined,
    Left,
    WebrtcOffer,
    WebrtcAnswer,
    VideoToggled,
    AudioToggled,
    ScreenShareToggled,
    ChatMessage,
    CallEnded,
}

impl AuditEventType {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            AuditEventType::Joined => "joined",
            AuditEventType::Left => "left",
            AuditEventType::WebrtcOffer => "webrtc_offer",
            AuditEventType::WebrtcAnswer => "webrtc_answer",
            AuditEventType::VideoToggled => "video_toggled",
            AuditEventType::AudioToggled => "audio_toggled",
            AuditEventType::ScreenShareToggled => "screen_share_toggled",
            AuditEventType::ChatMessage => "chat_message",
            AuditEventType::CallEnded => "call_ended",
        }
    }
}

impl fmt::Display for AuditEventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One audit record. Never mutated after creation.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditEvent {
    pub id: Uuid,
    pub room_id: RoomId,
    pub user_id: String,
    pub event_type: AuditEventType,
    pub metadata: Value,
    pub timestamp: String,
}

/// Append-only audit log owned by a room actor.
#[derive(Debug)]
pub struct AuditLog {
    room_id: RoomId,
    events: Vec<AuditEvent>,
}

impl AuditLog {
    #[must_use]
    pub fn new(room_id: RoomId) -> Self {
        Self {
            room_id,
            events: Vec::new(),
        }
    }

    /// Append a record and emit it to the audit log target.
    pub fn record(&mut self, user_id: &str, event_type: AuditEventType, metadata: Value) {
        let event = AuditEvent {
            id: Uuid::now_v7(),
            room_id: self.room_id.clone(),
            user_id: user_id.to_string(),
            event_type,
            metadata,
            timestamp: chrono::Utc::now().to_rfc3339(),
        };

        tracing::info!(
            target: "signaling.audit",
            audit_id = %event.id,
            room_id = %event.room_id,
            event_type = event.event_type.as_str(),
            metadata = %event.metadata,
            "Audit event recorded"
        );

        self.events.push(event);
    }

    /// All records, oldest first.
    #[must_use]
    pub fn events(&self) -> &[AuditEvent] {
        &self.events
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.events.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}
