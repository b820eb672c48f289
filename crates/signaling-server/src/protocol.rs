//! WebSocket event envelopes.
//!
//! Both directions use text frames carrying
//! `{"event": "<kebab-case name>", "data": {...}}` with camelCase fields.
//! Negotiation payloads (SDP, ICE candidates) are opaque JSON values and are
//! never inspected.

use crate::auth::Role;
use common::types::RoomId;
use serde::{Deserialize, Serialize};
use serde_json::Value;

// =============================================================================
// Client -> server
// =============================================================================

/// Event sent by a client.
#[derive(Debug, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "kebab-case")]
pub enum ClientEvent {
    JoinRoom(JoinRoomRequest),
    LeaveRoom(RoomRequest),
    WebrtcOffer(OfferRequest),
    WebrtcAnswer(AnswerRequest),
    WebrtcIceCandidate(IceCandidateRequest),
    ToggleVideo(ToggleRequest),
    ToggleAudio(ToggleRequest),
    ScreenShare(ToggleRequest),
    ChatMessage(ChatRequest),
    CallEnded(CallEndedRequest),
}

impl ClientEvent {
    /// Event name, used as a bounded metric label.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            ClientEvent::JoinRoom(_) => "join-room",
            ClientEvent::LeaveRoom(_) => "leave-room",
            ClientEvent::WebrtcOffer(_) => "webrtc-offer",
            ClientEvent::WebrtcAnswer(_) => "webrtc-answer",
            ClientEvent::WebrtcIceCandidate(_) => "webrtc-ice-candidate",
            ClientEvent::ToggleVideo(_) => "toggle-video",
            ClientEvent::ToggleAudio(_) => "toggle-audio",
            ClientEvent::ScreenShare(_) => "screen-share",
            ClientEvent::ChatMessage(_) => "chat-message",
            ClientEvent::CallEnded(_) => "call-ended",
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinRoomRequest {
    pub room_id: String,
    pub appointment_id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomRequest {
    pub room_id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OfferRequest {
    pub room_id: String,
    pub target_user_id: String,
    pub offer: Value,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnswerRequest {
    pub room_id: String,
    pub target_user_id: String,
    pub answer: Value,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IceCandidateRequest {
    pub room_id: String,
    pub target_user_id: String,
    pub candidate: Value,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToggleRequest {
    pub room_id: String,
    pub enabled: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatRequest {
    pub room_id: String,
    pub message: String,
    #[serde(default)]
    pub message_type: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallEndedRequest {
    pub room_id: String,
    #[serde(default)]
    pub reason: Option<String>,
}

// =============================================================================
// Server -> client
// =============================================================================

/// Event pushed to a client.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", content = "data", rename_all = "kebab-case")]
pub enum ServerEvent {
    UserJoined(UserJoined),
    UserLeft(UserLeft),
    RoomJoined(RoomJoined),
    WebrtcOffer(RelayedSignal),
    WebrtcAnswer(RelayedSignal),
    WebrtcIceCandidate(RelayedSignal),
    UserVideoToggled(VideoToggled),
    UserAudioToggled(AudioToggled),
    UserScreenShare(ScreenShareToggled),
    ChatMessage(ChatMessage),
    CallEnded(CallEnded),
    Error(ErrorEvent),
}

impl ServerEvent {
    /// Wrap a relayed negotiation message in the matching event.
    #[must_use]
    pub fn relayed(signal: RelayedSignal) -> Self {
        match signal.body {
            SignalBody::Offer(_) => ServerEvent::WebrtcOffer(signal),
            SignalBody::Answer(_) => ServerEvent::WebrtcAnswer(signal),
            SignalBody::Candidate(_) => ServerEvent::WebrtcIceCandidate(signal),
        }
    }

    /// Build an `error` event.
    #[must_use]
    pub fn error(code: &str, message: impl Into<String>) -> Self {
        ServerEvent::Error(ErrorEvent {
            code: code.to_string(),
            message: message.into(),
        })
    }

    /// Event name, used in logs.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            ServerEvent::UserJoined(_) => "user-joined",
            ServerEvent::UserLeft(_) => "user-left",
            ServerEvent::RoomJoined(_) => "room-joined",
            ServerEvent::WebrtcOffer(_) => "webrtc-offer",
            ServerEvent::WebrtcAnswer(_) => "webrtc-answer",
            ServerEvent::WebrtcIceCandidate(_) => "webrtc-ice-candidate",
            ServerEvent::UserVideoToggled(_) => "user-video-toggled",
            ServerEvent::UserAudioToggled(_) => "user-audio-toggled",
            ServerEvent::UserScreenShare(_) => "user-screen-share",
            ServerEvent::ChatMessage(_) => "chat-message",
            ServerEvent::CallEnded(_) => "call-ended",
            ServerEvent::Error(_) => "error",
        }
    }
}

/// Public view of a room participant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ParticipantInfo {
    pub user_id: String,
    pub user_name: String,
    pub role: Role,
    pub video_enabled: bool,
    pub audio_enabled: bool,
    pub screen_sharing: bool,
    pub joined_at: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserJoined {
    pub user_id: String,
    pub user_name: String,
    pub role: Role,
    pub participants: Vec<ParticipantInfo>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserLeft {
    pub user_id: String,
    pub user_name: String,
    pub participants: Vec<ParticipantInfo>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomJoined {
    pub room_id: RoomId,
    pub appointment_id: String,
    pub participants: Vec<ParticipantInfo>,
    pub chat_history: Vec<ChatMessage>,
}

/// Opaque negotiation payload, keyed by its kind.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SignalBody {
    Offer(Value),
    Answer(Value),
    Candidate(Value),
}

impl SignalBody {
    /// Bounded label for metrics and logs.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            SignalBody::Offer(_) => "offer",
            SignalBody::Answer(_) => "answer",
            SignalBody::Candidate(_) => "ice-candidate",
        }
    }
}

/// Negotiation message as delivered to the other members of a room.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RelayedSignal {
    #[serde(flatten)]
    pub body: SignalBody,
    pub from_user_id: String,
    pub from_user_name: String,
    pub target_user_id: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoToggled {
    pub user_id: String,
    pub video_enabled: bool,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AudioToggled {
    pub user_id: String,
    pub audio_enabled: bool,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScreenShareToggled {
    pub user_id: String,
    pub enabled: bool,
}

/// One transcript entry. Never mutated after creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    pub id: String,
    pub user_id: String,
    pub display_name: String,
    pub role: Role,
    pub message: String,
    pub message_type: String,
    pub timestamp: String,
    pub encrypted_payload: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CallEnded {
    pub ended_by: String,
    pub ended_by_name: String,
    pub reason: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ErrorEvent {
    pub code: String,
    pub message: String,
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_join_room() {
        let event: ClientEvent = serde_json::from_value(json!({
            "event": "join-room",
            "data": {"roomId": "appt-42", "appointmentId": "42"}
        }))
        .unwrap();

        match event {
            ClientEvent::JoinRoom(req) => {
                assert_eq!(req.room_id, "appt-42");
                assert_eq!(req.appointment_id, "42");
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[test]
    fn test_parse_ice_candidate_keeps_payload_opaque() {
        let event: ClientEvent = serde_json::from_value(json!({
            "event": "webrtc-ice-candidate",
            "data": {
                "roomId": "r",
                "targetUserId": "b",
                "candidate": {"candidate": "candidate:1 1 udp 2122260223 10.0.0.1 54321 typ host", "sdpMid": "0"}
            }
        }))
        .unwrap();

        assert_eq!(event.name(), "webrtc-ice-candidate");
        let ClientEvent::WebrtcIceCandidate(req) = event else {
            panic!("wrong variant");
        };
        assert_eq!(req.candidate["sdpMid"], "0");
    }

    #[test]
    fn test_chat_message_type_is_optional() {
        let event: ClientEvent = serde_json::from_value(json!({
            "event": "chat-message",
            "data": {"roomId": "r", "message": "hi"}
        }))
        .unwrap();
        let ClientEvent::ChatMessage(req) = event else {
            panic!("wrong variant");
        };
        assert!(req.message_type.is_none());
    }

    #[test]
    fn test_missing_field_is_an_error() {
        let result: Result<ClientEvent, _> = serde_json::from_value(json!({
            "event": "toggle-video",
            "data": {"roomId": "r"}
        }));
        assert!(result.is_err());
    }

    #[test]
    fn test_unknown_event_is_an_error() {
        let result: Result<ClientEvent, _> = serde_json::from_value(json!({
            "event": "start-recording",
            "data": {"roomId": "r"}
        }));
        assert!(result.is_err());
    }

    #[test]
    fn test_relayed_offer_wire_shape() {
        let event = ServerEvent::relayed(RelayedSignal {
            body: SignalBody::Offer(json!({"type": "offer", "sdp": "v=0"})),
            from_user_id: "a".to_string(),
            from_user_name: "Alice".to_string(),
            target_user_id: "b".to_string(),
        });

        let wire = serde_json::to_value(&event).unwrap();
        assert_eq!(wire["event"], "webrtc-offer");
        assert_eq!(wire["data"]["offer"]["sdp"], "v=0");
        assert_eq!(wire["data"]["fromUserId"], "a");
        assert_eq!(wire["data"]["fromUserName"], "Alice");
        assert_eq!(wire["data"]["targetUserId"], "b");
    }

    #[test]
    fn test_relayed_candidate_uses_candidate_key() {
        let event = ServerEvent::relayed(RelayedSignal {
            body: SignalBody::Candidate(json!({"candidate": "x"})),
            from_user_id: "a".to_string(),
            from_user_name: "Alice".to_string(),
            target_user_id: "b".to_string(),
        });

        let wire = serde_json::to_value(&event).unwrap();
        assert_eq!(wire["event"], "webrtc-ice-candidate");
        assert_eq!(wire["data"]["candidate"]["candidate"], "x");
    }

    #[test]
    fn test_toggle_and_error_wire_shape() {
        let wire = serde_json::to_value(ServerEvent::UserVideoToggled(VideoToggled {
            user_id: "d".to_string(),
            video_enabled: false,
        }))
        .unwrap();
        assert_eq!(
            wire,
            json!({"event": "user-video-toggled", "data": {"userId": "d", "videoEnabled": false}})
        );

        let wire = serde_json::to_value(ServerEvent::error("NOT_IN_ROOM", "nope")).unwrap();
        assert_eq!(
            wire,
            json!({"event": "error", "data": {"code": "NOT_IN_ROOM", "message": "nope"}})
        );
    }
}
