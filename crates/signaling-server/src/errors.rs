//! Signaling server error types.
//!
//! Every error maps to a stable string code used in WebSocket `error` events
//! and to an HTTP status for the admin API. Internal details are logged
//! server-side but not exposed to clients.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

/// Signaling server error type.
///
/// Maps to client error codes:
/// - `Unauthenticated`: `UNAUTHORIZED` (HTTP 401)
/// - `Forbidden`: `FORBIDDEN` (HTTP 403)
/// - `NotInRoom`: `NOT_IN_ROOM` (HTTP 403)
/// - `RoomNotFound`: `NOT_FOUND` (HTTP 404)
/// - `Malformed`: `MALFORMED_REQUEST` (HTTP 400)
/// - `RoomClosed`: `ROOM_CLOSED` (HTTP 409)
/// - `Internal`: `INTERNAL_ERROR` (HTTP 500)
#[derive(Debug, Error)]
pub enum SignalingError {
    /// Bearer token missing, invalid or expired.
    #[error("Authentication failed: {0}")]
    Unauthenticated(String),

    /// Authenticated, but the role may not perform this operation.
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// The connection is not a participant of the named room.
    #[error("Not a participant of this room")]
    NotInRoom,

    /// Room does not exist (admin API).
    #[error("Room not found: {0}")]
    RoomNotFound(String),

    /// Request is missing required fields or has invalid values.
    #[error("Malformed request: {0}")]
    Malformed(String),

    /// The room stopped while the request was in flight.
    #[error("Room is closed")]
    RoomClosed,

    /// Internal error (channel failure, crypto failure, ...).
    #[error("Internal error: {0}")]
    Internal(String),
}

impl SignalingError {
    /// Stable error code sent to clients.
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            SignalingError::Unauthenticated(_) => "UNAUTHORIZED",
            SignalingError::Forbidden(_) => "FORBIDDEN",
            SignalingError::NotInRoom => "NOT_IN_ROOM",
            SignalingError::RoomNotFound(_) => "NOT_FOUND",
            SignalingError::Malformed(_) => "MALFORMED_REQUEST",
            SignalingError::RoomClosed => "ROOM_CLOSED",
            SignalingError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// HTTP status code for this error.
    #[must_use]
    pub fn status_code(&self) -> StatusCode {
        match self {
            SignalingError::Unauthenticated(_) => StatusCode::UNAUTHORIZED,
            SignalingError::Forbidden(_) | SignalingError::NotInRoom => StatusCode::FORBIDDEN,
            SignalingError::RoomNotFound(_) => StatusCode::NOT_FOUND,
            SignalingError::Malformed(_) => StatusCode::BAD_REQUEST,
            SignalingError::RoomClosed => StatusCode::CONFLICT,
            SignalingError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Returns a client-safe error message (no internal details).
    #[must_use]
    pub fn client_message(&self) -> String {
        match self {
            SignalingError::Unauthenticated(_) => "Authentication failed".to_string(),
            SignalingError::NotInRoom => "You are not a participant of this room".to_string(),
            SignalingError::RoomNotFound(_) => "Room not found".to_string(),
            SignalingError::RoomClosed => "Room is closed, please rejoin".to_string(),
            SignalingError::Internal(_) => "An internal error occurred".to_string(),
            SignalingError::Forbidden(msg) | SignalingError::Malformed(msg) => msg.clone(),
        }
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    code: String,
    message: String,
}

impl IntoResponse for SignalingError {
    fn into_response(self) -> Response {
        if let SignalingError::Internal(err) = &self {
            tracing::error!(target: "signaling.http", error = %err, "Request failed");
        }

        let status = self.status_code();
        let error_response = ErrorResponse {
            error: ErrorDetail {
                code: self.code().to_string(),
                message: self.client_message(),
            },
        };

        let mut response = (status, Json(error_response)).into_response();

        if status == StatusCode::UNAUTHORIZED {
            if let Ok(header_value) =
                "Bearer realm=\"teleconsult-signaling\", error=\"invalid_token\"".parse()
            {
                response
                    .headers_mut()
                    .insert("WWW-Authenticate", header_value);
            }
        }

        response
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use axum::body::Body;
    use http_body_util::BodyExt;

    async fn read_body_json(body: Body) -> serde_json::Value {
        let bytes = body.collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[test]
    fn test_error_code_mapping() {
        assert_eq!(
            SignalingError::Unauthenticated("expired".to_string()).code(),
            "UNAUTHORIZED"
        );
        assert_eq!(
            SignalingError::Forbidden("role".to_string()).code(),
            "FORBIDDEN"
        );
        assert_eq!(SignalingError::NotInRoom.code(), "NOT_IN_ROOM");
        assert_eq!(
            SignalingError::RoomNotFound("r".to_string()).code(),
            "NOT_FOUND"
        );
        assert_eq!(
            SignalingError::Malformed("roomId".to_string()).code(),
            "MALFORMED_REQUEST"
        );
        assert_eq!(SignalingError::RoomClosed.code(), "ROOM_CLOSED");
        assert_eq!(
            SignalingError::Internal("boom".to_string()).code(),
            "INTERNAL_ERROR"
        );
    }

    #[test]
    fn test_client_messages_hide_internal_details() {
        let err = SignalingError::Internal("mailbox closed for room appt-42".to_string());
        assert_eq!(err.client_message(), "An internal error occurred");

        let err = SignalingError::Unauthenticated("InvalidSignature".to_string());
        assert_eq!(err.client_message(), "Authentication failed");
    }

    #[test]
    fn test_display_formatting() {
        assert_eq!(
            format!("{}", SignalingError::Malformed("missing roomId".to_string())),
            "Malformed request: missing roomId"
        );
        assert_eq!(
            format!("{}", SignalingError::NotInRoom),
            "Not a participant of this room"
        );
    }

    #[tokio::test]
    async fn test_unauthorized_response_has_www_authenticate() {
        let response = SignalingError::Unauthenticated("missing".to_string()).into_response();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        let header = response
            .headers()
            .get("WWW-Authenticate")
            .unwrap()
            .to_str()
            .unwrap();
        assert!(header.contains("invalid_token"));

        let body = read_body_json(response.into_body()).await;
        assert_eq!(body["error"]["code"], "UNAUTHORIZED");
        assert_eq!(body["error"]["message"], "Authentication failed");
    }

    #[tokio::test]
    async fn test_not_found_response() {
        let response = SignalingError::RoomNotFound("appt-1".to_string()).into_response();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert!(response.headers().get("WWW-Authenticate").is_none());

        let body = read_body_json(response.into_body()).await;
        assert_eq!(body["error"]["code"], "NOT_FOUND");
        assert_eq!(body["error"]["message"], "Room not found");
    }

    #[tokio::test]
    async fn test_internal_response_is_generic() {
        let response = SignalingError::Internal("secret detail".to_string()).into_response();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = read_body_json(response.into_body()).await;
        assert_eq!(body["error"]["message"], "An internal error occurred");
    }
}
