//! WebSocket transport.
//!
//! `GET /ws` verifies the bearer credential (query `token` or
//! `Authorization: Bearer`) before upgrading. A rejected handshake gets an
//! HTTP 401 and never reaches the session loop, so an unauthenticated
//! connection has no path to the room registry.
//!
//! - [`session`] - Per-connection read loop and event dispatch

pub mod session;

use crate::auth::bearer_token;
use crate::errors::SignalingError;
use crate::observability::metrics as prom;
use crate::routes::AppState;
use axum::{
    extract::{ws::WebSocketUpgrade, Query, State},
    http::HeaderMap,
    response::{IntoResponse, Response},
};
use serde::Deserialize;
use std::sync::Arc;
use tracing::{debug, instrument};

/// Query parameters accepted on the upgrade request.
#[derive(Debug, Default, Deserialize)]
pub struct WsParams {
    #[serde(default)]
    pub token: Option<String>,
}

/// Handler for GET /ws
#[instrument(skip_all, name = "signaling.ws.handshake")]
pub async fn ws_handler(
    State(state): State<Arc<AppState>>,
    Query(params): Query<WsParams>,
    headers: HeaderMap,
    ws: WebSocketUpgrade,
) -> Response {
    let Some(token) = bearer_token(&headers, params.token.as_deref()) else {
        debug!(target: "signaling.ws", "Handshake rejected: no credential");
        prom::record_handshake("rejected");
        return SignalingError::Unauthenticated("missing bearer token".to_string())
            .into_response();
    };

    let identity = match state.verifier.admit(token) {
        Ok(identity) => identity,
        Err(e) => {
            prom::record_handshake("rejected");
            return e.into_response();
        }
    };

    prom::record_handshake("accepted");
    debug!(
        target: "signaling.ws",
        connection_id = %identity.connection_id,
        role = %identity.role,
        "Handshake accepted"
    );

    ws.on_upgrade(move |socket| session::run(socket, state, identity))
}
