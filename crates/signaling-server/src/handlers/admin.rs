//! Admin read API.
//!
//! - `GET /api/v1/rooms/stats` - Registry statistics
//! - `GET /api/v1/rooms/{room_id}/audit` - Audit trail of a live room
//!
//! Both require an admin bearer token (see [`crate::middleware::require_admin`]).

use crate::actors::RegistryStats;
use crate::audit::AuditEvent;
use crate::auth::SessionIdentity;
use crate::errors::SignalingError;
use crate::routes::AppState;
use axum::{
    extract::{Path, State},
    Extension, Json,
};
use common::types::RoomId;
use serde::Serialize;
use std::sync::Arc;
use tracing::instrument;

/// Response body of the audit endpoint.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomAuditResponse {
    pub room_id: RoomId,
    pub events: Vec<AuditEvent>,
}

/// Handler for GET /api/v1/rooms/stats
#[instrument(skip_all, name = "signaling.admin.stats")]
pub async fn get_room_stats(
    State(state): State<Arc<AppState>>,
    Extension(admin): Extension<Arc<SessionIdentity>>,
) -> Result<Json<RegistryStats>, SignalingError> {
    let stats = state.registry.stats().await?;

    tracing::debug!(
        target: "signaling.admin",
        connection_id = %admin.connection_id,
        active_rooms = stats.active_rooms,
        "Served room stats"
    );

    Ok(Json(stats))
}

/// Handler for GET /api/v1/rooms/{room_id}/audit
///
/// Returns 404 if no live room has this id. A room that closes while the
/// request is in flight is reported the same way.
#[instrument(skip_all, name = "signaling.admin.audit")]
pub async fn get_room_audit(
    State(state): State<Arc<AppState>>,
    Extension(admin): Extension<Arc<SessionIdentity>>,
    Path(room_id): Path<String>,
) -> Result<Json<RoomAuditResponse>, SignalingError> {
    let room_id =
        RoomId::parse(&room_id).ok_or_else(|| SignalingError::RoomNotFound(room_id.clone()))?;

    let room = state
        .registry
        .get_room(room_id.clone())
        .await?
        .ok_or_else(|| SignalingError::RoomNotFound(room_id.to_string()))?;

    let events = room.audit_events().await.map_err(|e| match e {
        SignalingError::RoomClosed => SignalingError::RoomNotFound(room_id.to_string()),
        other => other,
    })?;

    tracing::debug!(
        target: "signaling.admin",
        connection_id = %admin.connection_id,
        room_id = %room_id,
        events = events.len(),
        "Served room audit trail"
    );

    Ok(Json(RoomAuditResponse { room_id, events }))
}
