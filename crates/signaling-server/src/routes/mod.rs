//! HTTP routes for the signaling server.
//!
//! Defines the Axum router and application state.

use crate::actors::{ActorMetrics, RoomRegistryHandle, RoomSettings};
use crate::auth::IdentityVerifier;
use crate::chat::{ChatChannel, ChatCipher};
use crate::config::Config;
use crate::errors::SignalingError;
use crate::handlers;
use crate::middleware::require_admin;
use crate::ws;
use axum::{middleware, routing::get, Router};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    /// Bearer token verifier for handshakes and the admin API.
    pub verifier: Arc<IdentityVerifier>,

    /// Handle to the room registry actor.
    pub registry: RoomRegistryHandle,

    /// Actor-level counters (rooms, connections, panics).
    pub metrics: Arc<ActorMetrics>,

    /// Per-connection outbound queue capacity.
    pub outbound_queue_size: usize,

    /// Cancelled on server shutdown; every WebSocket session holds a child token.
    pub shutdown: CancellationToken,
}

impl AppState {
    /// Build the application state and spawn the room registry.
    ///
    /// # Errors
    ///
    /// Returns `SignalingError::Internal` if the chat key material is unusable.
    pub fn new(config: &Config, metrics: Arc<ActorMetrics>) -> Result<Self, SignalingError> {
        let key_material = config
            .chat_key_material()
            .map_err(|e| SignalingError::Internal(format!("chat key: {e}")))?;
        let cipher = ChatCipher::new(&key_material)?;
        let chat = Arc::new(ChatChannel::new(cipher, config.max_chat_message_length));

        let settings = RoomSettings {
            history_limit: config.chat_history_limit,
            history_window: config.chat_history_window,
        };

        let registry = RoomRegistryHandle::new(
            config.instance_id.clone(),
            chat,
            settings,
            Arc::clone(&metrics),
        );

        let verifier = Arc::new(IdentityVerifier::new(
            &config.jwt_secret,
            Duration::from_secs(config.jwt_clock_skew_seconds),
        ));

        Ok(Self {
            verifier,
            registry,
            metrics,
            outbound_queue_size: config.outbound_queue_size,
            shutdown: CancellationToken::new(),
        })
    }
}

/// Build the application routes.
///
/// Creates an Axum router with:
/// - `/ws` - WebSocket signaling endpoint (token verified before upgrade)
/// - `/api/v1/rooms/stats` - Registry statistics (admin)
/// - `/api/v1/rooms/{room_id}/audit` - Audit trail of a room (admin)
/// - TraceLayer for request logging
pub fn build_routes(state: Arc<AppState>) -> Router {
    let public_routes = Router::new().route("/ws", get(ws::ws_handler));

    let admin_routes = Router::new()
        .route("/api/v1/rooms/stats", get(handlers::get_room_stats))
        .route(
            "/api/v1/rooms/:room_id/audit",
            get(handlers::get_room_audit),
        )
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            require_admin,
        ));

    Router::new()
        .merge(public_routes)
        .merge(admin_routes)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn test_config() -> Config {
        let vars = HashMap::from([
            (
                "SIGNALING_JWT_SECRET".to_string(),
                "routes-unit-test-secret".to_string(),
            ),
            (
                "SIGNALING_CHAT_ENCRYPTION_KEY".to_string(),
                "AQEBAQEBAQEBAQEBAQEBAQEBAQEBAQEBAQEBAQEBAQE=".to_string(),
            ),
        ]);
        Config::from_vars(&vars).unwrap()
    }

    #[test]
    fn test_app_state_is_clone() {
        fn assert_clone<T: Clone>() {}
        assert_clone::<AppState>();
    }

    #[tokio::test]
    async fn test_app_state_from_config() {
        let state = AppState::new(&test_config(), ActorMetrics::new()).unwrap();

        assert_eq!(state.outbound_queue_size, 256);
        assert!(!state.shutdown.is_cancelled());

        let stats = state.registry.stats().await.unwrap();
        assert_eq!(stats.active_rooms, 0);

        state.registry.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_build_routes() {
        let state = Arc::new(AppState::new(&test_config(), ActorMetrics::new()).unwrap());
        let _router = build_routes(Arc::clone(&state));
        state.registry.shutdown().await.unwrap();
    }
}
