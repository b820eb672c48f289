//! Authentication middleware for the admin API.
//!
//! Extracts the Bearer token from the Authorization header, verifies it with
//! the same verifier as the WebSocket handshake, and requires the `admin`
//! role. The resulting [`crate::auth::SessionIdentity`] is stored in request extensions.

use crate::auth::bearer_token;
use crate::errors::SignalingError;
use crate::routes::AppState;
use axum::{
    extract::{Request, State},
    middleware::Next,
    response::IntoResponse,
};
use std::sync::Arc;
use tracing::instrument;

/// Authentication middleware for admin routes.
///
/// # Response
///
/// - Returns 401 Unauthorized if the token is missing or invalid
/// - Returns 403 Forbidden if the caller is not an admin
/// - Continues to the handler with `Arc<SessionIdentity>` in extensions otherwise
#[instrument(skip_all, name = "signaling.middleware.auth")]
pub async fn require_admin(
    State(state): State<Arc<AppState>>,
    mut req: Request,
    next: Next,
) -> Result<impl IntoResponse, SignalingError> {
    let token = bearer_token(req.headers(), None).ok_or_else(|| {
        tracing::debug!(target: "signaling.auth", "Missing Authorization header");
        SignalingError::Unauthenticated("missing bearer token".to_string())
    })?;

    let identity = state.verifier.admit(token)?;

    if !identity.role.is_admin() {
        tracing::debug!(
            target: "signaling.auth",
            role = %identity.role,
            "Admin API access denied"
        );
        return Err(SignalingError::Forbidden("Admin role required".to_string()));
    }

    req.extensions_mut().insert(Arc::new(identity));

    Ok(next.run(req).await)
}
