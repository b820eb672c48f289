//! Bearer token verification.
//!
//! Client tokens are HS256 JWTs signed with a shared secret.
//!
//! # Security
//!
//! - Tokens are size-checked BEFORE parsing (DoS prevention)
//! - Only HS256 is accepted
//! - `exp` is required; `iat`, when present, is checked against clock skew
//! - Every failure collapses into one generic client-facing message

use crate::auth::identity::SessionIdentity;
use crate::errors::SignalingError;
use axum::http::{header::AUTHORIZATION, HeaderMap};
use common::jwt::{check_token_size, validate_iat, UserClaims};
use common::secret::{ExposeSecret, SecretString};
use common::types::ConnectionId;
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use std::time::Duration;
use tracing::instrument;

/// Verifies client bearer tokens and produces session identities.
pub struct IdentityVerifier {
    decoding_key: DecodingKey,
    validation: Validation,
    clock_skew: Duration,
}

impl IdentityVerifier {
    /// Create a verifier for tokens signed with `secret`.
    ///
    /// # Arguments
    ///
    /// * `secret` - HS256 shared secret
    /// * `clock_skew` - Tolerance for `iat` values in the future
    #[must_use]
    pub fn new(secret: &SecretString, clock_skew: Duration) -> Self {
        let decoding_key = DecodingKey::from_secret(secret.expose_secret().as_bytes());

        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = true;
        validation.leeway = 0;
        validation.validate_aud = false;
        validation.set_required_spec_claims(&["exp"]);

        Self {
            decoding_key,
            validation,
            clock_skew,
        }
    }

    /// Verify a token and return its claims.
    ///
    /// # Errors
    ///
    /// Returns `SignalingError::Unauthenticated` for every validation failure.
    #[instrument(skip_all)]
    pub fn verify(&self, token: &str) -> Result<UserClaims, SignalingError> {
        check_token_size(token).map_err(|e| {
            tracing::debug!(target: "signaling.auth", error = ?e, "Token rejected before parsing");
            SignalingError::Unauthenticated("token size or format".to_string())
        })?;

        let token_data =
            decode::<UserClaims>(token, &self.decoding_key, &self.validation).map_err(|e| {
                tracing::debug!(target: "signaling.auth", error = %e, "Token verification failed");
                SignalingError::Unauthenticated("verification failed".to_string())
            })?;
        let claims = token_data.claims;

        if let Some(iat) = claims.iat {
            validate_iat(iat, self.clock_skew).map_err(|e| {
                tracing::debug!(
                    target: "signaling.auth",
                    error = ?e,
                    "Token iat validation failed"
                );
                SignalingError::Unauthenticated("iat in the future".to_string())
            })?;
        }

        if claims.user.id.trim().is_empty() {
            tracing::debug!(target: "signaling.auth", "Token rejected: empty user id");
            return Err(SignalingError::Unauthenticated("empty user id".to_string()));
        }

        tracing::debug!(target: "signaling.auth", "Token validated successfully");
        Ok(claims)
    }

    /// Verify a handshake token and mint the identity of a new connection.
    ///
    /// # Errors
    ///
    /// Returns `SignalingError::Unauthenticated` if the token is rejected.
    pub fn admit(&self, token: &str) -> Result<SessionIdentity, SignalingError> {
        let claims = self.verify(token)?;
        Ok(SessionIdentity::from_claims(ConnectionId::new(), &claims))
    }
}

/// Extract the bearer credential from a request.
///
/// The `Authorization: Bearer` header wins over the `token` query parameter.
#[must_use]
pub fn bearer_token<'a>(headers: &'a HeaderMap, query_token: Option<&'a str>) -> Option<&'a str> {
    headers
        .get(AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        .or(query_token)
        .map(str::trim)
        .filter(|t| !t.is_empty())
}
