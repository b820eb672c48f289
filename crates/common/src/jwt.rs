//! Bearer token utilities shared by the signaling services.
//!
//! This module provides the token checks that do not depend on a particular
//! signing scheme:
//! - Size limits for DoS prevention
//! - Clock skew constants and `iat` validation
//! - The `UserClaims` structure carried by client bearer tokens
//!
//! # Security
//!
//! - Tokens are size-checked BEFORE parsing (DoS prevention)
//! - Generic error messages prevent information leakage
//! - The user `id` and `email` in claims are redacted in Debug output
//!
//! # Usage
//!
//! ```rust,ignore
//! use common::jwt::{check_token_size, validate_iat, DEFAULT_CLOCK_SKEW};
//!
//! check_token_size(token)?;
//! // ... verify signature, decode UserClaims ...
//! if let Some(iat) = claims.iat {
//!     validate_iat(iat, DEFAULT_CLOCK_SKEW)?;
//! }
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use thiserror::Error;

// =============================================================================
// Constants
// =============================================================================

/// Maximum allowed JWT size in bytes (8KB).
///
/// Client tokens are a few hundred bytes; anything larger is rejected before
/// base64 decoding or signature verification.
pub const MAX_JWT_SIZE_BYTES: usize = 8192;

/// Default JWT clock skew tolerance (5 minutes).
///
/// Tokens with an `iat` further than this in the future are rejected.
pub const DEFAULT_CLOCK_SKEW: Duration = Duration::from_secs(300);

/// Maximum allowed JWT clock skew tolerance (10 minutes).
pub const MAX_CLOCK_SKEW: Duration = Duration::from_secs(600);

/// Display name used when a token carries neither `name` nor `email`.
pub const UNKNOWN_DISPLAY_NAME: &str = "Unknown";

// =============================================================================
// Error Types
// =============================================================================

/// Errors that can occur during token validation.
///
/// All variants render the same client-facing message. Details are logged at
/// debug level.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum JwtValidationError {
    /// Token size exceeds maximum allowed.
    #[error("The access token is invalid or expired")]
    TokenTooLarge,

    /// Token is empty or not a three-part JWT.
    #[error("The access token is invalid or expired")]
    MalformedToken,

    /// Token `iat` claim is too far in the future.
    #[error("The access token is invalid or expired")]
    IatTooFarInFuture,
}

// =============================================================================
// Claims Types
// =============================================================================

/// The `user` object embedded in client bearer tokens.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserClaim {
    /// User identifier - redacted in Debug output.
    pub id: String,

    /// Role name as issued (`patient`, `doctor`, `admin`, ...).
    pub role: String,

    /// Human-readable name, if the issuer provided one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Email address, used as a display-name fallback - redacted in Debug output.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

impl fmt::Debug for UserClaim {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UserClaim")
            .field("id", &"[REDACTED]")
            .field("role", &self.role)
            .field("name", &self.name)
            .field("email", &self.email.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

impl UserClaim {
    /// Display name for this user: `name`, else `email`, else a placeholder.
    ///
    /// Blank values are skipped.
    #[must_use]
    pub fn display_name(&self) -> String {
        self.name
            .as_deref()
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .or_else(|| {
                self.email
                    .as_deref()
                    .map(str::trim)
                    .filter(|e| !e.is_empty())
            })
            .unwrap_or(UNKNOWN_DISPLAY_NAME)
            .to_string()
    }
}

/// Client bearer token claims.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserClaims {
    /// The authenticated user.
    pub user: UserClaim,

    /// Expiration timestamp (Unix epoch seconds).
    pub exp: i64,

    /// Issued-at timestamp (Unix epoch seconds), if present.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iat: Option<i64>,
}

// =============================================================================
// Functions
// =============================================================================

/// Reject empty or oversized tokens before any parsing happens.
///
/// # Errors
///
/// - `TokenTooLarge` - Token exceeds `MAX_JWT_SIZE_BYTES`
/// - `MalformedToken` - Token is empty or does not have three dot-separated parts
pub fn check_token_size(token: &str) -> Result<(), JwtValidationError> {
    if token.len() > MAX_JWT_SIZE_BYTES {
        tracing::debug!(
            target: "common.jwt",
            token_size = token.len(),
            max_size = MAX_JWT_SIZE_BYTES,
            "Token rejected: size exceeds maximum allowed"
        );
        return Err(JwtValidationError::TokenTooLarge);
    }

    if token.is_empty() || token.split('.').count() != 3 {
        tracing::debug!(target: "common.jwt", "Token rejected: invalid JWT format");
        return Err(JwtValidationError::MalformedToken);
    }

    Ok(())
}

/// Validate the `iat` (issued-at) claim with clock skew tolerance.
///
/// # Errors
///
/// Returns `JwtValidationError::IatTooFarInFuture` if the iat timestamp is more than
/// `clock_skew` in the future.
pub fn validate_iat(iat: i64, clock_skew: Duration) -> Result<(), JwtValidationError> {
    let now = chrono::Utc::now().timestamp();
    validate_iat_at(iat, clock_skew, now)
}

/// Deterministic `iat` validation against an explicit `now` timestamp.
pub(crate) fn validate_iat_at(
    iat: i64,
    clock_skew: Duration,
    now: i64,
) -> Result<(), JwtValidationError> {
    // clock_skew is bounded to MAX_CLOCK_SKEW by config loading
    #[allow(clippy::cast_possible_wrap)]
    let clock_skew_secs = clock_skew.as_secs() as i64;
    let max_iat = now + clock_skew_secs;

    if iat > max_iat {
        tracing::debug!(
            target: "common.jwt",
            iat = iat,
            now = now,
            max_allowed = max_iat,
            "Token rejected: iat too far in the future"
        );
        return Err(JwtValidationError::IatTooFarInFuture);
    }

    Ok(())
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::cast_possible_wrap)]
mod tests {
    use super::*;

    fn claim(name: Option<&str>, email: Option<&str>) -> UserClaim {
        UserClaim {
            id: "user-123".to_string(),
            role: "doctor".to_string(),
            name: name.map(ToString::to_string),
            email: email.map(ToString::to_string),
        }
    }

    #[test]
    fn test_constants() {
        assert_eq!(MAX_JWT_SIZE_BYTES, 8192);
        assert_eq!(DEFAULT_CLOCK_SKEW, Duration::from_secs(300));
        assert_eq!(MAX_CLOCK_SKEW, Duration::from_secs(600));
    }

    // -------------------------------------------------------------------------
    // check_token_size Tests
    // -------------------------------------------------------------------------

    #[test]
    fn test_check_token_size_accepts_three_parts() {
        assert!(check_token_size("header.payload.signature").is_ok());
    }

    #[test]
    fn test_check_token_size_rejects_malformed() {
        assert_eq!(
            check_token_size(""),
            Err(JwtValidationError::MalformedToken)
        );
        assert_eq!(
            check_token_size("only.two"),
            Err(JwtValidationError::MalformedToken)
        );
        assert_eq!(
            check_token_size("a.b.c.d"),
            Err(JwtValidationError::MalformedToken)
        );
    }

    #[test]
    fn test_check_token_size_rejects_oversized() {
        let oversized = format!("{}.b.c", "a".repeat(MAX_JWT_SIZE_BYTES));
        assert_eq!(
            check_token_size(&oversized),
            Err(JwtValidationError::TokenTooLarge)
        );
    }

    #[test]
    fn test_check_token_size_at_limit() {
        let filler = "a".repeat(MAX_JWT_SIZE_BYTES - 4);
        let token = format!("{filler}.b.c");
        assert_eq!(token.len(), MAX_JWT_SIZE_BYTES);
        assert!(check_token_size(&token).is_ok());
    }

    // -------------------------------------------------------------------------
    // validate_iat Tests
    // -------------------------------------------------------------------------

    #[test]
    fn test_validate_iat_past_and_present() {
        let now = 1_700_000_000;
        assert!(validate_iat_at(now, DEFAULT_CLOCK_SKEW, now).is_ok());
        assert!(validate_iat_at(now - 3600, DEFAULT_CLOCK_SKEW, now).is_ok());
    }

    #[test]
    fn test_validate_iat_boundary() {
        let now = 1_700_000_000;
        let skew = DEFAULT_CLOCK_SKEW.as_secs() as i64;
        assert!(validate_iat_at(now + skew, DEFAULT_CLOCK_SKEW, now).is_ok());
        assert_eq!(
            validate_iat_at(now + skew + 1, DEFAULT_CLOCK_SKEW, now),
            Err(JwtValidationError::IatTooFarInFuture)
        );
    }

    #[test]
    fn test_validate_iat_wall_clock() {
        let now = chrono::Utc::now().timestamp();
        assert!(validate_iat(now, DEFAULT_CLOCK_SKEW).is_ok());
        assert!(validate_iat(now + 3600, DEFAULT_CLOCK_SKEW).is_err());
    }

    // -------------------------------------------------------------------------
    // Claims Tests
    // -------------------------------------------------------------------------

    #[test]
    fn test_display_name_prefers_name() {
        assert_eq!(
            claim(Some("Dr. Grey"), Some("grey@example.com")).display_name(),
            "Dr. Grey"
        );
    }

    #[test]
    fn test_display_name_falls_back_to_email() {
        assert_eq!(
            claim(None, Some("grey@example.com")).display_name(),
            "grey@example.com"
        );
        assert_eq!(
            claim(Some("   "), Some("grey@example.com")).display_name(),
            "grey@example.com"
        );
    }

    #[test]
    fn test_display_name_placeholder() {
        assert_eq!(claim(None, None).display_name(), UNKNOWN_DISPLAY_NAME);
    }

    #[test]
    fn test_user_claim_debug_redacts_identifiers() {
        let debug = format!("{:?}", claim(Some("Dr. Grey"), Some("grey@example.com")));
        assert!(!debug.contains("user-123"));
        assert!(!debug.contains("grey@example.com"));
        assert!(debug.contains("[REDACTED]"));
        assert!(debug.contains("doctor"));
    }

    #[test]
    fn test_claims_deserialize_without_optional_fields() {
        let json = r#"{"user":{"id":"u1","role":"patient"},"exp":1900000000}"#;
        let claims: UserClaims = serde_json::from_str(json).unwrap();
        assert_eq!(claims.user.id, "u1");
        assert_eq!(claims.user.role, "patient");
        assert!(claims.user.name.is_none());
        assert!(claims.iat.is_none());
    }
}
