//! Identity verification for WebSocket handshakes and admin requests.
//!
//! - [`identity`] - `Role` and the per-connection `SessionIdentity`
//! - [`verifier`] - HS256 bearer token verification

pub mod identity;
pub mod verifier;

pub use identity::{Role, SessionIdentity};
pub use verifier::{bearer_token, IdentityVerifier};
