//! Secret types for protecting sensitive values from accidental logging.
//!
//! Re-exports the [`secrecy`] types used for the token verification secret and
//! the chat transcript key material. `Debug` on these types is redacted, so a
//! config struct that derives or hand-writes `Debug` cannot leak them through
//! `tracing` fields.
//!
//! # Usage Guidelines
//!
//! Use `SecretString` for:
//! - Bearer token verification secrets
//! - Base64-encoded key material read from the environment
//!
//! Use `SecretBox<Vec<u8>>` for:
//! - Decoded binary keys (e.g. the chat transcript master key)
//!
//! Secrets are zeroized on drop.
//!
//! ```rust
//! use common::secret::{ExposeSecret, SecretString};
//!
//! let secret = SecretString::from("signing-secret");
//! assert!(!format!("{secret:?}").contains("signing-secret"));
//! assert_eq!(secret.expose_secret(), "signing-secret");
//! ```

pub use secrecy::{ExposeSecret, SecretBox, SecretString};
