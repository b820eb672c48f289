//! Middleware for the signaling server.
//!
//! # Components
//!
//! - `auth` - Admin authentication for the read API

pub mod auth;

pub use auth::require_admin;
