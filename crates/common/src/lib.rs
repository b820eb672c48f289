//! Common utilities and types shared across the signaling workspace.

#![warn(clippy::pedantic)]

/// Module for identifier newtypes
pub mod types;

/// Module for secret types that prevent accidental logging
pub mod secret;

/// Module for bearer token utilities (size limits, clock skew, user claims)
pub mod jwt;
