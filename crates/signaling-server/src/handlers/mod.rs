//! HTTP request handlers for the signaling server.

pub mod admin;

pub use admin::{get_room_audit, get_room_stats};
