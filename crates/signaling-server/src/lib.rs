//! Teleconsult Signaling Server Library
//!
//! This library provides the real-time signaling core for video
//! consultations:
//!
//! - Bearer token verification at the WebSocket handshake
//! - Call rooms created on first join and destroyed on last leave
//! - WebRTC offer/answer/ICE relay to the other members of a room
//! - Video, audio and screen-share toggle broadcasts
//! - Sanitized, encrypted chat with a bounded per-room transcript
//! - A per-room audit trail and an admin read API
//!
//! # Architecture
//!
//! The server uses an actor model hierarchy:
//!
//! ```text
//! RoomRegistryActor (singleton per server instance)
//! └── supervises N RoomActors
//!     └── RoomActor (one per active call room)
//!         ├── owns participants, chat transcript and audit log
//!         └── pushes events into per-connection outbound queues
//!             └── ConnectionActor (one per WebSocket, drains the queue)
//! ```
//!
//! Every operation on a room is serialized through that room's mailbox.
//! Rooms are independent, so nothing coordinates across rooms.
//!
//! # Modules
//!
//! - [`actors`] - Room registry, room and connection actors
//! - [`auth`] - Identity verification and session identities
//! - [`audit`] - Per-room audit trail
//! - [`chat`] - Chat sanitization and transcript encryption
//! - [`config`] - Service configuration from environment
//! - [`errors`] - Error types with client-safe codes
//! - [`protocol`] - WebSocket event envelopes
//! - [`routes`] - HTTP router, admin API and application state
//! - [`ws`] - WebSocket upgrade and per-connection session loop

pub mod actors;
pub mod audit;
pub mod auth;
pub mod chat;
pub mod config;
pub mod errors;
pub mod handlers;
pub mod middleware;
pub mod observability;
pub mod protocol;
pub mod routes;
pub mod ws;
