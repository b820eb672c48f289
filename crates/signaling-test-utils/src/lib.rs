//! # Signaling Test Utilities
//!
//! Shared test utilities for the signaling server.
//!
//! This crate provides:
//! - Token builders (`TestTokenBuilder` for HS256 client tokens)
//! - Fixed secrets and configuration (`fixtures`)
//! - Server test harness (`TestSignalingServer` for E2E tests)
//! - WebSocket test client (`TestWsClient`)
//!
//! ## Usage
//!
//! ```rust,ignore
//! use signaling_test_utils::*;
//!
//! #[tokio::test]
//! async fn test_example() -> anyhow::Result<()> {
//!     let server = TestSignalingServer::spawn().await?;
//!     let token = TestTokenBuilder::doctor("doc-1", "Dr. Who").sign(TEST_JWT_SECRET);
//!
//!     let mut client = TestWsClient::connect(&server.ws_url_with_token(&token)).await?;
//!     client.send_event("join-room", json!({"roomId": "r1", "appointmentId": "1"})).await?;
//!     client.expect_event("room-joined").await?;
//!     Ok(())
//! }
//! ```

pub mod fixtures;
pub mod server_harness;
pub mod token_builders;
pub mod ws_client;

// Re-export commonly used items
pub use fixtures::*;
pub use server_harness::*;
pub use token_builders::*;
pub use ws_client::*;
