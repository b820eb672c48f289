//! Actor model implementation for the signaling server.
//!
//! ```text
//! RoomRegistryActor (singleton per server instance)
//! └── supervises N RoomActors
//!     └── RoomActor (one per active call room)
//!         ├── owns participants, chat transcript and audit log
//!         └── pushes events to ConnectionHandles
//!             └── ConnectionActor (one per WebSocket, writes frames)
//! ```
//!
//! # Key Design Decisions
//!
//! - **One task per room**: every state change of a room is serialized through its mailbox
//! - **CancellationToken propagation**: the registry owns the root token; rooms get child tokens
//! - **Non-blocking fan-out**: rooms enqueue outbound events with `try_send` and never wait on a socket
//! - **No wait cycles**: rooms await the registry (empty report); the registry never awaits a room
//!
//! # Modules
//!
//! - [`registry`] - `RoomRegistryActor` singleton that creates and destroys rooms
//! - [`room`] - `RoomActor` per call room
//! - [`connection`] - `ConnectionActor` outbound writer per WebSocket
//! - [`messages`] - Message types for actor communication
//! - [`metrics`] - Mailbox monitoring and actor metrics

pub mod connection;
pub mod messages;
pub mod metrics;
pub mod registry;
pub mod room;

pub use connection::{ConnectionActor, ConnectionHandle};
pub use messages::*;
pub use metrics::{ActorMetrics, ActorType, MailboxMonitor};
pub use registry::{RoomRegistryActor, RoomRegistryHandle};
pub use room::{RoomActor, RoomActorHandle, RoomSettings};
