//! Observability for the signaling server.
//!
//! # Privacy by Default
//!
//! Handlers and actor loops use `#[instrument(skip_all)]` with explicit
//! safe fields. SDP, ICE and chat text are never logged, only their sizes.
//!
//! # Metrics
//!
//! | Metric | Type | Labels | Purpose |
//! |--------|------|--------|---------|
//! | `signaling_rooms_active` | Gauge | none | Current call rooms |
//! | `signaling_connections_active` | Gauge | none | Current admitted sockets |
//! | `signaling_actor_mailbox_depth` | Gauge | `actor_type` | Backpressure indicator |
//! | `signaling_handshakes_total` | Counter | `outcome` | Accepted/rejected upgrades |
//! | `signaling_events_total` | Counter | `event`, `outcome` | Client events handled |
//! | `signaling_event_latency_seconds` | Histogram | `event` | Event processing time |
//! | `signaling_relays_total` | Counter | `kind` | Relayed negotiation messages |
//! | `signaling_actor_panics_total` | Counter | `actor_type` | Actor task panics |
//! | `signaling_messages_dropped_total` | Counter | `actor_type` | Outbound backpressure drops |

pub mod health;
pub mod metrics;

pub use health::{health_router, HealthState};
pub use metrics::{
    init_metrics_recorder, record_actor_panic, record_event, record_handshake,
    record_message_dropped, record_relay, set_actor_mailbox_depth, set_connections_active,
    set_rooms_active,
};
