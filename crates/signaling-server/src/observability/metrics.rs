//! Metrics definitions for the signaling server.
//!
//! All metrics follow Prometheus naming conventions:
//! - `signaling_` prefix
//! - `_total` suffix for counters
//! - `_seconds` suffix for duration histograms
//!
//! # Cardinality
//!
//! Labels are bounded:
//! - `actor_type`: 3 values (registry, room, connection)
//! - `event`: bounded by the client event set (~10 values)
//! - `outcome`: `ok` plus the error codes (~8 values)
//! - `kind`: offer, answer, ice-candidate
//!
//! Room ids, user ids and payloads are never used as labels.

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};
use std::time::Duration;

/// Initialize Prometheus metrics recorder and return the handle
/// for serving metrics via HTTP.
///
/// Must be called before any metrics are recorded.
///
/// # Errors
///
/// Returns error if Prometheus recorder fails to install (e.g., already installed).
pub fn init_metrics_recorder() -> Result<PrometheusHandle, String> {
    PrometheusBuilder::new()
        // Event handling is in-memory; p99 target well under 50ms
        .set_buckets_for_metric(
            Matcher::Prefix("signaling_event_latency".to_string()),
            &[
                0.0005, 0.001, 0.0025, 0.005, 0.010, 0.025, 0.050, 0.100, 0.250, 1.000,
            ],
        )
        .map_err(|e| format!("Failed to set event latency buckets: {e}"))?
        .install_recorder()
        .map_err(|e| format!("Failed to install Prometheus metrics recorder: {e}"))
}

// ============================================================================
// Rooms & Connections (Gauges)
// ============================================================================

/// Set the number of active rooms.
///
/// Metric: `signaling_rooms_active`
pub fn set_rooms_active(count: usize) {
    // usize to f64 conversion is safe for realistic room counts (< 2^53)
    #[allow(clippy::cast_precision_loss)]
    gauge!("signaling_rooms_active").set(count as f64);
}

/// Set the number of admitted WebSocket connections.
///
/// Metric: `signaling_connections_active`
pub fn set_connections_active(count: usize) {
    #[allow(clippy::cast_precision_loss)]
    gauge!("signaling_connections_active").set(count as f64);
}

/// Set the mailbox depth for an actor type.
///
/// Metric: `signaling_actor_mailbox_depth`
/// Labels: `actor_type`
pub fn set_actor_mailbox_depth(actor_type: &str, depth: usize) {
    #[allow(clippy::cast_precision_loss)]
    gauge!("signaling_actor_mailbox_depth", "actor_type" => actor_type.to_string())
        .set(depth as f64);
}

// ============================================================================
// Handshakes & Events (Counters / Histograms)
// ============================================================================

/// Record a WebSocket handshake attempt.
///
/// Metric: `signaling_handshakes_total`
/// Labels: `outcome` (accepted, rejected)
pub fn record_handshake(outcome: &str) {
    counter!("signaling_handshakes_total", "outcome" => outcome.to_string()).increment(1);
}

/// Record one handled client event and its processing latency.
///
/// Metrics: `signaling_events_total`, `signaling_event_latency_seconds`
/// Labels: `event`, `outcome` (`ok` or an error code)
pub fn record_event(event: &str, outcome: &str, duration: Duration) {
    counter!(
        "signaling_events_total",
        "event" => event.to_string(),
        "outcome" => outcome.to_string()
    )
    .increment(1);
    histogram!("signaling_event_latency_seconds", "event" => event.to_string())
        .record(duration.as_secs_f64());
}

/// Record a relayed negotiation message.
///
/// Metric: `signaling_relays_total`
/// Labels: `kind` (offer, answer, ice-candidate)
pub fn record_relay(kind: &str) {
    counter!("signaling_relays_total", "kind" => kind.to_string()).increment(1);
}

// ============================================================================
// Actor Health
// ============================================================================

/// Record an actor panic.
///
/// Metric: `signaling_actor_panics_total`
/// Labels: `actor_type`
pub fn record_actor_panic(actor_type: &str) {
    counter!("signaling_actor_panics_total", "actor_type" => actor_type.to_string()).increment(1);
}

/// Record an outbound message dropped because a connection queue was full
/// or closed.
///
/// Metric: `signaling_messages_dropped_total`
/// Labels: `actor_type`
pub fn record_message_dropped(actor_type: &str) {
    counter!("signaling_messages_dropped_total", "actor_type" => actor_type.to_string())
        .increment(1);
}
