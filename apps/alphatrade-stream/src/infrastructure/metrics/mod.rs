//! Prometheus Metrics Module
//!
//! Exposes stream client metrics in Prometheus format.
//!
//! # Metrics Categories
//!
//! - **Frames**: Counts of frames received by kind and dropped by reason
//! - **Connection**: Connection state, transport errors and reconnects
//! - **Subscriptions**: Active subscription counts by mode
//! - **Latency**: Per-frame decode and dispatch latency
//!
//! # Integration
//!
//! When a port is configured the exporter serves `/metrics` on it. Without
//! an installed recorder every recording function is a no-op.

use std::time::Duration;

use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

// =============================================================================
// Initialization
// =============================================================================

/// Install the Prometheus recorder and its HTTP listener on `port`.
///
/// A port of `0` leaves metrics disabled.
///
/// # Errors
///
/// Returns an error if a recorder is already installed or the listener
/// cannot be built. Must be called from within a Tokio runtime.
pub fn init_metrics(port: u16) -> Result<bool, BuildError> {
    if port == 0 {
        return Ok(false);
    }

    PrometheusBuilder::new()
        .with_http_listener(([0, 0, 0, 0], port))
        .install()?;

    register_metrics();
    Ok(true)
}

// =============================================================================
// Metric Registration
// =============================================================================

fn register_metrics() {
    // Frame counters
    describe_counter!(
        "alphatrade_stream_frames_received_total",
        "Total binary frames decoded and dispatched, by kind"
    );
    describe_counter!(
        "alphatrade_stream_frames_dropped_total",
        "Total binary frames dropped, by reason"
    );
    describe_counter!(
        "alphatrade_stream_commands_sent_total",
        "Total control commands written to the socket"
    );

    // Connection
    describe_gauge!(
        "alphatrade_stream_connection_state",
        "Connection state (0 disconnected, 1 connecting, 2 connected)"
    );
    describe_counter!(
        "alphatrade_stream_transport_errors_total",
        "Total transport errors by type"
    );
    describe_counter!(
        "alphatrade_stream_reconnects_total",
        "Total reconnection attempts"
    );

    // Subscriptions
    describe_gauge!(
        "alphatrade_stream_subscriptions",
        "Number of subscribed instruments by feed mode"
    );

    // Latency
    describe_histogram!(
        "alphatrade_stream_frame_processing_seconds",
        "Time to decode, normalize and dispatch one frame"
    );
}

// =============================================================================
// Metric Recording Functions
// =============================================================================

/// Record a dispatched frame.
pub fn record_frame_received(kind: &'static str) {
    counter!("alphatrade_stream_frames_received_total", "kind" => kind).increment(1);
}

/// Record a dropped frame.
pub fn record_frame_dropped(reason: &'static str) {
    counter!("alphatrade_stream_frames_dropped_total", "reason" => reason).increment(1);
}

/// Record a control command written to the socket.
pub fn record_command_sent(action: &'static str) {
    counter!("alphatrade_stream_commands_sent_total", "action" => action).increment(1);
}

/// Update the connection state gauge.
pub fn set_connection_state(state: f64) {
    gauge!("alphatrade_stream_connection_state").set(state);
}

/// Record a transport error.
pub fn record_transport_error(error_type: &'static str) {
    counter!(
        "alphatrade_stream_transport_errors_total",
        "error_type" => error_type
    )
    .increment(1);
}

/// Record a reconnection attempt.
pub fn record_reconnect() {
    counter!("alphatrade_stream_reconnects_total").increment(1);
}

/// Update the subscription count for a feed mode.
#[allow(clippy::cast_precision_loss)]
pub fn set_subscriptions(mode: &'static str, count: usize) {
    gauge!("alphatrade_stream_subscriptions", "mode" => mode).set(count as f64);
}

/// Record frame processing duration.
pub fn record_processing_duration(kind: &'static str, duration: Duration) {
    histogram!(
        "alphatrade_stream_frame_processing_seconds",
        "kind" => kind
    )
    .record(duration.as_secs_f64());
}

// =============================================================================
// Tests
// =============================================================================
