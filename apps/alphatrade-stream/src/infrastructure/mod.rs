//! Infrastructure Layer - Adapters and external integrations.
//!
//! This layer contains the wire protocol, the connection supervisor, and the
//! concrete implementations of the port interfaces defined in the
//! application layer.

/// AlphaTrade quote stream client (codec, dispatcher, supervisor).
pub mod alphatrade;

/// Configuration loading.
pub mod config;

/// In-memory instrument reference data.
pub mod instruments;

/// Prometheus metrics instrumentation.
pub mod metrics;

/// OpenTelemetry tracing integration.
pub mod telemetry;
