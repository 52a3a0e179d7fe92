#![cfg_attr(
    test,
    allow(
        clippy::unwrap_used,
        clippy::expect_used,
        clippy::float_cmp,
        clippy::significant_drop_tightening,
        clippy::too_many_lines,
        clippy::match_same_arms,
        clippy::needless_pass_by_value,
        clippy::needless_collect,
        clippy::option_if_let_else,
        clippy::default_trait_access,
        clippy::items_after_statements,
        clippy::or_fun_call
    )
)]

//! AlphaTrade Stream - Market Data Streaming Client
//!
//! Maintains a persistent WebSocket connection to the AlphaTrade quote
//! dispatch server, decodes its binary tick frames into typed records,
//! normalizes exchange fixed-point prices, and routes each record to the
//! callback registered for its kind. Subscriptions survive reconnects.
//!
//! # Layers (inside → outside)
//!
//! - **Domain**: Core types with no I/O
//!   - `instrument`: Exchange codes, instruments, feed modes
//!   - `streaming`: Frame kinds and normalized tick records
//!   - `subscription`: Subscription registry and replay
//!
//! - **Application**: Port definitions and services
//!   - `ports`: Instrument lookup and access token provider
//!   - `services`: Bounded status message log
//!
//! - **Infrastructure**: Adapters and external integrations
//!   - `alphatrade`: Codec, normalizer, dispatcher, connection supervisor
//!   - `instruments`: In-memory instrument catalog
//!   - `config`: Environment configuration
//!   - `metrics`: Prometheus instrumentation
//!   - `telemetry`: Tracing subscriber and OTLP export
//!
//! # Data Flow
//!
//! ```text
//!                   ┌─────────────┐   ┌────────────┐   ┌────────────┐
//! Quote server ────►│ Supervisor  │──►│ Dispatcher │──►│ Callbacks  │
//!   (binary WS)     │ (read loop) │   │ decode +   │   │ tick, dpr, │
//!        ▲          └─────────────┘   │ normalize  │   │ oi, status │
//!        │                 ▲          └────────────┘   └────────────┘
//!        │  subscribe/ping │
//!        └─────────────────┴──── StreamClient ◄── SubscriptionRegistry
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::pedantic)]

// =============================================================================
// Module Declarations
// =============================================================================

/// Domain layer - Core streaming types with no external dependencies.
pub mod domain;

/// Application layer - Port definitions and services.
pub mod application;

/// Infrastructure layer - Adapters and external integrations.
pub mod infrastructure;

// =============================================================================
// Re-exports
// =============================================================================

// Domain types
pub use domain::instrument::{Exchange, FeedMode, Instrument};
pub use domain::streaming::{CallbackSlot, FrameKind, TickRecord};
pub use domain::subscription::{
    StatusFeed, SubscriptionCommand, SubscriptionError, SubscriptionRegistry,
};

// Ports
pub use application::ports::{AccessTokenProvider, InstrumentLookup, StaticAccessToken, TokenError};

// Stream client
pub use infrastructure::alphatrade::{
    ClientError, ConnectionState, DecodeError, StreamClient, StreamClientBuilder, SupervisorError,
};

// Infrastructure config
pub use infrastructure::config::{ClientConfig, ConfigError, StreamSettings, SubscriptionSpec};

// Reference data
pub use infrastructure::instruments::{CatalogError, InstrumentCatalog};

// Metrics
pub use infrastructure::metrics::init_metrics;

// Telemetry
pub use infrastructure::telemetry::{TelemetryConfig, TelemetryGuard, init as init_telemetry};
