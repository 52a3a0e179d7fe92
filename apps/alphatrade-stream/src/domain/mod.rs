//! Domain Layer - Core streaming types and subscription state.
//!
//! This layer contains the instrument model, normalized tick records, and
//! the subscription registry. Nothing here performs I/O.

/// Exchange code table, instruments, and feed modes.
pub mod instrument;

/// Normalized market data records and frame kinds.
pub mod streaming;

/// Subscription tracking and reconnect replay.
pub mod subscription;
