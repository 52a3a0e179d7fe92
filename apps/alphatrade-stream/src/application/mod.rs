//! Application Layer - Ports and services.
//!
//! This layer contains the port interfaces the streaming core consumes and
//! the services that hold application-visible state.

/// Port interfaces for external collaborators (reference data, session).
pub mod ports;

/// Application services (status message retention).
pub mod services;
