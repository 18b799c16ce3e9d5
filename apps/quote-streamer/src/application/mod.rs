//! Application Layer - Use cases and port definitions.
//!
//! This layer contains the polling services and the port interfaces
//! that define how the pipeline talks to its record source and renderer.

/// Port interfaces for external systems (record source, visualization sink).
pub mod ports;

/// Lifecycle and merge notifications for observers.
pub mod events;

/// Accumulator, poll scheduler and view binder.
pub mod services;
