//! Infrastructure Layer - Adapters and external integrations.
//!
//! This layer contains the concrete implementations of the port interfaces
//! defined in the application layer, plus process plumbing.

/// Record source adapters (HTTP, simulated).
pub mod source;

/// Visualization sink adapters.
pub mod sink;

/// Environment configuration.
pub mod config;

/// Control, health and metrics HTTP endpoint.
pub mod control;

/// Prometheus metrics instrumentation.
pub mod metrics;

/// OpenTelemetry tracing integration.
pub mod telemetry;
