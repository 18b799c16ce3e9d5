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

//! Quote Streamer - Polling Quote Ingestion
//!
//! Polls a quote source at a fixed cadence, keeps every distinct
//! observation exactly once, and hands each new version of the accumulated
//! dataset to a visualization sink.
//!
//! # Layers (inside -> outside)
//!
//! - **Domain**: Core data types with no I/O
//!   - `quote`: Quote records and their `(stock, timestamp)` identity
//!   - `dataset`: Immutable dataset snapshots and the deduplicating merge
//!
//! - **Application**: Use cases and port definitions
//!   - `ports`: Record source and visualization sink interfaces
//!   - `events`: Lifecycle and merge events for observers
//!   - `services`: Accumulator, poll scheduler, view binder
//!
//! - **Infrastructure**: Adapters and external integrations
//!   - `source`: HTTP and simulated record sources
//!   - `sink`: Log-based visualization sink
//!   - `config`: Environment configuration
//!   - `control`: Start/stop, status, health and metrics HTTP endpoint
//!
//! # Data Flow
//!
//! ```text
//!              tick (100ms)
//! PollScheduler ──────────► RecordSource::fetch_batch
//!                                  │
//!                                  ▼
//!                       Accumulator::apply (merge, dedup)
//!                                  │ watch<Dataset>
//!                                  ▼
//!                     ViewBinder render loop ──► VisualizationSink
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::pedantic)]

// =============================================================================
// Module Declarations
// =============================================================================

/// Domain layer - Core quote types with no external dependencies.
pub mod domain;

/// Application layer - Use cases and port definitions.
pub mod application;

/// Infrastructure layer - Adapters and external integrations.
pub mod infrastructure;

// =============================================================================
// Re-exports
// =============================================================================

// Domain types
pub use domain::dataset::{Dataset, MergeOutcome};
pub use domain::quote::{BookLevel, QuoteKey, QuoteRecord, Symbol};

// Ports and events
pub use application::events::{EventHub, SessionId, StreamEvent};
pub use application::ports::{
    RecordSource, SharedRecordSource, SharedVisualizationSink, SourceError, VisualizationSink,
};

// Services
pub use application::services::{
    Accumulator, BinderConfig, MergeStats, PollScheduler, SchedulerConfig, SchedulerError,
    SchedulerState, SchedulerStatus, StartOutcome, StopOutcome, ViewBinder,
};

// Infrastructure config
pub use infrastructure::config::{
    ConfigError, ServerSettings, SourceKind, SourceSettings, StreamerConfig,
};

// Control server
pub use infrastructure::control::{ControlServer, ControlServerError, ControlServerState};

// Adapters
pub use infrastructure::sink::TracingSink;
pub use infrastructure::source::{HttpRecordSource, SimulatedConfig, SimulatedSource};

// Metrics
pub use infrastructure::metrics::init_metrics;

// Telemetry
pub use infrastructure::telemetry::{
    TelemetryConfig, TelemetryError, TelemetryGuard, init as init_telemetry,
};
