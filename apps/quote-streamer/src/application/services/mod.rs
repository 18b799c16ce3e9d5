//! Application Services
//!
//! Services that orchestrate domain logic and coordinate between ports.
//!
//! - `Accumulator`: owns the dataset and applies the deduplicating merge
//! - `PollScheduler`: Idle/Streaming/Retired state machine driving the record source
//! - `ViewBinder`: mounts a view, renders snapshots, guarantees teardown

/// Dataset ownership and batch merging.
pub mod accumulator;
/// View lifecycle and render loop.
pub mod binder;
/// Poll timer state machine.
pub mod scheduler;

pub use accumulator::{Accumulator, MergeStats};
pub use binder::{BinderConfig, ViewBinder};
pub use scheduler::{
    DEFAULT_CADENCE, MIN_CADENCE, PollScheduler, SchedulerConfig, SchedulerError, SchedulerState,
    SchedulerStatus, StartOutcome, StopOutcome,
};
