//! Domain Layer - Quote records and the accumulated dataset.
//!
//! Pure types with no runtime dependencies: the identity rule for
//! observations and the merge that keeps the history duplicate-free.

/// Quote records, symbols and observation identity.
pub mod quote;

/// Immutable dataset snapshots and the deduplicating merge.
pub mod dataset;
