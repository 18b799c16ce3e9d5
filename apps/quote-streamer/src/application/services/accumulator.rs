//! Deduplicating Accumulator
//!
//! Holds the current dataset snapshot and applies batches to it with the
//! merge-then-replace pattern. Snapshots are published on a tokio `watch`
//! channel: readers always see a complete version, and a batch that adds
//! nothing does not wake them.

use tokio::sync::watch;

use crate::domain::dataset::Dataset;
use crate::domain::quote::QuoteRecord;
use crate::infrastructure::metrics;

/// Counts from applying one batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MergeStats {
    /// Records appended.
    pub accepted: usize,
    /// Duplicates dropped.
    pub discarded: usize,
    /// Dataset size after the batch.
    pub dataset_len: usize,
}

/// Owner of the accumulated dataset.
#[derive(Debug)]
pub struct Accumulator {
    snapshot_tx: watch::Sender<Dataset>,
}

impl Default for Accumulator {
    fn default() -> Self {
        Self::new()
    }
}

impl Accumulator {
    /// Create an accumulator holding an empty dataset.
    #[must_use]
    pub fn new() -> Self {
        Self {
            snapshot_tx: watch::Sender::new(Dataset::empty()),
        }
    }

    /// Merge a batch into the current snapshot and publish the result.
    ///
    /// The read of the current snapshot and the replacement happen under
    /// the channel's lock, so concurrent batches never overwrite each
    /// other. Subscribers are notified only if something was accepted.
    pub fn apply(&self, batch: Vec<QuoteRecord>) -> MergeStats {
        let mut stats = MergeStats::default();

        self.snapshot_tx.send_if_modified(|current| {
            let outcome = current.merge(batch);
            stats = MergeStats {
                accepted: outcome.accepted,
                discarded: outcome.discarded,
                dataset_len: outcome.dataset.len(),
            };
            if outcome.is_unchanged() {
                return false;
            }
            *current = outcome.dataset;
            true
        });

        metrics::record_merge(stats.accepted, stats.discarded, stats.dataset_len);
        stats
    }

    /// The current snapshot.
    #[must_use]
    pub fn snapshot(&self) -> Dataset {
        self.snapshot_tx.borrow().clone()
    }

    /// Number of records accumulated so far.
    #[must_use]
    pub fn len(&self) -> usize {
        self.snapshot_tx.borrow().len()
    }

    /// Whether nothing has been accumulated yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Subscribe to published snapshots.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<Dataset> {
        self.snapshot_tx.subscribe()
    }
}
