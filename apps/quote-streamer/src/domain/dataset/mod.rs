//! Accumulated Dataset
//!
//! The ordered, duplicate-free history of every quote received during a
//! view's lifetime.
//!
//! # Design
//!
//! A [`Dataset`] is an immutable snapshot. Merging a batch never touches the
//! receiver's records; it yields a new snapshot, so a renderer holding an
//! older version keeps a consistent view.
//!
//! Membership is answered by an index mapping each `(stock, timestamp)` to
//! the position of its record. The index is append-only and shared by every
//! snapshot of one lineage: a snapshot of length `n` sees exactly the keys
//! at positions below `n`. Merging from the newest snapshot extends the
//! shared index in place, so the duplicate check and the index update cost
//! time proportional to the batch. Merging from an older snapshot forks a
//! private index rebuilt from its own records.

use std::collections::hash_map::Entry;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Serialize, Serializer};

use super::quote::{QuoteKey, QuoteRecord, Symbol};

// =============================================================================
// Pure Merge
// =============================================================================

/// Append the novel records of `incoming` to `existing`.
///
/// A record is novel when no record in `existing`, and no record accepted
/// earlier from the same batch, shares its `(stock, timestamp)`. Novel
/// records keep their batch order. `existing` is left untouched.
#[must_use]
pub fn merge(existing: &[QuoteRecord], incoming: &[QuoteRecord]) -> Vec<QuoteRecord> {
    let mut seen: HashSet<(&Symbol, &DateTime<Utc>)> =
        existing.iter().map(QuoteRecord::key_ref).collect();

    let mut merged = Vec::with_capacity(existing.len() + incoming.len());
    merged.extend_from_slice(existing);
    merged.extend(
        incoming
            .iter()
            .filter(|record| seen.insert(record.key_ref()))
            .cloned(),
    );
    merged
}

// =============================================================================
// Dataset Snapshot
// =============================================================================

/// Key positions for one lineage of snapshots.
#[derive(Debug, Default)]
struct KeyIndex {
    positions: HashMap<QuoteKey, usize>,
}

impl KeyIndex {
    fn from_records(records: &[QuoteRecord]) -> Self {
        Self {
            positions: records
                .iter()
                .enumerate()
                .map(|(position, record)| (record.key(), position))
                .collect(),
        }
    }

    /// Number of records the index covers.
    fn covered(&self) -> usize {
        self.positions.len()
    }
}

/// Immutable snapshot of the accumulated quotes.
///
/// Cloning is cheap: records and index are shared.
#[derive(Debug, Clone, Default)]
pub struct Dataset {
    records: Arc<Vec<QuoteRecord>>,
    index: Arc<RwLock<KeyIndex>>,
    version: u64,
}

/// Result of merging a batch into a snapshot.
#[derive(Debug, Clone)]
pub struct MergeOutcome {
    /// The snapshot after the merge. Same version as the input when
    /// nothing was accepted.
    pub dataset: Dataset,
    /// Records appended.
    pub accepted: usize,
    /// Records dropped as duplicates.
    pub discarded: usize,
}

impl MergeOutcome {
    /// Whether the batch contributed nothing new.
    #[must_use]
    pub const fn is_unchanged(&self) -> bool {
        self.accepted == 0
    }
}

impl Dataset {
    /// An empty dataset.
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// Number of records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether no record has been accepted yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Records in insertion order.
    #[must_use]
    pub fn records(&self) -> &[QuoteRecord] {
        &self.records
    }

    /// Iterate over records in insertion order.
    pub fn iter(&self) -> std::slice::Iter<'_, QuoteRecord> {
        self.records.iter()
    }

    /// Number of snapshots that led to this one. Starts at zero and only
    /// moves when a merge accepts at least one record.
    #[must_use]
    pub const fn version(&self) -> u64 {
        self.version
    }

    /// Whether an observation with this identity has been accepted.
    #[must_use]
    pub fn contains(&self, key: &QuoteKey) -> bool {
        self.index
            .read()
            .positions
            .get(key)
            .is_some_and(|&position| position < self.records.len())
    }

    /// Most recent record accepted for a symbol.
    #[must_use]
    pub fn latest_for(&self, stock: &Symbol) -> Option<&QuoteRecord> {
        self.records.iter().rev().find(|record| &record.stock == stock)
    }

    /// Merge a batch, producing a new snapshot.
    ///
    /// `self` is not modified. When the batch holds nothing novel the
    /// returned snapshot shares storage with `self`.
    #[must_use]
    pub fn merge(&self, incoming: Vec<QuoteRecord>) -> MergeOutcome {
        let total = incoming.len();
        let base = self.records.len();
        let mut novel = Vec::with_capacity(total);

        let mut shared = self.index.write();
        let mut forked = None;
        let index: &mut KeyIndex = if shared.covered() == base {
            &mut *shared
        } else {
            forked.insert(KeyIndex::from_records(&self.records))
        };

        for record in incoming {
            if let Entry::Vacant(slot) = index.positions.entry(record.key()) {
                slot.insert(base + novel.len());
                novel.push(record);
            }
        }
        drop(shared);

        let accepted = novel.len();
        let discarded = total - accepted;

        if accepted == 0 {
            return MergeOutcome {
                dataset: self.clone(),
                accepted,
                discarded,
            };
        }

        let mut records = Vec::with_capacity(base + accepted);
        records.extend_from_slice(&self.records);
        records.extend(novel);

        let index = forked.map_or_else(
            || Arc::clone(&self.index),
            |index| Arc::new(RwLock::new(index)),
        );

        MergeOutcome {
            dataset: Self {
                records: Arc::new(records),
                index,
                version: self.version + 1,
            },
            accepted,
            discarded,
        }
    }
}

impl<'a> IntoIterator for &'a Dataset {
    type Item = &'a QuoteRecord;
    type IntoIter = std::slice::Iter<'a, QuoteRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl Serialize for Dataset {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.records.as_slice().serialize(serializer)
    }
}

// =============================================================================
// Tests
// =============================================================================
