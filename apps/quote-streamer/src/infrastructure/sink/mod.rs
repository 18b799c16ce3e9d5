//! Visualization Sink Adapters
//!
//! [`TracingSink`] renders each snapshot as structured log lines: the row
//! count, and the latest quote per instrument at debug level.

use std::collections::BTreeMap;

use crate::application::ports::VisualizationSink;
use crate::domain::dataset::Dataset;
use crate::domain::quote::{QuoteRecord, Symbol};

/// Sink that writes snapshots to the log.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl TracingSink {
    /// Create a tracing sink.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl VisualizationSink for TracingSink {
    fn render(&self, snapshot: &Dataset) {
        tracing::info!(
            rows = snapshot.len(),
            version = snapshot.version(),
            "Dataset updated"
        );

        if tracing::enabled!(tracing::Level::DEBUG) {
            for (stock, record) in latest_by_symbol(snapshot) {
                tracing::debug!(
                    %stock,
                    timestamp = %record.timestamp,
                    price = ?record.price,
                    "Latest quote"
                );
            }
        }
    }
}

/// The most recent record for each instrument, ordered by symbol.
#[must_use]
pub fn latest_by_symbol(snapshot: &Dataset) -> BTreeMap<&Symbol, &QuoteRecord> {
    let mut latest: BTreeMap<&Symbol, &QuoteRecord> = BTreeMap::new();
    for record in snapshot {
        latest
            .entry(&record.stock)
            .and_modify(|current| {
                if record.timestamp >= current.timestamp {
                    *current = record;
                }
            })
            .or_insert(record);
    }
    latest
}
