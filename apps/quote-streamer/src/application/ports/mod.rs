//! Port Interfaces
//!
//! Contracts the pipeline expects from the outside world, following the
//! Hexagonal Architecture pattern. Infrastructure adapters implement them.
//!
//! ## Driven Ports (Outbound)
//!
//! - [`RecordSource`]: produces a batch of quotes on demand, once per tick
//! - [`VisualizationSink`]: receives every published dataset snapshot

use std::sync::Arc;

use async_trait::async_trait;

use crate::domain::dataset::Dataset;
use crate::domain::quote::QuoteRecord;

/// Errors a record source can report for a single fetch.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SourceError {
    /// The request never produced a response.
    #[error("transport error: {0}")]
    Transport(String),

    /// The source answered with a non-success status.
    #[error("source returned status {status}: {body}")]
    Status {
        /// HTTP-style status code.
        status: u16,
        /// Response body, possibly truncated.
        body: String,
    },

    /// The response could not be decoded into quotes.
    #[error("failed to decode batch: {0}")]
    Decode(String),

    /// A record in the batch lacks its identity fields.
    #[error("malformed record at index {index}: {reason}")]
    MalformedRecord {
        /// Position of the offending record in the batch.
        index: usize,
        /// What was wrong with it.
        reason: String,
    },
}

impl SourceError {
    /// Whether this error reports bad data rather than a failed fetch.
    #[must_use]
    pub const fn is_malformed(&self) -> bool {
        matches!(self, Self::MalformedRecord { .. })
    }

    /// Short label used in metrics and logs.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Transport(_) => "transport",
            Self::Status { .. } => "status",
            Self::Decode(_) => "decode",
            Self::MalformedRecord { .. } => "malformed_record",
        }
    }
}

/// On-demand provider of quote batches.
///
/// Called once per scheduler tick. Latency and batch size are unconstrained;
/// calls from consecutive ticks may overlap when the source is slower than
/// the cadence.
#[async_trait]
pub trait RecordSource: Send + Sync {
    /// Fetch the next batch. Records come back in source order and may
    /// repeat earlier observations.
    async fn fetch_batch(&self) -> Result<Vec<QuoteRecord>, SourceError>;

    /// Name used in logs.
    fn name(&self) -> &'static str {
        "record-source"
    }
}

/// Consumer of accumulated datasets.
///
/// Always handed the full snapshot, never a diff.
#[cfg_attr(test, mockall::automock)]
pub trait VisualizationSink: Send + Sync {
    /// Render the given snapshot.
    fn render(&self, snapshot: &Dataset);
}

/// Shared record source reference.
pub type SharedRecordSource = Arc<dyn RecordSource>;

/// Shared sink reference.
pub type SharedVisualizationSink = Arc<dyn VisualizationSink>;

#[cfg(test)]
mod tests {
    use test_case::test_case;

    use super::*;

    #[test_case(SourceError::Transport("refused".into()), "transport" ; "transport")]
    #[test_case(SourceError::Status { status: 503, body: String::new() }, "status" ; "status")]
    #[test_case(SourceError::Decode("eof".into()), "decode" ; "decode")]
    #[test_case(SourceError::MalformedRecord { index: 0, reason: "empty stock".into() }, "malformed_record" ; "malformed")]
    fn error_kind_labels(error: SourceError, expected: &str) {
        assert_eq!(error.kind(), expected);
    }

    #[test]
    fn only_malformed_records_are_flagged() {
        assert!(
            SourceError::MalformedRecord {
                index: 3,
                reason: "missing timestamp".into()
            }
            .is_malformed()
        );
        assert!(!SourceError::Transport("reset".into()).is_malformed());
    }

    #[test]
    fn error_messages_carry_context() {
        let err = SourceError::Status {
            status: 502,
            body: "bad gateway".into(),
        };
        assert_eq!(err.to_string(), "source returned status 502: bad gateway");
    }
}
