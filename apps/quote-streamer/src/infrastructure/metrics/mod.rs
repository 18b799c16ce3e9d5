//! Prometheus Metrics Module
//!
//! Exposes pipeline metrics via Prometheus format for monitoring.
//!
//! # Metrics Categories
//!
//! - **Polling**: ticks fired, fetch failures, fetch latency
//! - **Accumulation**: records accepted and discarded, dataset size
//! - **Lifecycle**: streaming state, late batches dropped after stop
//!
//! # Integration
//!
//! Metrics are exposed at `/metrics` on the control server port.
//! Recording functions are no-ops until [`init_metrics`] installs a
//! recorder, so library code and tests can call them freely.

use std::sync::OnceLock;
use std::time::Duration;

use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

// =============================================================================
// Global Metrics Handle
// =============================================================================

static PROMETHEUS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Initialize the Prometheus metrics recorder.
///
/// # Panics
///
/// Panics if the recorder cannot be installed.
pub fn init_metrics() -> PrometheusHandle {
    PROMETHEUS_HANDLE
        .get_or_init(|| {
            let handle = PrometheusBuilder::new()
                .install_recorder()
                .expect("failed to install Prometheus recorder");

            register_metrics();
            handle
        })
        .clone()
}

/// Get the Prometheus handle for rendering metrics.
///
/// Returns `None` if metrics have not been initialized.
#[must_use]
pub fn get_metrics_handle() -> Option<PrometheusHandle> {
    PROMETHEUS_HANDLE.get().cloned()
}

// =============================================================================
// Metric Registration
// =============================================================================

const TICKS_TOTAL: &str = "quote_streamer_ticks_total";
const FETCH_FAILURES_TOTAL: &str = "quote_streamer_fetch_failures_total";
const RECORDS_ACCEPTED_TOTAL: &str = "quote_streamer_records_accepted_total";
const RECORDS_DISCARDED_TOTAL: &str = "quote_streamer_records_discarded_total";
const LATE_BATCHES_TOTAL: &str = "quote_streamer_late_batches_discarded_total";
const DATASET_RECORDS: &str = "quote_streamer_dataset_records";
const STREAMING: &str = "quote_streamer_streaming";
const FETCH_SECONDS: &str = "quote_streamer_fetch_seconds";

fn register_metrics() {
    describe_counter!(TICKS_TOTAL, "Total poll ticks fired");
    describe_counter!(
        FETCH_FAILURES_TOTAL,
        "Total fetches that produced no batch, by error kind"
    );
    describe_counter!(
        RECORDS_ACCEPTED_TOTAL,
        "Total records appended to the dataset"
    );
    describe_counter!(
        RECORDS_DISCARDED_TOTAL,
        "Total records dropped as duplicate observations"
    );
    describe_counter!(
        LATE_BATCHES_TOTAL,
        "Total batches dropped because they resolved after stop"
    );
    describe_gauge!(DATASET_RECORDS, "Records currently held in the dataset");
    describe_gauge!(STREAMING, "1 while the poll scheduler is streaming");
    describe_histogram!(FETCH_SECONDS, "Record source fetch latency");
}

// =============================================================================
// Metric Recording Functions
// =============================================================================

/// Record a poll tick.
pub fn record_tick() {
    counter!(TICKS_TOTAL).increment(1);
}

/// Record a failed fetch.
pub fn record_fetch_failure(kind: &'static str) {
    counter!(FETCH_FAILURES_TOTAL, "kind" => kind).increment(1);
}

/// Record the outcome of a merge.
pub fn record_merge(accepted: usize, discarded: usize, dataset_len: usize) {
    counter!(RECORDS_ACCEPTED_TOTAL).increment(as_u64(accepted));
    counter!(RECORDS_DISCARDED_TOTAL).increment(as_u64(discarded));
    #[allow(clippy::cast_precision_loss)]
    gauge!(DATASET_RECORDS).set(dataset_len as f64);
}

/// Record a batch dropped after its session stopped.
pub fn record_late_batch() {
    counter!(LATE_BATCHES_TOTAL).increment(1);
}

/// Update the streaming gauge.
pub fn set_streaming(streaming: bool) {
    gauge!(STREAMING).set(if streaming { 1.0 } else { 0.0 });
}

/// Record fetch latency.
pub fn record_fetch_duration(duration: Duration) {
    histogram!(FETCH_SECONDS).record(duration.as_secs_f64());
}

fn as_u64(value: usize) -> u64 {
    u64::try_from(value).unwrap_or(u64::MAX)
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recording_without_recorder_is_noop() {
        record_tick();
        record_fetch_failure("transport");
        record_merge(3, 1, 10);
        record_late_batch();
        set_streaming(true);
        record_fetch_duration(Duration::from_millis(5));
    }

    #[test]
    fn handle_absent_before_init() {
        // Other tests never call init_metrics, so the handle stays unset.
        assert!(get_metrics_handle().is_none());
    }
}
