//! Streaming Lifecycle Integration Tests
//!
//! Drives the view binder end to end with fake sources and a recording
//! sink under tokio's paused clock.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::collections::{HashSet, VecDeque};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use parking_lot::Mutex;
use rust_decimal::Decimal;
use tokio::sync::broadcast;

use quote_streamer::{
    BinderConfig, Dataset, QuoteRecord, RecordSource, SchedulerError, SimulatedConfig,
    SimulatedSource, SourceError, StreamEvent, ViewBinder, VisualizationSink,
};

// =============================================================================
// Fakes
// =============================================================================

/// Returns the same batch on every call and counts calls.
struct CountingSource {
    calls: AtomicUsize,
    batch: Vec<QuoteRecord>,
}

impl CountingSource {
    fn new(batch: Vec<QuoteRecord>) -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicUsize::new(0),
            batch,
        })
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RecordSource for CountingSource {
    async fn fetch_batch(&self) -> Result<Vec<QuoteRecord>, SourceError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.batch.clone())
    }
}

/// Plays back a fixed script of results, then returns empty batches.
struct ScriptedSource {
    script: Mutex<VecDeque<Result<Vec<QuoteRecord>, SourceError>>>,
}

impl ScriptedSource {
    fn new(script: Vec<Result<Vec<QuoteRecord>, SourceError>>) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(script.into()),
        })
    }
}

#[async_trait]
impl RecordSource for ScriptedSource {
    async fn fetch_batch(&self) -> Result<Vec<QuoteRecord>, SourceError> {
        self.script.lock().pop_front().unwrap_or_else(|| Ok(Vec::new()))
    }
}

/// Takes longer than the cadence to answer.
struct SlowSource {
    calls: AtomicUsize,
    delay: Duration,
}

#[async_trait]
impl RecordSource for SlowSource {
    async fn fetch_batch(&self) -> Result<Vec<QuoteRecord>, SourceError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(self.delay).await;
        Ok(vec![quote("ABC", i64::try_from(call).unwrap(), 1)])
    }
}

/// Keeps every snapshot it is handed.
#[derive(Default)]
struct RecordingSink {
    renders: Mutex<Vec<Dataset>>,
}

impl RecordingSink {
    fn renders(&self) -> Vec<Dataset> {
        self.renders.lock().clone()
    }
}

impl VisualizationSink for RecordingSink {
    fn render(&self, snapshot: &Dataset) {
        self.renders.lock().push(snapshot.clone());
    }
}

// =============================================================================
// Helpers
// =============================================================================

fn ts(secs: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
}

fn quote(stock: &str, secs: i64, price: i64) -> QuoteRecord {
    QuoteRecord::new(stock, ts(secs)).with_price(Decimal::from(price))
}

fn drain(rx: &mut broadcast::Receiver<StreamEvent>) -> Vec<StreamEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

fn activate(
    source: Arc<dyn RecordSource>,
    sink: Arc<RecordingSink>,
) -> (ViewBinder, broadcast::Receiver<StreamEvent>) {
    let binder = ViewBinder::activate(BinderConfig::default(), source, sink).unwrap();
    let events = binder.events();
    (binder, events)
}

// =============================================================================
// Tests
// =============================================================================

#[tokio::test(start_paused = true)]
async fn repeated_start_requests_keep_single_cadence() {
    let source = CountingSource::new(vec![quote("ABC", 1, 1)]);
    let sink = Arc::new(RecordingSink::default());
    let (binder, _events) = activate(source.clone(), sink);

    binder.request_start().unwrap();
    binder.request_start().unwrap();

    tokio::time::sleep(Duration::from_millis(1_050)).await;
    assert_eq!(source.calls(), 10);

    binder.deactivate().await;
}

#[tokio::test(start_paused = true)]
async fn later_batches_append_and_keep_first_payload() {
    let source = ScriptedSource::new(vec![
        Ok(vec![quote("A", 1, 10), quote("B", 1, 20)]),
        Ok(vec![quote("A", 1, 99), quote("A", 2, 30)]),
    ]);
    let sink = Arc::new(RecordingSink::default());
    let (binder, _events) = activate(source, sink.clone());

    tokio::time::sleep(Duration::from_millis(250)).await;
    binder.deactivate().await;

    let snapshot = binder.snapshot();
    let rows: Vec<_> = snapshot
        .iter()
        .map(|r| (r.stock.as_str().to_string(), r.timestamp, r.price))
        .collect();
    assert_eq!(
        rows,
        vec![
            ("A".to_string(), ts(1), Some(Decimal::from(10))),
            ("B".to_string(), ts(1), Some(Decimal::from(20))),
            ("A".to_string(), ts(2), Some(Decimal::from(30))),
        ]
    );

    let lengths: Vec<_> = sink.renders().iter().map(Dataset::len).collect();
    assert_eq!(lengths, vec![0, 2, 3]);
}

#[tokio::test(start_paused = true)]
async fn failed_fetch_skips_tick_and_streaming_continues() {
    let source = ScriptedSource::new(vec![
        Ok(vec![quote("ABC", 1, 1)]),
        Err(SourceError::Transport("connection refused".to_string())),
        Ok(vec![quote("ABC", 2, 1)]),
    ]);
    let sink = Arc::new(RecordingSink::default());
    let (binder, mut events) = activate(source, sink);

    tokio::time::sleep(Duration::from_millis(350)).await;

    assert!(binder.is_streaming());
    assert_eq!(binder.snapshot().len(), 2);

    let events = drain(&mut events);
    assert!(events.iter().any(|e| matches!(
        e,
        StreamEvent::SourceFailed { tick: 2, error: SourceError::Transport(_), .. }
    )));
    let merged_ticks: Vec<_> = events
        .iter()
        .filter_map(|e| match e {
            StreamEvent::Merged { tick, .. } => Some(*tick),
            _ => None,
        })
        .collect();
    assert_eq!(merged_ticks, vec![1, 3]);

    binder.deactivate().await;
}

#[tokio::test(start_paused = true)]
async fn malformed_record_is_surfaced_unchanged() {
    let malformed = SourceError::MalformedRecord {
        index: 2,
        reason: "missing stock".to_string(),
    };
    let source = ScriptedSource::new(vec![Err(malformed.clone())]);
    let sink = Arc::new(RecordingSink::default());
    let (binder, mut events) = activate(source, sink);

    tokio::time::sleep(Duration::from_millis(150)).await;

    let events = drain(&mut events);
    assert!(events.contains(&StreamEvent::MalformedRecord {
        session: 1,
        tick: 1,
        error: malformed,
    }));
    assert!(binder.is_streaming());
    assert!(binder.snapshot().is_empty());

    binder.deactivate().await;
}

#[tokio::test(start_paused = true)]
async fn teardown_mid_fetch_discards_late_batch() {
    let source = Arc::new(SlowSource {
        calls: AtomicUsize::new(0),
        delay: Duration::from_millis(250),
    });
    let sink = Arc::new(RecordingSink::default());
    let (binder, mut events) = activate(source.clone(), sink.clone());

    // First tick at 100ms starts a fetch that resolves at 350ms.
    tokio::time::sleep(Duration::from_millis(150)).await;
    binder.deactivate().await;

    tokio::time::sleep(Duration::from_millis(1_000)).await;

    assert_eq!(source.calls.load(Ordering::SeqCst), 1);
    assert!(binder.snapshot().is_empty());
    assert_eq!(sink.renders().len(), 1);

    let events = drain(&mut events);
    assert!(events.contains(&StreamEvent::Stopped { session: 1 }));
    assert!(events.contains(&StreamEvent::LateBatchDiscarded {
        session: 1,
        tick: 1,
        records: 1,
    }));
}

#[tokio::test(start_paused = true)]
async fn slow_source_overlaps_without_losing_records() {
    let source = Arc::new(SlowSource {
        calls: AtomicUsize::new(0),
        delay: Duration::from_millis(250),
    });
    let sink = Arc::new(RecordingSink::default());
    let (binder, _events) = activate(source.clone(), sink);

    // Ticks at 100..=1000; fetches started by 700 have resolved by 1020.
    tokio::time::sleep(Duration::from_millis(1_020)).await;

    assert_eq!(source.calls.load(Ordering::SeqCst), 10);
    assert_eq!(binder.snapshot().len(), 7);
    assert!(binder.status().in_flight > 0);

    binder.deactivate().await;
}

#[tokio::test(start_paused = true)]
async fn start_request_after_deactivation_leaves_no_timer() {
    let source = CountingSource::new(vec![quote("ABC", 1, 1)]);
    let sink = Arc::new(RecordingSink::default());
    let (binder, mut events) = activate(source.clone(), sink.clone());

    binder.deactivate().await;
    let refused = binder.request_start();
    tokio::time::sleep(Duration::from_millis(1_050)).await;

    assert!(matches!(refused, Err(SchedulerError::Deactivated)));
    assert!(!binder.is_streaming());
    assert_eq!(source.calls(), 0);
    assert!(binder.snapshot().is_empty());
    assert_eq!(sink.renders().len(), 1);

    let events = drain(&mut events);
    assert_eq!(events, vec![StreamEvent::Stopped { session: 1 }]);
}

#[tokio::test(start_paused = true)]
async fn dropping_binder_stops_polling() {
    let source = CountingSource::new(vec![quote("ABC", 1, 1)]);
    let sink = Arc::new(RecordingSink::default());
    let (binder, _events) = activate(source.clone(), sink);

    tokio::time::sleep(Duration::from_millis(250)).await;
    drop(binder);
    let calls = source.calls();

    tokio::time::sleep(Duration::from_millis(1_000)).await;
    assert_eq!(source.calls(), calls);
}

#[tokio::test(start_paused = true)]
async fn simulated_feed_only_grows_by_appending() {
    let source = Arc::new(SimulatedSource::new(
        SimulatedConfig {
            seed: Some(42),
            ..SimulatedConfig::default()
        },
        ts(0),
    ));
    let sink = Arc::new(RecordingSink::default());
    let (binder, _events) = activate(source, sink.clone());

    tokio::time::sleep(Duration::from_millis(3_050)).await;
    binder.deactivate().await;

    let renders = sink.renders();
    assert!(renders.len() > 2);
    for pair in renders.windows(2) {
        let (older, newer) = (&pair[0], &pair[1]);
        assert!(newer.len() > older.len());
        assert_eq!(&newer.records()[..older.len()], older.records());
    }

    let last = binder.snapshot();
    let keys: HashSet<_> = last.iter().map(QuoteRecord::key).collect();
    assert_eq!(keys.len(), last.len());
}
