//! Poll Scheduler
//!
//! Drives the record source at a fixed cadence. The scheduler is an
//! explicit two-state machine:
//!
//! ```text
//!            start()                     stop()
//!   Idle ─────────────► Streaming ─────────────► Idle
//!    ▲  stop(): no-op      │  start(): no-op
//!    └─────────────────────┘
//!
//!   Idle | Streaming ── retire() ──► Retired   (start(): Deactivated)
//! ```
//!
//! `Retired` is terminal. It is entered when the owning view is torn down,
//! after which no session can be opened again.
//!
//! Each `Streaming` span is a session with its own cancellation token and
//! exactly one interval timer. Every tick spawns a poll task: fetch, then
//! merge into the accumulator. Poll tasks are not awaited by the timer, so
//! a source slower than the cadence leads to overlapping fetches that may
//! complete out of order. Each result is merged against whatever the
//! dataset holds when it lands.
//!
//! `stop()` cancels the session's timer immediately. In-flight fetches run
//! to completion, but a result that resolves after its session was stopped
//! is dropped rather than merged.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use parking_lot::Mutex;
use serde::Serialize;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::Instrument;

use super::accumulator::Accumulator;
use crate::application::events::{SessionId, SharedEventHub, StreamEvent};
use crate::application::ports::SharedRecordSource;
use crate::infrastructure::metrics;

/// Default interval between ticks.
pub const DEFAULT_CADENCE: Duration = Duration::from_millis(100);

/// Shortest accepted cadence. Smaller values are raised to this.
pub const MIN_CADENCE: Duration = Duration::from_millis(1);

/// Scheduler configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchedulerConfig {
    /// Interval between ticks.
    pub cadence: Duration,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            cadence: DEFAULT_CADENCE,
        }
    }
}

impl SchedulerConfig {
    /// Create a configuration with a custom cadence, raised to
    /// [`MIN_CADENCE`] if shorter.
    #[must_use]
    pub const fn new(cadence: Duration) -> Self {
        Self {
            cadence: clamp_cadence(cadence),
        }
    }
}

const fn clamp_cadence(cadence: Duration) -> Duration {
    if cadence.as_nanos() < MIN_CADENCE.as_nanos() {
        MIN_CADENCE
    } else {
        cadence
    }
}

/// Result of a `start()` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartOutcome {
    /// A new session began.
    Started(SessionId),
    /// A session was already running; nothing changed.
    AlreadyStreaming(SessionId),
}

impl StartOutcome {
    /// The session that is streaming after the call.
    #[must_use]
    pub const fn session(self) -> SessionId {
        match self {
            Self::Started(id) | Self::AlreadyStreaming(id) => id,
        }
    }
}

/// Result of a `stop()` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopOutcome {
    /// The given session was stopped.
    Stopped(SessionId),
    /// Nothing was streaming; nothing changed.
    AlreadyIdle,
}

/// Externally visible lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SchedulerState {
    /// No timer is active.
    Idle,
    /// A timer is polling the source.
    Streaming,
    /// The owning view was torn down; polling cannot resume.
    Retired,
}

/// Point-in-time view of the scheduler.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SchedulerStatus {
    /// Lifecycle state.
    pub state: SchedulerState,
    /// Current session, if streaming.
    pub session: Option<SessionId>,
    /// Ticks fired in the current session.
    pub ticks: u64,
    /// Fetches that have not resolved yet, across all sessions.
    pub in_flight: usize,
    /// Configured cadence in milliseconds.
    pub cadence_ms: u64,
}

/// Scheduler errors.
#[derive(Debug, thiserror::Error)]
pub enum SchedulerError {
    /// `start()` was called outside a tokio runtime.
    #[error("no tokio runtime available to drive the poll timer")]
    NoRuntime,

    /// `start()` was called after the scheduler was retired.
    #[error("scheduler was retired with its view and cannot start again")]
    Deactivated,
}

// =============================================================================
// Lifecycle
// =============================================================================

#[derive(Debug)]
enum Lifecycle {
    Idle,
    Streaming(Session),
    Retired,
}

#[derive(Debug)]
struct Session {
    id: SessionId,
    cancel: CancellationToken,
    ticks: Arc<AtomicU64>,
}

/// Everything a poll task needs, cloned into each tick.
#[derive(Clone)]
struct PollContext {
    source: SharedRecordSource,
    accumulator: Arc<Accumulator>,
    events: SharedEventHub,
    tracker: TaskTracker,
}

/// Periodic driver of the record source.
pub struct PollScheduler {
    config: SchedulerConfig,
    context: PollContext,
    lifecycle: Mutex<Lifecycle>,
    next_session: AtomicU64,
}

impl std::fmt::Debug for PollScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PollScheduler")
            .field("config", &self.config)
            .field("lifecycle", &*self.lifecycle.lock())
            .finish_non_exhaustive()
    }
}

impl PollScheduler {
    /// Create an idle scheduler. A cadence below [`MIN_CADENCE`] is raised
    /// to it.
    #[must_use]
    pub fn new(
        mut config: SchedulerConfig,
        source: SharedRecordSource,
        accumulator: Arc<Accumulator>,
        events: SharedEventHub,
    ) -> Self {
        if config.cadence < MIN_CADENCE {
            tracing::warn!(
                cadence_ns = u64::try_from(config.cadence.as_nanos()).unwrap_or(u64::MAX),
                "Cadence below minimum, using 1ms"
            );
            config.cadence = MIN_CADENCE;
        }

        Self {
            config,
            context: PollContext {
                source,
                accumulator,
                events,
                tracker: TaskTracker::new(),
            },
            lifecycle: Mutex::new(Lifecycle::Idle),
            next_session: AtomicU64::new(1),
        }
    }

    /// Begin polling.
    ///
    /// Idempotent: while a session is running this returns
    /// [`StartOutcome::AlreadyStreaming`] and does not create another
    /// timer.
    ///
    /// # Errors
    ///
    /// Returns [`SchedulerError::NoRuntime`] when called outside a tokio
    /// runtime and [`SchedulerError::Deactivated`] once the scheduler has
    /// been retired.
    pub fn start(&self) -> Result<StartOutcome, SchedulerError> {
        let mut lifecycle = self.lifecycle.lock();
        match &*lifecycle {
            Lifecycle::Streaming(session) => {
                tracing::debug!(session = session.id, "Start requested while streaming");
                return Ok(StartOutcome::AlreadyStreaming(session.id));
            }
            Lifecycle::Retired => {
                tracing::warn!("Start requested after view was deactivated");
                return Err(SchedulerError::Deactivated);
            }
            Lifecycle::Idle => {}
        }

        let runtime =
            tokio::runtime::Handle::try_current().map_err(|_| SchedulerError::NoRuntime)?;

        let session = Session {
            id: self.next_session.fetch_add(1, Ordering::Relaxed),
            cancel: CancellationToken::new(),
            ticks: Arc::new(AtomicU64::new(0)),
        };

        let timer = TickLoop {
            session: session.id,
            cadence: self.config.cadence,
            cancel: session.cancel.clone(),
            ticks: Arc::clone(&session.ticks),
            context: self.context.clone(),
        };
        let span = tracing::info_span!("poll_timer", session = session.id);
        runtime.spawn(timer.run().instrument(span));

        let id = session.id;
        *lifecycle = Lifecycle::Streaming(session);
        drop(lifecycle);

        metrics::set_streaming(true);
        tracing::info!(
            session = id,
            cadence_ms = duration_millis(self.config.cadence),
            "Streaming started"
        );
        self.context.events.publish(StreamEvent::Started { session: id });

        Ok(StartOutcome::Started(id))
    }

    /// Stop polling.
    ///
    /// Cancels the session's timer; no further ticks fire. Fetches already
    /// in flight are left to finish and their results are dropped.
    /// Calling this while idle does nothing.
    pub fn stop(&self) -> StopOutcome {
        let mut lifecycle = self.lifecycle.lock();
        if !matches!(*lifecycle, Lifecycle::Streaming(_)) {
            return StopOutcome::AlreadyIdle;
        }
        let previous = std::mem::replace(&mut *lifecycle, Lifecycle::Idle);
        drop(lifecycle);
        self.end_session(previous)
    }

    /// Stop polling for good.
    ///
    /// Ends any running session like [`stop`](Self::stop) and moves to the
    /// terminal `Retired` state, where every later `start()` fails with
    /// [`SchedulerError::Deactivated`]. Retiring twice is a no-op.
    pub fn retire(&self) -> StopOutcome {
        let previous = std::mem::replace(&mut *self.lifecycle.lock(), Lifecycle::Retired);
        if matches!(previous, Lifecycle::Idle) {
            tracing::debug!("Scheduler retired while idle");
        }
        self.end_session(previous)
    }

    /// Whether [`retire`](Self::retire) has been called.
    #[must_use]
    pub fn is_retired(&self) -> bool {
        matches!(*self.lifecycle.lock(), Lifecycle::Retired)
    }

    fn end_session(&self, previous: Lifecycle) -> StopOutcome {
        let Lifecycle::Streaming(session) = previous else {
            return StopOutcome::AlreadyIdle;
        };

        session.cancel.cancel();

        metrics::set_streaming(false);
        tracing::info!(
            session = session.id,
            ticks = session.ticks.load(Ordering::Relaxed),
            in_flight = self.context.tracker.len(),
            "Streaming stopped"
        );
        self.context.events.publish(StreamEvent::Stopped {
            session: session.id,
        });

        StopOutcome::Stopped(session.id)
    }

    /// Whether a session is running.
    #[must_use]
    pub fn is_streaming(&self) -> bool {
        matches!(*self.lifecycle.lock(), Lifecycle::Streaming(_))
    }

    /// Snapshot of the scheduler's state.
    #[must_use]
    pub fn status(&self) -> SchedulerStatus {
        let (state, session, ticks) = match &*self.lifecycle.lock() {
            Lifecycle::Idle => (SchedulerState::Idle, None, 0),
            Lifecycle::Retired => (SchedulerState::Retired, None, 0),
            Lifecycle::Streaming(session) => (
                SchedulerState::Streaming,
                Some(session.id),
                session.ticks.load(Ordering::Relaxed),
            ),
        };

        SchedulerStatus {
            state,
            session,
            ticks,
            in_flight: self.context.tracker.len(),
            cadence_ms: duration_millis(self.config.cadence),
        }
    }

    /// The configured cadence.
    #[must_use]
    pub const fn cadence(&self) -> Duration {
        self.config.cadence
    }
}

impl Drop for PollScheduler {
    fn drop(&mut self) {
        if let Lifecycle::Streaming(session) = &*self.lifecycle.get_mut() {
            session.cancel.cancel();
            metrics::set_streaming(false);
        }
    }
}

// =============================================================================
// Tick Loop
// =============================================================================

struct TickLoop {
    session: SessionId,
    cadence: Duration,
    cancel: CancellationToken,
    ticks: Arc<AtomicU64>,
    context: PollContext,
}

impl TickLoop {
    /// Fire a poll every cadence until the session is cancelled.
    ///
    /// The first tick fires one cadence after start.
    async fn run(self) {
        let mut interval = tokio::time::interval_at(Instant::now() + self.cadence, self.cadence);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                biased;
                () = self.cancel.cancelled() => {
                    tracing::debug!(session = self.session, "Poll timer cancelled");
                    break;
                }
                _ = interval.tick() => {
                    let tick = self.ticks.fetch_add(1, Ordering::Relaxed) + 1;
                    let context = self.context.clone();
                    let span = tracing::info_span!(
                        "poll",
                        session = self.session,
                        tick,
                        source = context.source.name(),
                        accepted = tracing::field::Empty,
                    );
                    self.context.tracker.spawn(
                        poll_once(context, self.session, tick, self.cancel.clone()).instrument(span),
                    );
                }
            }
        }
    }
}

/// One tick's fetch-then-merge.
async fn poll_once(
    context: PollContext,
    session: SessionId,
    tick: u64,
    cancel: CancellationToken,
) {
    metrics::record_tick();
    let started = Instant::now();
    let result = context.source.fetch_batch().await;
    metrics::record_fetch_duration(started.elapsed());

    if cancel.is_cancelled() {
        let records = result.as_ref().map_or(0, Vec::len);
        metrics::record_late_batch();
        tracing::debug!(session, tick, records, "Dropping batch resolved after stop");
        context.events.publish(StreamEvent::LateBatchDiscarded {
            session,
            tick,
            records,
        });
        return;
    }

    match result {
        Ok(batch) => {
            let stats = context.accumulator.apply(batch);
            tracing::Span::current().record("accepted", stats.accepted);
            if stats.accepted == 0 {
                tracing::trace!(session, tick, discarded = stats.discarded, "Batch added nothing");
                return;
            }
            tracing::debug!(
                session,
                tick,
                accepted = stats.accepted,
                discarded = stats.discarded,
                dataset_len = stats.dataset_len,
                "Batch merged"
            );
            context.events.publish(StreamEvent::Merged {
                session,
                tick,
                accepted: stats.accepted,
                discarded: stats.discarded,
                dataset_len: stats.dataset_len,
            });
        }
        Err(error) if error.is_malformed() => {
            metrics::record_fetch_failure(error.kind());
            tracing::error!(
                session,
                tick,
                source = context.source.name(),
                error = %error,
                "Source reported malformed record"
            );
            context
                .events
                .publish(StreamEvent::MalformedRecord { session, tick, error });
        }
        Err(error) => {
            metrics::record_fetch_failure(error.kind());
            tracing::warn!(
                session,
                tick,
                source = context.source.name(),
                error = %error,
                "Fetch failed, tick contributes nothing"
            );
            context
                .events
                .publish(StreamEvent::SourceFailed { session, tick, error });
        }
    }
}

fn duration_millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicUsize;

    use async_trait::async_trait;
    use chrono::{TimeZone, Utc};

    use super::*;
    use crate::application::events::EventHub;
    use crate::application::ports::{RecordSource, SourceError};
    use crate::domain::quote::QuoteRecord;

    /// Source that counts calls and returns one fresh record per call.
    #[derive(Default)]
    struct CountingSource {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl RecordSource for CountingSource {
        async fn fetch_batch(&self) -> Result<Vec<QuoteRecord>, SourceError> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            let secs = i64::try_from(n).unwrap();
            Ok(vec![QuoteRecord::new("ABC", Utc.timestamp_opt(secs, 0).unwrap())])
        }
    }

    /// Layer that keeps the name and fields of every span opened.
    #[derive(Clone, Default)]
    struct SpanLog(Arc<Mutex<Vec<(String, Vec<(String, String)>)>>>);

    impl<S: tracing::Subscriber> tracing_subscriber::Layer<S> for SpanLog {
        fn on_new_span(
            &self,
            attrs: &tracing::span::Attributes<'_>,
            _id: &tracing::span::Id,
            _ctx: tracing_subscriber::layer::Context<'_, S>,
        ) {
            let mut fields = FieldLog::default();
            attrs.record(&mut fields);
            self.0
                .lock()
                .push((attrs.metadata().name().to_string(), fields.0));
        }
    }

    #[derive(Default)]
    struct FieldLog(Vec<(String, String)>);

    impl tracing::field::Visit for FieldLog {
        fn record_debug(&mut self, field: &tracing::field::Field, value: &dyn std::fmt::Debug) {
            self.0.push((field.name().to_string(), format!("{value:?}")));
        }
    }

    fn scheduler_with(source: Arc<dyn RecordSource>) -> (PollScheduler, Arc<Accumulator>, SharedEventHub) {
        let accumulator = Arc::new(Accumulator::new());
        let events = Arc::new(EventHub::with_defaults());
        let scheduler = PollScheduler::new(
            SchedulerConfig::default(),
            source,
            Arc::clone(&accumulator),
            Arc::clone(&events),
        );
        (scheduler, accumulator, events)
    }

    #[test]
    fn default_cadence_is_100ms() {
        assert_eq!(SchedulerConfig::default().cadence, Duration::from_millis(100));
    }

    #[test]
    fn start_outside_runtime_fails() {
        let (scheduler, _, _) = scheduler_with(Arc::new(CountingSource::default()));
        assert!(matches!(scheduler.start(), Err(SchedulerError::NoRuntime)));
        assert!(!scheduler.is_streaming());
    }

    #[test]
    fn stop_while_idle_is_noop() {
        let (scheduler, _, _) = scheduler_with(Arc::new(CountingSource::default()));
        assert_eq!(scheduler.stop(), StopOutcome::AlreadyIdle);
        assert_eq!(scheduler.status().state, SchedulerState::Idle);
        assert_eq!(scheduler.stop(), StopOutcome::AlreadyIdle);
    }

    #[tokio::test(start_paused = true)]
    async fn second_start_reuses_session() {
        let (scheduler, _, _) = scheduler_with(Arc::new(CountingSource::default()));

        let first = scheduler.start().unwrap();
        let second = scheduler.start().unwrap();

        assert!(matches!(first, StartOutcome::Started(_)));
        assert_eq!(second, StartOutcome::AlreadyStreaming(first.session()));
        scheduler.stop();
    }

    #[tokio::test(start_paused = true)]
    async fn repeated_start_keeps_a_single_timer() {
        let source = Arc::new(CountingSource::default());
        let (scheduler, _, _) = scheduler_with(Arc::clone(&source) as Arc<dyn RecordSource>);

        scheduler.start().unwrap();
        scheduler.start().unwrap();
        scheduler.start().unwrap();

        tokio::time::sleep(Duration::from_millis(1_050)).await;
        scheduler.stop();

        assert_eq!(source.calls.load(Ordering::SeqCst), 10);
    }

    #[tokio::test(start_paused = true)]
    async fn no_ticks_after_stop() {
        let source = Arc::new(CountingSource::default());
        let (scheduler, accumulator, _) =
            scheduler_with(Arc::clone(&source) as Arc<dyn RecordSource>);

        scheduler.start().unwrap();
        tokio::time::sleep(Duration::from_millis(350)).await;
        assert_eq!(scheduler.stop(), StopOutcome::Stopped(1));

        let calls = source.calls.load(Ordering::SeqCst);
        assert_eq!(calls, 3);

        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(source.calls.load(Ordering::SeqCst), calls);
        assert_eq!(accumulator.len(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn restart_opens_a_new_session() {
        let (scheduler, _, events) = scheduler_with(Arc::new(CountingSource::default()));
        let mut rx = events.subscribe();

        scheduler.start().unwrap();
        scheduler.stop();
        let outcome = scheduler.start().unwrap();

        assert_eq!(outcome, StartOutcome::Started(2));
        assert_eq!(rx.recv().await.unwrap(), StreamEvent::Started { session: 1 });
        assert_eq!(rx.recv().await.unwrap(), StreamEvent::Stopped { session: 1 });
        assert_eq!(rx.recv().await.unwrap(), StreamEvent::Started { session: 2 });
        scheduler.stop();
    }

    #[tokio::test(start_paused = true)]
    async fn status_reports_session_and_ticks() {
        let (scheduler, _, _) = scheduler_with(Arc::new(CountingSource::default()));
        scheduler.start().unwrap();
        tokio::time::sleep(Duration::from_millis(250)).await;

        let status = scheduler.status();
        assert_eq!(status.state, SchedulerState::Streaming);
        assert_eq!(status.session, Some(1));
        assert_eq!(status.ticks, 2);
        assert_eq!(status.cadence_ms, 100);

        scheduler.stop();
        assert_eq!(scheduler.status().session, None);
    }

    #[test]
    fn zero_cadence_is_raised_to_minimum() {
        assert_eq!(SchedulerConfig::new(Duration::ZERO).cadence, MIN_CADENCE);
        assert_eq!(
            SchedulerConfig::new(Duration::from_micros(10)).cadence,
            MIN_CADENCE
        );
        assert_eq!(
            SchedulerConfig::new(Duration::from_millis(250)).cadence,
            Duration::from_millis(250)
        );
    }

    #[tokio::test(start_paused = true)]
    async fn zero_cadence_set_directly_still_ticks() {
        let source = Arc::new(CountingSource::default());
        let scheduler = PollScheduler::new(
            SchedulerConfig {
                cadence: Duration::ZERO,
            },
            Arc::clone(&source) as Arc<dyn RecordSource>,
            Arc::new(Accumulator::new()),
            Arc::new(EventHub::with_defaults()),
        );
        assert_eq!(scheduler.cadence(), MIN_CADENCE);

        scheduler.start().unwrap();
        tokio::time::sleep(Duration::from_millis(500)).await;

        let status = scheduler.status();
        assert_eq!(status.state, SchedulerState::Streaming);
        assert!(status.ticks >= 400);
        assert!(source.calls.load(Ordering::SeqCst) >= 400);
        assert_eq!(status.cadence_ms, 1);
        scheduler.stop();
    }

    #[tokio::test(start_paused = true)]
    async fn retired_scheduler_refuses_to_start() {
        let source = Arc::new(CountingSource::default());
        let (scheduler, _, events) = scheduler_with(Arc::clone(&source) as Arc<dyn RecordSource>);
        let mut rx = events.subscribe();

        scheduler.start().unwrap();
        assert_eq!(scheduler.retire(), StopOutcome::Stopped(1));
        assert!(scheduler.is_retired());
        assert!(matches!(scheduler.start(), Err(SchedulerError::Deactivated)));
        assert_eq!(scheduler.stop(), StopOutcome::AlreadyIdle);
        assert_eq!(scheduler.retire(), StopOutcome::AlreadyIdle);

        tokio::time::sleep(Duration::from_millis(1_050)).await;
        assert_eq!(source.calls.load(Ordering::SeqCst), 0);
        assert!(!scheduler.is_streaming());
        assert_eq!(scheduler.status().state, SchedulerState::Retired);

        assert_eq!(rx.recv().await.unwrap(), StreamEvent::Started { session: 1 });
        assert_eq!(rx.recv().await.unwrap(), StreamEvent::Stopped { session: 1 });
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn polls_run_inside_session_and_tick_spans() {
        use tracing_subscriber::layer::SubscriberExt;

        let log = SpanLog::default();
        let _default =
            tracing::subscriber::set_default(tracing_subscriber::registry().with(log.clone()));

        let (scheduler, _, _) = scheduler_with(Arc::new(CountingSource::default()));
        scheduler.start().unwrap();
        tokio::time::sleep(Duration::from_millis(250)).await;
        scheduler.stop();

        let spans = log.0.lock().clone();
        let field = |fields: &[(String, String)], key: &str| {
            fields.iter().find(|(k, _)| k == key).map(|(_, v)| v.clone())
        };

        assert!(spans.iter().any(|(name, fields)| {
            name == "poll_timer" && field(fields, "session").as_deref() == Some("1")
        }));
        let polls: Vec<_> = spans
            .iter()
            .filter(|(name, _)| name == "poll")
            .map(|(_, fields)| (field(fields, "session"), field(fields, "tick")))
            .collect();
        assert_eq!(
            polls,
            vec![
                (Some("1".to_string()), Some("1".to_string())),
                (Some("1".to_string()), Some("2".to_string())),
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn dropping_the_scheduler_cancels_its_timer() {
        let source = Arc::new(CountingSource::default());
        let (scheduler, _, _) = scheduler_with(Arc::clone(&source) as Arc<dyn RecordSource>);

        scheduler.start().unwrap();
        tokio::time::sleep(Duration::from_millis(150)).await;
        drop(scheduler);

        let calls = source.calls.load(Ordering::SeqCst);
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(source.calls.load(Ordering::SeqCst), calls);
    }
}
