//! View Binder
//!
//! Lifecycle glue between the scheduler, the accumulator and a
//! visualization sink. Activation builds an empty dataset, starts polling
//! and spawns a render loop that hands every published snapshot to the
//! sink. Deactivation retires the scheduler and ends the render loop; a
//! deactivated binder refuses to start polling again.
//!
//! Teardown is tied to ownership: dropping the binder stops the scheduler
//! even when [`ViewBinder::deactivate`] was never called, so no timer can
//! outlive the view.

use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::accumulator::Accumulator;
use super::scheduler::{
    PollScheduler, SchedulerConfig, SchedulerError, SchedulerStatus, StartOutcome, StopOutcome,
};
use crate::application::events::{EventHub, SharedEventHub, StreamEvent};
use crate::application::ports::{SharedRecordSource, SharedVisualizationSink};
use crate::domain::dataset::Dataset;

/// Binder options.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BinderConfig {
    /// Poll scheduler settings.
    pub scheduler: SchedulerConfig,
    /// Capacity of the stream event channel (0 selects the default).
    pub events_capacity: usize,
}

/// An active view: owns the dataset, the scheduler and the render loop.
#[derive(Debug)]
pub struct ViewBinder {
    accumulator: Arc<Accumulator>,
    scheduler: PollScheduler,
    events: SharedEventHub,
    render_cancel: CancellationToken,
    render_task: Mutex<Option<JoinHandle<()>>>,
}

impl ViewBinder {
    /// Mount a view: empty dataset, render loop running, polling started.
    ///
    /// The sink receives the empty dataset once right away, then every
    /// snapshot that adds records.
    ///
    /// # Errors
    ///
    /// Returns [`SchedulerError::NoRuntime`] when called outside a tokio
    /// runtime.
    pub fn activate(
        config: BinderConfig,
        source: SharedRecordSource,
        sink: SharedVisualizationSink,
    ) -> Result<Self, SchedulerError> {
        let runtime =
            tokio::runtime::Handle::try_current().map_err(|_| SchedulerError::NoRuntime)?;

        let events = Arc::new(if config.events_capacity == 0 {
            EventHub::with_defaults()
        } else {
            EventHub::new(config.events_capacity)
        });
        let accumulator = Arc::new(Accumulator::new());
        let scheduler = PollScheduler::new(
            config.scheduler,
            source,
            Arc::clone(&accumulator),
            Arc::clone(&events),
        );

        let render_cancel = CancellationToken::new();
        let render_task = runtime.spawn(render_loop(
            accumulator.subscribe(),
            sink,
            render_cancel.clone(),
        ));

        let binder = Self {
            accumulator,
            scheduler,
            events,
            render_cancel,
            render_task: Mutex::new(Some(render_task)),
        };
        binder.scheduler.start()?;

        tracing::info!("View activated");
        Ok(binder)
    }

    /// User-initiated (re)start. Safe to call any number of times.
    ///
    /// # Errors
    ///
    /// Returns [`SchedulerError::NoRuntime`] when called outside a tokio
    /// runtime and [`SchedulerError::Deactivated`] after
    /// [`deactivate`](Self::deactivate).
    pub fn request_start(&self) -> Result<StartOutcome, SchedulerError> {
        self.scheduler.start()
    }

    /// Stop polling without tearing the view down.
    pub fn stop(&self) -> StopOutcome {
        self.scheduler.stop()
    }

    /// Unmount the view.
    ///
    /// Retires the scheduler unconditionally, then ends the render loop and
    /// waits for it. Fetches still in flight may complete but nothing is
    /// merged or rendered afterwards, and later start requests fail.
    pub async fn deactivate(&self) {
        self.scheduler.retire();
        self.render_cancel.cancel();

        let task = self.render_task.lock().take();
        if let Some(task) = task
            && let Err(e) = task.await
        {
            tracing::error!(error = %e, "Render loop ended abnormally");
        }

        tracing::info!(records = self.accumulator.len(), "View deactivated");
    }

    /// The latest snapshot.
    #[must_use]
    pub fn snapshot(&self) -> Dataset {
        self.accumulator.snapshot()
    }

    /// Subscribe to dataset snapshots.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<Dataset> {
        self.accumulator.subscribe()
    }

    /// Subscribe to lifecycle and merge events.
    #[must_use]
    pub fn events(&self) -> broadcast::Receiver<StreamEvent> {
        self.events.subscribe()
    }

    /// Scheduler status.
    #[must_use]
    pub fn status(&self) -> SchedulerStatus {
        self.scheduler.status()
    }

    /// Whether the scheduler is polling.
    #[must_use]
    pub fn is_streaming(&self) -> bool {
        self.scheduler.is_streaming()
    }
}

impl Drop for ViewBinder {
    fn drop(&mut self) {
        self.scheduler.retire();
        self.render_cancel.cancel();
    }
}

/// Hand each new snapshot to the sink until cancelled.
///
/// Snapshots are cloned out of the channel before rendering so the sink
/// never holds the channel lock. If several merges land while the sink is
/// busy it sees only the newest; every snapshot is complete, so nothing
/// is lost from the rendered history.
async fn render_loop(
    mut snapshots: watch::Receiver<Dataset>,
    sink: SharedVisualizationSink,
    cancel: CancellationToken,
) {
    let initial = snapshots.borrow_and_update().clone();
    sink.render(&initial);

    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            changed = snapshots.changed() => {
                if changed.is_err() {
                    break;
                }
                let snapshot = snapshots.borrow_and_update().clone();
                sink.render(&snapshot);
            }
        }
    }

    tracing::debug!("Render loop stopped");
}
