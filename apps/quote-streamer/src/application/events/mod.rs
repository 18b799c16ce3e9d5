//! Stream Events
//!
//! Fan-out of lifecycle and merge notifications using a tokio broadcast
//! channel. Observers (the control server, tests, log tailers) subscribe
//! independently; a slow observer only lags itself.
//!
//! Dataset snapshots travel on their own watch channel owned by the
//! accumulator; these events describe what happened, not the data.

use std::sync::Arc;

use tokio::sync::broadcast;

use super::ports::SourceError;

/// Identifier of one Idle → Streaming → Idle span.
pub type SessionId = u64;

/// Something observable that happened in the pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEvent {
    /// Polling started.
    Started {
        /// New session.
        session: SessionId,
    },
    /// Polling stopped.
    Stopped {
        /// Session that ended.
        session: SessionId,
    },
    /// A batch added at least one record.
    Merged {
        /// Session that issued the fetch.
        session: SessionId,
        /// Tick number within the session.
        tick: u64,
        /// Records appended.
        accepted: usize,
        /// Duplicates dropped.
        discarded: usize,
        /// Dataset size after the merge.
        dataset_len: usize,
    },
    /// A fetch failed; the tick contributed nothing.
    SourceFailed {
        /// Session that issued the fetch.
        session: SessionId,
        /// Tick number within the session.
        tick: u64,
        /// What went wrong.
        error: SourceError,
    },
    /// The source reported a record it could not vouch for.
    MalformedRecord {
        /// Session that issued the fetch.
        session: SessionId,
        /// Tick number within the session.
        tick: u64,
        /// The error exactly as the source reported it.
        error: SourceError,
    },
    /// A fetch resolved after its session was stopped and was dropped.
    LateBatchDiscarded {
        /// Session that issued the fetch.
        session: SessionId,
        /// Tick number within the session.
        tick: u64,
        /// Records dropped unread.
        records: usize,
    },
}

/// Default capacity of the event channel.
pub const DEFAULT_EVENT_CAPACITY: usize = 256;

/// Broadcast hub for [`StreamEvent`]s.
#[derive(Debug, Clone)]
pub struct EventHub {
    tx: broadcast::Sender<StreamEvent>,
}

impl EventHub {
    /// Create a hub with the given channel capacity.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            tx: broadcast::channel(capacity.max(1)).0,
        }
    }

    /// Create a hub with the default capacity.
    #[must_use]
    pub fn with_defaults() -> Self {
        Self::new(DEFAULT_EVENT_CAPACITY)
    }

    /// Publish an event to all subscribers.
    ///
    /// Returns the number of receivers that got the event, or `None` if
    /// nobody is listening.
    #[allow(clippy::must_use_candidate)]
    pub fn publish(&self, event: StreamEvent) -> Option<usize> {
        self.tx.send(event).ok()
    }

    /// Get a new receiver.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<StreamEvent> {
        self.tx.subscribe()
    }

    /// Number of active receivers.
    #[must_use]
    pub fn receiver_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for EventHub {
    fn default() -> Self {
        Self::with_defaults()
    }
}

/// Shared event hub reference.
pub type SharedEventHub = Arc<EventHub>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn publish_without_receivers_returns_none() {
        let hub = EventHub::with_defaults();
        assert!(hub.publish(StreamEvent::Started { session: 1 }).is_none());
    }

    #[test]
    fn receiver_count_tracks_drops() {
        let hub = EventHub::with_defaults();
        {
            let _rx = hub.subscribe();
            assert_eq!(hub.receiver_count(), 1);
        }
        assert_eq!(hub.receiver_count(), 0);
    }

    #[tokio::test]
    async fn every_subscriber_sees_the_event() {
        let hub = EventHub::with_defaults();
        let mut rx1 = hub.subscribe();
        let mut rx2 = hub.subscribe();

        assert_eq!(hub.publish(StreamEvent::Stopped { session: 7 }), Some(2));

        assert_eq!(rx1.recv().await.unwrap(), StreamEvent::Stopped { session: 7 });
        assert_eq!(rx2.recv().await.unwrap(), StreamEvent::Stopped { session: 7 });
    }

    #[test]
    fn zero_capacity_is_clamped() {
        let hub = EventHub::new(0);
        let _rx = hub.subscribe();
        assert_eq!(hub.publish(StreamEvent::Started { session: 1 }), Some(1));
    }
}
