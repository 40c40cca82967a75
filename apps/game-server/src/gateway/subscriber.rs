//! One connected client and its outbound queue.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::extract::ws::Utf8Bytes;
use serde::Serialize;
use tokio::sync::mpsc;
use utoipa::ToSchema;

use super::session::{CloseReason, SessionCloser};

/// An already-serialized outbound frame. Cloning shares the buffer.
pub type Payload = Utf8Bytes;

/// Outcome of a non-blocking enqueue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Enqueue {
    Queued,
    /// The queue was full; the subscriber is being evicted.
    Overflowed,
    /// The session is already closing; nothing was queued.
    Closed,
}

/// Public view of a subscriber, as listed over HTTP.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct SubscriberSummary {
    pub id: String,
    pub name: String,
}

/// A connected client.
///
/// Broadcasters push onto `tx`; the matching receiver belongs to the
/// subscriber's writer loop, which is the only consumer.
pub struct Subscriber {
    pub id: String,
    pub name: String,
    tx: mpsc::Sender<Payload>,
    closer: Arc<SessionCloser>,
    connected_at: Instant,
    overflows: AtomicU64,
}

impl Subscriber {
    /// Create a subscriber with a queue bounded at `capacity` (at least 1).
    pub fn new(
        id: String,
        name: String,
        capacity: usize,
        closer: Arc<SessionCloser>,
    ) -> (Arc<Self>, mpsc::Receiver<Payload>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let subscriber = Self {
            id,
            name,
            tx,
            closer,
            connected_at: Instant::now(),
            overflows: AtomicU64::new(0),
        };
        (Arc::new(subscriber), rx)
    }

    /// Queue a payload without waiting.
    ///
    /// A full queue evicts the subscriber instead of blocking the caller or
    /// growing the queue. Nothing is queued once the session is closing.
    pub fn try_enqueue(&self, payload: Payload) -> Enqueue {
        if self.closer.is_closed() {
            return Enqueue::Closed;
        }
        match self.tx.try_send(payload) {
            Ok(()) => Enqueue::Queued,
            Err(mpsc::error::TrySendError::Full(_)) => {
                self.overflows.fetch_add(1, Ordering::Relaxed);
                self.close_slow();
                Enqueue::Overflowed
            }
            Err(mpsc::error::TrySendError::Closed(_)) => Enqueue::Closed,
        }
    }

    /// Force-close this subscriber's connection for falling behind.
    pub fn close_slow(&self) {
        if self.closer.close(CloseReason::SlowConsumer) {
            tracing::warn!(
                subscriber_id = %self.id,
                name = %self.name,
                "evicting slow subscriber"
            );
        }
    }

    pub fn closer(&self) -> &Arc<SessionCloser> {
        &self.closer
    }

    pub fn is_closing(&self) -> bool {
        self.closer.is_closed()
    }

    /// Number of enqueue attempts that found the queue full.
    pub fn overflow_count(&self) -> u64 {
        self.overflows.load(Ordering::Relaxed)
    }

    pub fn age(&self) -> Duration {
        self.connected_at.elapsed()
    }

    pub fn summary(&self) -> SubscriberSummary {
        SubscriberSummary {
            id: self.id.clone(),
            name: self.name.clone(),
        }
    }
}

impl std::fmt::Debug for Subscriber {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscriber")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("closing", &self.is_closing())
            .finish()
    }
}
