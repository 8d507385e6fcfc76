//! Live job status fan-out.

use std::sync::{Arc, Mutex, MutexGuard, Weak};

use crate::worker::job::JobRecord;
use crate::worker::queue::FifoQueue;

type SubscriberQueue = FifoQueue<JobRecord>;

/// Publishes job snapshots to every live subscriber.
///
/// Each subscriber owns an unbounded queue, so a slow consumer never loses
/// snapshots and never delays the others. Subscribers that were dropped are
/// pruned on the next publish.
#[derive(Clone, Default)]
pub struct StatusBroadcaster {
    subscribers: Arc<Mutex<Vec<Weak<SubscriberQueue>>>>,
}

impl StatusBroadcaster {
    pub fn new() -> Self {
        Self::default()
    }

    fn subscribers(&self) -> MutexGuard<'_, Vec<Weak<SubscriberQueue>>> {
        match self.subscribers.lock() {
            Ok(g) => g,
            Err(poisoned) => {
                log::warn!("Status subscriber list lock was poisoned, recovering");
                poisoned.into_inner()
            }
        }
    }

    /// Appends a snapshot to every subscriber's queue.
    ///
    /// The subscriber list stays locked for the whole fan-out, so concurrent
    /// publishers are observed in the same relative order by everyone.
    pub fn send(&self, snapshot: &JobRecord) {
        self.subscribers().retain(|weak| match weak.upgrade() {
            Some(queue) => {
                queue.push(snapshot.clone());
                true
            }
            None => false,
        });
    }

    /// Registers a new subscriber. Only snapshots published after this call
    /// are delivered to it.
    pub fn subscribe(&self) -> StatusSubscription {
        let queue = Arc::new(SubscriberQueue::new());
        self.subscribers().push(Arc::downgrade(&queue));
        StatusSubscription { queue }
    }

    /// Number of subscribers still alive.
    pub fn subscriber_count(&self) -> usize {
        self.subscribers()
            .iter()
            .filter(|weak| weak.strong_count() > 0)
            .count()
    }

    /// Drops every undelivered snapshot and returns how many there were.
    pub fn clear(&self) -> usize {
        self.subscribers()
            .iter()
            .filter_map(Weak::upgrade)
            .map(|queue| queue.clear())
            .sum()
    }
}

/// Receiving end of a status subscription. Dropping it unsubscribes.
pub struct StatusSubscription {
    queue: Arc<SubscriberQueue>,
}

impl StatusSubscription {
    /// Waits for the next snapshot.
    pub async fn recv(&self) -> JobRecord {
        self.queue.pop().await
    }

    pub fn try_recv(&self) -> Option<JobRecord> {
        self.queue.try_pop()
    }
}
