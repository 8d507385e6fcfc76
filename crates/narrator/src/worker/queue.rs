//! Unbounded FIFO hand-off primitives.
//!
//! `FifoQueue` is the plain building block used for per-subscriber status
//! delivery. `JobQueue` adds the two pieces of bookkeeping the model hot-swap
//! guard needs: which job (if any) the processor has dequeued but not yet
//! finished, and an admission lock that producers and model switches share.

use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard};

use tokio::sync::Notify;

use super::job::JobRecord;

fn lock_recover<'a, T>(mutex: &'a Mutex<T>, what: &str) -> MutexGuard<'a, T> {
    match mutex.lock() {
        Ok(g) => g,
        Err(poisoned) => {
            log::warn!("{} lock was poisoned, recovering", what);
            poisoned.into_inner()
        }
    }
}

/// Unbounded, ordered, single-consumer queue. `push` never blocks; `pop`
/// suspends until an item is available.
pub struct FifoQueue<T> {
    items: Mutex<VecDeque<T>>,
    notify: Notify,
}

impl<T> FifoQueue<T> {
    pub fn new() -> Self {
        Self {
            items: Mutex::new(VecDeque::new()),
            notify: Notify::new(),
        }
    }

    pub fn push(&self, item: T) {
        lock_recover(&self.items, "Fifo queue").push_back(item);
        self.notify.notify_one();
    }

    pub fn try_pop(&self) -> Option<T> {
        lock_recover(&self.items, "Fifo queue").pop_front()
    }

    pub async fn pop(&self) -> T {
        loop {
            if let Some(item) = self.try_pop() {
                return item;
            }
            // `notify_one` leaves a permit when nobody is waiting, so a push
            // landing between `try_pop` and here is not lost.
            self.notify.notified().await;
        }
    }

    pub fn len(&self) -> usize {
        lock_recover(&self.items, "Fifo queue").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Discards every queued item and returns how many were dropped.
    pub fn clear(&self) -> usize {
        let mut items = lock_recover(&self.items, "Fifo queue");
        let count = items.len();
        items.clear();
        count
    }
}

impl<T> Default for FifoQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

struct JobQueueState {
    pending: VecDeque<JobRecord>,
    in_flight: Option<String>,
}

/// The ordered job hand-off between producers and the single processor.
pub struct JobQueue {
    state: Mutex<JobQueueState>,
    notify: Notify,
    admission: tokio::sync::Mutex<()>,
}

/// Marks the dequeued job as in flight until dropped.
#[must_use = "dropping the guard ends the in-flight window immediately"]
pub struct InFlight<'a> {
    queue: &'a JobQueue,
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.queue.state().in_flight = None;
    }
}

/// Held by producers while enqueueing and by model switches while swapping.
pub struct Admission<'a> {
    _guard: tokio::sync::MutexGuard<'a, ()>,
}

impl JobQueue {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(JobQueueState {
                pending: VecDeque::new(),
                in_flight: None,
            }),
            notify: Notify::new(),
            admission: tokio::sync::Mutex::new(()),
        }
    }

    fn state(&self) -> MutexGuard<'_, JobQueueState> {
        lock_recover(&self.state, "Job queue")
    }

    /// Waits for exclusive admission. Pushes made while holding it cannot race
    /// a model switch.
    pub async fn admit(&self) -> Admission<'_> {
        Admission {
            _guard: self.admission.lock().await,
        }
    }

    pub fn push(&self, job: JobRecord) {
        self.state().pending.push_back(job);
        self.notify.notify_one();
    }

    /// Dequeues the oldest job, suspending while the queue is empty. The job
    /// counts as in flight until the returned guard is dropped.
    pub async fn pop(&self) -> (JobRecord, InFlight<'_>) {
        loop {
            {
                let mut state = self.state();
                if let Some(job) = state.pending.pop_front() {
                    state.in_flight = Some(job.id.clone());
                    return (job, InFlight { queue: self });
                }
            }
            self.notify.notified().await;
        }
    }

    pub fn len(&self) -> usize {
        self.state().pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state().pending.is_empty()
    }

    /// Id of the job the processor is currently working on.
    pub fn in_flight(&self) -> Option<String> {
        self.state().in_flight.clone()
    }

    /// No queued jobs and nothing in flight.
    pub fn is_idle(&self) -> bool {
        let state = self.state();
        state.pending.is_empty() && state.in_flight.is_none()
    }

    /// Discards queued jobs. A job already dequeued keeps running.
    pub fn clear(&self) -> usize {
        let mut state = self.state();
        let count = state.pending.len();
        state.pending.clear();
        count
    }
}

impl Default for JobQueue {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    #[tokio::test]
    async fn test_fifo_order() {
        let queue = FifoQueue::new();
        for i in 0..5 {
            queue.push(i);
        }
        assert_eq!(queue.len(), 5);
        for i in 0..5 {
            assert_eq!(queue.pop().await, i);
        }
        assert!(queue.is_empty());
    }

    #[tokio::test]
    async fn test_pop_waits_for_push() {
        let queue = Arc::new(FifoQueue::new());
        let consumer = {
            let queue = Arc::clone(&queue);
            tokio::spawn(async move { queue.pop().await })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!consumer.is_finished());

        queue.push("late");
        let item = tokio::time::timeout(Duration::from_secs(1), consumer)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(item, "late");
    }

    #[test]
    fn test_fifo_clear_returns_count() {
        let queue = FifoQueue::new();
        queue.push(1);
        queue.push(2);
        assert_eq!(queue.clear(), 2);
        assert_eq!(queue.clear(), 0);
        assert!(queue.try_pop().is_none());
    }

    #[tokio::test]
    async fn test_job_queue_tracks_in_flight() {
        let queue = JobQueue::new();
        assert!(queue.is_idle());

        let job = JobRecord::new("evt-1", "ping");
        let id = job.id.clone();
        queue.push(job);
        assert!(!queue.is_empty());
        assert!(!queue.is_idle());

        let (popped, in_flight) = queue.pop().await;
        assert_eq!(popped.id, id);
        assert!(queue.is_empty());
        assert_eq!(queue.in_flight(), Some(id));
        assert!(!queue.is_idle());

        drop(in_flight);
        assert!(queue.in_flight().is_none());
        assert!(queue.is_idle());
    }

    #[tokio::test]
    async fn test_job_queue_preserves_order() {
        let queue = JobQueue::new();
        let ids: Vec<String> = (0..3)
            .map(|i| {
                let job = JobRecord::new(format!("evt-{}", i), "x");
                let id = job.id.clone();
                queue.push(job);
                id
            })
            .collect();

        for id in ids {
            let (job, _in_flight) = queue.pop().await;
            assert_eq!(job.id, id);
        }
    }

    #[tokio::test]
    async fn test_clear_keeps_in_flight_job() {
        let queue = JobQueue::new();
        queue.push(JobRecord::new("evt-1", "a"));
        queue.push(JobRecord::new("evt-2", "b"));
        queue.push(JobRecord::new("evt-3", "c"));

        let (job, _in_flight) = queue.pop().await;
        assert_eq!(queue.clear(), 2);
        assert_eq!(queue.in_flight(), Some(job.id));
        assert!(queue.is_empty());
    }

    #[tokio::test]
    async fn test_admission_is_exclusive() {
        let queue = Arc::new(JobQueue::new());
        let held = queue.admit().await;

        let contender = {
            let queue = Arc::clone(&queue);
            tokio::spawn(async move {
                let _admission = queue.admit().await;
            })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!contender.is_finished());

        drop(held);
        tokio::time::timeout(Duration::from_secs(1), contender)
            .await
            .unwrap()
            .unwrap();
    }
}
