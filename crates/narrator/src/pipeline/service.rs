use std::sync::Arc;

use log::{info, warn};
use serde::Serialize;

use crate::broadcast::{StatusBroadcaster, StatusSubscription, TrackedJobs};
use crate::db::job_repo::JobFilter;
use crate::error::{NarratorError, Result};
use crate::prompts::PromptResolver;
use crate::storage::JobStore;
use crate::worker::job::JobRecord;
use crate::worker::queue::JobQueue;

/// How much volatile state a `clear` discarded.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ClearCounts {
    pub tracked: usize,
    pub queue: usize,
    pub status: usize,
}

/// Producer-side entry point: turns recorded events into queued jobs and
/// answers questions about them.
pub struct EventService {
    store: Arc<dyn JobStore>,
    prompts: Arc<PromptResolver>,
    queue: Arc<JobQueue>,
    status: StatusBroadcaster,
    tracked: Arc<TrackedJobs>,
}

impl EventService {
    pub fn new(
        store: Arc<dyn JobStore>,
        prompts: Arc<PromptResolver>,
        queue: Arc<JobQueue>,
        status: StatusBroadcaster,
        tracked: Arc<TrackedJobs>,
    ) -> Self {
        Self {
            store,
            prompts,
            queue,
            status,
            tracked,
        }
    }

    async fn blocking<T, F>(&self, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&dyn JobStore) -> Result<T> + Send + 'static,
    {
        let store = Arc::clone(&self.store);
        tokio::task::spawn_blocking(move || f(store.as_ref())).await?
    }

    /// Enqueues one job per event id and returns the job ids in input order.
    ///
    /// Every event is fetched and its prompt resolved before anything is
    /// enqueued, so a bad id rejects the whole batch. Each job is persisted,
    /// tracked and published as `Pending` before it becomes visible to the
    /// processor.
    pub async fn add_events(&self, event_ids: &[String]) -> Result<Vec<String>> {
        if event_ids.is_empty() {
            return Err(NarratorError::Validation(
                "events_ids must not be empty".to_string(),
            ));
        }

        let ids = event_ids.to_vec();
        let events = self
            .blocking(move |store| {
                ids.iter()
                    .map(|id| {
                        store
                            .fetch_event_by_id(id)?
                            .ok_or_else(|| NarratorError::not_found("event", id))
                    })
                    .collect::<Result<Vec<_>>>()
            })
            .await?;

        let mut jobs = Vec::with_capacity(events.len());
        for event in &events {
            let prompt = self
                .prompts
                .resolve(&event.event_name, &event.event_data)?;
            jobs.push(JobRecord::new(&event.id, prompt));
        }

        let _admission = self.queue.admit().await;
        let mut saved_ids = Vec::with_capacity(jobs.len());
        for mut job in jobs {
            job.touch();
            let snapshot = job.clone();
            self.blocking(move |store| store.insert(&snapshot)).await?;

            self.tracked.track(&job);
            self.status.send(&job);
            info!("Enqueued job {} for event {}", job.id, job.event_id);
            saved_ids.push(job.id.clone());
            self.queue.push(job);
        }

        Ok(saved_ids)
    }

    /// Jobs still pending or processing, oldest first.
    pub fn tracked_jobs(&self) -> Vec<JobRecord> {
        self.tracked.list()
    }

    /// Discards tracked jobs, queued jobs and undelivered status snapshots.
    /// A job already being processed runs to completion. Waits for any batch
    /// being admitted so a batch is never half cleared.
    pub async fn clear(&self) -> ClearCounts {
        let _admission = self.queue.admit().await;
        let counts = ClearCounts {
            tracked: self.tracked.clear(),
            queue: self.queue.clear(),
            status: self.status.clear(),
        };
        warn!(
            "Cleared {} tracked job(s), {} queued job(s), {} status update(s)",
            counts.tracked, counts.queue, counts.status
        );
        counts
    }

    pub fn subscribe(&self) -> StatusSubscription {
        self.status.subscribe()
    }

    /// Status subscriptions still open.
    pub fn subscriber_count(&self) -> usize {
        self.status.subscriber_count()
    }

    /// Live snapshot if the job is still tracked, else the stored record.
    pub async fn job(&self, job_id: &str) -> Result<JobRecord> {
        if let Some(job) = self.tracked.get(job_id) {
            return Ok(job);
        }
        let id = job_id.to_string();
        self.blocking(move |store| store.find_job(&id))
            .await?
            .ok_or_else(|| NarratorError::not_found("job", job_id))
    }

    pub async fn history(&self, filter: JobFilter) -> Result<(Vec<JobRecord>, u64)> {
        self.blocking(move |store| store.query_jobs(&filter)).await
    }

    /// Nothing queued and nothing being processed.
    pub fn is_idle(&self) -> bool {
        self.queue.is_idle()
    }

    pub fn queue_len(&self) -> usize {
        self.queue.len()
    }
}
