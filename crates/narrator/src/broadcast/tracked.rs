//! In-memory registry of jobs that are still pending or in flight.

use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::worker::job::JobRecord;

/// Maps job id to the latest non-terminal snapshot of that job.
///
/// Volatile by design of the deployment: a restart loses it. History lives in
/// the persistent job store.
#[derive(Default)]
pub struct TrackedJobs {
    jobs: RwLock<HashMap<String, JobRecord>>,
}

impl TrackedJobs {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<String, JobRecord>> {
        match self.jobs.read() {
            Ok(g) => g,
            Err(poisoned) => {
                log::warn!("Tracked jobs lock was poisoned, recovering");
                poisoned.into_inner()
            }
        }
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<String, JobRecord>> {
        match self.jobs.write() {
            Ok(g) => g,
            Err(poisoned) => {
                log::warn!("Tracked jobs lock was poisoned, recovering");
                poisoned.into_inner()
            }
        }
    }

    /// Starts tracking a job. Terminal jobs are never tracked.
    pub fn track(&self, job: &JobRecord) {
        if job.is_finished() {
            log::warn!("Refusing to track finished job {}", job.id);
            return;
        }
        self.write().insert(job.id.clone(), job.clone());
    }

    /// Refreshes the snapshot of a job that is already tracked. Returns false
    /// when the job is unknown (for instance after a clear) or finished.
    pub fn refresh(&self, job: &JobRecord) -> bool {
        if job.is_finished() {
            return false;
        }
        match self.write().get_mut(&job.id) {
            Some(slot) => {
                *slot = job.clone();
                true
            }
            None => false,
        }
    }

    pub fn remove(&self, job_id: &str) -> Option<JobRecord> {
        self.write().remove(job_id)
    }

    pub fn get(&self, job_id: &str) -> Option<JobRecord> {
        self.read().get(job_id).cloned()
    }

    /// All tracked jobs, oldest first.
    pub fn list(&self) -> Vec<JobRecord> {
        let mut jobs: Vec<JobRecord> = self.read().values().cloned().collect();
        jobs.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        jobs
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    /// Forgets every tracked job and returns how many there were.
    pub fn clear(&self) -> usize {
        let mut jobs = self.write();
        let count = jobs.len();
        jobs.clear();
        count
    }
}
