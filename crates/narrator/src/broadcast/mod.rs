//! Live status fan-out and the registry of jobs still in the pipeline.

pub mod job_status;
pub mod tracked;

pub use job_status::{StatusBroadcaster, StatusSubscription};
pub use tracked::TrackedJobs;
