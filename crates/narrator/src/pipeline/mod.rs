//! Per-job stage execution and the producer-side event service.

pub mod error;
pub mod runner;
pub mod service;

pub use error::{StageError, StageOutcome};
pub use runner::Pipeline;
pub use service::{ClearCounts, EventService};
