pub mod ai;
pub mod app;
pub mod broadcast;
pub mod config;
pub mod db;
pub mod error;
pub mod pipeline;
pub mod prompts;
pub mod storage;
pub mod worker;

pub use ai::{
    Engine, EngineError, Generation, ModelRegistry, SpeechOutput, SpeechSynthesizer,
    TextGenerator,
};
pub use app::{EngineSet, Narrator};
pub use broadcast::{StatusBroadcaster, StatusSubscription, TrackedJobs};
pub use config::{load_config, Config};
pub use db::job_repo::JobFilter;
pub use error::{ConfigError, NarratorError, Result, StorageError};
pub use pipeline::{ClearCounts, EventService, Pipeline, StageError};
pub use prompts::{PromptError, PromptResolver};
pub use storage::{FileSystemSink, GameEvent, JobStore, ObjectSink, SqliteJobStore};
pub use worker::{JobRecord, JobStatus, ProcessorHandle};
