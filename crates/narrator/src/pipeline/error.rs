use thiserror::Error;

use crate::ai::EngineError;
use crate::error::StorageError;
use crate::worker::job::JobError;

/// Why a job's pipeline stopped short of `Completed`.
///
/// The display text becomes the job's `error_message`.
#[derive(Error, Debug)]
pub enum StageError {
    #[error("Text generation with '{model}' failed: {source}")]
    Generation {
        model: String,
        #[source]
        source: EngineError,
    },

    #[error("Speech synthesis with '{model}' failed: {source}")]
    Synthesis {
        model: String,
        #[source]
        source: EngineError,
    },

    #[error("Audio upload failed: {0}")]
    Upload(#[from] StorageError),

    #[error("Stage task was interrupted: {0}")]
    Interrupted(String),

    #[error("Job bookkeeping failed: {0}")]
    Job(#[from] JobError),
}

impl StageError {
    /// Short stage label for logs.
    pub fn stage(&self) -> &'static str {
        match self {
            StageError::Generation { .. } => "generation",
            StageError::Synthesis { .. } => "synthesis",
            StageError::Upload(_) => "upload",
            StageError::Interrupted(_) => "interrupted",
            StageError::Job(_) => "bookkeeping",
        }
    }
}

/// Result of one pipeline stage.
pub type StageOutcome<T> = Result<T, StageError>;
