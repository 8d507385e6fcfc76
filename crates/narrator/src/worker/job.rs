use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Lifecycle state of a narration job.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Processing => "processing",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(JobStatus::Pending),
            "processing" => Some(JobStatus::Processing),
            "completed" => Some(JobStatus::Completed),
            "failed" => Some(JobStatus::Failed),
            _ => None,
        }
    }

    /// True for `Completed` and `Failed`.
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum JobError {
    #[error("Illegal job transition {from} -> {to}")]
    InvalidTransition { from: JobStatus, to: JobStatus },

    #[error("Stage '{stage}' finished before it started")]
    StageNotStarted { stage: &'static str },
}

/// A narration job and its audit trail.
///
/// Serialized keys match the `narration_jobs` columns, so a status snapshot
/// and a stored row use the same names (`event_id`, `llm_*`, `tts_*`).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct JobRecord {
    pub id: String,
    /// Id of the recorded game event this job narrates.
    pub event_id: String,
    pub status: JobStatus,
    pub input_text: String,

    #[serde(rename = "llm_started_at")]
    pub generation_started_at: Option<DateTime<Utc>>,
    #[serde(rename = "llm_completed_at")]
    pub generation_completed_at: Option<DateTime<Utc>>,
    #[serde(rename = "llm_model_name")]
    pub generation_model_name: Option<String>,
    #[serde(rename = "llm_text")]
    pub generated_text: Option<String>,

    pub error_message: Option<String>,

    #[serde(rename = "tts_started_at")]
    pub synthesis_started_at: Option<DateTime<Utc>>,
    #[serde(rename = "tts_completed_at")]
    pub synthesis_completed_at: Option<DateTime<Utc>>,
    #[serde(rename = "tts_model_name")]
    pub synthesis_model_name: Option<String>,
    pub audio_url: Option<String>,
    #[serde(rename = "audio_duration")]
    pub audio_duration_seconds: Option<f64>,

    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl JobRecord {
    /// Creates a `Pending` job for the given event and resolved prompt.
    pub fn new(event_id: impl Into<String>, input_text: impl Into<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            event_id: event_id.into(),
            status: JobStatus::Pending,
            input_text: input_text.into(),
            generation_started_at: None,
            generation_completed_at: None,
            generation_model_name: None,
            generated_text: None,
            error_message: None,
            synthesis_started_at: None,
            synthesis_completed_at: None,
            synthesis_model_name: None,
            audio_url: None,
            audio_duration_seconds: None,
            created_at: Utc::now(),
            updated_at: None,
        }
    }

    pub fn is_finished(&self) -> bool {
        self.status.is_terminal()
    }

    /// Stamps `updated_at`; called before every persisted snapshot.
    pub fn touch(&mut self) {
        self.updated_at = Some(Utc::now());
    }

    fn transition(&mut self, from: JobStatus, to: JobStatus) -> Result<(), JobError> {
        if self.status != from {
            return Err(JobError::InvalidTransition {
                from: self.status,
                to,
            });
        }
        self.status = to;
        Ok(())
    }

    /// `Pending -> Processing`. Happens exactly once, when the processor dequeues the job.
    pub fn start_processing(&mut self) -> Result<(), JobError> {
        self.transition(JobStatus::Pending, JobStatus::Processing)
    }

    /// `Processing -> Completed`.
    pub fn complete(&mut self) -> Result<(), JobError> {
        self.transition(JobStatus::Processing, JobStatus::Completed)
    }

    /// `Processing -> Failed`, recording the reason.
    pub fn fail(&mut self, message: impl Into<String>) -> Result<(), JobError> {
        self.transition(JobStatus::Processing, JobStatus::Failed)?;
        self.error_message = Some(message.into());
        Ok(())
    }

    pub fn begin_generation(&mut self, model_name: &str) {
        self.generation_started_at = Some(Utc::now());
        self.generation_model_name = Some(model_name.to_string());
    }

    pub fn finish_generation(&mut self, text: String) -> Result<(), JobError> {
        let started = self
            .generation_started_at
            .ok_or(JobError::StageNotStarted {
                stage: "generation",
            })?;
        self.generation_completed_at = Some(not_before(started));
        self.generated_text = Some(text);
        Ok(())
    }

    pub fn begin_synthesis(&mut self, model_name: &str) {
        self.synthesis_started_at = Some(Utc::now());
        self.synthesis_model_name = Some(model_name.to_string());
    }

    pub fn finish_synthesis(&mut self, audio_url: String, duration: f64) -> Result<(), JobError> {
        let started = self
            .synthesis_started_at
            .ok_or(JobError::StageNotStarted { stage: "synthesis" })?;
        self.synthesis_completed_at = Some(not_before(started));
        self.audio_url = Some(audio_url);
        self.audio_duration_seconds = Some(duration);
        Ok(())
    }
}

/// Wall clock can step backwards; completion never precedes its start.
fn not_before(started: DateTime<Utc>) -> DateTime<Utc> {
    Utc::now().max(started)
}
