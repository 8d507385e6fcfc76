//! Durable job records and the recorded events they narrate.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::db::event_repo::{self, EventRow};
use crate::db::job_repo::{self, JobFilter, JobRow};
use crate::db::{Database, DatabaseError};
use crate::error::{NarratorError, Result};
use crate::worker::job::{JobRecord, JobStatus};

/// A game event recorded by the collector, as narrated by a job.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GameEvent {
    pub id: String,
    pub game_session_id: String,
    pub external_event_id: i64,
    /// Selects the prompt template.
    pub event_name: String,
    /// Fields substituted into the template.
    pub event_data: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

/// Persistence for job snapshots.
///
/// Calls are blocking; async callers dispatch them with `spawn_blocking`.
pub trait JobStore: Send + Sync {
    /// Stores a new job.
    fn insert(&self, job: &JobRecord) -> Result<()>;

    /// Overwrites the stored snapshot of an existing job.
    fn update_by_id(&self, job: &JobRecord) -> Result<()>;

    fn fetch_event_by_id(&self, event_id: &str) -> Result<Option<GameEvent>>;

    fn find_job(&self, job_id: &str) -> Result<Option<JobRecord>>;

    /// Filtered history, newest first, with the total number of matches.
    fn query_jobs(&self, filter: &JobFilter) -> Result<(Vec<JobRecord>, u64)>;
}

// ─── Helpers ────────────────────────────────────────────────────────────────

fn format_timestamp(dt: DateTime<Utc>) -> String {
    dt.to_rfc3339()
}

fn parse_timestamp(s: &str, column: &'static str) -> std::result::Result<DateTime<Utc>, DatabaseError> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| DatabaseError::Decode {
            column,
            reason: format!("'{}': {}", s, e),
        })
}

fn parse_optional(
    s: Option<&str>,
    column: &'static str,
) -> std::result::Result<Option<DateTime<Utc>>, DatabaseError> {
    s.map(|s| parse_timestamp(s, column)).transpose()
}

fn job_to_row(job: &JobRecord, updated_at: DateTime<Utc>) -> JobRow {
    JobRow {
        id: job.id.clone(),
        event_id: job.event_id.clone(),
        status: job.status.as_str().to_string(),
        input_text: job.input_text.clone(),
        llm_started_at: job.generation_started_at.map(format_timestamp),
        llm_completed_at: job.generation_completed_at.map(format_timestamp),
        llm_model_name: job.generation_model_name.clone(),
        llm_text: job.generated_text.clone(),
        error_message: job.error_message.clone(),
        tts_started_at: job.synthesis_started_at.map(format_timestamp),
        tts_completed_at: job.synthesis_completed_at.map(format_timestamp),
        tts_model_name: job.synthesis_model_name.clone(),
        audio_url: job.audio_url.clone(),
        audio_duration: job.audio_duration_seconds,
        created_at: format_timestamp(job.created_at),
        updated_at: Some(format_timestamp(updated_at)),
    }
}

fn row_to_job(row: JobRow) -> std::result::Result<JobRecord, DatabaseError> {
    let status = JobStatus::parse(&row.status).ok_or_else(|| DatabaseError::Decode {
        column: "status",
        reason: format!("unknown status '{}' for job {}", row.status, row.id),
    })?;

    Ok(JobRecord {
        status,
        generation_started_at: parse_optional(row.llm_started_at.as_deref(), "llm_started_at")?,
        generation_completed_at: parse_optional(
            row.llm_completed_at.as_deref(),
            "llm_completed_at",
        )?,
        generation_model_name: row.llm_model_name,
        generated_text: row.llm_text,
        error_message: row.error_message,
        synthesis_started_at: parse_optional(row.tts_started_at.as_deref(), "tts_started_at")?,
        synthesis_completed_at: parse_optional(
            row.tts_completed_at.as_deref(),
            "tts_completed_at",
        )?,
        synthesis_model_name: row.tts_model_name,
        audio_url: row.audio_url,
        audio_duration_seconds: row.audio_duration,
        created_at: parse_timestamp(&row.created_at, "created_at")?,
        updated_at: parse_optional(row.updated_at.as_deref(), "updated_at")?,
        id: row.id,
        event_id: row.event_id,
        input_text: row.input_text,
    })
}

fn row_to_event(row: EventRow) -> std::result::Result<GameEvent, DatabaseError> {
    let event_data = serde_json::from_str(&row.event_data).map_err(|e| DatabaseError::Decode {
        column: "event_data",
        reason: e.to_string(),
    })?;

    Ok(GameEvent {
        created_at: parse_timestamp(&row.created_at, "created_at")?,
        id: row.id,
        game_session_id: row.game_session_id,
        external_event_id: row.external_event_id,
        event_name: row.event_name,
        event_data,
    })
}

// ─── SqliteJobStore ─────────────────────────────────────────────────────────

/// `JobStore` over the narrator SQLite database.
#[derive(Clone)]
pub struct SqliteJobStore {
    db: Database,
}

impl SqliteJobStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    /// Records a game event. Used for seeding; the collector owns this table.
    pub fn insert_event(&self, event: &GameEvent) -> Result<()> {
        let row = EventRow {
            id: event.id.clone(),
            game_session_id: event.game_session_id.clone(),
            external_event_id: event.external_event_id,
            event_name: event.event_name.clone(),
            event_data: event.event_data.to_string(),
            created_at: format_timestamp(event.created_at),
        };
        event_repo::insert(&self.db, &row)?;
        Ok(())
    }

    pub fn count_by_status(&self, status: JobStatus) -> Result<u64> {
        Ok(job_repo::count_by_status(&self.db, status.as_str())?)
    }
}

impl JobStore for SqliteJobStore {
    fn insert(&self, job: &JobRecord) -> Result<()> {
        let row = job_to_row(job, job.updated_at.unwrap_or_else(Utc::now));
        job_repo::insert(&self.db, &row)?;
        Ok(())
    }

    fn update_by_id(&self, job: &JobRecord) -> Result<()> {
        let row = job_to_row(job, job.updated_at.unwrap_or_else(Utc::now));
        if job_repo::update(&self.db, &row)? == 0 {
            return Err(NarratorError::not_found("job", &job.id));
        }
        Ok(())
    }

    fn fetch_event_by_id(&self, event_id: &str) -> Result<Option<GameEvent>> {
        let row = event_repo::find_by_id(&self.db, event_id)?;
        Ok(row.map(row_to_event).transpose()?)
    }

    fn find_job(&self, job_id: &str) -> Result<Option<JobRecord>> {
        let row = job_repo::find_by_id(&self.db, job_id)?;
        Ok(row.map(row_to_job).transpose()?)
    }

    fn query_jobs(&self, filter: &JobFilter) -> Result<(Vec<JobRecord>, u64)> {
        let (rows, total) = job_repo::query(&self.db, filter)?;
        let jobs = rows
            .into_iter()
            .map(row_to_job)
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok((jobs, total))
    }
}
