//! Job repository: row-level access to the `narration_jobs` table.

use rusqlite::{params, Row};

use super::{Database, DatabaseError};

/// A raw `narration_jobs` row. Timestamps are RFC 3339 strings.
#[derive(Debug, Clone, PartialEq)]
pub struct JobRow {
    pub id: String,
    pub event_id: String,
    pub status: String,
    pub input_text: String,
    pub llm_started_at: Option<String>,
    pub llm_completed_at: Option<String>,
    pub llm_model_name: Option<String>,
    pub llm_text: Option<String>,
    pub error_message: Option<String>,
    pub tts_started_at: Option<String>,
    pub tts_completed_at: Option<String>,
    pub tts_model_name: Option<String>,
    pub audio_url: Option<String>,
    pub audio_duration: Option<f64>,
    pub created_at: String,
    pub updated_at: Option<String>,
}

impl JobRow {
    fn from_row(row: &Row<'_>) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            id: row.get("id")?,
            event_id: row.get("event_id")?,
            status: row.get("status")?,
            input_text: row.get("input_text")?,
            llm_started_at: row.get("llm_started_at")?,
            llm_completed_at: row.get("llm_completed_at")?,
            llm_model_name: row.get("llm_model_name")?,
            llm_text: row.get("llm_text")?,
            error_message: row.get("error_message")?,
            tts_started_at: row.get("tts_started_at")?,
            tts_completed_at: row.get("tts_completed_at")?,
            tts_model_name: row.get("tts_model_name")?,
            audio_url: row.get("audio_url")?,
            audio_duration: row.get("audio_duration")?,
            created_at: row.get("created_at")?,
            updated_at: row.get("updated_at")?,
        })
    }
}

/// Filter for history queries. Results are newest first.
#[derive(Debug, Default, Clone)]
pub struct JobFilter {
    pub status: Option<String>,
    pub event_id: Option<String>,
    pub limit: Option<u64>,
    pub offset: Option<u64>,
}

pub fn insert(db: &Database, job: &JobRow) -> Result<(), DatabaseError> {
    db.with_conn(|conn| {
        conn.execute(
            "INSERT INTO narration_jobs (id, event_id, status, input_text, llm_started_at,
             llm_completed_at, llm_model_name, llm_text, error_message, tts_started_at,
             tts_completed_at, tts_model_name, audio_url, audio_duration, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16)",
            params![
                job.id,
                job.event_id,
                job.status,
                job.input_text,
                job.llm_started_at,
                job.llm_completed_at,
                job.llm_model_name,
                job.llm_text,
                job.error_message,
                job.tts_started_at,
                job.tts_completed_at,
                job.tts_model_name,
                job.audio_url,
                job.audio_duration,
                job.created_at,
                job.updated_at,
            ],
        )?;
        Ok(())
    })
}

/// Overwrites every column except `id`, `event_id`, `input_text` and
/// `created_at`. Returns the number of rows touched (0 when the id is unknown).
pub fn update(db: &Database, job: &JobRow) -> Result<usize, DatabaseError> {
    db.with_conn(|conn| {
        let changed = conn.execute(
            "UPDATE narration_jobs SET status=?2, llm_started_at=?3, llm_completed_at=?4,
             llm_model_name=?5, llm_text=?6, error_message=?7, tts_started_at=?8,
             tts_completed_at=?9, tts_model_name=?10, audio_url=?11, audio_duration=?12,
             updated_at=?13
             WHERE id=?1",
            params![
                job.id,
                job.status,
                job.llm_started_at,
                job.llm_completed_at,
                job.llm_model_name,
                job.llm_text,
                job.error_message,
                job.tts_started_at,
                job.tts_completed_at,
                job.tts_model_name,
                job.audio_url,
                job.audio_duration,
                job.updated_at,
            ],
        )?;
        Ok(changed)
    })
}

pub fn find_by_id(db: &Database, id: &str) -> Result<Option<JobRow>, DatabaseError> {
    db.with_conn(|conn| {
        let mut stmt = conn.prepare("SELECT * FROM narration_jobs WHERE id = ?1")?;
        let mut rows = stmt.query_map(params![id], JobRow::from_row)?;
        match rows.next() {
            Some(Ok(row)) => Ok(Some(row)),
            Some(Err(e)) => Err(DatabaseError::Sqlite(e)),
            None => Ok(None),
        }
    })
}

/// Queries jobs with filters, returning (rows, total_count).
pub fn query(db: &Database, filter: &JobFilter) -> Result<(Vec<JobRow>, u64), DatabaseError> {
    db.with_conn(|conn| {
        let mut conditions = Vec::new();
        let mut param_values: Vec<Box<dyn rusqlite::types::ToSql>> = Vec::new();

        if let Some(ref status) = filter.status {
            conditions.push(format!("status = ?{}", param_values.len() + 1));
            param_values.push(Box::new(status.clone()));
        }
        if let Some(ref event_id) = filter.event_id {
            conditions.push(format!("event_id = ?{}", param_values.len() + 1));
            param_values.push(Box::new(event_id.clone()));
        }

        let where_clause = if conditions.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", conditions.join(" AND "))
        };

        let count_sql = format!("SELECT COUNT(*) FROM narration_jobs {}", where_clause);
        let params_ref: Vec<&dyn rusqlite::types::ToSql> =
            param_values.iter().map(|p| p.as_ref()).collect();
        let total: u64 = conn.query_row(&count_sql, params_ref.as_slice(), |r| r.get(0))?;

        let limit = filter.limit.unwrap_or(100) as i64;
        let offset = filter.offset.unwrap_or(0) as i64;
        param_values.push(Box::new(limit));
        param_values.push(Box::new(offset));
        let query_sql = format!(
            "SELECT * FROM narration_jobs {} ORDER BY created_at DESC, rowid DESC LIMIT ?{} OFFSET ?{}",
            where_clause,
            param_values.len() - 1,
            param_values.len()
        );

        let params_ref: Vec<&dyn rusqlite::types::ToSql> =
            param_values.iter().map(|p| p.as_ref()).collect();
        let mut stmt = conn.prepare(&query_sql)?;
        let rows: Vec<JobRow> = stmt
            .query_map(params_ref.as_slice(), JobRow::from_row)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok((rows, total))
    })
}

pub fn count_by_status(db: &Database, status: &str) -> Result<u64, DatabaseError> {
    db.with_conn(|conn| {
        let count: u64 = conn.query_row(
            "SELECT COUNT(*) FROM narration_jobs WHERE status = ?1",
            params![status],
            |r| r.get(0),
        )?;
        Ok(count)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_db() -> Database {
        Database::open_in_memory().expect("Failed to create test database")
    }

    fn sample_job(id: &str, created_at: &str) -> JobRow {
        JobRow {
            id: id.to_string(),
            event_id: "evt-1".to_string(),
            status: "pending".to_string(),
            input_text: "ping".to_string(),
            llm_started_at: None,
            llm_completed_at: None,
            llm_model_name: None,
            llm_text: None,
            error_message: None,
            tts_started_at: None,
            tts_completed_at: None,
            tts_model_name: None,
            audio_url: None,
            audio_duration: None,
            created_at: created_at.to_string(),
            updated_at: None,
        }
    }

    #[test]
    fn test_insert_and_find() {
        let db = test_db();
        let job = sample_job("j1", "2026-01-01T00:00:00+00:00");
        insert(&db, &job).unwrap();

        let found = find_by_id(&db, "j1").unwrap().unwrap();
        assert_eq!(found, job);
        assert!(find_by_id(&db, "missing").unwrap().is_none());
    }

    #[test]
    fn test_update_overwrites_progress() {
        let db = test_db();
        let mut job = sample_job("j1", "2026-01-01T00:00:00+00:00");
        insert(&db, &job).unwrap();

        job.status = "completed".to_string();
        job.llm_text = Some("pong".to_string());
        job.audio_url = Some("https://x/y.wav".to_string());
        job.audio_duration = Some(1.5);
        job.updated_at = Some("2026-01-01T00:00:05+00:00".to_string());
        assert_eq!(update(&db, &job).unwrap(), 1);

        let found = find_by_id(&db, "j1").unwrap().unwrap();
        assert_eq!(found.status, "completed");
        assert_eq!(found.llm_text.as_deref(), Some("pong"));
        assert_eq!(found.audio_duration, Some(1.5));
    }

    #[test]
    fn test_update_unknown_id_touches_nothing() {
        let db = test_db();
        let job = sample_job("ghost", "2026-01-01T00:00:00+00:00");
        assert_eq!(update(&db, &job).unwrap(), 0);
    }

    #[test]
    fn test_query_filters_and_paginates() {
        let db = test_db();
        for i in 0..5 {
            let mut job = sample_job(&format!("j{}", i), &format!("2026-01-01T00:00:0{}+00:00", i));
            if i % 2 == 0 {
                job.status = "completed".to_string();
            }
            insert(&db, &job).unwrap();
        }

        let (rows, total) = query(&db, &JobFilter::default()).unwrap();
        assert_eq!(total, 5);
        assert_eq!(rows[0].id, "j4");

        let filter = JobFilter {
            status: Some("completed".to_string()),
            limit: Some(2),
            ..Default::default()
        };
        let (rows, total) = query(&db, &filter).unwrap();
        assert_eq!(total, 3);
        assert_eq!(
            rows.iter().map(|r| r.id.as_str()).collect::<Vec<_>>(),
            vec!["j4", "j2"]
        );

        let filter = JobFilter {
            offset: Some(4),
            ..Default::default()
        };
        let (rows, _) = query(&db, &filter).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].id, "j0");
    }

    #[test]
    fn test_count_by_status() {
        let db = test_db();
        insert(&db, &sample_job("a", "2026-01-01T00:00:00+00:00")).unwrap();
        insert(&db, &sample_job("b", "2026-01-01T00:00:01+00:00")).unwrap();

        assert_eq!(count_by_status(&db, "pending").unwrap(), 2);
        assert_eq!(count_by_status(&db, "failed").unwrap(), 0);
    }
}
