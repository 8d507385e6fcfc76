//! Read access to recorded game events.
//!
//! Events are written by the game-side collector; `insert` exists for seeding
//! and tests.

use rusqlite::{params, Row};

use super::{Database, DatabaseError};

#[derive(Debug, Clone, PartialEq)]
pub struct EventRow {
    pub id: String,
    pub game_session_id: String,
    pub external_event_id: i64,
    pub event_name: String,
    /// JSON object text.
    pub event_data: String,
    pub created_at: String,
}

impl EventRow {
    fn from_row(row: &Row<'_>) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            id: row.get("id")?,
            game_session_id: row.get("game_session_id")?,
            external_event_id: row.get("external_event_id")?,
            event_name: row.get("event_name")?,
            event_data: row.get("event_data")?,
            created_at: row.get("created_at")?,
        })
    }
}

pub fn insert(db: &Database, event: &EventRow) -> Result<(), DatabaseError> {
    db.with_conn(|conn| {
        conn.execute(
            "INSERT INTO game_events (id, game_session_id, external_event_id, event_name,
             event_data, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                event.id,
                event.game_session_id,
                event.external_event_id,
                event.event_name,
                event.event_data,
                event.created_at,
            ],
        )?;
        Ok(())
    })
}

pub fn find_by_id(db: &Database, id: &str) -> Result<Option<EventRow>, DatabaseError> {
    db.with_conn(|conn| {
        let mut stmt = conn.prepare("SELECT * FROM game_events WHERE id = ?1")?;
        let mut rows = stmt.query_map(params![id], EventRow::from_row)?;
        match rows.next() {
            Some(Ok(row)) => Ok(Some(row)),
            Some(Err(e)) => Err(DatabaseError::Sqlite(e)),
            None => Ok(None),
        }
    })
}
