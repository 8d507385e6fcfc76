use std::convert::Infallible;
use std::time::Duration;

use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Path, Query, State,
    },
    response::sse::{Event, KeepAlive, Sse},
    routing::{get, post, put},
    Json, Router,
};
use futures_util::stream::{self, Stream, StreamExt};
use narrator::{ClearCounts, JobFilter, JobRecord, JobStatus, StatusSubscription};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::error::ApiError;
use crate::state::AppState;

const STATUS_EVENT: &str = "event_status";
const CLIENT_RETRY: Duration = Duration::from_millis(1000);
const MAX_PAGE: u64 = 500;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/events/add", post(add_events))
        .route("/events/list", get(list_events))
        .route("/events/clear", put(clear_events))
        .route("/events/sse", get(stream_status))
        .route("/events/history", get(history))
        .route("/events/{id}", get(get_job))
}

#[derive(Debug, Deserialize)]
pub struct AddEventsRequest {
    pub events_ids: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct AddEventsResponse {
    pub saved_ids: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct ListEventsResponse {
    pub events: Vec<JobRecord>,
}

#[derive(Debug, Default, Deserialize)]
pub struct HistoryQuery {
    pub status: Option<String>,
    pub event_id: Option<String>,
    pub limit: Option<u64>,
    pub offset: Option<u64>,
}

#[derive(Debug, Serialize)]
pub struct HistoryResponse {
    pub jobs: Vec<JobRecord>,
    pub total: u64,
}

async fn add_events(
    State(state): State<AppState>,
    payload: Result<Json<AddEventsRequest>, JsonRejection>,
) -> Result<Json<AddEventsResponse>, ApiError> {
    let Json(request) = payload?;
    let saved_ids = state
        .narrator
        .events()
        .add_events(&request.events_ids)
        .await?;
    Ok(Json(AddEventsResponse { saved_ids }))
}

async fn list_events(State(state): State<AppState>) -> Json<ListEventsResponse> {
    Json(ListEventsResponse {
        events: state.narrator.events().tracked_jobs(),
    })
}

async fn clear_events(State(state): State<AppState>) -> Json<ClearCounts> {
    Json(state.narrator.events().clear().await)
}

async fn history(
    State(state): State<AppState>,
    query: Result<Query<HistoryQuery>, QueryRejection>,
) -> Result<Json<HistoryResponse>, ApiError> {
    let Query(query) = query?;
    if let Some(status) = &query.status {
        if JobStatus::parse(status).is_none() {
            return Err(ApiError::bad_request(format!(
                "Unknown status '{}'; expected pending, processing, completed or failed",
                status
            )));
        }
    }

    let filter = JobFilter {
        status: query.status,
        event_id: query.event_id,
        limit: query.limit.map(|l| l.min(MAX_PAGE)),
        offset: query.offset,
    };
    let (jobs, total) = state.narrator.events().history(filter).await?;
    Ok(Json(HistoryResponse { jobs, total }))
}

async fn get_job(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<JobRecord>, ApiError> {
    Ok(Json(state.narrator.events().job(&id).await?))
}

/// Logs the connect/disconnect pair of one status stream.
struct StreamConnection {
    id: String,
}

impl StreamConnection {
    fn open(open_streams: usize) -> Self {
        let id = uuid::Uuid::new_v4().to_string();
        info!("Status stream {} connected ({} open)", id, open_streams);
        Self { id }
    }
}

impl Drop for StreamConnection {
    fn drop(&mut self) {
        info!("Status stream {} disconnected", self.id);
    }
}

/// Server-sent status snapshots. Each client gets its own subscription, so
/// every connected client sees every update published after it connected.
async fn stream_status(
    State(state): State<AppState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let subscription = state.narrator.events().subscribe();
    let connection = StreamConnection::open(state.narrator.events().subscriber_count());

    let updates = stream::unfold(
        (subscription, connection),
        |(subscription, connection): (StatusSubscription, StreamConnection)| async move {
            let job = subscription.recv().await;
            Some((Ok(status_event(&job)), (subscription, connection)))
        },
    );

    let mut shutdown = state.shutdown.clone();
    let stopped = async move {
        let _ = shutdown.wait_for(|stopping| *stopping).await;
    };

    Sse::new(updates.take_until(stopped)).keep_alive(KeepAlive::default())
}

fn status_event(job: &JobRecord) -> Event {
    let event = Event::default()
        .event(STATUS_EVENT)
        .id(uuid::Uuid::new_v4().to_string())
        .retry(CLIENT_RETRY);
    match event.json_data(job) {
        Ok(event) => event,
        Err(e) => {
            warn!("Failed to serialize status of job {}: {}", job.id, e);
            Event::default().comment("unserializable status update")
        }
    }
}
