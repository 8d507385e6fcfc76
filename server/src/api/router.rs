use std::path::Path;

use axum::{extract::Request, middleware, Router};
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing::info_span;

use super::{auth, events, health, models};
use crate::state::AppState;

/// Builds the application router. Everything except the health check and
/// the published audio requires the auth token.
pub fn create_router(state: AppState, audio_dir: &Path) -> Router {
    let trace_layer = TraceLayer::new_for_http().make_span_with(|request: &Request| {
        info_span!(
            "http_request",
            method = %request.method(),
            uri = %request.uri().path(),
        )
    });

    let protected = Router::new()
        .merge(events::router())
        .merge(models::router())
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            auth::require_token,
        ));

    Router::new()
        .merge(health::router())
        .merge(protected)
        .nest_service("/audio", ServeDir::new(audio_dir))
        .layer(trace_layer)
        .layer(CorsLayer::permissive())
        .with_state(state)
}
