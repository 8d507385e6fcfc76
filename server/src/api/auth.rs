use axum::{
    extract::{Query, Request, State},
    http::header,
    middleware::Next,
    response::{IntoResponse, Response},
};
use serde::Deserialize;

use super::error::ApiError;
use crate::state::AppState;

#[derive(Deserialize)]
struct TokenQuery {
    token: Option<String>,
}

/// Admits requests carrying the configured token, either as
/// `Authorization: Bearer <token>` or as a `token` query parameter
/// (browsers cannot set headers on an `EventSource`).
pub async fn require_token(State(state): State<AppState>, req: Request, next: Next) -> Response {
    match presented_token(&req) {
        Some(token) if token == state.auth_token.as_ref() => next.run(req).await,
        _ => ApiError::unauthorized().into_response(),
    }
}

/// The bearer token, else the percent-decoded `token` query parameter.
fn presented_token(req: &Request) -> Option<String> {
    let bearer = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim);
    if let Some(token) = bearer {
        return Some(token.to_string());
    }

    Query::<TokenQuery>::try_from_uri(req.uri())
        .ok()
        .and_then(|Query(query)| query.token)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;

    fn request(uri: &str) -> Request {
        axum::http::Request::builder()
            .uri(uri)
            .body(Body::empty())
            .unwrap()
    }

    #[test]
    fn test_query_token_is_percent_decoded() {
        let req = request("/events/sse?token=a%2Bb%2Fc%3D");
        assert_eq!(presented_token(&req).as_deref(), Some("a+b/c="));
    }

    #[test]
    fn test_bearer_header_wins_over_query() {
        let mut req = request("/events/list?token=from-query");
        req.headers_mut()
            .insert(header::AUTHORIZATION, "Bearer from-header".parse().unwrap());
        assert_eq!(presented_token(&req).as_deref(), Some("from-header"));
    }

    #[test]
    fn test_missing_token() {
        assert_eq!(presented_token(&request("/events/list?limit=5")), None);
        assert_eq!(presented_token(&request("/events/list")), None);
    }
}
