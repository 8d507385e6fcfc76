use std::sync::Arc;

use narrator::Narrator;
use tokio::sync::watch;

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub narrator: Arc<Narrator>,
    /// Bearer token every protected route expects.
    pub auth_token: Arc<str>,
    /// Flips to `true` when the server starts shutting down; open status
    /// streams end on it so graceful shutdown does not wait on them.
    pub shutdown: watch::Receiver<bool>,
}

impl AppState {
    pub fn new(
        narrator: Arc<Narrator>,
        auth_token: impl Into<Arc<str>>,
        shutdown: watch::Receiver<bool>,
    ) -> Self {
        Self {
            narrator,
            auth_token: auth_token.into(),
            shutdown,
        }
    }
}
