//! Long-poll change feed, `GET /changes?since=N&timeout=S`.
//!
//! Returns immediately when events newer than `since` exist; otherwise
//! waits up to `timeout` seconds for the next write. Clients resume with
//! the returned `latest` sequence and reload everything when `resync` is
//! set.

use std::time::Duration;

use axum::extract::{Query, State};
use axum::routing::get;
use axum::{Json, Router};
use serde::Deserialize;

use labtrack_core::{Actor, ServiceError};
use labtrack_store::ChangeBatch;

use super::AppState;

const DEFAULT_TIMEOUT_SECS: u64 = 30;
const MAX_TIMEOUT_SECS: u64 = 120;

pub fn routes() -> Router<AppState> {
    Router::new().route("/changes", get(poll_changes))
}

#[derive(Debug, Default, Deserialize)]
struct ChangesQuery {
    #[serde(default)]
    since: u64,
    #[serde(default)]
    timeout: Option<u64>,
}

async fn poll_changes(
    State(svc): State<AppState>,
    _actor: Actor,
    Query(q): Query<ChangesQuery>,
) -> Result<Json<ChangeBatch>, ServiceError> {
    let secs = q.timeout.unwrap_or(DEFAULT_TIMEOUT_SECS).min(MAX_TIMEOUT_SECS);
    let batch = svc.feed().wait_since(q.since, Duration::from_secs(secs)).await;
    Ok(Json(batch))
}
