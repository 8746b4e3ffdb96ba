use axum::body::Bytes;
use axum::extract::{Path, Query, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;

use labtrack_core::{Actor, ListParams, ListResult, ServiceError};

use crate::model::Notification;
use crate::service::notification::NotificationFilters;
use super::{deleted, optional_body, AppState};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/notifications", get(list_notifications))
        .route("/notifications/@count", get(unread_count))
        .route("/notifications/@read-all", post(read_all))
        .route(
            "/notifications/{id}",
            get(get_notification).delete(delete_notification),
        )
        .route("/notifications/{id}/@read", post(mark_read))
}

#[derive(Debug, Deserialize)]
struct ReadRequest {
    #[serde(default = "default_read")]
    read: bool,
}

impl Default for ReadRequest {
    fn default() -> Self {
        Self { read: true }
    }
}

fn default_read() -> bool {
    true
}

async fn list_notifications(
    State(svc): State<AppState>,
    actor: Actor,
    Query(params): Query<ListParams>,
    Query(filters): Query<NotificationFilters>,
) -> Result<Json<ListResult<Notification>>, ServiceError> {
    Ok(Json(svc.list_notifications(&actor, &params, &filters)?))
}

async fn unread_count(
    State(svc): State<AppState>,
    actor: Actor,
) -> Result<Json<serde_json::Value>, ServiceError> {
    let unread = svc.unread_count(&actor)?;
    Ok(Json(serde_json::json!({ "unread": unread })))
}

async fn read_all(
    State(svc): State<AppState>,
    actor: Actor,
) -> Result<Json<serde_json::Value>, ServiceError> {
    let updated = svc.mark_all_read(&actor)?;
    Ok(Json(serde_json::json!({ "updated": updated })))
}

async fn get_notification(
    State(svc): State<AppState>,
    actor: Actor,
    Path(id): Path<String>,
) -> Result<Json<Notification>, ServiceError> {
    Ok(Json(svc.get_notification(&actor, &id)?))
}

async fn mark_read(
    State(svc): State<AppState>,
    actor: Actor,
    Path(id): Path<String>,
    body: Bytes,
) -> Result<Json<Notification>, ServiceError> {
    let req: ReadRequest = optional_body(&body)?;
    Ok(Json(svc.mark_read(&actor, &id, req.read)?))
}

async fn delete_notification(
    State(svc): State<AppState>,
    actor: Actor,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, ServiceError> {
    svc.delete_notification(&actor, &id)?;
    Ok(deleted())
}
