use axum::extract::{Path, Query, State};
use axum::routing::get;
use axum::{Json, Router};

use labtrack_core::{Actor, ListParams, ListResult, ServiceError};

use crate::model::ActivityLog;
use crate::service::activity::ActivityFilters;
use super::AppState;

/// Read-only: activity is appended by the service, never edited.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/activity", get(list_activity))
        .route("/activity/{id}", get(get_activity))
}

async fn list_activity(
    State(svc): State<AppState>,
    actor: Actor,
    Query(params): Query<ListParams>,
    Query(filters): Query<ActivityFilters>,
) -> Result<Json<ListResult<ActivityLog>>, ServiceError> {
    Ok(Json(svc.list_activity(&actor, &params, &filters)?))
}

async fn get_activity(
    State(svc): State<AppState>,
    actor: Actor,
    Path(id): Path<String>,
) -> Result<Json<ActivityLog>, ServiceError> {
    Ok(Json(svc.get_activity(&actor, &id)?))
}
