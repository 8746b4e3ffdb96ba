use axum::extract::{Path, Query, State};
use axum::routing::get;
use axum::{Json, Router};

use labtrack_core::{Actor, ListParams, ListResult, ServiceError};

use crate::model::Lab;
use crate::service::lab::{CreateLab, LabFilters};
use super::{deleted, AppState};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/labs", get(list_labs).post(create_lab))
        .route("/labs/{id}", get(get_lab).patch(update_lab).delete(delete_lab))
}

async fn list_labs(
    State(svc): State<AppState>,
    _actor: Actor,
    Query(params): Query<ListParams>,
    Query(filters): Query<LabFilters>,
) -> Result<Json<ListResult<Lab>>, ServiceError> {
    Ok(Json(svc.list_labs(&params, &filters)?))
}

async fn create_lab(
    State(svc): State<AppState>,
    actor: Actor,
    Json(input): Json<CreateLab>,
) -> Result<Json<Lab>, ServiceError> {
    Ok(Json(svc.create_lab(&actor, input)?))
}

async fn get_lab(
    State(svc): State<AppState>,
    _actor: Actor,
    Path(id): Path<String>,
) -> Result<Json<Lab>, ServiceError> {
    Ok(Json(svc.get_lab(&id)?))
}

async fn update_lab(
    State(svc): State<AppState>,
    actor: Actor,
    Path(id): Path<String>,
    Json(patch): Json<serde_json::Value>,
) -> Result<Json<Lab>, ServiceError> {
    Ok(Json(svc.update_lab(&actor, &id, patch)?))
}

async fn delete_lab(
    State(svc): State<AppState>,
    actor: Actor,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, ServiceError> {
    svc.delete_lab(&actor, &id)?;
    Ok(deleted())
}
