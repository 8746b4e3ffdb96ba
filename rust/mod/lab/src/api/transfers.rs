use axum::extract::{Path, Query, State};
use axum::routing::{get, post};
use axum::{Json, Router};

use labtrack_core::{Actor, ListParams, ListResult, ServiceError};

use crate::model::AssetTransfer;
use crate::service::transfer::{CreateTransfer, TransferFilters};
use super::{deleted, AppState};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/transfers", get(list_transfers).post(create_transfer))
        .route(
            "/transfers/{id}",
            get(get_transfer).patch(update_transfer).delete(delete_transfer),
        )
        .route("/transfers/{id}/@receive", post(receive_transfer))
}

async fn list_transfers(
    State(svc): State<AppState>,
    _actor: Actor,
    Query(params): Query<ListParams>,
    Query(filters): Query<TransferFilters>,
) -> Result<Json<ListResult<AssetTransfer>>, ServiceError> {
    Ok(Json(svc.list_transfers(&params, &filters)?))
}

async fn create_transfer(
    State(svc): State<AppState>,
    actor: Actor,
    Json(input): Json<CreateTransfer>,
) -> Result<Json<AssetTransfer>, ServiceError> {
    Ok(Json(svc.create_transfer(&actor, input)?))
}

async fn get_transfer(
    State(svc): State<AppState>,
    _actor: Actor,
    Path(id): Path<String>,
) -> Result<Json<AssetTransfer>, ServiceError> {
    Ok(Json(svc.get_transfer(&id)?))
}

async fn update_transfer(
    State(svc): State<AppState>,
    actor: Actor,
    Path(id): Path<String>,
    Json(patch): Json<serde_json::Value>,
) -> Result<Json<AssetTransfer>, ServiceError> {
    Ok(Json(svc.update_transfer(&actor, &id, patch)?))
}

async fn delete_transfer(
    State(svc): State<AppState>,
    actor: Actor,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, ServiceError> {
    svc.delete_transfer(&actor, &id)?;
    Ok(deleted())
}

async fn receive_transfer(
    State(svc): State<AppState>,
    actor: Actor,
    Path(id): Path<String>,
) -> Result<Json<AssetTransfer>, ServiceError> {
    Ok(Json(svc.receive_transfer(&actor, &id)?))
}
