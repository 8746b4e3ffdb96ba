use axum::body::Bytes;
use axum::extract::{Path, Query, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;

use labtrack_core::{Actor, ListParams, ListResult, ServiceError};

use crate::model::Asset;
use crate::service::asset::{ApprovalSlot, AssetFilters, CreateAsset};
use super::{deleted, optional_body, AppState};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/assets", get(list_assets).post(create_asset))
        .route(
            "/assets/{id}",
            get(get_asset).patch(update_asset).delete(delete_asset),
        )
        .route("/assets/{id}/@approve", post(approve_asset))
}

#[derive(Debug, Default, Deserialize)]
struct ApproveRequest {
    /// Slot an admin approves as; ignored for other roles.
    #[serde(rename = "as", default)]
    slot: Option<ApprovalSlot>,
}

async fn list_assets(
    State(svc): State<AppState>,
    _actor: Actor,
    Query(params): Query<ListParams>,
    Query(filters): Query<AssetFilters>,
) -> Result<Json<ListResult<Asset>>, ServiceError> {
    Ok(Json(svc.list_assets(&params, &filters)?))
}

async fn create_asset(
    State(svc): State<AppState>,
    actor: Actor,
    Json(input): Json<CreateAsset>,
) -> Result<Json<Asset>, ServiceError> {
    Ok(Json(svc.create_asset(&actor, input)?))
}

async fn get_asset(
    State(svc): State<AppState>,
    _actor: Actor,
    Path(id): Path<String>,
) -> Result<Json<Asset>, ServiceError> {
    Ok(Json(svc.get_asset(&id)?))
}

async fn update_asset(
    State(svc): State<AppState>,
    actor: Actor,
    Path(id): Path<String>,
    Json(patch): Json<serde_json::Value>,
) -> Result<Json<Asset>, ServiceError> {
    Ok(Json(svc.update_asset(&actor, &id, patch)?))
}

async fn delete_asset(
    State(svc): State<AppState>,
    actor: Actor,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, ServiceError> {
    svc.delete_asset(&actor, &id)?;
    Ok(deleted())
}

async fn approve_asset(
    State(svc): State<AppState>,
    actor: Actor,
    Path(id): Path<String>,
    body: Bytes,
) -> Result<Json<Asset>, ServiceError> {
    let req: ApproveRequest = optional_body(&body)?;
    Ok(Json(svc.approve_asset(&actor, &id, req.slot)?))
}
