use axum::extract::{Path, Query, State};
use axum::routing::{get, post};
use axum::{Json, Router};

use labtrack_core::{Actor, ListParams, ListResult, ServiceError};

use crate::model::{AssetIssue, LabIssue};
use crate::service::issue::{CreateAssetIssue, CreateLabIssue, IssueFilters, StatusChange};
use super::{deleted, AppState};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/lab-issues", get(list_lab_issues).post(create_lab_issue))
        .route(
            "/lab-issues/{id}",
            get(get_lab_issue).patch(update_lab_issue).delete(delete_lab_issue),
        )
        .route("/lab-issues/{id}/@status", post(set_lab_issue_status))
        .route("/asset-issues", get(list_asset_issues).post(create_asset_issue))
        .route(
            "/asset-issues/{id}",
            get(get_asset_issue).patch(update_asset_issue).delete(delete_asset_issue),
        )
        .route("/asset-issues/{id}/@status", post(set_asset_issue_status))
}

// ---------------------------------------------------------------------------
// Lab issues
// ---------------------------------------------------------------------------

async fn list_lab_issues(
    State(svc): State<AppState>,
    _actor: Actor,
    Query(params): Query<ListParams>,
    Query(filters): Query<IssueFilters>,
) -> Result<Json<ListResult<LabIssue>>, ServiceError> {
    Ok(Json(svc.list_lab_issues(&params, &filters)?))
}

async fn create_lab_issue(
    State(svc): State<AppState>,
    actor: Actor,
    Json(input): Json<CreateLabIssue>,
) -> Result<Json<LabIssue>, ServiceError> {
    Ok(Json(svc.create_lab_issue(&actor, input)?))
}

async fn get_lab_issue(
    State(svc): State<AppState>,
    _actor: Actor,
    Path(id): Path<String>,
) -> Result<Json<LabIssue>, ServiceError> {
    Ok(Json(svc.get_lab_issue(&id)?))
}

async fn update_lab_issue(
    State(svc): State<AppState>,
    actor: Actor,
    Path(id): Path<String>,
    Json(patch): Json<serde_json::Value>,
) -> Result<Json<LabIssue>, ServiceError> {
    Ok(Json(svc.update_lab_issue(&actor, &id, patch)?))
}

async fn delete_lab_issue(
    State(svc): State<AppState>,
    actor: Actor,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, ServiceError> {
    svc.delete_lab_issue(&actor, &id)?;
    Ok(deleted())
}

async fn set_lab_issue_status(
    State(svc): State<AppState>,
    actor: Actor,
    Path(id): Path<String>,
    Json(change): Json<StatusChange>,
) -> Result<Json<LabIssue>, ServiceError> {
    Ok(Json(svc.set_lab_issue_status(&actor, &id, change)?))
}

// ---------------------------------------------------------------------------
// Asset issues
// ---------------------------------------------------------------------------

async fn list_asset_issues(
    State(svc): State<AppState>,
    _actor: Actor,
    Query(params): Query<ListParams>,
    Query(filters): Query<IssueFilters>,
) -> Result<Json<ListResult<AssetIssue>>, ServiceError> {
    Ok(Json(svc.list_asset_issues(&params, &filters)?))
}

async fn create_asset_issue(
    State(svc): State<AppState>,
    actor: Actor,
    Json(input): Json<CreateAssetIssue>,
) -> Result<Json<AssetIssue>, ServiceError> {
    Ok(Json(svc.create_asset_issue(&actor, input)?))
}

async fn get_asset_issue(
    State(svc): State<AppState>,
    _actor: Actor,
    Path(id): Path<String>,
) -> Result<Json<AssetIssue>, ServiceError> {
    Ok(Json(svc.get_asset_issue(&id)?))
}

async fn update_asset_issue(
    State(svc): State<AppState>,
    actor: Actor,
    Path(id): Path<String>,
    Json(patch): Json<serde_json::Value>,
) -> Result<Json<AssetIssue>, ServiceError> {
    Ok(Json(svc.update_asset_issue(&actor, &id, patch)?))
}

async fn delete_asset_issue(
    State(svc): State<AppState>,
    actor: Actor,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, ServiceError> {
    svc.delete_asset_issue(&actor, &id)?;
    Ok(deleted())
}

async fn set_asset_issue_status(
    State(svc): State<AppState>,
    actor: Actor,
    Path(id): Path<String>,
    Json(change): Json<StatusChange>,
) -> Result<Json<AssetIssue>, ServiceError> {
    Ok(Json(svc.set_asset_issue_status(&actor, &id, change)?))
}
