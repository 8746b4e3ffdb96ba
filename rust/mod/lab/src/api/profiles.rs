use axum::extract::{Path, Query, State};
use axum::routing::get;
use axum::{Json, Router};

use labtrack_core::{Actor, ListParams, ListResult, ServiceError};

use crate::model::Profile;
use crate::service::profile::{CreateProfile, ProfileFilters};
use super::{deleted, AppState};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/me", get(me))
        .route("/profiles", get(list_profiles).post(create_profile))
        .route(
            "/profiles/{id}",
            get(get_profile).patch(update_profile).delete(delete_profile),
        )
}

async fn me(State(svc): State<AppState>, actor: Actor) -> Result<Json<Profile>, ServiceError> {
    Ok(Json(svc.me(&actor)?))
}

async fn list_profiles(
    State(svc): State<AppState>,
    actor: Actor,
    Query(params): Query<ListParams>,
    Query(filters): Query<ProfileFilters>,
) -> Result<Json<ListResult<Profile>>, ServiceError> {
    Ok(Json(svc.list_profiles(&actor, &params, &filters)?))
}

async fn create_profile(
    State(svc): State<AppState>,
    actor: Actor,
    Json(input): Json<CreateProfile>,
) -> Result<Json<Profile>, ServiceError> {
    Ok(Json(svc.create_profile(&actor, input)?))
}

async fn get_profile(
    State(svc): State<AppState>,
    actor: Actor,
    Path(id): Path<String>,
) -> Result<Json<Profile>, ServiceError> {
    Ok(Json(svc.get_profile(&actor, &id)?))
}

async fn update_profile(
    State(svc): State<AppState>,
    actor: Actor,
    Path(id): Path<String>,
    Json(patch): Json<serde_json::Value>,
) -> Result<Json<Profile>, ServiceError> {
    Ok(Json(svc.update_profile(&actor, &id, patch)?))
}

async fn delete_profile(
    State(svc): State<AppState>,
    actor: Actor,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, ServiceError> {
    svc.delete_profile(&actor, &id)?;
    Ok(deleted())
}
