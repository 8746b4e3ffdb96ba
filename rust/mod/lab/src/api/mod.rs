mod activity;
mod assets;
mod changes;
mod issues;
mod labs;
mod notifications;
mod profiles;
mod rpc;
mod transfers;

#[cfg(test)]
mod tests;

use std::sync::Arc;

use axum::body::Bytes;
use axum::Router;
use serde::de::DeserializeOwned;

use labtrack_core::ServiceError;

use crate::service::LabService;

/// Shared handler state.
pub type AppState = Arc<LabService>;

/// Build the lab module router.
///
/// Routes (nested under `/lab` by the server):
/// - `GET    /me`
/// - `GET|POST /profiles`, `GET|PATCH|DELETE /profiles/{id}`
/// - `GET|POST /labs`, `GET|PATCH|DELETE /labs/{id}`
/// - `GET|POST /assets`, `GET|PATCH|DELETE /assets/{id}`, `POST /assets/{id}/@approve`
/// - `GET|POST /transfers`, `GET|PATCH|DELETE /transfers/{id}`, `POST /transfers/{id}/@receive`
/// - `GET|POST /lab-issues`, `GET|PATCH|DELETE /lab-issues/{id}`, `POST /lab-issues/{id}/@status`
/// - `GET|POST /asset-issues`, `GET|PATCH|DELETE /asset-issues/{id}`, `POST /asset-issues/{id}/@status`
/// - `GET    /activity`, `GET /activity/{id}`
/// - `GET    /notifications`, `GET /notifications/@count`, `POST /notifications/@read-all`,
///   `GET|DELETE /notifications/{id}`, `POST /notifications/{id}/@read`
/// - `POST   /rpc/{name}`
/// - `GET    /changes?since=&timeout=`
pub fn router(svc: Arc<LabService>) -> Router {
    Router::new()
        .merge(profiles::routes())
        .merge(labs::routes())
        .merge(assets::routes())
        .merge(transfers::routes())
        .merge(issues::routes())
        .merge(activity::routes())
        .merge(notifications::routes())
        .merge(rpc::routes())
        .merge(changes::routes())
        .with_state(svc)
}

/// Parse an optional JSON body; an empty body yields the default.
pub(crate) fn optional_body<T: DeserializeOwned + Default>(body: &Bytes) -> Result<T, ServiceError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(T::default());
    }
    serde_json::from_slice(body).map_err(|e| ServiceError::Validation(format!("invalid body: {}", e)))
}

pub(crate) fn deleted() -> axum::Json<serde_json::Value> {
    axum::Json(serde_json::json!({ "deleted": true }))
}
