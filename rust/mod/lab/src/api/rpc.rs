//! Named server-side procedures, `POST /rpc/{name}`.

use axum::extract::{Path, State};
use axum::routing::post;
use axum::{Json, Router};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};

use labtrack_core::{Actor, ServiceError};

use crate::model::NewActivity;
use crate::service::permission::LabAction;
use super::AppState;

pub fn routes() -> Router<AppState> {
    Router::new().route("/rpc/{name}", post(call))
}

#[derive(Debug, Default, Deserialize)]
struct StatsArgs {
    #[serde(default)]
    days: Option<u32>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PermissionArgs {
    #[serde(default)]
    user_id: Option<String>,
    lab_id: String,
    action: LabAction,
}

async fn call(
    State(svc): State<AppState>,
    actor: Actor,
    Path(name): Path<String>,
    Json(args): Json<Value>,
) -> Result<Json<Value>, ServiceError> {
    let result = match name.as_str() {
        "log_activity" => {
            let mut entry: NewActivity = parse_args(args)?;
            if !actor.is_admin() {
                entry.user_id = actor.id.clone();
                entry.user_email = Some(actor.email.clone());
            }
            serde_json::to_value(svc.log_activity(entry)?)?
        }
        "get_activity_stats" => {
            let args: StatsArgs = parse_args(args)?;
            serde_json::to_value(svc.get_activity_stats(&actor, args.days)?)?
        }
        "check_lab_permission" => {
            let args: PermissionArgs = parse_args(args)?;
            let allowed = match args.user_id.as_deref() {
                None => svc.permits(
                    actor.role,
                    &actor.id,
                    actor.lab_id.as_deref(),
                    &args.lab_id,
                    args.action,
                )?,
                Some(id) if id == actor.id => svc.permits(
                    actor.role,
                    &actor.id,
                    actor.lab_id.as_deref(),
                    &args.lab_id,
                    args.action,
                )?,
                Some(id) => {
                    svc.require_manager(&actor)?;
                    svc.check_lab_permission(id, &args.lab_id, args.action)?
                }
            };
            json!({ "allowed": allowed })
        }
        other => {
            return Err(ServiceError::NotFound(format!("unknown procedure '{}'", other)));
        }
    };
    Ok(Json(result))
}

fn parse_args<T: DeserializeOwned>(args: Value) -> Result<T, ServiceError> {
    let args = if args.is_null() { json!({}) } else { args };
    serde_json::from_value(args).map_err(|e| ServiceError::Validation(format!("invalid arguments: {}", e)))
}
