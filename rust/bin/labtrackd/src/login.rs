//! Login endpoint: verifies credentials and issues an HS256 JWT.

use axum::extract::State;
use axum::routing::post;
use axum::{Json, Router};
use jsonwebtoken::{encode, EncodingKey, Header};
use serde::{Deserialize, Serialize};

use labtrack_core::{Claims, Role, ServiceError};
use lab::model::{ActionType, NewActivity};

use crate::bootstrap::{verify_root_password, ROOT_USER};
use crate::routes::AppState;

/// Login request body. `email` is `root` for the bootstrap admin.
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    #[serde(alias = "username")]
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub access_token: String,
    pub token_type: String,
    pub expires_in: u64,
    pub role: Role,
}

pub fn routes() -> Router<AppState> {
    Router::new().route("/auth/login", post(login_handler))
}

async fn login_handler(
    State(state): State<AppState>,
    Json(body): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, ServiceError> {
    let claims = if body.email == ROOT_USER {
        root_claims(&state, &body.password)?
    } else {
        let profile = state.lab.authenticate(&body.email, &body.password)?;
        Claims {
            sub: profile.id,
            email: profile.email,
            role: profile.role,
            lab_id: profile.lab_id,
            iat: 0,
            exp: 0,
        }
    };
    issue_token(&state, claims).map(Json)
}

fn root_claims(state: &AppState, password: &str) -> Result<Claims, ServiceError> {
    let ok = verify_root_password(password, &state.server_config.root.password_hash);

    let root = labtrack_core::Actor {
        id: ROOT_USER.to_string(),
        email: ROOT_USER.to_string(),
        role: Role::Admin,
        lab_id: None,
    };
    let mut entry = NewActivity::by(&root, ActionType::Login, "profiles", ROOT_USER);
    if !ok {
        entry = entry.describe("root login rejected").denied();
    }
    if let Err(e) = state.lab.log_activity(entry) {
        tracing::warn!("failed to log root login: {}", e);
    }

    if !ok {
        return Err(ServiceError::Unauthorized("invalid credentials".into()));
    }
    Ok(Claims {
        sub: root.id,
        email: root.email,
        role: root.role,
        lab_id: None,
        iat: 0,
        exp: 0,
    })
}

fn issue_token(state: &AppState, mut claims: Claims) -> Result<LoginResponse, ServiceError> {
    let jwt = &state.server_config.jwt;
    let now = chrono::Utc::now().timestamp();
    claims.iat = now;
    claims.exp = now + jwt.expire_secs as i64;

    let key = EncodingKey::from_secret(jwt.secret.as_bytes());
    let token = encode(&Header::default(), &claims, &key).map_err(|e| {
        tracing::error!("Failed to encode JWT: {}", e);
        ServiceError::Internal("failed to issue token".into())
    })?;

    tracing::info!(user = %claims.sub, role = %claims.role, "login");
    Ok(LoginResponse {
        access_token: token,
        token_type: "Bearer".to_string(),
        expires_in: jwt.expire_secs,
        role: claims.role,
    })
}
