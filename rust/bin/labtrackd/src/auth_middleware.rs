//! JWT authentication middleware.
//!
//! Extracts the token from `Authorization: Bearer <token>`, validates it,
//! and stores the decoded [`Claims`] in request extensions where the
//! `Actor` extractor picks them up. Profile tokens are re-checked against
//! the stored profile on every request.

use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::Response;
use jsonwebtoken::{DecodingKey, Validation};

use labtrack_core::{Claims, ServiceError};

use crate::bootstrap::ROOT_USER;
use crate::routes::AppState;

/// Shared JWT configuration for the middleware.
#[derive(Clone)]
pub struct JwtState {
    pub decoding_key: DecodingKey,
    pub validation: Validation,
}

impl JwtState {
    pub fn new(secret: &str) -> Self {
        Self {
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            validation: Validation::default(),
        }
    }
}

/// Public paths pass through; everything else needs a valid token.
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, ServiceError> {
    if is_public_path(request.uri().path()) {
        return Ok(next.run(request).await);
    }

    let token = request
        .headers()
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .ok_or_else(|| ServiceError::Unauthorized("missing authorization token".into()))?;

    let jwt = &state.jwt_state;
    let mut claims = jsonwebtoken::decode::<Claims>(token, &jwt.decoding_key, &jwt.validation)
        .map_err(|e| ServiceError::Unauthorized(format!("invalid token: {}", e)))?
        .claims;
    if claims.sub != ROOT_USER {
        state.lab.refresh_claims(&mut claims)?;
    }

    request.extensions_mut().insert(claims);
    Ok(next.run(request).await)
}

fn is_public_path(path: &str) -> bool {
    matches!(path, "/health" | "/version" | "/auth/login")
}
