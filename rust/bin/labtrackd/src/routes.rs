//! Route registration: system endpoints, login, and module routes.

use std::sync::Arc;

use axum::middleware;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;

use lab::service::LabService;

use crate::auth_middleware::{self, JwtState};
use crate::config::ServerConfig;
use crate::login;

/// Application shared state.
#[derive(Clone)]
pub struct AppState {
    pub jwt_state: Arc<JwtState>,
    pub server_config: Arc<ServerConfig>,
    pub lab: Arc<LabService>,
}

/// Build the complete router. Each module router is nested under
/// `/{name}` and everything sits behind the JWT middleware.
pub fn build_router(state: AppState, module_routes: Vec<(&str, Router)>) -> Router {
    let auth_state = state.clone();

    let mut app: Router<()> = Router::new()
        .route("/health", get(health))
        .route("/version", get(version))
        .merge(login::routes())
        .with_state(state);

    for (name, router) in module_routes {
        app = app.nest(&format!("/{}", name), router);
    }

    app.layer(middleware::from_fn_with_state(
        auth_state,
        auth_middleware::auth_middleware,
    ))
}

async fn health() -> impl IntoResponse {
    axum::Json(serde_json::json!({
        "status": "ok",
    }))
}

async fn version() -> impl IntoResponse {
    axum::Json(serde_json::json!({
        "name": "labtrackd",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

#[cfg(test)]
mod tests {
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use labtrack_core::{Actor, Module, Role};
    use labtrack_sql::SqliteStore;
    use labtrack_store::ChangeFeed;
    use lab::service::profile::{hash_password, CreateProfile};
    use tower::ServiceExt;

    use super::*;
    use crate::config::{JwtConfig, ListenConfig, RootConfig, StorageConfig};

    const ROOT_PASSWORD: &str = "root-password";

    fn app() -> (Router, Arc<LabService>) {
        let config = ServerConfig {
            root: RootConfig {
                password_hash: hash_password(ROOT_PASSWORD).unwrap(),
            },
            storage: StorageConfig {
                data_dir: "/tmp".into(),
                change_buffer: 64,
            },
            jwt: JwtConfig {
                secret: "test-secret".into(),
                expire_secs: 600,
            },
            server: ListenConfig::default(),
        };
        let sql = Arc::new(SqliteStore::open_in_memory().unwrap());
        let module = lab::LabModule::new(sql, Arc::new(ChangeFeed::new(64))).unwrap();
        let state = AppState {
            jwt_state: Arc::new(JwtState::new(&config.jwt.secret)),
            server_config: Arc::new(config),
            lab: Arc::clone(module.service()),
        };
        let svc = Arc::clone(&state.lab);
        (build_router(state, vec![(module.name(), module.routes())]), svc)
    }

    async fn call(app: &Router, req: Request<Body>) -> (StatusCode, serde_json::Value) {
        let resp = app.clone().oneshot(req).await.unwrap();
        let status = resp.status();
        let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null))
    }

    async fn login(app: &Router, email: &str, password: &str) -> (StatusCode, serde_json::Value) {
        let body = serde_json::json!({ "email": email, "password": password });
        call(
            app,
            Request::post("/auth/login")
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
    }

    fn authed(uri: &str, token: &str) -> Request<Body> {
        Request::get(uri)
            .header("authorization", format!("Bearer {}", token))
            .body(Body::empty())
            .unwrap()
    }

    #[tokio::test]
    async fn health_is_public() {
        let (app, _) = app();
        let (status, body) = call(&app, Request::get("/health").body(Body::empty()).unwrap()).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
    }

    #[tokio::test]
    async fn lab_routes_need_a_valid_token() {
        let (app, _) = app();
        let (status, body) =
            call(&app, Request::get("/lab/assets").body(Body::empty()).unwrap()).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["code"], "UNAUTHENTICATED");

        let (status, _) = call(&app, authed("/lab/assets", "not.a.jwt")).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn root_login_issues_admin_token() {
        let (app, _) = app();
        let (status, _) = login(&app, "root", "wrong").await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let (status, body) = login(&app, "root", ROOT_PASSWORD).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["role"], "admin");
        let token = body["access_token"].as_str().unwrap();

        let (status, me) = call(&app, authed("/lab/me", token)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(me["id"], "root");
        assert_eq!(me["role"], "admin");
    }

    #[tokio::test]
    async fn profile_login_carries_role() {
        let (app, svc) = app();
        let root = Actor {
            id: "root".into(),
            email: "root".into(),
            role: Role::Admin,
            lab_id: None,
        };
        svc.create_profile(
            &root,
            CreateProfile {
                email: "Hod@College.edu".into(),
                full_name: Some("Dr. Rao".into()),
                role: Role::Hod,
                lab_id: None,
                password: "hod-password".into(),
            },
        )
        .unwrap();

        let (status, _) = login(&app, "hod@college.edu", "nope-nope").await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let (status, body) = login(&app, "hod@college.edu", "hod-password").await;
        assert_eq!(status, StatusCode::OK);
        let token = body["access_token"].as_str().unwrap();

        let (status, me) = call(&app, authed("/lab/me", token)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(me["email"], "hod@college.edu");
        assert_eq!(me["role"], "hod");
        assert!(me.get("passwordHash").is_none());
    }

    #[tokio::test]
    async fn token_of_deleted_profile_is_rejected() {
        let (app, svc) = app();
        let root = Actor {
            id: "root".into(),
            email: "root".into(),
            role: Role::Admin,
            lab_id: None,
        };
        let profile = svc
            .create_profile(
                &root,
                CreateProfile {
                    email: "hod@college.edu".into(),
                    full_name: None,
                    role: Role::Hod,
                    lab_id: None,
                    password: "hod-password".into(),
                },
            )
            .unwrap();
        let (_, body) = login(&app, "hod@college.edu", "hod-password").await;
        let token = body["access_token"].as_str().unwrap().to_string();
        let (status, _) = call(&app, authed("/lab/assets", &token)).await;
        assert_eq!(status, StatusCode::OK);

        svc.delete_profile(&root, &profile.id).unwrap();
        let (status, body) = call(&app, authed("/lab/assets", &token)).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["code"], "UNAUTHENTICATED");
    }
}
