//! Caller identity.
//!
//! The server's JWT middleware validates the bearer token and stores the
//! decoded [`Claims`] in request extensions. Handlers take an [`Actor`]
//! argument to get the authenticated caller; a request that reached a
//! handler without claims is rejected with `401`.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use serde::{Deserialize, Serialize};

use crate::ServiceError;

/// Organisational role of a profile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Admin,
    /// Head of Department.
    Hod,
    LabIncharge,
    LabAssistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Admin => "admin",
            Self::Hod => "hod",
            Self::LabIncharge => "lab_incharge",
            Self::LabAssistant => "lab_assistant",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "admin" => Some(Self::Admin),
            "hod" => Some(Self::Hod),
            "lab_incharge" => Some(Self::LabIncharge),
            "lab_assistant" => Some(Self::LabAssistant),
            _ => None,
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// JWT claims payload issued by `/auth/login`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Claims {
    /// Subject: profile id (or "root" for the bootstrap admin).
    pub sub: String,
    pub email: String,
    pub role: Role,
    /// Lab the profile belongs to (incharges and assistants).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lab_id: Option<String>,
    /// Issued at (unix timestamp).
    pub iat: i64,
    /// Expiration (unix timestamp).
    pub exp: i64,
}

/// The authenticated caller of an operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Actor {
    pub id: String,
    pub email: String,
    pub role: Role,
    pub lab_id: Option<String>,
}

impl Actor {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

impl From<Claims> for Actor {
    fn from(c: Claims) -> Self {
        Self {
            id: c.sub,
            email: c.email,
            role: c.role,
            lab_id: c.lab_id,
        }
    }
}

impl<S> FromRequestParts<S> for Actor
where
    S: Send + Sync,
{
    type Rejection = ServiceError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Claims>()
            .cloned()
            .map(Actor::from)
            .ok_or_else(|| ServiceError::Unauthorized("missing authorization token".into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_str_roundtrip() {
        for r in [Role::Admin, Role::Hod, Role::LabIncharge, Role::LabAssistant] {
            assert_eq!(Role::from_str(r.as_str()), Some(r));
            let json = serde_json::to_string(&r).unwrap();
            assert_eq!(json, format!("\"{}\"", r.as_str()));
        }
        assert_eq!(Role::from_str("janitor"), None);
    }

    #[test]
    fn only_admin_role_is_admin() {
        let mut actor = Actor {
            id: "u1".into(),
            email: "u1@lab".into(),
            role: Role::LabIncharge,
            lab_id: Some("lab-a".into()),
        };
        assert!(!actor.is_admin());
        actor.role = Role::Admin;
        assert!(actor.is_admin());
    }

    #[tokio::test]
    async fn extractor_requires_claims() {
        let (mut parts, _) = axum::http::Request::new(()).into_parts();
        let err = Actor::from_request_parts(&mut parts, &()).await.unwrap_err();
        assert_eq!(err.error_code(), "UNAUTHENTICATED");

        parts.extensions.insert(Claims {
            sub: "p1".into(),
            email: "hod@lab".into(),
            role: Role::Hod,
            lab_id: None,
            iat: 0,
            exp: 0,
        });
        let actor = Actor::from_request_parts(&mut parts, &()).await.unwrap();
        assert_eq!(actor.id, "p1");
        assert_eq!(actor.role, Role::Hod);
    }
}
