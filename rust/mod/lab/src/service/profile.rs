use serde::Deserialize;

use labtrack_core::{
    new_id, now_rfc3339, Actor, Claims, ListParams, ListResult, Role, ServiceError,
};
use labtrack_store::Query;

use crate::model::{ActionType, NewActivity, Profile};
use super::{clean, required, LabService};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateProfile {
    pub email: String,
    #[serde(default)]
    pub full_name: Option<String>,
    pub role: Role,
    #[serde(default)]
    pub lab_id: Option<String>,
    pub password: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileFilters {
    pub role: Option<Role>,
    pub lab_id: Option<String>,
}

/// Hash a plain password with argon2id.
pub fn hash_password(password: &str) -> Result<String, ServiceError> {
    use argon2::Argon2;
    use password_hash::rand_core::OsRng;
    use password_hash::{PasswordHasher, SaltString};

    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|h| h.to_string())
        .map_err(|e| ServiceError::Internal(format!("failed to hash password: {}", e)))
}

/// Verify a password against an argon2id PHC string.
pub fn verify_password(password: &str, hash: &str) -> bool {
    use argon2::Argon2;
    use password_hash::{PasswordHash, PasswordVerifier};

    match PasswordHash::new(hash) {
        Ok(parsed) => Argon2::default().verify_password(password.as_bytes(), &parsed).is_ok(),
        Err(_) => false,
    }
}

const MIN_PASSWORD_LEN: usize = 8;

fn check_password(password: &str) -> Result<(), ServiceError> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(ServiceError::Validation(format!(
            "password must be at least {} characters",
            MIN_PASSWORD_LEN
        )));
    }
    Ok(())
}

impl LabService {
    /// Lab-scoped roles need an existing lab; others may omit it.
    fn check_role_lab(&self, role: Role, lab_id: Option<&str>) -> Result<(), ServiceError> {
        match (role, lab_id) {
            (Role::LabIncharge | Role::LabAssistant, None) => Err(ServiceError::Validation(
                format!("role {} requires labId", role),
            )),
            (_, Some(lab)) => self.labs.get_or_err(lab).map(|_| ()),
            _ => Ok(()),
        }
    }

    pub fn create_profile(
        &self,
        actor: &Actor,
        input: CreateProfile,
    ) -> Result<Profile, ServiceError> {
        self.require_admin(actor)?;
        let email = required("email", &input.email)?.to_lowercase();
        if !email.contains('@') {
            return Err(ServiceError::Validation(format!("invalid email '{}'", email)));
        }
        check_password(&input.password)?;
        let lab_id = clean(input.lab_id);
        self.check_role_lab(input.role, lab_id.as_deref())?;

        let now = now_rfc3339();
        let profile = Profile {
            id: new_id(),
            email,
            full_name: clean(input.full_name),
            role: input.role,
            lab_id,
            password_hash: hash_password(&input.password)?,
            created_at: now.clone(),
            updated_at: now,
        };
        self.profiles.insert(&profile)?;

        let public = profile.redacted();
        self.record(
            NewActivity::by(actor, ActionType::Create, "profiles", &profile.id)
                .describe(format!("created {} account {}", profile.role, profile.email))
                .values(None, serde_json::to_value(&public).ok()),
        );
        Ok(public)
    }

    pub fn get_profile(&self, actor: &Actor, id: &str) -> Result<Profile, ServiceError> {
        if actor.id != id {
            self.require_admin(actor)?;
        }
        Ok(self.profiles.get_or_err(id)?.redacted())
    }

    /// The caller's own profile. The bootstrap root account has no stored
    /// profile and gets a synthetic one.
    pub fn me(&self, actor: &Actor) -> Result<Profile, ServiceError> {
        match self.profiles.get(&actor.id)? {
            Some(p) => Ok(p.redacted()),
            None if actor.is_admin() => Ok(Profile {
                id: actor.id.clone(),
                email: actor.email.clone(),
                full_name: None,
                role: actor.role,
                lab_id: actor.lab_id.clone(),
                password_hash: String::new(),
                created_at: String::new(),
                updated_at: String::new(),
            }),
            None => Err(ServiceError::not_found("profiles", &actor.id)),
        }
    }

    pub fn list_profiles(
        &self,
        actor: &Actor,
        params: &ListParams,
        filters: &ProfileFilters,
    ) -> Result<ListResult<Profile>, ServiceError> {
        self.require_admin(actor)?;
        let q = Query::new()
            .eq_opt("role", filters.role.map(|r| r.as_str()))
            .eq_opt("lab_id", filters.lab_id.clone())
            .search(&["email"], params.search_term())
            .page(params);
        let mut page = self.profiles.find(&q)?;
        page.items = page.items.iter().map(Profile::redacted).collect();
        Ok(page)
    }

    /// Merge-patch a profile. A `password` key is hashed into
    /// `passwordHash`; the hash itself cannot be patched.
    pub fn update_profile(
        &self,
        actor: &Actor,
        id: &str,
        patch: serde_json::Value,
    ) -> Result<Profile, ServiceError> {
        self.require_admin(actor)?;
        let current = self.profiles.get_or_err(id)?;

        let mut patch = patch;
        let new_password = match patch.as_object_mut().and_then(|o| o.remove("password")) {
            Some(serde_json::Value::String(p)) => Some(p),
            Some(_) => return Err(ServiceError::Validation("password must be a string".into())),
            None => None,
        };

        let mut updated: Profile = Self::apply_patch(&current, patch, &["passwordHash"])?;
        updated.email = required("email", &updated.email)?.to_lowercase();
        self.check_role_lab(updated.role, updated.lab_id.as_deref())?;
        if let Some(p) = new_password {
            check_password(&p)?;
            updated.password_hash = hash_password(&p)?;
        }
        self.profiles.update(&updated)?;

        let public = updated.redacted();
        self.record(
            NewActivity::by(actor, ActionType::Update, "profiles", id).values(
                serde_json::to_value(current.redacted()).ok(),
                serde_json::to_value(&public).ok(),
            ),
        );
        Ok(public)
    }

    pub fn delete_profile(&self, actor: &Actor, id: &str) -> Result<(), ServiceError> {
        self.require_admin(actor)?;
        let current = self.profiles.get_or_err(id)?;
        self.profiles.delete(id)?;
        self.record(
            NewActivity::by(actor, ActionType::Delete, "profiles", id)
                .describe(format!("deleted account {}", current.email))
                .values(serde_json::to_value(current.redacted()).ok(), None),
        );
        Ok(())
    }

    /// Bring a token's identity in line with the stored profile.
    ///
    /// Role, lab and email come from the current record; a deleted
    /// profile no longer authenticates.
    pub fn refresh_claims(&self, claims: &mut Claims) -> Result<(), ServiceError> {
        let profile = self
            .profiles
            .get(&claims.sub)?
            .ok_or_else(|| ServiceError::Unauthorized("account no longer exists".into()))?;
        claims.email = profile.email;
        claims.role = profile.role;
        claims.lab_id = profile.lab_id;
        Ok(())
    }

    /// Check email and password. Every attempt is logged.
    pub fn authenticate(&self, email: &str, password: &str) -> Result<Profile, ServiceError> {
        let email = email.trim().to_lowercase();
        let found = self
            .profiles
            .find_all(&Query::new().eq("email", email.as_str()))?
            .into_iter()
            .next();

        let profile = match found {
            Some(p) if verify_password(password, &p.password_hash) => p,
            other => {
                let user_id = other.map(|p| p.id).unwrap_or_else(|| email.clone());
                self.record(NewActivity {
                    user_id,
                    user_email: Some(email.clone()),
                    action_type: ActionType::Login,
                    entity_type: "profiles".into(),
                    entity_id: None,
                    description: Some("invalid email or password".into()),
                    old_values: None,
                    new_values: None,
                    severity: crate::model::Severity::Warning,
                    success: false,
                });
                return Err(ServiceError::Unauthorized("invalid email or password".into()));
            }
        };

        let actor = Actor {
            id: profile.id.clone(),
            email: profile.email.clone(),
            role: profile.role,
            lab_id: profile.lab_id.clone(),
        };
        self.record(NewActivity::by(&actor, ActionType::Login, "profiles", &profile.id));
        Ok(profile.redacted())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::service::testing;

    #[test]
    fn password_hash_roundtrip() {
        let hash = hash_password("correct horse").unwrap();
        assert!(hash.starts_with("$argon2"));
        assert!(verify_password("correct horse", &hash));
        assert!(!verify_password("wrong", &hash));
        assert!(!verify_password("x", "not-a-hash"));
    }

    #[test]
    fn lab_roles_need_a_lab() {
        let svc = testing::service();
        let err = svc
            .create_profile(
                &testing::root(),
                CreateProfile {
                    email: "asst@college.edu".into(),
                    full_name: None,
                    role: Role::LabAssistant,
                    lab_id: None,
                    password: "long-enough".into(),
                },
            )
            .unwrap_err();
        assert_eq!(err.error_code(), "VALIDATION_FAILED");
    }

    #[test]
    fn duplicate_email_conflicts() {
        let svc = testing::service();
        testing::user(&svc, "hod@college.edu", Role::Hod, None);
        let err = svc
            .create_profile(
                &testing::root(),
                CreateProfile {
                    email: "HOD@college.edu".into(),
                    full_name: None,
                    role: Role::Hod,
                    lab_id: None,
                    password: "long-enough".into(),
                },
            )
            .unwrap_err();
        assert_eq!(err.error_code(), "ALREADY_EXISTS");
    }

    #[test]
    fn authenticate_and_change_password() {
        let svc = testing::service();
        let hod = testing::user(&svc, "hod@college.edu", Role::Hod, None);

        let p = svc.authenticate("Hod@College.edu", "secret-pass").unwrap();
        assert_eq!(p.id, hod.id);
        assert!(p.password_hash.is_empty());
        assert_eq!(
            svc.authenticate("hod@college.edu", "nope").unwrap_err().error_code(),
            "UNAUTHENTICATED"
        );

        svc.update_profile(
            &testing::root(),
            &hod.id,
            serde_json::json!({"password": "brand-new-pass", "fullName": "Dr. Iyer"}),
        )
        .unwrap();
        assert!(svc.authenticate("hod@college.edu", "secret-pass").is_err());
        let p = svc.authenticate("hod@college.edu", "brand-new-pass").unwrap();
        assert_eq!(p.full_name.as_deref(), Some("Dr. Iyer"));
    }

    #[test]
    fn refreshed_claims_follow_the_profile() {
        let svc = testing::service();
        let first = testing::lab(&svc, "L1");
        let second = testing::lab(&svc, "L2");
        let inc = testing::user(&svc, "inc@college.edu", Role::LabIncharge, Some(&first.id));
        let mut claims = Claims {
            sub: inc.id.clone(),
            email: inc.email.clone(),
            role: inc.role,
            lab_id: inc.lab_id.clone(),
            iat: 0,
            exp: 0,
        };

        svc.update_profile(
            &testing::root(),
            &inc.id,
            serde_json::json!({"role": "lab_assistant", "labId": second.id}),
        )
        .unwrap();
        svc.refresh_claims(&mut claims).unwrap();
        assert_eq!(claims.role, Role::LabAssistant);
        assert_eq!(claims.lab_id.as_deref(), Some(second.id.as_str()));

        svc.delete_profile(&testing::root(), &inc.id).unwrap();
        let err = svc.refresh_claims(&mut claims).unwrap_err();
        assert_eq!(err.error_code(), "UNAUTHENTICATED");
    }

    #[test]
    fn profiles_are_admin_only() {
        let svc = testing::service();
        let hod = testing::user(&svc, "hod@college.edu", Role::Hod, None);
        let other = testing::user(&svc, "hod2@college.edu", Role::Hod, None);

        let err = svc
            .list_profiles(&hod, &ListParams::default(), &ProfileFilters::default())
            .unwrap_err();
        assert_eq!(err.error_code(), "PERMISSION_DENIED");
        assert!(svc.get_profile(&hod, &hod.id).is_ok());
        assert!(svc.get_profile(&hod, &other.id).is_err());
        assert_eq!(svc.me(&hod).unwrap().email, "hod@college.edu");
        assert_eq!(svc.me(&testing::root()).unwrap().role, Role::Admin);

        let err = svc
            .update_profile(&testing::root(), &hod.id, serde_json::json!({"passwordHash": "x"}))
            .unwrap_err();
        assert_eq!(err.error_code(), "VALIDATION_FAILED");
    }
}
