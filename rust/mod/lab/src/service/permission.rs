use serde::{Deserialize, Serialize};

use labtrack_core::{Actor, Role, ServiceError};

use super::LabService;

/// An action a caller may take on a lab's data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LabAction {
    Read,
    Create,
    Update,
    Delete,
    Approve,
    Receive,
}

impl LabAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Read => "read",
            Self::Create => "create",
            Self::Update => "update",
            Self::Delete => "delete",
            Self::Approve => "approve",
            Self::Receive => "receive",
        }
    }
}

/// Role/lab rule behind `check_lab_permission`.
///
/// Admins and HODs may do anything. A Lab Incharge may do anything on
/// their own lab; a Lab Assistant may read and create there.
pub fn allows(role: Role, own_lab: Option<&str>, lab_id: &str, action: LabAction) -> bool {
    match role {
        Role::Admin | Role::Hod => true,
        Role::LabIncharge => own_lab == Some(lab_id),
        Role::LabAssistant => {
            own_lab == Some(lab_id) && matches!(action, LabAction::Read | LabAction::Create)
        }
    }
}

impl LabService {
    /// Whether a Lab Incharge is in charge of `lab_id`: assigned to it
    /// through their profile, or named as the lab's `inchargeId`.
    pub(crate) fn is_incharge(
        &self,
        role: Role,
        user_id: &str,
        own_lab: Option<&str>,
        lab_id: &str,
    ) -> Result<bool, ServiceError> {
        if role != Role::LabIncharge {
            return Ok(false);
        }
        if own_lab == Some(lab_id) {
            return Ok(true);
        }
        let designated = self.labs.get(lab_id)?.and_then(|lab| lab.incharge_id);
        Ok(designated.as_deref() == Some(user_id))
    }

    /// [`allows`], extended to a lab's designated incharge.
    pub fn permits(
        &self,
        role: Role,
        user_id: &str,
        own_lab: Option<&str>,
        lab_id: &str,
        action: LabAction,
    ) -> Result<bool, ServiceError> {
        if allows(role, own_lab, lab_id, action) {
            return Ok(true);
        }
        self.is_incharge(role, user_id, own_lab, lab_id)
    }

    /// Whether the given profile may perform `action` on `lab_id`.
    pub fn check_lab_permission(
        &self,
        user_id: &str,
        lab_id: &str,
        action: LabAction,
    ) -> Result<bool, ServiceError> {
        let profile = self.profiles.get_or_err(user_id)?;
        self.permits(profile.role, &profile.id, profile.lab_id.as_deref(), lab_id, action)
    }

    /// Fail with `PermissionDenied` unless the actor may act on the lab.
    pub(crate) fn require_lab(
        &self,
        actor: &Actor,
        lab_id: &str,
        action: LabAction,
    ) -> Result<(), ServiceError> {
        if self.permits(actor.role, &actor.id, actor.lab_id.as_deref(), lab_id, action)? {
            Ok(())
        } else {
            Err(ServiceError::PermissionDenied(format!(
                "{} may not {} on lab {}",
                actor.role,
                action.as_str(),
                lab_id
            )))
        }
    }

    /// Fail with `PermissionDenied` unless the actor is an admin or HOD.
    pub(crate) fn require_manager(&self, actor: &Actor) -> Result<(), ServiceError> {
        match actor.role {
            Role::Admin | Role::Hod => Ok(()),
            _ => Err(ServiceError::PermissionDenied(format!(
                "{} may not perform this operation",
                actor.role
            ))),
        }
    }

    pub(crate) fn require_admin(&self, actor: &Actor) -> Result<(), ServiceError> {
        if actor.is_admin() {
            Ok(())
        } else {
            Err(ServiceError::PermissionDenied("admin role required".into()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::service::testing;

    #[test]
    fn role_matrix() {
        use LabAction::*;
        assert!(allows(Role::Admin, None, "lab1", Delete));
        assert!(allows(Role::Hod, None, "lab1", Approve));

        assert!(allows(Role::LabIncharge, Some("lab1"), "lab1", Delete));
        assert!(!allows(Role::LabIncharge, Some("lab1"), "lab2", Read));

        assert!(allows(Role::LabAssistant, Some("lab1"), "lab1", Read));
        assert!(allows(Role::LabAssistant, Some("lab1"), "lab1", Create));
        assert!(!allows(Role::LabAssistant, Some("lab1"), "lab1", Update));
        assert!(!allows(Role::LabAssistant, Some("lab1"), "lab2", Create));
        assert!(!allows(Role::LabAssistant, None, "lab1", Read));
    }

    #[test]
    fn check_by_profile_id() {
        let svc = testing::service();
        let lab = testing::lab(&svc, "CHEM-1");
        let asst = testing::user(&svc, "asst@college.edu", Role::LabAssistant, Some(&lab.id));

        assert!(svc.check_lab_permission(&asst.id, &lab.id, LabAction::Create).unwrap());
        assert!(!svc.check_lab_permission(&asst.id, &lab.id, LabAction::Delete).unwrap());
        assert_eq!(
            svc.check_lab_permission("ghost", &lab.id, LabAction::Read)
                .unwrap_err()
                .error_code(),
            "NOT_FOUND"
        );
    }
}
