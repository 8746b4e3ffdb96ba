use serde::Deserialize;

use labtrack_core::{new_id, now_rfc3339, Actor, ListParams, ListResult, Role, ServiceError};
use labtrack_store::{Filter, Query};

use crate::model::{ActionType, Lab, NewActivity};
use super::permission::LabAction;
use super::{clean, required, LabService};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateLab {
    pub lab_identifier: String,
    pub name: String,
    #[serde(default)]
    pub department: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub capacity: Option<u32>,
    #[serde(default)]
    pub incharge_id: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LabFilters {
    pub department: Option<String>,
    pub incharge_id: Option<String>,
}

impl LabService {
    pub fn create_lab(&self, actor: &Actor, input: CreateLab) -> Result<Lab, ServiceError> {
        self.require_manager(actor)?;
        let incharge_id = clean(input.incharge_id);
        if let Some(p) = &incharge_id {
            self.check_incharge(p)?;
        }

        let now = now_rfc3339();
        let lab = Lab {
            id: new_id(),
            lab_identifier: required("labIdentifier", &input.lab_identifier)?,
            name: required("name", &input.name)?,
            department: clean(input.department),
            location: clean(input.location),
            capacity: input.capacity,
            incharge_id,
            description: clean(input.description),
            created_at: now.clone(),
            updated_at: now,
        };
        self.labs.insert(&lab)?;

        self.record(
            NewActivity::by(actor, ActionType::Create, "labs", &lab.id)
                .describe(format!("created lab {}", lab.lab_identifier))
                .values(None, serde_json::to_value(&lab).ok()),
        );
        Ok(lab)
    }

    /// A designated incharge must hold the Lab Incharge role.
    fn check_incharge(&self, profile_id: &str) -> Result<(), ServiceError> {
        let profile = self.profiles.get_or_err(profile_id)?;
        if profile.role != Role::LabIncharge {
            return Err(ServiceError::Validation(format!(
                "inchargeId must name a lab_incharge profile, not {}",
                profile.role
            )));
        }
        Ok(())
    }

    pub fn get_lab(&self, id: &str) -> Result<Lab, ServiceError> {
        self.labs.get_or_err(id)
    }

    pub fn list_labs(
        &self,
        params: &ListParams,
        filters: &LabFilters,
    ) -> Result<ListResult<Lab>, ServiceError> {
        let q = Query::new()
            .eq_opt("department", filters.department.clone())
            .eq_opt("incharge_id", filters.incharge_id.clone())
            .search(&["name", "lab_identifier"], params.search_term())
            .page(params);
        self.labs.find(&q)
    }

    /// Merge-patch a lab. `labIdentifier` is fixed at creation.
    pub fn update_lab(
        &self,
        actor: &Actor,
        id: &str,
        patch: serde_json::Value,
    ) -> Result<Lab, ServiceError> {
        self.require_lab(actor, id, LabAction::Update)?;
        let _guard = self.lock_workflow();
        let current = self.labs.get_or_err(id)?;

        if let Some(v) = patch.get("labIdentifier") {
            if v.as_str() != Some(current.lab_identifier.as_str()) {
                return Err(ServiceError::Validation(
                    "labIdentifier cannot be changed after creation".into(),
                ));
            }
        }

        let mut updated: Lab = Self::apply_patch(&current, patch, &[])?;
        updated.name = required("name", &updated.name)?;
        if updated.incharge_id != current.incharge_id {
            // Reassigning the incharge is a management decision.
            self.require_manager(actor)?;
            if let Some(p) = &updated.incharge_id {
                self.check_incharge(p)?;
            }
        }
        self.labs.update(&updated)?;

        self.record(
            NewActivity::by(actor, ActionType::Update, "labs", id).values(
                serde_json::to_value(&current).ok(),
                serde_json::to_value(&updated).ok(),
            ),
        );
        Ok(updated)
    }

    /// Delete a lab that nothing refers to.
    pub fn delete_lab(&self, actor: &Actor, id: &str) -> Result<(), ServiceError> {
        self.require_manager(actor)?;
        let _guard = self.lock_workflow();
        let current = self.labs.get_or_err(id)?;

        let assets = self.assets.count(&Query::new().eq("allocated_lab", id))?;
        if assets > 0 {
            return Err(ServiceError::Conflict(format!(
                "lab {} still has {} allocated asset(s)",
                current.lab_identifier, assets
            )));
        }
        let pending = self.transfers.count(
            &Query::new()
                .eq("status", "pending")
                .filter(Filter::Or(vec![
                    Filter::Eq("from_lab".into(), id.into()),
                    Filter::Eq("to_lab".into(), id.into()),
                ])),
        )?;
        if pending > 0 {
            return Err(ServiceError::Conflict(format!(
                "lab {} has {} pending transfer(s)",
                current.lab_identifier, pending
            )));
        }

        self.labs.delete(id)?;
        self.record(
            NewActivity::by(actor, ActionType::Delete, "labs", id)
                .describe(format!("deleted lab {}", current.lab_identifier))
                .values(serde_json::to_value(&current).ok(), None),
        );
        Ok(())
    }
}
