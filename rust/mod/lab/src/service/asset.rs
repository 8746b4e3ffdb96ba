use serde::Deserialize;

use labtrack_core::{new_id, now_rfc3339, Actor, ListParams, ListResult, Role, ServiceError};
use labtrack_store::Query;

use crate::model::{ActionType, Asset, AssetStatus, NewActivity, NotificationKind};
use super::notification::Draft;
use super::permission::LabAction;
use super::{clean, required, LabService};

/// Fields only `approve` (or creation) may write.
const APPROVAL_FIELDS: &[&str] = &[
    "createdBy",
    "approvedBy",
    "approvedByLabIncharge",
    "hodApprovedAt",
    "labInchargeApprovedAt",
    "approved",
];

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateAsset {
    pub asset_id: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub make: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub serial_number: Option<String>,
    pub allocated_lab: String,
    #[serde(default)]
    pub consumable: bool,
    #[serde(default)]
    pub quantity: Option<u32>,
    #[serde(default)]
    pub rate: f64,
    #[serde(default)]
    pub bill_number: Option<String>,
    #[serde(default)]
    pub supplier: Option<String>,
    #[serde(default)]
    pub purchase_date: Option<String>,
    #[serde(default)]
    pub status: Option<AssetStatus>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetFilters {
    /// Allocated lab id.
    pub lab: Option<String>,
    pub category: Option<String>,
    pub status: Option<AssetStatus>,
    pub consumable: Option<bool>,
    pub approved: Option<bool>,
    pub created_by: Option<String>,
    pub min_rate: Option<f64>,
    pub max_rate: Option<f64>,
    pub purchased_from: Option<String>,
    pub purchased_to: Option<String>,
}

/// Which approval slot an approval fills.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApprovalSlot {
    Hod,
    LabIncharge,
}

fn status_str(s: AssetStatus) -> &'static str {
    match s {
        AssetStatus::Active => "active",
        AssetStatus::UnderMaintenance => "under_maintenance",
        AssetStatus::Damaged => "damaged",
        AssetStatus::Disposed => "disposed",
    }
}

fn check_amounts(asset: &Asset) -> Result<(), ServiceError> {
    if !asset.rate.is_finite() || asset.rate < 0.0 {
        return Err(ServiceError::Validation("rate must be a non-negative number".into()));
    }
    if asset.quantity == 0 {
        return Err(ServiceError::Validation("quantity must be at least 1".into()));
    }
    Ok(())
}

impl LabService {
    pub fn create_asset(&self, actor: &Actor, input: CreateAsset) -> Result<Asset, ServiceError> {
        let _guard = self.lock_workflow();
        let lab_id = required("allocatedLab", &input.allocated_lab)?;
        self.require_lab(actor, &lab_id, LabAction::Create)?;
        let lab = self.labs.get_or_err(&lab_id)?;

        let now = now_rfc3339();
        let mut asset = Asset {
            id: new_id(),
            asset_id: required("assetId", &input.asset_id)?,
            name: required("name", &input.name)?,
            description: clean(input.description),
            category: clean(input.category),
            make: clean(input.make),
            model: clean(input.model),
            serial_number: clean(input.serial_number),
            allocated_lab: lab_id,
            consumable: input.consumable,
            quantity: input.quantity.unwrap_or(1),
            rate: input.rate,
            total_amount: 0.0,
            bill_number: clean(input.bill_number),
            supplier: clean(input.supplier),
            purchase_date: clean(input.purchase_date),
            status: input.status.unwrap_or_default(),
            created_by: actor.id.clone(),
            approved_by: None,
            approved_by_lab_incharge: None,
            hod_approved_at: None,
            lab_incharge_approved_at: None,
            approved: false,
            created_at: now.clone(),
            updated_at: now,
        };
        check_amounts(&asset)?;
        asset.normalize();
        self.assets.insert(&asset)?;

        self.record(
            NewActivity::by(actor, ActionType::Create, "assets", &asset.id)
                .describe(format!("created asset {} in {}", asset.asset_id, lab.lab_identifier))
                .values(None, serde_json::to_value(&asset).ok()),
        );

        let mut approvers = self.lab_incharges(&asset.allocated_lab);
        approvers.extend(self.hods());
        self.notify(
            approvers,
            Some(&actor.id),
            &Draft {
                kind: NotificationKind::AssetApproval,
                title: "Asset awaiting approval".into(),
                message: format!(
                    "{} ({}) was added to {} and needs approval",
                    asset.name, asset.asset_id, lab.name
                ),
                entity_type: "assets",
                entity_id: asset.id.clone(),
            },
        );
        Ok(asset)
    }

    pub fn get_asset(&self, id: &str) -> Result<Asset, ServiceError> {
        self.assets.get_or_err(id)
    }

    pub fn list_assets(
        &self,
        params: &ListParams,
        filters: &AssetFilters,
    ) -> Result<ListResult<Asset>, ServiceError> {
        let q = Query::new()
            .eq_opt("allocated_lab", filters.lab.clone())
            .eq_opt("category", filters.category.clone())
            .eq_opt("status", filters.status.map(status_str))
            .eq_opt("consumable", filters.consumable)
            .eq_opt("approved", filters.approved)
            .eq_opt("created_by", filters.created_by.clone())
            .gte_opt("rate", filters.min_rate)
            .lte_opt("rate", filters.max_rate)
            .gte_opt("purchase_date", filters.purchased_from.clone())
            .lte_opt("purchase_date", filters.purchased_to.clone())
            .search(&["name", "asset_id", "serial_number"], params.search_term())
            .page(params);
        self.assets.find(&q)
    }

    /// Merge-patch an asset. Approval fields are off limits; moving the
    /// asset needs update rights on both labs and no pending transfer.
    pub fn update_asset(
        &self,
        actor: &Actor,
        id: &str,
        patch: serde_json::Value,
    ) -> Result<Asset, ServiceError> {
        let _guard = self.lock_workflow();
        let current = self.assets.get_or_err(id)?;
        self.require_lab(actor, &current.allocated_lab, LabAction::Update)?;

        let mut patch = patch;
        if let Some(obj) = patch.as_object_mut() {
            obj.remove("totalAmount");
        }
        let mut updated: Asset = Self::apply_patch(&current, patch, APPROVAL_FIELDS)?;
        updated.asset_id = required("assetId", &updated.asset_id)?;
        updated.name = required("name", &updated.name)?;
        check_amounts(&updated)?;

        if updated.allocated_lab != current.allocated_lab {
            self.require_lab(actor, &updated.allocated_lab, LabAction::Update)?;
            self.labs.get_or_err(&updated.allocated_lab)?;
            if self.pending_transfer_for(id)?.is_some() {
                return Err(ServiceError::Conflict(format!(
                    "asset {} has a pending transfer",
                    current.asset_id
                )));
            }
        }
        updated.normalize();
        self.assets.update(&updated)?;

        self.record(
            NewActivity::by(actor, ActionType::Update, "assets", id).values(
                serde_json::to_value(&current).ok(),
                serde_json::to_value(&updated).ok(),
            ),
        );
        Ok(updated)
    }

    pub fn delete_asset(&self, actor: &Actor, id: &str) -> Result<(), ServiceError> {
        let _guard = self.lock_workflow();
        let current = self.assets.get_or_err(id)?;
        self.require_lab(actor, &current.allocated_lab, LabAction::Delete)?;
        if self.pending_transfer_for(id)?.is_some() {
            return Err(ServiceError::Conflict(format!(
                "asset {} has a pending transfer",
                current.asset_id
            )));
        }
        self.assets.delete(id)?;
        self.record(
            NewActivity::by(actor, ActionType::Delete, "assets", id)
                .describe(format!("deleted asset {}", current.asset_id))
                .values(serde_json::to_value(&current).ok(), None),
        );
        Ok(())
    }

    /// Fill one approval slot.
    ///
    /// HODs fill the HOD slot; the incharge of the asset's lab fills the
    /// Lab Incharge slot; admins fill whichever `slot` names (HOD by
    /// default). `approved` becomes true once both are set.
    pub fn approve_asset(
        &self,
        actor: &Actor,
        id: &str,
        slot: Option<ApprovalSlot>,
    ) -> Result<Asset, ServiceError> {
        let _guard = self.lock_workflow();
        let current = self.assets.get_or_err(id)?;

        let incharge = self.is_incharge(
            actor.role,
            &actor.id,
            actor.lab_id.as_deref(),
            &current.allocated_lab,
        )?;
        let slot = match actor.role {
            Role::Hod => ApprovalSlot::Hod,
            Role::LabIncharge if incharge => ApprovalSlot::LabIncharge,
            Role::Admin => slot.unwrap_or(ApprovalSlot::Hod),
            _ => {
                self.record(
                    NewActivity::by(actor, ActionType::Approve, "assets", id)
                        .describe(format!("approval of {} refused for {}", current.asset_id, actor.role))
                        .denied(),
                );
                return Err(ServiceError::PermissionDenied(format!(
                    "{} may not approve asset {}",
                    actor.role, current.asset_id
                )));
            }
        };

        let now = now_rfc3339();
        let mut updated = current.clone();
        let label = match slot {
            ApprovalSlot::Hod => {
                if updated.approved_by.is_some() {
                    return Err(ServiceError::Conflict(format!(
                        "asset {} already has HOD approval",
                        current.asset_id
                    )));
                }
                updated.approved_by = Some(actor.id.clone());
                updated.hod_approved_at = Some(now.clone());
                "HOD"
            }
            ApprovalSlot::LabIncharge => {
                if updated.approved_by_lab_incharge.is_some() {
                    return Err(ServiceError::Conflict(format!(
                        "asset {} already has Lab Incharge approval",
                        current.asset_id
                    )));
                }
                updated.approved_by_lab_incharge = Some(actor.id.clone());
                updated.lab_incharge_approved_at = Some(now.clone());
                "Lab Incharge"
            }
        };
        updated.updated_at = now;
        updated.normalize();
        self.assets.update(&updated)?;

        self.record(
            NewActivity::by(actor, ActionType::Approve, "assets", id)
                .describe(format!("{} approval of {}", label, updated.asset_id))
                .values(
                    serde_json::to_value(&current).ok(),
                    serde_json::to_value(&updated).ok(),
                ),
        );

        let draft = if updated.approved {
            Draft {
                kind: NotificationKind::AssetApproved,
                title: "Asset approved".into(),
                message: format!("{} ({}) is fully approved", updated.name, updated.asset_id),
                entity_type: "assets",
                entity_id: updated.id.clone(),
            }
        } else {
            Draft {
                kind: NotificationKind::Info,
                title: format!("{} approval recorded", label),
                message: format!(
                    "{} ({}) received {} approval and awaits the other sign-off",
                    updated.name, updated.asset_id, label
                ),
                entity_type: "assets",
                entity_id: updated.id.clone(),
            }
        };
        self.notify([updated.created_by.clone()], Some(&actor.id), &draft);
        Ok(updated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Notification;
    use crate::service::notification::NotificationFilters;
    use crate::service::testing;

    #[test]
    fn create_then_get_keeps_fields() {
        let svc = testing::service();
        let lab = testing::lab(&svc, "CSE-L1");
        let asset = testing::asset(&svc, &lab.id, "PC-001");

        let got = svc.get_asset(&asset.id).unwrap();
        assert_eq!(got.allocated_lab, lab.id);
        assert_eq!(got.rate, 42000.0);
        assert_eq!(got.total_amount, 84000.0);
        assert!(!got.approved);
    }

    #[test]
    fn create_requires_existing_lab_and_rights() {
        let svc = testing::service();
        let lab = testing::lab(&svc, "CSE-L1");
        let other = testing::lab(&svc, "CSE-L2");
        let asst = testing::user(&svc, "asst@college.edu", Role::LabAssistant, Some(&lab.id));

        let input = |lab_id: &str| CreateAsset {
            asset_id: "X-1".into(),
            name: "Multimeter".into(),
            description: None,
            category: None,
            make: None,
            model: None,
            serial_number: None,
            allocated_lab: lab_id.into(),
            consumable: false,
            quantity: None,
            rate: 10.0,
            bill_number: None,
            supplier: None,
            purchase_date: None,
            status: None,
        };
        assert!(svc.create_asset(&asst, input(&lab.id)).is_ok());
        assert_eq!(
            svc.create_asset(&asst, input(&other.id)).unwrap_err().error_code(),
            "PERMISSION_DENIED"
        );
        assert_eq!(
            svc.create_asset(&testing::root(), input("missing")).unwrap_err().error_code(),
            "NOT_FOUND"
        );
    }

    #[test]
    fn dual_approval_in_either_order() {
        let svc = testing::service();
        let lab = testing::lab(&svc, "CSE-L1");
        let hod = testing::user(&svc, "hod@college.edu", Role::Hod, None);
        let inc = testing::user(&svc, "inc@college.edu", Role::LabIncharge, Some(&lab.id));

        let a = testing::asset(&svc, &lab.id, "PC-1");
        let after_hod = svc.approve_asset(&hod, &a.id, None).unwrap();
        assert!(!after_hod.approved);
        assert_eq!(after_hod.approved_by.as_deref(), Some(hod.id.as_str()));
        assert!(svc.approve_asset(&inc, &a.id, None).unwrap().approved);

        let b = testing::asset(&svc, &lab.id, "PC-2");
        let after_inc = svc.approve_asset(&inc, &b.id, None).unwrap();
        assert!(!after_inc.approved);
        assert!(after_inc.lab_incharge_approved_at.is_some());
        assert!(svc.approve_asset(&hod, &b.id, None).unwrap().approved);
    }

    #[test]
    fn approval_conflicts_and_denials() {
        let svc = testing::service();
        let lab = testing::lab(&svc, "CSE-L1");
        let other = testing::lab(&svc, "CSE-L2");
        let hod = testing::user(&svc, "hod@college.edu", Role::Hod, None);
        let foreign = testing::user(&svc, "inc2@college.edu", Role::LabIncharge, Some(&other.id));
        let asst = testing::user(&svc, "asst@college.edu", Role::LabAssistant, Some(&lab.id));
        let a = testing::asset(&svc, &lab.id, "PC-1");

        svc.approve_asset(&hod, &a.id, None).unwrap();
        assert_eq!(
            svc.approve_asset(&hod, &a.id, None).unwrap_err().error_code(),
            "CONFLICT"
        );
        assert_eq!(
            svc.approve_asset(&foreign, &a.id, None).unwrap_err().error_code(),
            "PERMISSION_DENIED"
        );
        assert_eq!(
            svc.approve_asset(&asst, &a.id, None).unwrap_err().error_code(),
            "PERMISSION_DENIED"
        );

        // Admin can fill the remaining slot explicitly.
        let done = svc
            .approve_asset(&testing::root(), &a.id, Some(ApprovalSlot::LabIncharge))
            .unwrap();
        assert!(done.approved);

        // Refusals are in the audit trail.
        let denied = svc
            .activity
            .count(&Query::new().eq("action_type", "approve").eq("success", false))
            .unwrap();
        assert_eq!(denied, 2);
    }

    #[test]
    fn update_cannot_touch_approval() {
        let svc = testing::service();
        let lab = testing::lab(&svc, "CSE-L1");
        let a = testing::asset(&svc, &lab.id, "PC-1");

        let err = svc
            .update_asset(&testing::root(), &a.id, serde_json::json!({"approved": true}))
            .unwrap_err();
        assert_eq!(err.error_code(), "VALIDATION_FAILED");

        let updated = svc
            .update_asset(
                &testing::root(),
                &a.id,
                serde_json::json!({"quantity": 3, "totalAmount": 1, "status": "damaged"}),
            )
            .unwrap();
        assert_eq!(updated.total_amount, 126000.0);
        assert_eq!(updated.status, AssetStatus::Damaged);
    }

    #[test]
    fn filters() {
        let svc = testing::service();
        let l1 = testing::lab(&svc, "L1");
        let l2 = testing::lab(&svc, "L2");
        testing::asset(&svc, &l1.id, "PC-1");
        let cheap = svc
            .create_asset(
                &testing::root(),
                CreateAsset {
                    asset_id: "CBL-9".into(),
                    name: "Patch cable".into(),
                    description: None,
                    category: Some("network".into()),
                    make: None,
                    model: None,
                    serial_number: Some("SN-77".into()),
                    allocated_lab: l2.id.clone(),
                    consumable: true,
                    quantity: Some(50),
                    rate: 120.0,
                    bill_number: None,
                    supplier: None,
                    purchase_date: Some("2026-03-01".into()),
                    status: None,
                },
            )
            .unwrap();

        let by = |f: AssetFilters| svc.list_assets(&ListParams::default(), &f).unwrap();
        assert_eq!(by(AssetFilters { lab: Some(l2.id.clone()), ..Default::default() }).total, 1);
        assert_eq!(by(AssetFilters { consumable: Some(true), ..Default::default() }).total, 1);
        assert_eq!(by(AssetFilters { max_rate: Some(500.0), ..Default::default() }).items[0].id, cheap.id);
        assert_eq!(by(AssetFilters { approved: Some(false), ..Default::default() }).total, 2);
        assert_eq!(
            by(AssetFilters {
                purchased_from: Some("2026-01-01".into()),
                purchased_to: Some("2026-12-31".into()),
                ..Default::default()
            })
            .total,
            1
        );

        let search = ListParams { q: Some("sn-77".into()), ..Default::default() };
        assert_eq!(svc.list_assets(&search, &AssetFilters::default()).unwrap().total, 1);
    }

    #[test]
    fn creation_and_approval_notify() {
        let svc = testing::service();
        let lab = testing::lab(&svc, "CSE-L1");
        let hod = testing::user(&svc, "hod@college.edu", Role::Hod, None);
        let inc = testing::user(&svc, "inc@college.edu", Role::LabIncharge, Some(&lab.id));
        let asst = testing::user(&svc, "asst@college.edu", Role::LabAssistant, Some(&lab.id));

        let a = svc
            .create_asset(
                &asst,
                CreateAsset {
                    asset_id: "SCOPE-1".into(),
                    name: "Oscilloscope".into(),
                    description: None,
                    category: None,
                    make: None,
                    model: None,
                    serial_number: None,
                    allocated_lab: lab.id.clone(),
                    consumable: false,
                    quantity: None,
                    rate: 30000.0,
                    bill_number: None,
                    supplier: None,
                    purchase_date: None,
                    status: None,
                },
            )
            .unwrap();

        let kinds = |who: &Actor| -> Vec<NotificationKind> {
            svc.list_notifications(who, &ListParams::default(), &NotificationFilters::default())
                .unwrap()
                .items
                .iter()
                .map(|n: &Notification| n.kind)
                .collect()
        };
        assert_eq!(kinds(&hod), vec![NotificationKind::AssetApproval]);
        assert_eq!(kinds(&inc), vec![NotificationKind::AssetApproval]);

        svc.approve_asset(&hod, &a.id, None).unwrap();
        svc.approve_asset(&inc, &a.id, None).unwrap();
        // Newest first.
        assert_eq!(kinds(&asst), vec![NotificationKind::AssetApproved, NotificationKind::Info]);
    }
}
