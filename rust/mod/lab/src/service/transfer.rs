use serde::Deserialize;

use labtrack_core::{new_id, now_rfc3339, Actor, ListParams, ListResult, Role, ServiceError};
use labtrack_store::{ChangeOp, Filter, Query};

use crate::model::{ActionType, AssetTransfer, NewActivity, NotificationKind, TransferStatus};
use super::notification::Draft;
use super::permission::LabAction;
use super::{clean, required, LabService};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateTransfer {
    /// Asset.id to move.
    pub asset_id: String,
    /// Must match the asset's current lab when given.
    #[serde(default)]
    pub from_lab: Option<String>,
    pub to_lab: String,
    #[serde(default)]
    pub reason: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferFilters {
    pub asset_id: Option<String>,
    pub from_lab: Option<String>,
    pub to_lab: Option<String>,
    /// Either side of the transfer.
    pub lab: Option<String>,
    pub status: Option<TransferStatus>,
    pub initiated_by: Option<String>,
}

fn status_str(s: TransferStatus) -> &'static str {
    match s {
        TransferStatus::Pending => "pending",
        TransferStatus::Received => "received",
    }
}

/// Fields a pending transfer may not have patched.
const FIXED_FIELDS: &[&str] = &[
    "assetId",
    "fromLab",
    "status",
    "initiatedBy",
    "receivedBy",
    "receivedAt",
];

impl LabService {
    pub(crate) fn pending_transfer_for(
        &self,
        asset_id: &str,
    ) -> Result<Option<AssetTransfer>, ServiceError> {
        let q = Query::new().eq("asset_id", asset_id).eq("status", "pending");
        Ok(self.transfers.find_all(&q)?.into_iter().next())
    }

    /// Start moving an asset to another lab.
    pub fn create_transfer(
        &self,
        actor: &Actor,
        input: CreateTransfer,
    ) -> Result<AssetTransfer, ServiceError> {
        let _guard = self.lock_workflow();
        let asset = self.assets.get_or_err(&required("assetId", &input.asset_id)?)?;
        let from_lab = asset.allocated_lab.clone();
        self.require_lab(actor, &from_lab, LabAction::Create)?;

        if let Some(given) = clean(input.from_lab) {
            if given != from_lab {
                return Err(ServiceError::Validation(format!(
                    "fromLab {} does not match the asset's current lab {}",
                    given, from_lab
                )));
            }
        }
        let to_lab = required("toLab", &input.to_lab)?;
        if to_lab == from_lab {
            return Err(ServiceError::Validation(
                "toLab must differ from the asset's current lab".into(),
            ));
        }
        let dest = self.labs.get_or_err(&to_lab)?;
        if self.pending_transfer_for(&asset.id)?.is_some() {
            return Err(ServiceError::Conflict(format!(
                "asset {} already has a pending transfer",
                asset.asset_id
            )));
        }

        let now = now_rfc3339();
        let transfer = AssetTransfer {
            id: new_id(),
            asset_id: asset.id.clone(),
            from_lab,
            to_lab,
            reason: clean(input.reason),
            status: TransferStatus::Pending,
            initiated_by: actor.id.clone(),
            received_by: None,
            received_at: None,
            created_at: now.clone(),
            updated_at: now,
        };
        self.transfers.insert(&transfer)?;

        self.record(
            NewActivity::by(actor, ActionType::Create, "asset_transfers", &transfer.id)
                .describe(format!("transfer of {} to {} started", asset.asset_id, dest.lab_identifier))
                .values(None, serde_json::to_value(&transfer).ok()),
        );
        self.notify(
            self.lab_incharges(&transfer.to_lab),
            Some(&actor.id),
            &Draft {
                kind: NotificationKind::TransferRequest,
                title: "Incoming asset transfer".into(),
                message: format!(
                    "{} ({}) is being transferred to {}",
                    asset.name, asset.asset_id, dest.name
                ),
                entity_type: "asset_transfers",
                entity_id: transfer.id.clone(),
            },
        );
        Ok(transfer)
    }

    pub fn get_transfer(&self, id: &str) -> Result<AssetTransfer, ServiceError> {
        self.transfers.get_or_err(id)
    }

    pub fn list_transfers(
        &self,
        params: &ListParams,
        filters: &TransferFilters,
    ) -> Result<ListResult<AssetTransfer>, ServiceError> {
        let mut q = Query::new()
            .eq_opt("asset_id", filters.asset_id.clone())
            .eq_opt("from_lab", filters.from_lab.clone())
            .eq_opt("to_lab", filters.to_lab.clone())
            .eq_opt("status", filters.status.map(status_str))
            .eq_opt("initiated_by", filters.initiated_by.clone());
        if let Some(lab) = &filters.lab {
            q = q.filter(Filter::Or(vec![
                Filter::Eq("from_lab".into(), lab.as_str().into()),
                Filter::Eq("to_lab".into(), lab.as_str().into()),
            ]));
        }
        self.transfers.find(&q.page(params))
    }

    fn require_transfer_owner(&self, actor: &Actor, t: &AssetTransfer) -> Result<(), ServiceError> {
        match actor.role {
            Role::Admin | Role::Hod => Ok(()),
            _ if actor.id == t.initiated_by => Ok(()),
            _ => self.require_lab(actor, &t.from_lab, LabAction::Update),
        }
    }

    /// Edit a pending transfer's destination or reason.
    pub fn update_transfer(
        &self,
        actor: &Actor,
        id: &str,
        patch: serde_json::Value,
    ) -> Result<AssetTransfer, ServiceError> {
        let _guard = self.lock_workflow();
        let current = self.transfers.get_or_err(id)?;
        if current.status == TransferStatus::Received {
            return Err(ServiceError::ReadOnly(format!(
                "transfer {} was already received",
                id
            )));
        }
        self.require_transfer_owner(actor, &current)?;

        let updated: AssetTransfer = Self::apply_patch(&current, patch, FIXED_FIELDS)?;
        if updated.to_lab != current.to_lab {
            if updated.to_lab == updated.from_lab {
                return Err(ServiceError::Validation(
                    "toLab must differ from the asset's current lab".into(),
                ));
            }
            self.labs.get_or_err(&updated.to_lab)?;
        }
        self.transfers.update(&updated)?;

        self.record(
            NewActivity::by(actor, ActionType::Update, "asset_transfers", id).values(
                serde_json::to_value(&current).ok(),
                serde_json::to_value(&updated).ok(),
            ),
        );
        Ok(updated)
    }

    /// Cancel a pending transfer.
    pub fn delete_transfer(&self, actor: &Actor, id: &str) -> Result<(), ServiceError> {
        let _guard = self.lock_workflow();
        let current = self.transfers.get_or_err(id)?;
        if current.status == TransferStatus::Received {
            return Err(ServiceError::ReadOnly(format!(
                "transfer {} was already received",
                id
            )));
        }
        self.require_transfer_owner(actor, &current)?;
        self.transfers.delete(id)?;
        self.record(
            NewActivity::by(actor, ActionType::Delete, "asset_transfers", id)
                .describe("pending transfer cancelled")
                .values(serde_json::to_value(&current).ok(), None),
        );
        Ok(())
    }

    /// Confirm arrival at the destination lab.
    ///
    /// Marks the transfer received and moves the asset to `toLab` in one
    /// transaction. Only the destination's Lab Incharge or an admin may
    /// receive.
    pub fn receive_transfer(&self, actor: &Actor, id: &str) -> Result<AssetTransfer, ServiceError> {
        let _guard = self.lock_workflow();
        let current = self.transfers.get_or_err(id)?;

        let incharge =
            self.is_incharge(actor.role, &actor.id, actor.lab_id.as_deref(), &current.to_lab)?;
        if !(actor.is_admin() || incharge) {
            self.record(
                NewActivity::by(actor, ActionType::Receive, "asset_transfers", id)
                    .describe(format!("receive refused for {}", actor.role))
                    .denied(),
            );
            return Err(ServiceError::PermissionDenied(
                "only the destination lab's incharge or an admin may receive a transfer".into(),
            ));
        }
        if current.status == TransferStatus::Received {
            return Err(ServiceError::Conflict(format!(
                "transfer {} was already received",
                id
            )));
        }

        let mut asset = self.assets.get_or_err(&current.asset_id)?;
        if asset.allocated_lab != current.from_lab {
            return Err(ServiceError::Conflict(format!(
                "asset {} is no longer in the transfer's source lab",
                asset.asset_id
            )));
        }

        let now = now_rfc3339();
        let mut received = current.clone();
        received.status = TransferStatus::Received;
        received.received_by = Some(actor.id.clone());
        received.received_at = Some(now.clone());
        received.updated_at = now.clone();

        asset.allocated_lab = received.to_lab.clone();
        asset.updated_at = now;

        self.transfers.exec_batch(&[
            self.transfers.update_statement(&received)?,
            self.assets.update_statement(&asset)?,
        ])?;
        self.transfers.publish(ChangeOp::Update, &received.id);
        self.assets.publish(ChangeOp::Update, &asset.id);

        self.record(
            NewActivity::by(actor, ActionType::Receive, "asset_transfers", id)
                .describe(format!("{} received into {}", asset.asset_id, received.to_lab))
                .values(
                    serde_json::to_value(&current).ok(),
                    serde_json::to_value(&received).ok(),
                ),
        );
        self.notify(
            [received.initiated_by.clone()],
            Some(&actor.id),
            &Draft {
                kind: NotificationKind::TransferReceived,
                title: "Transfer received".into(),
                message: format!("{} ({}) arrived at its new lab", asset.name, asset.asset_id),
                entity_type: "asset_transfers",
                entity_id: received.id.clone(),
            },
        );
        Ok(received)
    }
}
