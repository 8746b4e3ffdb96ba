use serde::Deserialize;

use labtrack_core::{new_id, now_rfc3339, Actor, ListParams, ListResult, ServiceError};
use labtrack_store::{Query, Table};

use crate::model::{
    ActionType, AssetIssue, IssuePriority, IssueRecord, IssueStatus, LabIssue, NewActivity,
    NotificationKind,
};
use super::notification::Draft;
use super::permission::LabAction;
use super::{clean, required, LabService};

/// Fields changed only through the status workflow.
const WORKFLOW_FIELDS: &[&str] = &["status", "resolvedAt", "reportedBy", "labId", "assetId"];

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateLabIssue {
    pub lab_id: String,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub priority: Option<IssuePriority>,
    #[serde(default)]
    pub assigned_to: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateAssetIssue {
    pub asset_id: String,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub priority: Option<IssuePriority>,
    #[serde(default)]
    pub assigned_to: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IssueFilters {
    pub lab_id: Option<String>,
    /// Asset issues only.
    pub asset_id: Option<String>,
    pub status: Option<IssueStatus>,
    pub priority: Option<IssuePriority>,
    pub reported_by: Option<String>,
    pub assigned_to: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusChange {
    pub status: IssueStatus,
    #[serde(default)]
    pub resolution: Option<String>,
}

fn priority_str(p: IssuePriority) -> &'static str {
    match p {
        IssuePriority::Low => "low",
        IssuePriority::Medium => "medium",
        IssuePriority::High => "high",
        IssuePriority::Critical => "critical",
    }
}

impl LabService {
    pub fn create_lab_issue(
        &self,
        actor: &Actor,
        input: CreateLabIssue,
    ) -> Result<LabIssue, ServiceError> {
        let _guard = self.lock_workflow();
        let lab_id = required("labId", &input.lab_id)?;
        self.require_lab(actor, &lab_id, LabAction::Create)?;
        let lab = self.labs.get_or_err(&lab_id)?;

        let now = now_rfc3339();
        let issue = LabIssue {
            id: new_id(),
            lab_id,
            title: required("title", &input.title)?,
            description: clean(input.description),
            priority: input.priority.unwrap_or_default(),
            status: IssueStatus::Open,
            reported_by: actor.id.clone(),
            assigned_to: clean(input.assigned_to),
            resolution: None,
            resolved_at: None,
            created_at: now.clone(),
            updated_at: now,
        };
        let location = lab.name;
        self.report_issue(actor, &self.lab_issues, &issue, &location)?;
        Ok(issue)
    }

    pub fn create_asset_issue(
        &self,
        actor: &Actor,
        input: CreateAssetIssue,
    ) -> Result<AssetIssue, ServiceError> {
        let _guard = self.lock_workflow();
        let asset = self.assets.get_or_err(&required("assetId", &input.asset_id)?)?;
        self.require_lab(actor, &asset.allocated_lab, LabAction::Create)?;

        let now = now_rfc3339();
        let issue = AssetIssue {
            id: new_id(),
            asset_id: asset.id.clone(),
            lab_id: asset.allocated_lab.clone(),
            title: required("title", &input.title)?,
            description: clean(input.description),
            priority: input.priority.unwrap_or_default(),
            status: IssueStatus::Open,
            reported_by: actor.id.clone(),
            assigned_to: clean(input.assigned_to),
            resolution: None,
            resolved_at: None,
            created_at: now.clone(),
            updated_at: now,
        };
        let location = format!("{} ({})", asset.name, asset.asset_id);
        self.report_issue(actor, &self.asset_issues, &issue, &location)?;
        Ok(issue)
    }

    fn report_issue<T: IssueRecord>(
        &self,
        actor: &Actor,
        table: &Table<T>,
        issue: &T,
        location: &str,
    ) -> Result<(), ServiceError> {
        table.insert(issue)?;
        self.record(
            NewActivity::by(actor, ActionType::Create, T::TABLE, issue.id())
                .describe(format!("reported '{}'", issue.title()))
                .values(None, serde_json::to_value(issue).ok()),
        );

        let mut recipients = self.lab_incharges(issue.lab_id());
        recipients.extend(issue.assigned_to().map(String::from));
        self.notify(
            recipients,
            Some(&actor.id),
            &Draft {
                kind: NotificationKind::IssueReported,
                title: "Issue reported".into(),
                message: format!("'{}' was reported for {}", issue.title(), location),
                entity_type: T::TABLE,
                entity_id: issue.id().to_string(),
            },
        );
        Ok(())
    }

    pub fn get_lab_issue(&self, id: &str) -> Result<LabIssue, ServiceError> {
        self.lab_issues.get_or_err(id)
    }

    pub fn get_asset_issue(&self, id: &str) -> Result<AssetIssue, ServiceError> {
        self.asset_issues.get_or_err(id)
    }

    pub fn list_lab_issues(
        &self,
        params: &ListParams,
        filters: &IssueFilters,
    ) -> Result<ListResult<LabIssue>, ServiceError> {
        self.lab_issues.find(&issue_query(params, filters, false))
    }

    pub fn list_asset_issues(
        &self,
        params: &ListParams,
        filters: &IssueFilters,
    ) -> Result<ListResult<AssetIssue>, ServiceError> {
        self.asset_issues.find(&issue_query(params, filters, true))
    }

    pub fn update_lab_issue(
        &self,
        actor: &Actor,
        id: &str,
        patch: serde_json::Value,
    ) -> Result<LabIssue, ServiceError> {
        self.update_issue(actor, &self.lab_issues, id, patch)
    }

    pub fn update_asset_issue(
        &self,
        actor: &Actor,
        id: &str,
        patch: serde_json::Value,
    ) -> Result<AssetIssue, ServiceError> {
        self.update_issue(actor, &self.asset_issues, id, patch)
    }

    pub fn set_lab_issue_status(
        &self,
        actor: &Actor,
        id: &str,
        change: StatusChange,
    ) -> Result<LabIssue, ServiceError> {
        self.set_issue_status(actor, &self.lab_issues, id, change)
    }

    pub fn set_asset_issue_status(
        &self,
        actor: &Actor,
        id: &str,
        change: StatusChange,
    ) -> Result<AssetIssue, ServiceError> {
        self.set_issue_status(actor, &self.asset_issues, id, change)
    }

    pub fn delete_lab_issue(&self, actor: &Actor, id: &str) -> Result<(), ServiceError> {
        self.delete_issue(actor, &self.lab_issues, id)
    }

    pub fn delete_asset_issue(&self, actor: &Actor, id: &str) -> Result<(), ServiceError> {
        self.delete_issue(actor, &self.asset_issues, id)
    }

    /// Edit title, description, priority or assignee.
    fn update_issue<T: IssueRecord>(
        &self,
        actor: &Actor,
        table: &Table<T>,
        id: &str,
        patch: serde_json::Value,
    ) -> Result<T, ServiceError> {
        let _guard = self.lock_workflow();
        let current = table.get_or_err(id)?;
        if current.reported_by() != actor.id {
            self.require_lab(actor, current.lab_id(), LabAction::Update)?;
        }
        let updated: T = Self::apply_patch(&current, patch, WORKFLOW_FIELDS)?;
        required("title", updated.title())?;
        table.update(&updated)?;
        self.record(
            NewActivity::by(actor, ActionType::Update, T::TABLE, id).values(
                serde_json::to_value(&current).ok(),
                serde_json::to_value(&updated).ok(),
            ),
        );
        Ok(updated)
    }

    /// Move an issue forward through open → in_progress → resolved → closed.
    ///
    /// The lab's staff with update rights or the assignee may do this.
    fn set_issue_status<T: IssueRecord>(
        &self,
        actor: &Actor,
        table: &Table<T>,
        id: &str,
        change: StatusChange,
    ) -> Result<T, ServiceError> {
        let _guard = self.lock_workflow();
        let current = table.get_or_err(id)?;
        if current.assigned_to() != Some(actor.id.as_str()) {
            self.require_lab(actor, current.lab_id(), LabAction::Update)?;
        }

        let from = current.status();
        if !from.can_transition_to(change.status) {
            return Err(ServiceError::Validation(format!(
                "issue cannot move from {} to {}",
                from.as_str(),
                change.status.as_str()
            )));
        }

        let mut updated = current.clone();
        updated.transition(change.status, clean(change.resolution), &now_rfc3339());
        table.update(&updated)?;

        self.record(
            NewActivity::by(actor, ActionType::StatusChange, T::TABLE, id)
                .describe(format!("status {} -> {}", from.as_str(), change.status.as_str()))
                .values(
                    serde_json::to_value(&current).ok(),
                    serde_json::to_value(&updated).ok(),
                ),
        );
        self.notify(
            [updated.reported_by().to_string()],
            Some(&actor.id),
            &Draft {
                kind: NotificationKind::IssueUpdated,
                title: "Issue updated".into(),
                message: format!("'{}' is now {}", updated.title(), change.status.as_str()),
                entity_type: T::TABLE,
                entity_id: id.to_string(),
            },
        );
        Ok(updated)
    }

    fn delete_issue<T: IssueRecord>(
        &self,
        actor: &Actor,
        table: &Table<T>,
        id: &str,
    ) -> Result<(), ServiceError> {
        self.require_manager(actor)?;
        let _guard = self.lock_workflow();
        let current = table.get_or_err(id)?;
        table.delete(id)?;
        self.record(
            NewActivity::by(actor, ActionType::Delete, T::TABLE, id)
                .values(serde_json::to_value(&current).ok(), None),
        );
        Ok(())
    }
}

fn issue_query(params: &ListParams, filters: &IssueFilters, with_asset: bool) -> Query {
    let mut q = Query::new()
        .eq_opt("lab_id", filters.lab_id.clone())
        .eq_opt("status", filters.status.map(|s| s.as_str()))
        .eq_opt("priority", filters.priority.map(priority_str))
        .eq_opt("reported_by", filters.reported_by.clone())
        .eq_opt("assigned_to", filters.assigned_to.clone());
    if with_asset {
        q = q.eq_opt("asset_id", filters.asset_id.clone());
    }
    q.page(params)
}
