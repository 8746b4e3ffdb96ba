use serde::{Deserialize, Serialize};

use labtrack_store::{Column, Record};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssuePriority {
    Low,
    Medium,
    High,
    Critical,
}

impl Default for IssuePriority {
    fn default() -> Self {
        Self::Medium
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueStatus {
    Open,
    InProgress,
    Resolved,
    Closed,
}

impl Default for IssueStatus {
    fn default() -> Self {
        Self::Open
    }
}

impl IssueStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Open => "open",
            Self::InProgress => "in_progress",
            Self::Resolved => "resolved",
            Self::Closed => "closed",
        }
    }

    fn rank(&self) -> u8 {
        match self {
            Self::Open => 0,
            Self::InProgress => 1,
            Self::Resolved => 2,
            Self::Closed => 3,
        }
    }

    /// Issues only move forward; `closed` is terminal.
    pub fn can_transition_to(&self, next: IssueStatus) -> bool {
        next.rank() > self.rank()
    }
}

/// A problem reported against a lab as a whole.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LabIssue {
    pub id: String,
    pub lab_id: String,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub priority: IssuePriority,
    #[serde(default)]
    pub status: IssueStatus,
    pub reported_by: String,
    #[serde(default)]
    pub assigned_to: Option<String>,
    #[serde(default)]
    pub resolution: Option<String>,
    #[serde(default)]
    pub resolved_at: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

/// A problem reported against one asset. `labId` is the asset's lab at
/// the time of the report.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AssetIssue {
    pub id: String,
    pub asset_id: String,
    pub lab_id: String,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub priority: IssuePriority,
    #[serde(default)]
    pub status: IssueStatus,
    pub reported_by: String,
    #[serde(default)]
    pub assigned_to: Option<String>,
    #[serde(default)]
    pub resolution: Option<String>,
    #[serde(default)]
    pub resolved_at: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

/// Shared workflow surface of both issue kinds.
pub trait IssueRecord: Record {
    fn title(&self) -> &str;
    fn lab_id(&self) -> &str;
    fn reported_by(&self) -> &str;
    fn assigned_to(&self) -> Option<&str>;
    fn status(&self) -> IssueStatus;

    /// Apply a status change and stamp the timestamps it implies.
    fn transition(&mut self, next: IssueStatus, resolution: Option<String>, now: &str);
}

macro_rules! impl_issue_record {
    ($ty:ty, $table:literal, [$($extra:expr),*]) => {
        impl Record for $ty {
            const TABLE: &'static str = $table;
            const COLUMNS: &'static [Column] = &[
                $($extra,)*
                Column::text("lab_id"),
                Column::text("status"),
                Column::text("priority"),
                Column::text("reported_by"),
                Column::text("assigned_to"),
                Column::text("created_at"),
            ];

            fn id(&self) -> &str {
                &self.id
            }
        }

        impl IssueRecord for $ty {
            fn title(&self) -> &str {
                &self.title
            }

            fn lab_id(&self) -> &str {
                &self.lab_id
            }

            fn reported_by(&self) -> &str {
                &self.reported_by
            }

            fn assigned_to(&self) -> Option<&str> {
                self.assigned_to.as_deref()
            }

            fn status(&self) -> IssueStatus {
                self.status
            }

            fn transition(&mut self, next: IssueStatus, resolution: Option<String>, now: &str) {
                self.status = next;
                if resolution.is_some() {
                    self.resolution = resolution;
                }
                if next == IssueStatus::Resolved {
                    self.resolved_at = Some(now.to_string());
                }
                self.updated_at = now.to_string();
            }
        }
    };
}

impl_issue_record!(LabIssue, "lab_issues", []);
impl_issue_record!(AssetIssue, "asset_issues", [Column::text("asset_id")]);
