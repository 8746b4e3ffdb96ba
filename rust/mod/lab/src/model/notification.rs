use serde::{Deserialize, Serialize};

use labtrack_store::{Column, Record};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    AssetApproval,
    AssetApproved,
    TransferRequest,
    TransferReceived,
    IssueReported,
    IssueUpdated,
    Info,
}

/// A message for one user, produced as a side effect of another write.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub id: String,
    pub user_id: String,
    pub title: String,
    pub message: String,
    pub kind: NotificationKind,
    #[serde(default)]
    pub entity_type: Option<String>,
    #[serde(default)]
    pub entity_id: Option<String>,
    #[serde(default)]
    pub read: bool,
    #[serde(default)]
    pub read_at: Option<String>,
    pub created_at: String,
}

impl Record for Notification {
    const TABLE: &'static str = "notifications";
    const COLUMNS: &'static [Column] = &[
        Column::text("user_id"),
        Column::text("kind"),
        Column::integer("read"),
        Column::text("created_at"),
    ];

    fn id(&self) -> &str {
        &self.id
    }
}
