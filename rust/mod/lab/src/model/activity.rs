use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use labtrack_store::{Column, Record};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionType {
    Create,
    Update,
    Delete,
    Approve,
    Receive,
    StatusChange,
    Login,
    Read,
}

impl ActionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Update => "update",
            Self::Delete => "delete",
            Self::Approve => "approve",
            Self::Receive => "receive",
            Self::StatusChange => "status_change",
            Self::Login => "login",
            Self::Read => "read",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Info,
    Warning,
    Error,
    Critical,
}

impl Default for Severity {
    fn default() -> Self {
        Self::Info
    }
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Info => "info",
            Self::Warning => "warning",
            Self::Error => "error",
            Self::Critical => "critical",
        }
    }
}

/// One audit-trail entry. Append-only.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ActivityLog {
    pub id: String,
    pub user_id: String,
    #[serde(default)]
    pub user_email: Option<String>,
    pub action_type: ActionType,
    pub entity_type: String,
    #[serde(default)]
    pub entity_id: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub old_values: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub new_values: Option<serde_json::Value>,
    #[serde(default)]
    pub severity: Severity,
    #[serde(default = "default_success")]
    pub success: bool,
    pub created_at: String,
}

fn default_success() -> bool {
    true
}

/// Input to `log_activity`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewActivity {
    #[serde(default)]
    pub user_id: String,
    #[serde(default)]
    pub user_email: Option<String>,
    pub action_type: ActionType,
    pub entity_type: String,
    #[serde(default)]
    pub entity_id: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub old_values: Option<serde_json::Value>,
    #[serde(default)]
    pub new_values: Option<serde_json::Value>,
    #[serde(default)]
    pub severity: Severity,
    #[serde(default = "default_success")]
    pub success: bool,
}

impl Record for ActivityLog {
    const TABLE: &'static str = "enhanced_activity_logs";
    const COLUMNS: &'static [Column] = &[
        Column::text("user_id"),
        Column::text("action_type"),
        Column::text("entity_type"),
        Column::text("entity_id"),
        Column::text("severity"),
        Column::integer("success"),
        Column::text("created_at"),
    ];

    fn id(&self) -> &str {
        &self.id
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct UserCount {
    pub user_id: String,
    #[serde(default)]
    pub user_email: Option<String>,
    pub count: usize,
}

/// Aggregates returned by `get_activity_stats`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ActivityStats {
    pub days: u32,
    pub total: usize,
    pub failed: usize,
    pub by_action: BTreeMap<String, usize>,
    pub by_severity: BTreeMap<String, usize>,
    pub by_entity_type: BTreeMap<String, usize>,
    pub top_users: Vec<UserCount>,
    /// `YYYY-MM-DD` → entries that day.
    pub daily: BTreeMap<String, usize>,
}
