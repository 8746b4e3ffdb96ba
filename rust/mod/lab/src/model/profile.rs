use serde::{Deserialize, Serialize};

use labtrack_core::Role;
use labtrack_store::{Column, Record};

/// A user account. Incharges and assistants belong to one lab.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
    pub id: String,
    pub email: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub full_name: Option<String>,

    pub role: Role,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lab_id: Option<String>,

    /// argon2id PHC string. Empty once redacted for API output.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub password_hash: String,

    pub created_at: String,
    pub updated_at: String,
}

impl Profile {
    /// Copy without the password hash, for API responses.
    pub fn redacted(&self) -> Self {
        Self {
            password_hash: String::new(),
            ..self.clone()
        }
    }
}

impl Record for Profile {
    const TABLE: &'static str = "profiles";
    const COLUMNS: &'static [Column] = &[
        Column::text("email").unique(),
        Column::text("role"),
        Column::text("lab_id"),
    ];

    fn id(&self) -> &str {
        &self.id
    }
}
