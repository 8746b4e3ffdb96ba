use serde::{Deserialize, Serialize};

use labtrack_store::{Column, Record};

/// A physical lab. `labIdentifier` is the human code (e.g. "CSE-L2") and
/// never changes after creation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Lab {
    pub id: String,
    pub lab_identifier: String,
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub department: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub capacity: Option<u32>,

    /// Profile id of the designated Lab Incharge.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub incharge_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    pub created_at: String,
    pub updated_at: String,
}

impl Record for Lab {
    const TABLE: &'static str = "labs";
    const COLUMNS: &'static [Column] = &[
        Column::text("lab_identifier").unique(),
        Column::text("name"),
        Column::text("department"),
        Column::text("incharge_id"),
        Column::text("created_at"),
    ];

    fn id(&self) -> &str {
        &self.id
    }
}
