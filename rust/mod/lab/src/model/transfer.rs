use serde::{Deserialize, Serialize};

use labtrack_store::{Column, Record};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransferStatus {
    Pending,
    Received,
}

impl Default for TransferStatus {
    fn default() -> Self {
        Self::Pending
    }
}

/// Movement of an asset from one lab to another. Becomes immutable once
/// received.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AssetTransfer {
    pub id: String,
    /// Asset.id being moved.
    pub asset_id: String,
    pub from_lab: String,
    pub to_lab: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,

    #[serde(default)]
    pub status: TransferStatus,

    pub initiated_by: String,

    #[serde(default)]
    pub received_by: Option<String>,
    #[serde(default)]
    pub received_at: Option<String>,

    pub created_at: String,
    pub updated_at: String,
}

impl Record for AssetTransfer {
    const TABLE: &'static str = "asset_transfers";
    const COLUMNS: &'static [Column] = &[
        Column::text("asset_id"),
        Column::text("from_lab"),
        Column::text("to_lab"),
        Column::text("status"),
        Column::text("initiated_by"),
        Column::text("created_at"),
    ];

    fn id(&self) -> &str {
        &self.id
    }
}
