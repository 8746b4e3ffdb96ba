use serde::{Deserialize, Serialize};

use labtrack_store::{Column, Record};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssetStatus {
    Active,
    UnderMaintenance,
    Damaged,
    Disposed,
}

impl Default for AssetStatus {
    fn default() -> Self {
        Self::Active
    }
}

/// An inventory item allocated to a lab.
///
/// Two sign-offs are needed before an asset counts as approved: the HOD
/// (`approvedBy`) and the Lab Incharge of the allocated lab
/// (`approvedByLabIncharge`). `approved` is derived from both.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Asset {
    pub id: String,

    /// Human asset code, unique across the inventory.
    pub asset_id: String,
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub make: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub serial_number: Option<String>,

    /// Lab.id the asset currently belongs to.
    pub allocated_lab: String,

    #[serde(default)]
    pub consumable: bool,
    #[serde(default = "default_quantity")]
    pub quantity: u32,
    #[serde(default)]
    pub rate: f64,
    /// rate × quantity, recomputed on every write.
    #[serde(default)]
    pub total_amount: f64,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bill_number: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub supplier: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub purchase_date: Option<String>,

    #[serde(default)]
    pub status: AssetStatus,

    pub created_by: String,

    /// HOD approval slot.
    #[serde(default)]
    pub approved_by: Option<String>,
    /// Lab Incharge approval slot.
    #[serde(default)]
    pub approved_by_lab_incharge: Option<String>,
    #[serde(default)]
    pub hod_approved_at: Option<String>,
    #[serde(default)]
    pub lab_incharge_approved_at: Option<String>,
    #[serde(default)]
    pub approved: bool,

    pub created_at: String,
    pub updated_at: String,
}

fn default_quantity() -> u32 {
    1
}

impl Asset {
    /// Recompute derived fields.
    pub fn normalize(&mut self) {
        self.total_amount = self.rate * self.quantity as f64;
        self.approved = self.approved_by.is_some() && self.approved_by_lab_incharge.is_some();
    }
}

impl Record for Asset {
    const TABLE: &'static str = "assets";
    const COLUMNS: &'static [Column] = &[
        Column::text("asset_id").unique(),
        Column::text("name"),
        Column::text("category"),
        Column::text("serial_number"),
        Column::text("allocated_lab"),
        Column::integer("consumable"),
        Column::real("rate"),
        Column::text("purchase_date"),
        Column::text("status"),
        Column::integer("approved"),
        Column::text("created_by"),
        Column::text("created_at"),
    ];

    fn id(&self) -> &str {
        &self.id
    }
}
