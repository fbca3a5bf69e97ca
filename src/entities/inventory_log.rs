use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Append-only audit record for every stock mutation. Rows are never updated
/// or deleted; this table is the ledger of truth for stock history.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "inventory_logs")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub variant_id: Uuid,
    /// "sale", "restock", "adjustment", ...
    pub change_type: String,
    /// Signed delta applied to the stock quantity.
    pub quantity_change: i32,
    pub previous_quantity: i32,
    pub new_quantity: i32,
    #[sea_orm(nullable)]
    pub reason: Option<String>,
    /// Order id for sale movements.
    #[sea_orm(nullable)]
    pub reference_id: Option<Uuid>,
    #[sea_orm(nullable)]
    pub performed_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::product_variant::Entity",
        from = "Column::VariantId",
        to = "super::product_variant::Column::Id"
    )]
    Variant,
}

impl Related<super::product_variant::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Variant.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
