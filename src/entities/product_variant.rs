use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// A sellable variant of a product (one color/size combination).
///
/// `stock_quantity` is the contention point of the whole system: it is only
/// ever decremented through the inventory service's conditional update, never
/// through a read-modify-write cycle.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "product_variants")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub product_id: Uuid,
    pub color_id: Uuid,
    pub size_id: Uuid,
    #[sea_orm(unique)]
    pub sku: String,
    pub stock_quantity: i32,
    #[sea_orm(column_type = "Decimal(Some((16, 4)))", nullable)]
    pub price_override: Option<Decimal>,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::product::Entity",
        from = "Column::ProductId",
        to = "super::product::Column::Id"
    )]
    Product,
    #[sea_orm(
        belongs_to = "super::color::Entity",
        from = "Column::ColorId",
        to = "super::color::Column::Id"
    )]
    Color,
    #[sea_orm(
        belongs_to = "super::size::Entity",
        from = "Column::SizeId",
        to = "super::size::Column::Id"
    )]
    Size,
    #[sea_orm(has_many = "super::inventory_log::Entity")]
    InventoryLogs,
}

impl Related<super::product::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Product.def()
    }
}

impl Related<super::color::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Color.def()
    }
}

impl Related<super::size::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Size.def()
    }
}

impl Related<super::inventory_log::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::InventoryLogs.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
