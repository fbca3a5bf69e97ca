use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// An order header. Created once by the settlement coordinator; afterwards
/// only `status` / `payment_status` and the gateway correlation fields are
/// mutated, and only by the coordinator. Never deleted.
///
/// All monetary fields are derived server-side. `shipping_address` is a JSON
/// snapshot copied from the buyer's address at creation time, so the order
/// stays intact if the address is later edited or removed.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "orders")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    #[sea_orm(unique)]
    pub order_number: String,
    pub user_id: Uuid,
    /// See [`OrderStatus`].
    pub status: String,
    /// See [`PaymentStatus`].
    pub payment_status: String,
    /// "online" or "cod".
    pub payment_method: String,
    #[sea_orm(column_type = "Decimal(Some((16, 4)))")]
    pub subtotal: Decimal,
    #[sea_orm(column_type = "Decimal(Some((16, 4)))")]
    pub discount_amount: Decimal,
    #[sea_orm(column_type = "Decimal(Some((16, 4)))")]
    pub shipping_cost: Decimal,
    #[sea_orm(column_type = "Decimal(Some((16, 4)))")]
    pub tax_amount: Decimal,
    #[sea_orm(column_type = "Decimal(Some((16, 4)))")]
    pub total_amount: Decimal,
    #[sea_orm(nullable)]
    pub coupon_id: Option<Uuid>,
    #[sea_orm(nullable)]
    pub coupon_code: Option<String>,
    pub shipping_address: String,
    #[sea_orm(nullable)]
    pub razorpay_order_id: Option<String>,
    #[sea_orm(nullable)]
    pub razorpay_payment_id: Option<String>,
    #[sea_orm(nullable)]
    pub razorpay_signature: Option<String>,
    pub created_at: DateTime<Utc>,
    #[sea_orm(nullable)]
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::order_item::Entity")]
    Items,
    #[sea_orm(has_many = "super::coupon_usage::Entity")]
    CouponUsages,
}

impl Related<super::order_item::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Items.def()
    }
}

impl Related<super::coupon_usage::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::CouponUsages.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

/// Order lifecycle: `pending -> confirmed` or `pending -> cancelled`.
/// Both terminal states are final.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    Pending,
    Confirmed,
    Cancelled,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Confirmed => "confirmed",
            OrderStatus::Cancelled => "cancelled",
        }
    }
}

/// Payment lifecycle: `pending -> captured | failed`, `cod_pending` for
/// cash-on-delivery orders, `captured -> refunded` via the return flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Pending,
    Captured,
    Failed,
    CodPending,
    Refunded,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "pending",
            PaymentStatus::Captured => "captured",
            PaymentStatus::Failed => "failed",
            PaymentStatus::CodPending => "cod_pending",
            PaymentStatus::Refunded => "refunded",
        }
    }
}
