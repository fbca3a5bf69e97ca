//! Inventory ledger.
//!
//! Stock commits are a storage-level conditional decrement, not a
//! read-then-write cycle: two concurrent settlements racing for the last
//! unit resolve at the database, and the loser gets `InsufficientStock`.
//! Every mutation appends an audit row to `inventory_logs`.

use chrono::Utc;
use sea_orm::{
    sea_query::Expr, ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter,
    Set,
};
use tracing::instrument;
use uuid::Uuid;

use crate::entities::{inventory_log, product_variant, InventoryLog, ProductVariant};
use crate::errors::ServiceError;

pub const CHANGE_TYPE_SALE: &str = "sale";

#[derive(Clone, Default)]
pub struct InventoryService;

impl InventoryService {
    pub fn new() -> Self {
        Self
    }

    /// Commits a stock reservation for one order line.
    ///
    /// Executes `UPDATE product_variants SET stock_quantity = stock_quantity
    /// - q WHERE id = ? AND stock_quantity >= q` and checks the affected-row
    /// count; zero rows means another buyer got there first.
    #[instrument(skip(self, conn))]
    pub async fn commit<C: ConnectionTrait>(
        &self,
        conn: &C,
        variant_id: Uuid,
        quantity: i32,
        order_id: Uuid,
        performed_by: Option<Uuid>,
    ) -> Result<inventory_log::Model, ServiceError> {
        if quantity < 1 {
            return Err(ServiceError::Validation(
                "Quantity must be a positive integer".to_string(),
            ));
        }

        let result = ProductVariant::update_many()
            .col_expr(
                product_variant::Column::StockQuantity,
                Expr::col(product_variant::Column::StockQuantity).sub(quantity),
            )
            .col_expr(product_variant::Column::UpdatedAt, Expr::value(Utc::now()))
            .filter(product_variant::Column::Id.eq(variant_id))
            .filter(product_variant::Column::StockQuantity.gte(quantity))
            .exec(conn)
            .await?;

        if result.rows_affected == 0 {
            let remaining = ProductVariant::find_by_id(variant_id)
                .one(conn)
                .await?
                .map(|v| v.stock_quantity)
                .unwrap_or(0);
            return Err(ServiceError::InsufficientStock(format!(
                "Variant {} has only {} left",
                variant_id, remaining
            )));
        }

        let variant = ProductVariant::find_by_id(variant_id)
            .one(conn)
            .await?
            .ok_or_else(|| {
                ServiceError::Internal(format!("Variant {} vanished mid-commit", variant_id))
            })?;

        let entry = inventory_log::ActiveModel {
            id: Set(Uuid::new_v4()),
            variant_id: Set(variant_id),
            change_type: Set(CHANGE_TYPE_SALE.to_string()),
            quantity_change: Set(-quantity),
            previous_quantity: Set(variant.stock_quantity + quantity),
            new_quantity: Set(variant.stock_quantity),
            reason: Set(Some("Order settlement".to_string())),
            reference_id: Set(Some(order_id)),
            performed_by: Set(performed_by),
            created_at: Set(Utc::now()),
        }
        .insert(conn)
        .await?;

        Ok(entry)
    }

    /// Stock-movement history for a variant, newest first.
    pub async fn history<C: ConnectionTrait>(
        &self,
        conn: &C,
        variant_id: Uuid,
    ) -> Result<Vec<inventory_log::Model>, ServiceError> {
        use sea_orm::QueryOrder;
        Ok(InventoryLog::find()
            .filter(inventory_log::Column::VariantId.eq(variant_id))
            .order_by_desc(inventory_log::Column::CreatedAt)
            .all(conn)
            .await?)
    }
}
