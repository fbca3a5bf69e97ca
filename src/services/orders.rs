//! Order assembly: totals, order-number generation, and persistence of the
//! order header plus its item snapshots.

use std::sync::Arc;

use chrono::Utc;
use rand::Rng;
use rust_decimal::{Decimal, RoundingStrategy};
use rust_decimal_macros::dec;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, DatabaseTransaction, EntityTrait,
    QueryFilter, QueryOrder, Set, SqlErr, TransactionTrait,
};
use serde::Serialize;
use tracing::{instrument, warn};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::entities::order::{OrderStatus, PaymentStatus};
use crate::entities::{order, order_item, Order, OrderItem};
use crate::errors::ServiceError;
use crate::services::pricing::PricedLine;

/// Free shipping kicks in at this subtotal.
const FREE_SHIPPING_THRESHOLD: Decimal = dec!(999);
const FLAT_SHIPPING_COST: Decimal = dec!(99);
/// GST on the discounted subtotal.
const TAX_RATE: Decimal = dec!(0.18);

const ORDER_NUMBER_ATTEMPTS: usize = 5;
const ORDER_NUMBER_SUFFIX_LEN: usize = 4;
const ORDER_NUMBER_CHARSET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

/// Derived monetary breakdown of an order. Never client-supplied.
#[derive(Debug, Clone, Copy, Serialize, ToSchema)]
pub struct OrderTotals {
    pub subtotal: Decimal,
    pub discount_amount: Decimal,
    pub shipping_cost: Decimal,
    pub tax_amount: Decimal,
    pub total_amount: Decimal,
}

/// Computes shipping, tax and the grand total from a validated subtotal and
/// discount.
pub fn assemble_totals(subtotal: Decimal, discount: Decimal) -> OrderTotals {
    let shipping_cost = if subtotal >= FREE_SHIPPING_THRESHOLD {
        Decimal::ZERO
    } else {
        FLAT_SHIPPING_COST
    };
    let tax_amount = ((subtotal - discount) * TAX_RATE)
        .round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
    let total_amount = (subtotal - discount + tax_amount + shipping_cost)
        .round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
    OrderTotals {
        subtotal,
        discount_amount: discount,
        shipping_cost,
        tax_amount,
        total_amount,
    }
}

/// Generates a human-readable order number: `ORD-<YYYYMMDD>-<4 alnum>`.
/// Collisions are possible; the caller retries on unique violation.
pub fn generate_order_number() -> String {
    let mut rng = rand::thread_rng();
    let suffix: String = (0..ORDER_NUMBER_SUFFIX_LEN)
        .map(|_| {
            let idx = rng.gen_range(0..ORDER_NUMBER_CHARSET.len());
            ORDER_NUMBER_CHARSET[idx] as char
        })
        .collect();
    format!("ORD-{}-{}", Utc::now().format("%Y%m%d"), suffix)
}

/// Everything needed to persist an order header besides the items.
pub struct NewOrder {
    pub user_id: Uuid,
    pub status: OrderStatus,
    pub payment_status: PaymentStatus,
    pub payment_method: String,
    pub totals: OrderTotals,
    pub coupon_id: Option<Uuid>,
    pub coupon_code: Option<String>,
    pub shipping_address_json: String,
}

#[derive(Clone)]
pub struct OrderService {
    db: Arc<DatabaseConnection>,
}

impl OrderService {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Persists the order header and its item snapshots inside the supplied
    /// transaction. Order-number collisions are retried behind a savepoint
    /// so a unique violation does not poison the outer transaction.
    #[instrument(skip(self, txn, new_order, lines), fields(user_id = %new_order.user_id))]
    pub async fn create_order(
        &self,
        txn: &DatabaseTransaction,
        new_order: NewOrder,
        lines: &[PricedLine],
    ) -> Result<order::Model, ServiceError> {
        let order_id = Uuid::new_v4();
        let now = Utc::now();

        let mut header: Option<order::Model> = None;
        for attempt in 0..ORDER_NUMBER_ATTEMPTS {
            let candidate = generate_order_number();
            let active = order::ActiveModel {
                id: Set(order_id),
                order_number: Set(candidate.clone()),
                user_id: Set(new_order.user_id),
                status: Set(new_order.status.as_str().to_string()),
                payment_status: Set(new_order.payment_status.as_str().to_string()),
                payment_method: Set(new_order.payment_method.clone()),
                subtotal: Set(new_order.totals.subtotal),
                discount_amount: Set(new_order.totals.discount_amount),
                shipping_cost: Set(new_order.totals.shipping_cost),
                tax_amount: Set(new_order.totals.tax_amount),
                total_amount: Set(new_order.totals.total_amount),
                coupon_id: Set(new_order.coupon_id),
                coupon_code: Set(new_order.coupon_code.clone()),
                shipping_address: Set(new_order.shipping_address_json.clone()),
                razorpay_order_id: Set(None),
                razorpay_payment_id: Set(None),
                razorpay_signature: Set(None),
                created_at: Set(now),
                updated_at: Set(None),
            };

            let savepoint = txn.begin().await?;
            match active.insert(&savepoint).await {
                Ok(model) => {
                    savepoint.commit().await?;
                    header = Some(model);
                    break;
                }
                Err(err) => {
                    savepoint.rollback().await?;
                    if matches!(err.sql_err(), Some(SqlErr::UniqueConstraintViolation(_))) {
                        warn!(%candidate, attempt, "Order number collision; regenerating");
                        continue;
                    }
                    return Err(err.into());
                }
            }
        }
        let header = header.ok_or_else(|| {
            ServiceError::Internal("Exhausted order number generation attempts".to_string())
        })?;

        for line in lines {
            order_item::ActiveModel {
                id: Set(Uuid::new_v4()),
                order_id: Set(order_id),
                variant_id: Set(line.variant_id),
                product_name: Set(line.product_name.clone()),
                color_name: Set(line.color_name.clone()),
                size_label: Set(line.size_label.clone()),
                sku: Set(line.sku.clone()),
                quantity: Set(line.quantity),
                unit_price: Set(line.unit_price),
                total_price: Set(line.line_total),
                created_at: Set(now),
            }
            .insert(txn)
            .await?;
        }

        Ok(header)
    }

    pub async fn find_by_razorpay_order_id(
        &self,
        gateway_order_id: &str,
    ) -> Result<Option<order::Model>, ServiceError> {
        Ok(Order::find()
            .filter(order::Column::RazorpayOrderId.eq(gateway_order_id))
            .one(&*self.db)
            .await?)
    }

    /// The authenticated buyer's orders, newest first.
    pub async fn list_for_user(&self, user_id: Uuid) -> Result<Vec<order::Model>, ServiceError> {
        Ok(Order::find()
            .filter(order::Column::UserId.eq(user_id))
            .order_by_desc(order::Column::CreatedAt)
            .all(&*self.db)
            .await?)
    }

    /// One of the buyer's orders with its item snapshots. A foreign order id
    /// is indistinguishable from a missing one.
    pub async fn get_for_user(
        &self,
        user_id: Uuid,
        order_id: Uuid,
    ) -> Result<(order::Model, Vec<order_item::Model>), ServiceError> {
        let header = Order::find_by_id(order_id)
            .filter(order::Column::UserId.eq(user_id))
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Order {} not found", order_id)))?;
        let items = OrderItem::find()
            .filter(order_item::Column::OrderId.eq(order_id))
            .all(&*self.db)
            .await?;
        Ok((header, items))
    }
}
