//! Coupon evaluation and redemption.
//!
//! Evaluation is deliberately forgiving: an unknown, expired or otherwise
//! ineligible code degrades to zero discount so a typo never blocks
//! checkout. Redemption is strict: the global usage cap is enforced with a
//! conditional compare-and-increment, and the per-user limit is re-checked
//! inside the settlement transaction.

use std::sync::Arc;

use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{
    sea_query::Expr, ActiveModelTrait, ColumnTrait, Condition, ConnectionTrait,
    DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter, Set,
};
use tracing::{debug, instrument};
use uuid::Uuid;

use crate::entities::{coupon, coupon_usage, Coupon, CouponUsage};
use crate::entities::coupon::DiscountType;
use crate::errors::ServiceError;

/// Result of evaluating a (possibly absent) coupon code.
#[derive(Debug, Clone)]
pub struct CouponOutcome {
    pub discount: Decimal,
    /// Present only when a discount was applied; carried through settlement
    /// for usage recording.
    pub coupon: Option<coupon::Model>,
}

impl CouponOutcome {
    pub fn none() -> Self {
        Self {
            discount: Decimal::ZERO,
            coupon: None,
        }
    }
}

#[derive(Clone)]
pub struct CouponService {
    db: Arc<DatabaseConnection>,
}

impl CouponService {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Evaluates a coupon code for a buyer and subtotal. Never fails the
    /// checkout: every ineligibility path returns a zero discount.
    #[instrument(skip(self))]
    pub async fn evaluate(
        &self,
        code: Option<&str>,
        user_id: Uuid,
        subtotal: Decimal,
    ) -> Result<CouponOutcome, ServiceError> {
        let code = match code.map(str::trim).filter(|c| !c.is_empty()) {
            Some(c) => c.to_uppercase(),
            None => return Ok(CouponOutcome::none()),
        };

        let db = &*self.db;
        let coupon = match Coupon::find()
            .filter(coupon::Column::Code.eq(code.clone()))
            .filter(coupon::Column::Active.eq(true))
            .one(db)
            .await?
        {
            Some(c) => c,
            None => {
                debug!(%code, "Coupon not found or inactive; no discount");
                return Ok(CouponOutcome::none());
            }
        };

        let now = Utc::now();
        if now < coupon.valid_from || coupon.valid_until.map_or(false, |until| now > until) {
            debug!(%code, "Coupon outside validity window; no discount");
            return Ok(CouponOutcome::none());
        }
        if let Some(limit) = coupon.usage_limit {
            if coupon.used_count >= limit {
                debug!(%code, "Coupon global usage limit reached; no discount");
                return Ok(CouponOutcome::none());
            }
        }
        let user_redemptions = CouponUsage::find()
            .filter(coupon_usage::Column::CouponId.eq(coupon.id))
            .filter(coupon_usage::Column::UserId.eq(user_id))
            .count(db)
            .await?;
        if user_redemptions >= coupon.per_user_limit as u64 {
            debug!(%code, "Coupon per-user limit reached; no discount");
            return Ok(CouponOutcome::none());
        }
        if subtotal < coupon.min_order_amount {
            debug!(%code, %subtotal, "Subtotal below coupon minimum; no discount");
            return Ok(CouponOutcome::none());
        }

        let discount = compute_discount(&coupon, subtotal);
        if discount <= Decimal::ZERO {
            return Ok(CouponOutcome::none());
        }
        Ok(CouponOutcome {
            discount,
            coupon: Some(coupon),
        })
    }

    /// Records a redemption inside the settlement transaction.
    ///
    /// The global cap is enforced with a conditional increment
    /// (`used_count < usage_limit`, rows-affected checked) so two concurrent
    /// settlements cannot overrun it. A lost race here aborts the
    /// transaction with `Conflict` — at this point the discount is already
    /// priced into the order and silently dropping it would undercharge.
    #[instrument(skip(self, txn))]
    pub async fn redeem<C: ConnectionTrait>(
        &self,
        txn: &C,
        coupon_id: Uuid,
        user_id: Uuid,
        order_id: Uuid,
    ) -> Result<(), ServiceError> {
        let coupon = Coupon::find_by_id(coupon_id)
            .one(txn)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Coupon {} not found", coupon_id)))?;

        // Replayed settlement for the same order: the redemption is already
        // on record, nothing to do.
        let already_recorded = CouponUsage::find()
            .filter(coupon_usage::Column::CouponId.eq(coupon_id))
            .filter(coupon_usage::Column::OrderId.eq(order_id))
            .count(txn)
            .await?;
        if already_recorded > 0 {
            return Ok(());
        }

        let result = Coupon::update_many()
            .col_expr(
                coupon::Column::UsedCount,
                Expr::col(coupon::Column::UsedCount).add(1),
            )
            .col_expr(coupon::Column::UpdatedAt, Expr::value(Utc::now()))
            .filter(coupon::Column::Id.eq(coupon_id))
            .filter(
                Condition::any()
                    .add(coupon::Column::UsageLimit.is_null())
                    .add(
                        Expr::col(coupon::Column::UsedCount)
                            .lt(Expr::col(coupon::Column::UsageLimit)),
                    ),
            )
            .exec(txn)
            .await?;
        if result.rows_affected == 0 {
            return Err(ServiceError::Conflict(format!(
                "Coupon {} usage limit reached",
                coupon.code
            )));
        }

        let user_redemptions = CouponUsage::find()
            .filter(coupon_usage::Column::CouponId.eq(coupon_id))
            .filter(coupon_usage::Column::UserId.eq(user_id))
            .count(txn)
            .await?;
        if user_redemptions >= coupon.per_user_limit as u64 {
            return Err(ServiceError::Conflict(format!(
                "Coupon {} per-user limit reached",
                coupon.code
            )));
        }

        coupon_usage::ActiveModel {
            id: Set(Uuid::new_v4()),
            coupon_id: Set(coupon_id),
            user_id: Set(user_id),
            order_id: Set(order_id),
            created_at: Set(Utc::now()),
        }
        .insert(txn)
        .await?;

        Ok(())
    }
}

/// Discount arithmetic, separated from the eligibility checks so it is
/// testable without a database.
pub fn compute_discount(coupon: &coupon::Model, subtotal: Decimal) -> Decimal {
    match DiscountType::parse(&coupon.discount_type) {
        Some(DiscountType::Percentage) => {
            let raw = subtotal * coupon.discount_value / Decimal::from(100);
            match coupon.max_discount_amount {
                Some(cap) => raw.min(cap),
                None => raw,
            }
        }
        // A fixed discount can never exceed the order value.
        Some(DiscountType::Fixed) => coupon.discount_value.min(subtotal),
        None => Decimal::ZERO,
    }
}
