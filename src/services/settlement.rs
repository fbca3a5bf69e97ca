//! Settlement coordinator.
//!
//! Converges cart, inventory, coupon usage and order state into one
//! consistent outcome across two entry points: synchronous order creation
//! and asynchronous payment confirmation (direct client callback and
//! gateway webhook). Both confirmation paths run the same status-guarded
//! finalize, so duplicate webhook deliveries and client/webhook races
//! collapse into no-ops.

use std::sync::Arc;

use chrono::Utc;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal_macros::dec;
use sea_orm::{
    sea_query::Expr, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter,
    TransactionTrait,
};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::auth::AuthUser;
use crate::entities::order::{OrderStatus, PaymentStatus};
use crate::entities::{
    cart_item, customer_address, order, order_item, CartItem, CustomerAddress, Order, OrderItem,
};
use crate::errors::ServiceError;
use crate::events::{Event, EventSender};
use crate::services::coupons::CouponService;
use crate::services::inventory::InventoryService;
use crate::services::orders::{NewOrder, OrderService, OrderTotals};
use crate::services::payments::{self, PaymentGateway};
use crate::services::pricing::{CartLine, PricingService};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum PaymentMethod {
    Online,
    Cod,
}

impl PaymentMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentMethod::Online => "online",
            PaymentMethod::Cod => "cod",
        }
    }
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreateOrderInput {
    #[validate]
    pub items: Vec<CartLine>,
    pub address_id: Uuid,
    #[serde(default)]
    pub coupon_code: Option<String>,
    pub payment_method: PaymentMethod,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct VerifyPaymentInput {
    #[validate(length(min = 1))]
    pub razorpay_order_id: String,
    #[validate(length(min = 1))]
    pub razorpay_payment_id: String,
    #[validate(length(min = 1))]
    pub razorpay_signature: String,
}

/// Buyer fields echoed back for the client-side payment widget.
#[derive(Debug, Serialize, ToSchema)]
pub struct Prefill {
    pub name: String,
    pub email: String,
    pub contact: String,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(untagged)]
pub enum CreateOrderResponse {
    Cod {
        success: bool,
        order_id: Uuid,
        order_number: String,
    },
    Online {
        order_id: Uuid,
        order_number: String,
        gateway_order_id: String,
        gateway_key_id: String,
        amount_minor_units: i64,
        currency: String,
        prefill: Prefill,
        summary: OrderTotals,
    },
}

#[derive(Debug, Serialize, ToSchema)]
pub struct VerifyPaymentResponse {
    pub success: bool,
    pub order_id: Uuid,
    pub order_number: String,
}

/// Gateway webhook envelope.
#[derive(Debug, Deserialize)]
pub struct WebhookEnvelope {
    pub event: String,
    #[serde(default)]
    pub payload: serde_json::Value,
}

/// Shipping snapshot embedded in the order at creation time.
#[derive(Debug, Serialize, Deserialize)]
struct AddressSnapshot {
    full_name: String,
    phone: String,
    line1: String,
    line2: Option<String>,
    city: String,
    state: String,
    postal_code: String,
    country: String,
}

impl From<&customer_address::Model> for AddressSnapshot {
    fn from(address: &customer_address::Model) -> Self {
        Self {
            full_name: address.full_name.clone(),
            phone: address.phone.clone(),
            line1: address.line1.clone(),
            line2: address.line2.clone(),
            city: address.city.clone(),
            state: address.state.clone(),
            postal_code: address.postal_code.clone(),
            country: address.country.clone(),
        }
    }
}

#[derive(Clone)]
pub struct SettlementService {
    db: Arc<DatabaseConnection>,
    gateway: Arc<dyn PaymentGateway>,
    pricing: PricingService,
    coupons: CouponService,
    orders: OrderService,
    inventory: InventoryService,
    events: EventSender,
    currency: String,
    payment_secret: String,
}

impl SettlementService {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        db: Arc<DatabaseConnection>,
        gateway: Arc<dyn PaymentGateway>,
        pricing: PricingService,
        coupons: CouponService,
        orders: OrderService,
        inventory: InventoryService,
        events: EventSender,
        currency: String,
        payment_secret: String,
    ) -> Self {
        Self {
            db,
            gateway,
            pricing,
            coupons,
            orders,
            inventory,
            events,
            currency,
            payment_secret,
        }
    }

    /// Synchronous order creation.
    ///
    /// COD orders settle immediately (inventory, coupon, cart all committed
    /// in one transaction). Online orders are persisted `pending`/`pending`
    /// and wait for payment confirmation before any stock is touched.
    #[instrument(skip(self, buyer, input), fields(user_id = %buyer.id))]
    pub async fn create_order(
        &self,
        buyer: &AuthUser,
        input: CreateOrderInput,
    ) -> Result<CreateOrderResponse, ServiceError> {
        input.validate()?;
        if input.items.is_empty() {
            return Err(ServiceError::Validation("Cart is empty".to_string()));
        }

        let address = CustomerAddress::find_by_id(input.address_id)
            .filter(customer_address::Column::UserId.eq(buyer.id))
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound("Address not found".to_string()))?;

        let priced = self.pricing.price_cart(&input.items).await?;
        let outcome = self
            .coupons
            .evaluate(input.coupon_code.as_deref(), buyer.id, priced.subtotal)
            .await?;
        let totals = crate::services::orders::assemble_totals(priced.subtotal, outcome.discount);

        let snapshot = AddressSnapshot::from(&address);
        let shipping_address_json = serde_json::to_string(&snapshot)
            .map_err(|e| ServiceError::Internal(format!("Address snapshot failed: {}", e)))?;
        let (coupon_id, coupon_code) = match &outcome.coupon {
            Some(c) => (Some(c.id), Some(c.code.clone())),
            None => (None, None),
        };

        match input.payment_method {
            PaymentMethod::Cod => {
                let txn = self.db.begin().await?;
                let header = self
                    .orders
                    .create_order(
                        &txn,
                        NewOrder {
                            user_id: buyer.id,
                            status: OrderStatus::Confirmed,
                            payment_status: PaymentStatus::CodPending,
                            payment_method: PaymentMethod::Cod.as_str().to_string(),
                            totals,
                            coupon_id,
                            coupon_code,
                            shipping_address_json,
                        },
                        &priced.lines,
                    )
                    .await?;

                for line in &priced.lines {
                    self.inventory
                        .commit(&txn, line.variant_id, line.quantity, header.id, Some(buyer.id))
                        .await?;
                }
                if let Some(cid) = coupon_id {
                    self.coupons.redeem(&txn, cid, buyer.id, header.id).await?;
                }
                CartItem::delete_many()
                    .filter(cart_item::Column::UserId.eq(buyer.id))
                    .exec(&txn)
                    .await?;
                txn.commit().await?;

                info!(order_id = %header.id, order_number = %header.order_number, "COD order settled");
                self.events
                    .send(Event::OrderCreated {
                        order_id: header.id,
                    })
                    .await;
                self.events
                    .send(Event::OrderConfirmed {
                        order_id: header.id,
                    })
                    .await;

                Ok(CreateOrderResponse::Cod {
                    success: true,
                    order_id: header.id,
                    order_number: header.order_number,
                })
            }
            PaymentMethod::Online => {
                let txn = self.db.begin().await?;
                let header = self
                    .orders
                    .create_order(
                        &txn,
                        NewOrder {
                            user_id: buyer.id,
                            status: OrderStatus::Pending,
                            payment_status: PaymentStatus::Pending,
                            payment_method: PaymentMethod::Online.as_str().to_string(),
                            totals,
                            coupon_id,
                            coupon_code,
                            shipping_address_json,
                        },
                        &priced.lines,
                    )
                    .await?;
                txn.commit().await?;
                self.events
                    .send(Event::OrderCreated {
                        order_id: header.id,
                    })
                    .await;

                let amount_minor_units = (totals.total_amount * dec!(100))
                    .round()
                    .to_i64()
                    .ok_or_else(|| {
                        ServiceError::Internal("Order total out of range".to_string())
                    })?;

                let intent = match self
                    .gateway
                    .create_intent(amount_minor_units, &self.currency, &header.order_number)
                    .await
                {
                    Ok(intent) => intent,
                    Err(err) => {
                        // No inventory has moved yet; the order just dies.
                        self.mark_payment_failed(header.id).await?;
                        return Err(err);
                    }
                };

                Order::update_many()
                    .col_expr(
                        order::Column::RazorpayOrderId,
                        Expr::value(intent.gateway_order_id.clone()),
                    )
                    .col_expr(order::Column::UpdatedAt, Expr::value(Utc::now()))
                    .filter(order::Column::Id.eq(header.id))
                    .exec(&*self.db)
                    .await?;

                info!(
                    order_id = %header.id,
                    gateway_order_id = %intent.gateway_order_id,
                    "Online order awaiting payment"
                );

                Ok(CreateOrderResponse::Online {
                    order_id: header.id,
                    order_number: header.order_number,
                    gateway_order_id: intent.gateway_order_id,
                    gateway_key_id: self.gateway.key_id().to_string(),
                    amount_minor_units: intent.amount_minor_units,
                    currency: intent.currency,
                    prefill: Prefill {
                        name: buyer.name.clone(),
                        email: buyer.email.clone(),
                        contact: buyer.phone.clone().unwrap_or_default(),
                    },
                    summary: totals,
                })
            }
        }
    }

    /// Direct client confirmation after the payment widget completes.
    ///
    /// The signature is the sole proof of payment. An invalid one cancels
    /// the order and leaves stock untouched.
    #[instrument(skip(self, buyer, input), fields(user_id = %buyer.id))]
    pub async fn confirm_payment(
        &self,
        buyer: &AuthUser,
        input: VerifyPaymentInput,
    ) -> Result<VerifyPaymentResponse, ServiceError> {
        input.validate().map_err(|_| {
            ServiceError::Validation("Missing payment verification fields".to_string())
        })?;

        let header = Order::find()
            .filter(order::Column::RazorpayOrderId.eq(input.razorpay_order_id.clone()))
            .filter(order::Column::UserId.eq(buyer.id))
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound("Order not found".to_string()))?;

        let valid = payments::verify_payment_signature(
            &input.razorpay_order_id,
            &input.razorpay_payment_id,
            &input.razorpay_signature,
            &self.payment_secret,
        );
        if !valid {
            warn!(order_id = %header.id, "Payment signature verification failed");
            if self.mark_payment_failed(header.id).await? {
                self.events
                    .send(Event::PaymentFailed {
                        order_id: header.id,
                    })
                    .await;
            }
            return Err(ServiceError::SignatureInvalid(
                "Payment signature verification failed".to_string(),
            ));
        }

        self.finalize_captured(
            &header,
            Some(&input.razorpay_payment_id),
            Some(&input.razorpay_signature),
        )
        .await?;

        Ok(VerifyPaymentResponse {
            success: true,
            order_id: header.id,
            order_number: header.order_number,
        })
    }

    /// Applies a signature-verified webhook event.
    ///
    /// The caller (HTTP handler) logs and swallows errors from here: the
    /// gateway retries delivery and there is no caller to answer to.
    #[instrument(skip(self, envelope), fields(event = %envelope.event))]
    pub async fn process_webhook(&self, envelope: &WebhookEnvelope) -> Result<(), ServiceError> {
        let gateway_order_id = payment_entity_field(&envelope.payload, "order_id");

        match envelope.event.as_str() {
            "payment.captured" => {
                let Some(gateway_order_id) = gateway_order_id else {
                    warn!("payment.captured without order_id; ignoring");
                    return Ok(());
                };
                let Some(header) = self.orders.find_by_razorpay_order_id(&gateway_order_id).await?
                else {
                    warn!(%gateway_order_id, "payment.captured for unknown order; ignoring");
                    return Ok(());
                };
                let payment_id = payment_entity_field(&envelope.payload, "id");
                self.finalize_captured(&header, payment_id.as_deref(), None)
                    .await?;
            }
            "payment.failed" => {
                let Some(gateway_order_id) = gateway_order_id else {
                    warn!("payment.failed without order_id; ignoring");
                    return Ok(());
                };
                if let Some(header) =
                    self.orders.find_by_razorpay_order_id(&gateway_order_id).await?
                {
                    let transitioned = self.mark_payment_failed(header.id).await?;
                    if transitioned {
                        self.events
                            .send(Event::PaymentFailed {
                                order_id: header.id,
                            })
                            .await;
                    }
                }
            }
            "refund.processed" => {
                let Some(gateway_order_id) = gateway_order_id else {
                    warn!("refund.processed without order_id; ignoring");
                    return Ok(());
                };
                if let Some(header) =
                    self.orders.find_by_razorpay_order_id(&gateway_order_id).await?
                {
                    let result = Order::update_many()
                        .col_expr(
                            order::Column::PaymentStatus,
                            Expr::value(PaymentStatus::Refunded.as_str()),
                        )
                        .col_expr(order::Column::UpdatedAt, Expr::value(Utc::now()))
                        .filter(order::Column::Id.eq(header.id))
                        .filter(
                            order::Column::PaymentStatus.eq(PaymentStatus::Captured.as_str()),
                        )
                        .exec(&*self.db)
                        .await?;
                    if result.rows_affected > 0 {
                        self.events
                            .send(Event::PaymentRefunded {
                                order_id: header.id,
                            })
                            .await;
                    }
                }
            }
            other => {
                info!(event = other, "Unhandled webhook event type");
            }
        }
        Ok(())
    }

    /// The single terminal-success transition, shared by direct confirmation
    /// and the `payment.captured` webhook.
    ///
    /// Guarded by `payment_status = pending` (conditional update,
    /// rows-affected checked): whichever path arrives second, or a
    /// redelivered webhook, matches zero rows and changes nothing — no
    /// double stock decrement, no duplicate coupon usage, no second
    /// notification.
    async fn finalize_captured(
        &self,
        header: &order::Model,
        payment_id: Option<&str>,
        signature: Option<&str>,
    ) -> Result<bool, ServiceError> {
        let txn = self.db.begin().await?;

        let mut update = Order::update_many()
            .col_expr(
                order::Column::Status,
                Expr::value(OrderStatus::Confirmed.as_str()),
            )
            .col_expr(
                order::Column::PaymentStatus,
                Expr::value(PaymentStatus::Captured.as_str()),
            )
            .col_expr(order::Column::UpdatedAt, Expr::value(Utc::now()));
        if let Some(payment_id) = payment_id {
            update = update.col_expr(
                order::Column::RazorpayPaymentId,
                Expr::value(payment_id.to_string()),
            );
        }
        if let Some(signature) = signature {
            update = update.col_expr(
                order::Column::RazorpaySignature,
                Expr::value(signature.to_string()),
            );
        }
        let result = update
            .filter(order::Column::Id.eq(header.id))
            .filter(order::Column::PaymentStatus.eq(PaymentStatus::Pending.as_str()))
            .exec(&txn)
            .await?;

        if result.rows_affected == 0 {
            txn.rollback().await?;
            info!(order_id = %header.id, "Order already settled; confirmation is a no-op");
            return Ok(false);
        }

        let items = OrderItem::find()
            .filter(order_item::Column::OrderId.eq(header.id))
            .all(&txn)
            .await?;
        for item in &items {
            self.inventory
                .commit(
                    &txn,
                    item.variant_id,
                    item.quantity,
                    header.id,
                    Some(header.user_id),
                )
                .await?;
        }
        if let Some(coupon_id) = header.coupon_id {
            self.coupons
                .redeem(&txn, coupon_id, header.user_id, header.id)
                .await?;
        }
        CartItem::delete_many()
            .filter(cart_item::Column::UserId.eq(header.user_id))
            .exec(&txn)
            .await?;

        txn.commit().await?;

        info!(order_id = %header.id, order_number = %header.order_number, "Payment captured; order settled");
        self.events
            .send(Event::OrderConfirmed {
                order_id: header.id,
            })
            .await;
        Ok(true)
    }

    /// `pending -> cancelled/failed`. Returns whether a transition happened;
    /// an already-settled order is left alone.
    async fn mark_payment_failed(&self, order_id: Uuid) -> Result<bool, ServiceError> {
        let result = Order::update_many()
            .col_expr(
                order::Column::Status,
                Expr::value(OrderStatus::Cancelled.as_str()),
            )
            .col_expr(
                order::Column::PaymentStatus,
                Expr::value(PaymentStatus::Failed.as_str()),
            )
            .col_expr(order::Column::UpdatedAt, Expr::value(Utc::now()))
            .filter(order::Column::Id.eq(order_id))
            .filter(order::Column::PaymentStatus.eq(PaymentStatus::Pending.as_str()))
            .exec(&*self.db)
            .await?;
        Ok(result.rows_affected > 0)
    }
}

/// Pulls a string field out of `payload.payment.entity`.
fn payment_entity_field(payload: &serde_json::Value, field: &str) -> Option<String> {
    payload
        .get("payment")
        .and_then(|p| p.get("entity"))
        .and_then(|e| e.get(field))
        .and_then(|v| v.as_str())
        .map(|s| s.to_string())
}
