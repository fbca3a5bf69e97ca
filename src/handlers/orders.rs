//! Buyer-facing order reads.

use axum::{
    extract::{Path, State},
    response::IntoResponse,
    Json,
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use tracing::instrument;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::auth::AuthUser;
use crate::entities::{order, order_item};
use crate::errors::ServiceError;
use crate::AppState;

/// Order header as exposed to the buyer. Gateway bookkeeping fields stay
/// server-side.
#[derive(Debug, Serialize, ToSchema)]
pub struct OrderSummary {
    pub id: Uuid,
    pub order_number: String,
    pub status: String,
    pub payment_status: String,
    pub payment_method: String,
    pub subtotal: Decimal,
    pub discount_amount: Decimal,
    pub shipping_cost: Decimal,
    pub tax_amount: Decimal,
    pub total_amount: Decimal,
    pub coupon_code: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl From<order::Model> for OrderSummary {
    fn from(model: order::Model) -> Self {
        Self {
            id: model.id,
            order_number: model.order_number,
            status: model.status,
            payment_status: model.payment_status,
            payment_method: model.payment_method,
            subtotal: model.subtotal,
            discount_amount: model.discount_amount,
            shipping_cost: model.shipping_cost,
            tax_amount: model.tax_amount,
            total_amount: model.total_amount,
            coupon_code: model.coupon_code,
            created_at: model.created_at,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct OrderItemView {
    pub product_name: String,
    pub color_name: String,
    pub size_label: String,
    pub sku: String,
    pub quantity: i32,
    pub unit_price: Decimal,
    pub total_price: Decimal,
}

impl From<order_item::Model> for OrderItemView {
    fn from(model: order_item::Model) -> Self {
        Self {
            product_name: model.product_name,
            color_name: model.color_name,
            size_label: model.size_label,
            sku: model.sku,
            quantity: model.quantity,
            unit_price: model.unit_price,
            total_price: model.total_price,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct OrderDetail {
    #[serde(flatten)]
    pub summary: OrderSummary,
    pub shipping_address: serde_json::Value,
    pub items: Vec<OrderItemView>,
}

#[utoipa::path(
    get,
    path = "/api/v1/orders",
    responses(
        (status = 200, description = "The buyer's orders, newest first", body = [OrderSummary]),
        (status = 401, description = "Missing or invalid bearer token", body = crate::errors::ErrorResponse)
    ),
    tag = "orders"
)]
#[instrument(skip(state, buyer), fields(user_id = %buyer.id))]
pub async fn list_my_orders(
    State(state): State<AppState>,
    buyer: AuthUser,
) -> Result<impl IntoResponse, ServiceError> {
    let orders = state.orders.list_for_user(buyer.id).await?;
    let summaries: Vec<OrderSummary> = orders.into_iter().map(OrderSummary::from).collect();
    Ok(Json(summaries))
}

#[utoipa::path(
    get,
    path = "/api/v1/orders/{id}",
    params(("id" = Uuid, Path, description = "Order id")),
    responses(
        (status = 200, description = "Order with item snapshots", body = OrderDetail),
        (status = 401, description = "Missing or invalid bearer token", body = crate::errors::ErrorResponse),
        (status = 404, description = "Order not found", body = crate::errors::ErrorResponse)
    ),
    tag = "orders"
)]
#[instrument(skip(state, buyer), fields(user_id = %buyer.id, order_id = %order_id))]
pub async fn get_my_order(
    State(state): State<AppState>,
    buyer: AuthUser,
    Path(order_id): Path<Uuid>,
) -> Result<impl IntoResponse, ServiceError> {
    let (header, items) = state.orders.get_for_user(buyer.id, order_id).await?;
    let shipping_address = serde_json::from_str(&header.shipping_address)
        .unwrap_or(serde_json::Value::Null);
    Ok(Json(OrderDetail {
        summary: OrderSummary::from(header),
        shipping_address,
        items: items.into_iter().map(OrderItemView::from).collect(),
    }))
}
