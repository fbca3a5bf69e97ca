//! Order settlement backend for an apparel storefront.
//!
//! The crate is layered the usual way: `entities` (persistence models),
//! `services` (pricing, coupons, inventory, orders, payments, settlement),
//! `handlers` (HTTP surface), with `config`, `db`, `auth`, `errors` and
//! `events` as shared infrastructure.

use std::sync::Arc;

use axum::{
    extract::State,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use sea_orm::DatabaseConnection;
use serde_json::json;
use utoipa::OpenApi;

pub mod auth;
pub mod config;
pub mod db;
pub mod entities;
pub mod errors;
pub mod events;
pub mod handlers;
pub mod services;

use crate::config::AppConfig;
use crate::events::EventSender;
use crate::services::orders::OrderService;
use crate::services::settlement::SettlementService;

/// Shared application state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<DatabaseConnection>,
    pub config: Arc<AppConfig>,
    pub event_sender: EventSender,
    pub settlement: Arc<SettlementService>,
    pub orders: Arc<OrderService>,
}

#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::checkout::create_order,
        handlers::checkout::verify_payment,
        handlers::webhooks::razorpay_webhook,
        handlers::orders::list_my_orders,
        handlers::orders::get_my_order,
    ),
    components(schemas(
        errors::ErrorResponse,
        services::pricing::CartLine,
        services::settlement::CreateOrderInput,
        services::settlement::VerifyPaymentInput,
        services::settlement::CreateOrderResponse,
        services::settlement::VerifyPaymentResponse,
        services::settlement::PaymentMethod,
        services::settlement::Prefill,
        services::orders::OrderTotals,
        handlers::orders::OrderSummary,
        handlers::orders::OrderItemView,
        handlers::orders::OrderDetail,
    )),
    tags(
        (name = "checkout", description = "Order creation and payment confirmation"),
        (name = "payments", description = "Gateway webhook receiver"),
        (name = "orders", description = "Buyer order history")
    )
)]
pub struct ApiDoc;

/// Builds the application router. Middleware layers are applied by the
/// binary so tests can mount this router bare.
pub fn api_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/api/v1/status", get(app_status))
        .route("/api/v1/openapi.json", get(openapi_spec))
        .route("/api/v1/checkout/orders", post(handlers::checkout::create_order))
        .route(
            "/api/v1/checkout/verify-payment",
            post(handlers::checkout::verify_payment),
        )
        .route(
            "/api/v1/payments/webhook",
            post(handlers::webhooks::razorpay_webhook),
        )
        .route("/api/v1/orders", get(handlers::orders::list_my_orders))
        .route("/api/v1/orders/:id", get(handlers::orders::get_my_order))
        .with_state(state)
}

async fn health_check() -> impl IntoResponse {
    Json(json!({ "status": "ok" }))
}

async fn app_status(State(state): State<AppState>) -> impl IntoResponse {
    let db_healthy = state.db.ping().await.is_ok();
    Json(json!({
        "name": env!("CARGO_PKG_NAME"),
        "version": env!("CARGO_PKG_VERSION"),
        "environment": state.config.environment,
        "database": if db_healthy { "up" } else { "down" },
    }))
}

async fn openapi_spec() -> impl IntoResponse {
    Json(ApiDoc::openapi())
}
