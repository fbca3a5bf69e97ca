//! Checkout entry points: order creation and direct payment confirmation.

use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use tracing::instrument;

use crate::auth::AuthUser;
use crate::errors::ServiceError;
use crate::services::settlement::{CreateOrderInput, VerifyPaymentInput};
use crate::AppState;

/// Create an order from the buyer's cart.
///
/// COD orders settle synchronously; online orders return the gateway
/// intent for the client-side payment widget.
#[utoipa::path(
    post,
    path = "/api/v1/checkout/orders",
    request_body = CreateOrderInput,
    responses(
        (status = 201, description = "Order created"),
        (status = 400, description = "Validation, availability or stock failure", body = crate::errors::ErrorResponse),
        (status = 401, description = "Missing or invalid bearer token", body = crate::errors::ErrorResponse),
        (status = 404, description = "Address not found", body = crate::errors::ErrorResponse),
        (status = 502, description = "Payment gateway failure", body = crate::errors::ErrorResponse)
    ),
    tag = "checkout"
)]
#[instrument(skip(state, buyer, input), fields(user_id = %buyer.id))]
pub async fn create_order(
    State(state): State<AppState>,
    buyer: AuthUser,
    Json(input): Json<CreateOrderInput>,
) -> Result<impl IntoResponse, ServiceError> {
    let response = state.settlement.create_order(&buyer, input).await?;
    Ok((StatusCode::CREATED, Json(response)))
}

/// Direct confirmation callback from the payment widget.
#[utoipa::path(
    post,
    path = "/api/v1/checkout/verify-payment",
    request_body = VerifyPaymentInput,
    responses(
        (status = 200, description = "Payment verified and order settled"),
        (status = 400, description = "Missing fields or invalid signature", body = crate::errors::ErrorResponse),
        (status = 401, description = "Missing or invalid bearer token", body = crate::errors::ErrorResponse),
        (status = 404, description = "Order not found", body = crate::errors::ErrorResponse)
    ),
    tag = "checkout"
)]
#[instrument(skip(state, buyer, input), fields(user_id = %buyer.id))]
pub async fn verify_payment(
    State(state): State<AppState>,
    buyer: AuthUser,
    Json(input): Json<VerifyPaymentInput>,
) -> Result<impl IntoResponse, ServiceError> {
    let response = state.settlement.confirm_payment(&buyer, input).await?;
    Ok(Json(response))
}
