//! Gateway webhook receiver.
//!
//! The signature check runs over the raw body before any JSON parsing, so
//! the bytes that are verified are exactly the bytes that were signed.
//! After the signature passes, every failure is acknowledged with 200:
//! the gateway retries non-2xx deliveries and a permanently failing event
//! would be redelivered forever.

use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};
use serde_json::json;
use tracing::{error, instrument, warn};

use crate::errors::{ErrorResponse, ServiceError};
use crate::services::payments;
use crate::services::settlement::WebhookEnvelope;
use crate::AppState;

const SIGNATURE_HEADER: &str = "x-razorpay-signature";

#[utoipa::path(
    post,
    path = "/api/v1/payments/webhook",
    request_body(content = Vec<u8>, content_type = "application/json"),
    responses(
        (status = 200, description = "Event acknowledged"),
        (status = 400, description = "Missing or invalid webhook signature", body = ErrorResponse)
    ),
    tag = "payments"
)]
#[instrument(skip(state, headers, body))]
pub async fn razorpay_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<impl IntoResponse, ServiceError> {
    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|value| value.to_str().ok())
        .ok_or_else(|| {
            ServiceError::SignatureInvalid("Missing webhook signature".to_string())
        })?;

    if !payments::verify_webhook_signature(&body, signature, &state.config.razorpay_webhook_secret)
    {
        warn!("Webhook signature verification failed");
        return Err(ServiceError::SignatureInvalid(
            "Invalid webhook signature".to_string(),
        ));
    }

    // Signature verified: from here on the delivery is acknowledged no
    // matter what, and failures only surface in logs.
    match serde_json::from_slice::<WebhookEnvelope>(&body) {
        Ok(envelope) => {
            if let Err(e) = state.settlement.process_webhook(&envelope).await {
                error!(event = %envelope.event, error = %e, "Webhook processing failed");
            }
        }
        Err(e) => {
            warn!(error = %e, "Webhook body is not a recognizable event envelope");
        }
    }

    Ok((StatusCode::OK, Json(json!({ "received": true }))))
}
