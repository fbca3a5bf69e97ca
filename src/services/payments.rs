//! Payment gateway adapter.
//!
//! The gateway client is a trait so handlers and the settlement coordinator
//! work against an injected `Arc<dyn PaymentGateway>` rather than a global
//! singleton. Signature verification is the sole trust boundary for
//! "payment actually happened": the payment signature and the webhook
//! signature are independently keyed HMAC-SHA256 checks.

use std::time::Duration;

use async_trait::async_trait;
use hmac::{Hmac, Mac};
use serde::Deserialize;
use serde_json::json;
use sha2::Sha256;
use tracing::{error, instrument};

use crate::config::AppConfig;
use crate::errors::ServiceError;

type HmacSha256 = Hmac<Sha256>;

/// A created gateway payment intent (Razorpay calls this an "order").
#[derive(Debug, Clone)]
pub struct GatewayIntent {
    pub gateway_order_id: String,
    pub amount_minor_units: i64,
    pub currency: String,
}

#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Creates a payment intent for the given amount in minor units.
    async fn create_intent(
        &self,
        amount_minor_units: i64,
        currency: &str,
        receipt: &str,
    ) -> Result<GatewayIntent, ServiceError>;

    /// Public key id echoed to the client-side payment widget.
    fn key_id(&self) -> &str;
}

/// Production Razorpay client.
pub struct RazorpayGateway {
    http: reqwest::Client,
    base_url: String,
    key_id: String,
    key_secret: String,
}

#[derive(Debug, Deserialize)]
struct RazorpayOrderResponse {
    id: String,
    amount: i64,
    currency: String,
}

impl RazorpayGateway {
    pub fn from_config(cfg: &AppConfig) -> Result<Self, ServiceError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(cfg.gateway_timeout_secs))
            .build()
            .map_err(|e| ServiceError::Internal(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self {
            http,
            base_url: cfg.razorpay_base_url.trim_end_matches('/').to_string(),
            key_id: cfg.razorpay_key_id.clone(),
            key_secret: cfg.razorpay_key_secret.clone(),
        })
    }
}

#[async_trait]
impl PaymentGateway for RazorpayGateway {
    #[instrument(skip(self))]
    async fn create_intent(
        &self,
        amount_minor_units: i64,
        currency: &str,
        receipt: &str,
    ) -> Result<GatewayIntent, ServiceError> {
        let url = format!("{}/v1/orders", self.base_url);
        let response = self
            .http
            .post(&url)
            .basic_auth(&self.key_id, Some(&self.key_secret))
            .json(&json!({
                "amount": amount_minor_units,
                "currency": currency,
                "receipt": receipt,
                "payment_capture": 1,
            }))
            .send()
            .await
            .map_err(|e| ServiceError::Gateway(format!("Request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            error!(%status, %body, "Gateway order creation failed");
            return Err(ServiceError::Gateway(body));
        }

        let order: RazorpayOrderResponse = response
            .json()
            .await
            .map_err(|e| ServiceError::Gateway(format!("Malformed gateway response: {}", e)))?;

        Ok(GatewayIntent {
            gateway_order_id: order.id,
            amount_minor_units: order.amount,
            currency: order.currency,
        })
    }

    fn key_id(&self) -> &str {
        &self.key_id
    }
}

/// Verifies the client-supplied payment signature: HMAC-SHA256 over
/// `"{gateway_order_id}|{payment_id}"` keyed with the API secret.
pub fn verify_payment_signature(
    gateway_order_id: &str,
    payment_id: &str,
    signature: &str,
    secret: &str,
) -> bool {
    let payload = format!("{}|{}", gateway_order_id, payment_id);
    expected_hex(payload.as_bytes(), secret)
        .map(|expected| constant_time_eq(&expected, signature))
        .unwrap_or(false)
}

/// Verifies a webhook delivery: HMAC-SHA256 over the raw request body keyed
/// with the webhook secret (independent of the payment signature key).
pub fn verify_webhook_signature(body: &[u8], signature: &str, webhook_secret: &str) -> bool {
    expected_hex(body, webhook_secret)
        .map(|expected| constant_time_eq(&expected, signature))
        .unwrap_or(false)
}

fn expected_hex(payload: &[u8], secret: &str) -> Option<String> {
    if secret.is_empty() {
        return None;
    }
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).ok()?;
    mac.update(payload);
    Some(hex::encode(mac.finalize().into_bytes()))
}

fn constant_time_eq(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut res = 0u8;
    for (x, y) in a.as_bytes().iter().zip(b.as_bytes()) {
        res |= x ^ y;
    }
    res == 0
}
