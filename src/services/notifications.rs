//! Outbound notification dispatch.
//!
//! The sink is an external collaborator: settlement guarantees the dispatch
//! is invoked exactly once per confirmed order, not that delivery succeeds.
//! Failures are logged and dropped.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, warn};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    Confirmation,
    Shipped,
    Delivered,
    ReturnUpdate,
}

impl NotificationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationKind::Confirmation => "confirmation",
            NotificationKind::Shipped => "shipped",
            NotificationKind::Delivered => "delivered",
            NotificationKind::ReturnUpdate => "return_update",
        }
    }
}

#[derive(Clone)]
pub struct NotificationService {
    http: reqwest::Client,
    endpoint: Option<String>,
}

impl NotificationService {
    pub fn new(endpoint: Option<String>) -> Self {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(5))
            .build()
            .unwrap_or_default();
        Self { http, endpoint }
    }

    /// Fire-and-forget dispatch of `{order_id, type}` to the sink.
    pub async fn dispatch(&self, order_id: Uuid, kind: NotificationKind) {
        let Some(endpoint) = &self.endpoint else {
            debug!(%order_id, kind = kind.as_str(), "Notification sink not configured; skipping");
            return;
        };
        let result = self
            .http
            .post(endpoint)
            .json(&json!({
                "order_id": order_id,
                "type": kind.as_str(),
            }))
            .send()
            .await;
        match result {
            Ok(response) if response.status().is_success() => {
                debug!(%order_id, kind = kind.as_str(), "Notification dispatched");
            }
            Ok(response) => {
                warn!(%order_id, status = %response.status(), "Notification sink rejected dispatch");
            }
            Err(e) => {
                warn!(%order_id, error = %e, "Notification dispatch failed");
            }
        }
    }
}
