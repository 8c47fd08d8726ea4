// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Custodia Project

//! Lifecycle event dispatch to subscribers.
//!
//! Dispatch is best-effort relative to the primary operation: a subscriber
//! that is down must never fail the action that triggered the event.
//! Delivery retry semantics live outside this crate.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;

use crate::models::TransactionRecord;
use crate::policy::PolicyViolation;

/// Event name for an accepted broadcast.
pub const TRANSACTION_SUBMITTED: &str = "transaction.submitted";
/// Event name for a policy-rejected action.
pub const TRANSACTION_REJECTED: &str = "transaction.rejected";

/// Per-request timeout for webhook delivery.
const DELIVERY_TIMEOUT: Duration = Duration::from_secs(5);

type HmacSha256 = Hmac<Sha256>;

/// A lifecycle event as delivered to subscribers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LifecycleEvent {
    pub id: String,
    pub event: String,
    pub payload: serde_json::Value,
    pub timestamp: DateTime<Utc>,
}

impl LifecycleEvent {
    pub fn new(event: impl Into<String>, payload: serde_json::Value) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            event: event.into(),
            payload,
            timestamp: Utc::now(),
        }
    }

    pub fn transaction_submitted(tx: &TransactionRecord) -> Self {
        Self::new(
            TRANSACTION_SUBMITTED,
            serde_json::json!({
                "transactionId": tx.id,
                "hash": tx.hash,
                "from": tx.from,
                "to": tx.to,
                "value": tx.value,
            }),
        )
    }

    pub fn transaction_rejected(wallet_address: &str, violation: &PolicyViolation) -> Self {
        Self::new(
            TRANSACTION_REJECTED,
            serde_json::json!({
                "wallet": wallet_address,
                "reason": violation.reason,
            }),
        )
    }
}

/// Notifies subscribers of lifecycle events. Infallible from the caller's
/// perspective; implementations absorb and log delivery failures.
#[async_trait]
pub trait EventDispatcher: Send + Sync {
    async fn dispatch(&self, event: LifecycleEvent);
}

/// A webhook subscription.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookEndpoint {
    pub url: String,
    /// Event names this endpoint subscribes to.
    pub events: Vec<String>,
    /// Shared secret for payload signing, if configured.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub secret: Option<String>,
}

/// Best-effort HTTP webhook dispatcher.
pub struct WebhookDispatcher {
    endpoints: Vec<WebhookEndpoint>,
    http: reqwest::Client,
}

impl WebhookDispatcher {
    pub fn new(endpoints: Vec<WebhookEndpoint>) -> Self {
        let http = reqwest::Client::builder()
            .timeout(DELIVERY_TIMEOUT)
            .build()
            .unwrap_or_default();
        Self { endpoints, http }
    }

    /// HMAC-SHA256 signature over the serialized event body.
    fn signature(secret: &str, body: &str) -> String {
        let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
            .expect("HMAC accepts keys of any length");
        mac.update(body.as_bytes());
        alloy::hex::encode(mac.finalize().into_bytes())
    }

    async fn deliver(&self, endpoint: &WebhookEndpoint, body: &str) {
        let mut request = self
            .http
            .post(&endpoint.url)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .body(body.to_string());

        if let Some(secret) = &endpoint.secret {
            request = request.header("X-Webhook-Signature", Self::signature(secret, body));
        }

        match request.send().await {
            Ok(response) if !response.status().is_success() => {
                tracing::warn!(url = %endpoint.url, status = %response.status(),
                    "webhook delivery rejected by subscriber");
            }
            Ok(_) => {}
            Err(e) => {
                tracing::warn!(url = %endpoint.url, error = %e, "webhook delivery failed");
            }
        }
    }
}

#[async_trait]
impl EventDispatcher for WebhookDispatcher {
    async fn dispatch(&self, event: LifecycleEvent) {
        let body = match serde_json::to_string(&event) {
            Ok(body) => body,
            Err(e) => {
                tracing::error!(error = %e, "failed to serialize lifecycle event");
                return;
            }
        };

        for endpoint in &self.endpoints {
            if !endpoint.events.iter().any(|name| name == &event.event) {
                continue;
            }
            self.deliver(endpoint, &body).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signature_is_stable_hmac_sha256() {
        let sig = WebhookDispatcher::signature("secret", r#"{"a":1}"#);
        assert_eq!(sig.len(), 64);
        assert_eq!(sig, WebhookDispatcher::signature("secret", r#"{"a":1}"#));
        assert_ne!(sig, WebhookDispatcher::signature("other", r#"{"a":1}"#));
        assert_ne!(sig, WebhookDispatcher::signature("secret", r#"{"a":2}"#));
    }

    #[test]
    fn submitted_event_carries_transaction_fields() {
        let mut tx = TransactionRecord::new_pending("0xfrom", "0xto", "1.5", 11155111);
        tx.mark_submitted("0xhash").unwrap();

        let event = LifecycleEvent::transaction_submitted(&tx);
        assert_eq!(event.event, TRANSACTION_SUBMITTED);
        assert_eq!(event.payload["hash"], "0xhash");
        assert_eq!(event.payload["value"], "1.5");
    }

    #[test]
    fn rejected_event_carries_reason() {
        let violation = PolicyViolation {
            kind: crate::policy::PolicyKind::TransactionLimit,
            reason: "transaction amount 2 exceeds limit of 1".to_string(),
        };
        let event = LifecycleEvent::transaction_rejected("0xwallet", &violation);
        assert_eq!(event.event, TRANSACTION_REJECTED);
        assert!(event.payload["reason"]
            .as_str()
            .unwrap()
            .contains("exceeds limit"));
    }

    #[tokio::test]
    async fn dispatch_skips_unsubscribed_endpoints() {
        // An endpoint subscribed to nothing relevant: dispatch must
        // return without attempting delivery (no server is listening on
        // this port, so an attempted delivery would log, not panic).
        let dispatcher = WebhookDispatcher::new(vec![WebhookEndpoint {
            url: "http://127.0.0.1:1/hook".to_string(),
            events: vec!["something.else".to_string()],
            secret: None,
        }]);

        let event = LifecycleEvent::new(TRANSACTION_SUBMITTED, serde_json::json!({}));
        dispatcher.dispatch(event).await;
    }
}
