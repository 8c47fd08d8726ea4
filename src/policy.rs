// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Custodia Project

//! Organizational risk policy: rule model and evaluation engine.
//!
//! Every enabled rule applicable to an action must pass (logical AND); the
//! first violated rule short-circuits evaluation. A violation is an
//! expected, structured rejection, not a fault. A rule whose configuration
//! cannot be parsed is logged and skipped as unevaluable; bad data quality
//! in one rule must not block the request or the other rules.

use alloy::primitives::utils::parse_ether;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::store::{PolicyStore, StoreError};

/// Policy rule kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PolicyKind {
    /// Cap on the native-currency amount of a single action.
    TransactionLimit,
    /// Closed set of allowed destination addresses.
    Whitelist,
}

/// Whether a rule applies to every wallet or one specific wallet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PolicyScope {
    Global,
    Wallet,
}

/// A stored policy rule.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Policy {
    pub id: String,
    pub kind: PolicyKind,
    pub scope: PolicyScope,
    /// Scoping wallet id; required iff scope is [`PolicyScope::Wallet`].
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entity_id: Option<String>,
    /// Kind-specific configuration payload:
    /// `{"maxAmount": "10"}` or `{"addresses": ["0x..."]}`.
    pub config: serde_json::Value,
    pub enabled: bool,
    pub created_at: DateTime<Utc>,
}

impl Policy {
    pub fn new(
        kind: PolicyKind,
        scope: PolicyScope,
        entity_id: Option<String>,
        config: serde_json::Value,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            kind,
            scope,
            entity_id,
            config,
            enabled: true,
            created_at: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LimitConfig {
    max_amount: String,
}

#[derive(Debug, Clone, Deserialize)]
struct WhitelistConfig {
    addresses: Vec<String>,
}

/// Structured rejection carrying the violated rule and a human-readable
/// reason.
#[derive(Debug, Clone, Serialize, Deserialize, thiserror::Error)]
#[error("policy violation: {reason}")]
pub struct PolicyViolation {
    pub kind: PolicyKind,
    pub reason: String,
}

/// Wire shape of a rejection, per the external contract.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RejectionPayload {
    pub policy_status: &'static str,
    pub policy_error: String,
}

impl PolicyViolation {
    pub fn rejection_payload(&self) -> RejectionPayload {
        RejectionPayload {
            policy_status: "REJECTED",
            policy_error: self.reason.clone(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum PolicyError {
    /// Expected structured rejection.
    #[error(transparent)]
    Violation(#[from] PolicyViolation),
    /// Policy read failed; fatal for the invocation.
    #[error("policy store read failed: {0}")]
    Store(#[from] StoreError),
}

/// The action attributes a rule can judge. Absent attributes cause the
/// corresponding rules to skip themselves (cannot judge, does not block).
#[derive(Debug, Clone, Default)]
pub struct ActionContext {
    /// Native-currency amount as a decimal string.
    pub amount: Option<String>,
    /// Destination address.
    pub destination: Option<String>,
    /// Originating wallet id, for wallet-scoped rule lookup.
    pub wallet_id: Option<String>,
}

/// Evaluates a proposed action against all enabled applicable rules.
///
/// Also independently invocable for dry-run/simulation use.
pub struct PolicyEngine {
    store: Arc<dyn PolicyStore>,
}

impl PolicyEngine {
    pub fn new(store: Arc<dyn PolicyStore>) -> Self {
        Self { store }
    }

    /// Evaluate the context against enabled global rules plus enabled
    /// rules scoped to the context's wallet. Global rules are checked
    /// first, then wallet rules, each set in store order; the first
    /// violation aborts.
    pub async fn evaluate(&self, ctx: &ActionContext) -> Result<(), PolicyError> {
        let mut policies = self.store.enabled_global().await?;
        if let Some(wallet_id) = &ctx.wallet_id {
            policies.extend(self.store.enabled_for_wallet(wallet_id).await?);
        }

        for policy in &policies {
            match policy.kind {
                PolicyKind::TransactionLimit => {
                    check_transaction_limit(policy, ctx.amount.as_deref())?
                }
                PolicyKind::Whitelist => check_whitelist(policy, ctx.destination.as_deref())?,
            }
        }

        Ok(())
    }
}

fn check_transaction_limit(policy: &Policy, amount: Option<&str>) -> Result<(), PolicyViolation> {
    let Some(amount) = amount else {
        // Cannot judge without an amount.
        return Ok(());
    };

    let config: LimitConfig = match serde_json::from_value(policy.config.clone()) {
        Ok(config) => config,
        Err(e) => {
            tracing::warn!(policy_id = %policy.id, error = %e,
                "skipping transaction limit rule with malformed config");
            return Ok(());
        }
    };

    let limit = match parse_ether(&config.max_amount) {
        Ok(limit) => limit,
        Err(e) => {
            tracing::warn!(policy_id = %policy.id, error = %e,
                "skipping transaction limit rule with unparsable maxAmount");
            return Ok(());
        }
    };

    let value = match parse_ether(amount) {
        Ok(value) => value,
        Err(e) => {
            tracing::warn!(policy_id = %policy.id, error = %e,
                "invalid amount format for policy check");
            return Ok(());
        }
    };

    // Compared in wei; the boundary is inclusive.
    if value > limit {
        return Err(PolicyViolation {
            kind: PolicyKind::TransactionLimit,
            reason: format!(
                "transaction amount {amount} exceeds limit of {}",
                config.max_amount
            ),
        });
    }

    Ok(())
}

fn check_whitelist(policy: &Policy, destination: Option<&str>) -> Result<(), PolicyViolation> {
    let Some(destination) = destination else {
        return Ok(());
    };

    let config: WhitelistConfig = match serde_json::from_value(policy.config.clone()) {
        Ok(config) => config,
        Err(e) => {
            tracing::warn!(policy_id = %policy.id, error = %e,
                "skipping whitelist rule with malformed config");
            return Ok(());
        }
    };

    let normalized = destination.to_lowercase();
    let allowed = config
        .addresses
        .iter()
        .any(|addr| addr.to_lowercase() == normalized);

    if !allowed {
        return Err(PolicyViolation {
            kind: PolicyKind::Whitelist,
            reason: format!("recipient {destination} is not in the whitelist"),
        });
    }

    Ok(())
}
