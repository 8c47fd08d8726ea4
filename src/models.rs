// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Custodia Project

//! Core domain records: wallets and transactions.
//!
//! ## Security
//!
//! - [`WalletRecord`] carries only the *encrypted* key blob; no plaintext
//!   key field exists on any persisted type.
//! - [`WalletSummary`] is the only wallet shape that leaves the crate's
//!   public API, and it has no key field at all.
//! - [`TransactionRecord`] enforces the lifecycle at the type level: a
//!   record moves exactly once from `Pending` to `Submitted` or `Failed`,
//!   and any further transition is an error.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::custody::EncryptedSecret;
use crate::store::StoreError;

/// Persisted wallet record, keyed by checksummed address.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WalletRecord {
    /// Opaque wallet identifier (UUID), generated at creation.
    pub id: String,
    /// EIP-55 checksummed address, derived from the key material at
    /// creation time. Unique and immutable for the wallet's lifetime.
    pub address: String,
    /// Encrypted private key plus the nonce used to produce it.
    pub key: EncryptedSecret,
    /// Optional human-readable label. The only mutable field.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    /// When the wallet was created.
    pub created_at: DateTime<Utc>,
}

/// Public wallet projection returned to callers. Never includes key material.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WalletSummary {
    pub id: String,
    pub address: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl From<&WalletRecord> for WalletSummary {
    fn from(record: &WalletRecord) -> Self {
        Self {
            id: record.id.clone(),
            address: record.address.clone(),
            label: record.label.clone(),
            created_at: record.created_at,
        }
    }
}

/// Transaction lifecycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TxStatus {
    /// Committed: the pipeline has decided to attempt the action.
    Pending,
    /// Broadcast accepted by the node; hash recorded. Terminal.
    Submitted,
    /// Any error after commit; hash absent. Terminal.
    Failed,
}

impl std::fmt::Display for TxStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TxStatus::Pending => write!(f, "PENDING"),
            TxStatus::Submitted => write!(f, "SUBMITTED"),
            TxStatus::Failed => write!(f, "FAILED"),
        }
    }
}

/// Persisted transaction record.
///
/// Created and terminated solely by the transaction pipeline; read by
/// audit and reporting collaborators.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransactionRecord {
    /// Opaque transaction identifier (UUID).
    pub id: String,
    /// Originating wallet address.
    pub from: String,
    /// Destination address (recipient, or contract under interaction).
    pub to: String,
    /// Value in chain-native units, as a decimal string.
    pub value: String,
    /// Chain identifier the action targets.
    pub chain_id: u64,
    /// On-chain hash; absent until broadcast succeeds.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hash: Option<String>,
    /// Current lifecycle status.
    pub status: TxStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TransactionRecord {
    /// Create a new record in `Pending` status.
    pub fn new_pending(
        from: impl Into<String>,
        to: impl Into<String>,
        value: impl Into<String>,
        chain_id: u64,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            from: from.into(),
            to: to.into(),
            value: value.into(),
            chain_id,
            hash: None,
            status: TxStatus::Pending,
            created_at: now,
            updated_at: now,
        }
    }

    fn guard_pending(&self) -> Result<(), StoreError> {
        if self.status != TxStatus::Pending {
            return Err(StoreError::InvalidTransition {
                id: self.id.clone(),
                status: self.status.to_string(),
            });
        }
        Ok(())
    }

    /// Transition `Pending -> Submitted`, recording the broadcast hash.
    pub fn mark_submitted(&mut self, hash: &str) -> Result<(), StoreError> {
        self.guard_pending()?;
        self.status = TxStatus::Submitted;
        self.hash = Some(hash.to_string());
        self.updated_at = Utc::now();
        Ok(())
    }

    /// Transition `Pending -> Failed`. The hash stays absent.
    pub fn mark_failed(&mut self) -> Result<(), StoreError> {
        self.guard_pending()?;
        self.status = TxStatus::Failed;
        self.updated_at = Utc::now();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record() -> TransactionRecord {
        TransactionRecord::new_pending("0xfrom", "0xto", "1.5", 11155111)
    }

    #[test]
    fn new_record_is_pending_without_hash() {
        let tx = record();
        assert_eq!(tx.status, TxStatus::Pending);
        assert!(tx.hash.is_none());
    }

    #[test]
    fn submitted_records_hash() {
        let mut tx = record();
        tx.mark_submitted("0xdeadbeef").unwrap();
        assert_eq!(tx.status, TxStatus::Submitted);
        assert_eq!(tx.hash.as_deref(), Some("0xdeadbeef"));
    }

    #[test]
    fn failed_keeps_hash_absent() {
        let mut tx = record();
        tx.mark_failed().unwrap();
        assert_eq!(tx.status, TxStatus::Failed);
        assert!(tx.hash.is_none());
    }

    #[test]
    fn terminal_states_are_immutable() {
        let mut tx = record();
        tx.mark_submitted("0xabc").unwrap();

        let err = tx.mark_failed().unwrap_err();
        assert!(matches!(err, StoreError::InvalidTransition { .. }));

        let mut tx = record();
        tx.mark_failed().unwrap();
        assert!(tx.mark_submitted("0xabc").is_err());
        // A second failure write is also rejected.
        assert!(tx.mark_failed().is_err());
    }

    #[test]
    fn status_serializes_in_wire_format() {
        assert_eq!(
            serde_json::to_string(&TxStatus::Pending).unwrap(),
            r#""PENDING""#
        );
        assert_eq!(
            serde_json::to_string(&TxStatus::Submitted).unwrap(),
            r#""SUBMITTED""#
        );
        assert_eq!(
            serde_json::to_string(&TxStatus::Failed).unwrap(),
            r#""FAILED""#
        );
    }

    #[test]
    fn summary_has_no_key_material() {
        // Type-level guarantee; assert the serialized form as well.
        let record = WalletRecord {
            id: "w1".to_string(),
            address: "0xabc".to_string(),
            key: EncryptedSecret {
                ciphertext: "00".to_string(),
                nonce: "00".to_string(),
            },
            label: Some("ops".to_string()),
            created_at: Utc::now(),
        };
        let summary = WalletSummary::from(&record);
        let json = serde_json::to_string(&summary).unwrap();
        assert!(!json.contains("ciphertext"));
        assert!(!json.contains("nonce"));
        assert!(json.contains("0xabc"));
    }
}
