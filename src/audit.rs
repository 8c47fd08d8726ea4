// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Custodia Project

//! Audit logging for custody operations.
//!
//! One record per pipeline invocation is the compliance record of record:
//! it is attempted even when the triggering action failed, and a sink
//! failure is logged locally (including the serialized record) but never
//! propagated as a failure of the underlying action.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::store::{FileStore, StoreResult};

/// Auditable action kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuditAction {
    WalletCreate,
    WalletImport,
    TransactionSend,
    Erc20Transfer,
    ContractCall,
    MessageSign,
}

/// Entity class the record is about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AuditEntity {
    Wallet,
    Transaction,
}

/// Final outcome of the audited invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuditOutcome {
    Success,
    Failure,
    /// Policy rejected the action before it was committed.
    Rejected,
}

/// An audit record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditRecord {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    pub action: AuditAction,
    pub entity: AuditEntity,
    pub entity_id: String,
    /// Actor identifier (API key prefix, operator id).
    pub actor: String,
    pub outcome: AuditOutcome,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl AuditRecord {
    /// Create a new success record.
    pub fn new(
        action: AuditAction,
        entity: AuditEntity,
        entity_id: impl Into<String>,
        actor: impl Into<String>,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            action,
            entity,
            entity_id: entity_id.into(),
            actor: actor.into(),
            outcome: AuditOutcome::Success,
            metadata: None,
            error: None,
        }
    }

    /// Attach metadata.
    pub fn with_metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = Some(metadata);
        self
    }

    /// Mark as failed with the underlying error message.
    pub fn failed(mut self, error: impl Into<String>) -> Self {
        self.outcome = AuditOutcome::Failure;
        self.error = Some(error.into());
        self
    }

    /// Mark as policy-rejected with the violation reason.
    pub fn rejected(mut self, reason: impl Into<String>) -> Self {
        self.outcome = AuditOutcome::Rejected;
        self.error = Some(reason.into());
        self
    }
}

/// Destination for audit records. Durability and querying semantics
/// belong to the implementation, not the pipeline.
#[async_trait]
pub trait AuditSink: Send + Sync {
    async fn record(&self, record: &AuditRecord) -> StoreResult<()>;
}

/// Appends records to a daily JSONL file.
pub struct JsonlAuditSink {
    store: Arc<FileStore>,
}

impl JsonlAuditSink {
    pub fn new(store: Arc<FileStore>) -> Self {
        Self { store }
    }

    /// Read back all records for a date (`YYYY-MM-DD`).
    pub fn read_records(&self, date: &str) -> StoreResult<Vec<AuditRecord>> {
        let path = self.store.paths().audit_events_file(date);
        let mut records = Vec::new();
        for line in self.store.read_lines(path)? {
            records.push(serde_json::from_str(&line)?);
        }
        Ok(records)
    }
}

#[async_trait]
impl AuditSink for JsonlAuditSink {
    async fn record(&self, record: &AuditRecord) -> StoreResult<()> {
        let date = record.timestamp.format("%Y-%m-%d").to_string();
        let path = self.store.paths().audit_events_file(&date);
        let line = serde_json::to_string(record)?;
        self.store.append_line(path, &line)
    }
}
