// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Custodia Project

//! # Persistence Module
//!
//! Narrow, independently mockable store traits for the pipeline's three
//! persisted entities, plus file-backed default implementations.
//!
//! ## Storage Layout (file-backed)
//!
//! ```text
//! {DATA_DIR}/
//!   wallets/{address}.json       # Wallet record (encrypted key inline)
//!   transactions/{id}.json       # Transaction record, append-mostly
//!   policies/{id}.json           # Policy record
//!   audit/{date}/events.jsonl    # Daily audit logs
//! ```
//!
//! Writes go through a temp-file-plus-rename so a crash never leaves a
//! half-written record behind.

pub mod file;
pub mod paths;

pub use file::{FilePolicyStore, FileStore, FileTransactionStore, FileWalletStore};
pub use paths::StorePaths;

use async_trait::async_trait;

use crate::models::{TransactionRecord, WalletRecord};
use crate::policy::Policy;

/// Error type for store operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("already exists: {0}")]
    AlreadyExists(String),

    /// A terminal transaction record was asked to move again.
    #[error("invalid status transition: transaction {id} is already {status}")]
    InvalidTransition { id: String, status: String },

    #[error("store not initialized")]
    NotInitialized,
}

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Wallet persistence, keyed by checksummed address.
#[async_trait]
pub trait WalletStore: Send + Sync {
    /// Insert a new wallet. Fails with [`StoreError::AlreadyExists`] if a
    /// record with the same address is present.
    async fn insert(&self, record: WalletRecord) -> StoreResult<()>;

    async fn find_by_address(&self, address: &str) -> StoreResult<Option<WalletRecord>>;

    async fn find_by_id(&self, id: &str) -> StoreResult<Option<WalletRecord>>;

    async fn list(&self) -> StoreResult<Vec<WalletRecord>>;

    /// Update the label, the only mutable wallet field.
    async fn update_label(&self, address: &str, label: Option<String>) -> StoreResult<()>;
}

/// Transaction persistence. Append-mostly: a record is inserted once in
/// `Pending` and updated exactly once to a terminal status.
#[async_trait]
pub trait TransactionStore: Send + Sync {
    async fn insert(&self, record: TransactionRecord) -> StoreResult<()>;

    async fn get(&self, id: &str) -> StoreResult<Option<TransactionRecord>>;

    /// Transition `Pending -> Submitted` and return the updated record.
    async fn mark_submitted(&self, id: &str, hash: &str) -> StoreResult<TransactionRecord>;

    /// Transition `Pending -> Failed` and return the updated record.
    async fn mark_failed(&self, id: &str) -> StoreResult<TransactionRecord>;

    async fn list_by_wallet(&self, address: &str) -> StoreResult<Vec<TransactionRecord>>;
}

/// Policy persistence. Administrative writes happen outside the pipeline;
/// the pipeline only reads enabled rules.
#[async_trait]
pub trait PolicyStore: Send + Sync {
    async fn insert(&self, policy: Policy) -> StoreResult<()>;

    async fn delete(&self, id: &str) -> StoreResult<()>;

    async fn list(&self) -> StoreResult<Vec<Policy>>;

    /// All enabled globally-scoped policies, in deterministic order.
    async fn enabled_global(&self) -> StoreResult<Vec<Policy>>;

    /// All enabled wallet-scoped policies for the given wallet id, in
    /// deterministic order.
    async fn enabled_for_wallet(&self, wallet_id: &str) -> StoreResult<Vec<Policy>>;
}
