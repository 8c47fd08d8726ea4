// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Custodia Project

//! File-backed store implementations.
//!
//! One JSON document per entity, written atomically via temp-file-plus-
//! rename. Listing skips unreadable documents with a warning rather than
//! failing the whole read; a single corrupt record must not take the
//! collection down with it.

use std::fs::{self, File, OpenOptions};
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{de::DeserializeOwned, Serialize};

use super::{
    PolicyStore, StoreError, StorePaths, StoreResult, TransactionStore, WalletStore,
};
use crate::models::{TransactionRecord, WalletRecord};
use crate::policy::{Policy, PolicyScope};

/// Low-level JSON document store over a directory tree.
#[derive(Debug, Clone)]
pub struct FileStore {
    paths: StorePaths,
    initialized: bool,
}

impl FileStore {
    /// Create a new FileStore. Does NOT create the directory structure;
    /// call [`FileStore::initialize`] first.
    pub fn new(paths: StorePaths) -> Self {
        Self {
            paths,
            initialized: false,
        }
    }

    /// Get the storage paths.
    pub fn paths(&self) -> &StorePaths {
        &self.paths
    }

    /// Create all required directories. Idempotent.
    pub fn initialize(&mut self) -> StoreResult<()> {
        let dirs = [
            self.paths.wallets_dir(),
            self.paths.transactions_dir(),
            self.paths.policies_dir(),
            self.paths.audit_dir(),
        ];
        for dir in dirs {
            fs::create_dir_all(&dir)?;
        }
        self.initialized = true;
        Ok(())
    }

    fn guard(&self) -> StoreResult<()> {
        if !self.initialized {
            return Err(StoreError::NotInitialized);
        }
        Ok(())
    }

    /// Read a JSON document.
    pub fn read_json<T: DeserializeOwned>(&self, path: impl AsRef<Path>) -> StoreResult<T> {
        self.guard()?;
        let file = File::open(path.as_ref())?;
        let reader = BufReader::new(file);
        Ok(serde_json::from_reader(reader)?)
    }

    /// Write a JSON document atomically (temp file + rename).
    pub fn write_json<T: Serialize>(&self, path: impl AsRef<Path>, value: &T) -> StoreResult<()> {
        self.guard()?;
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let temp_path = path.with_extension("tmp");
        {
            let file = File::create(&temp_path)?;
            let mut writer = BufWriter::new(file);
            serde_json::to_writer_pretty(&mut writer, value)?;
            writer.flush()?;
        }
        fs::rename(&temp_path, path)?;
        Ok(())
    }

    /// Check if a document exists.
    pub fn exists(&self, path: impl AsRef<Path>) -> bool {
        path.as_ref().is_file()
    }

    /// Delete a document.
    pub fn delete(&self, path: impl AsRef<Path>) -> StoreResult<()> {
        self.guard()?;
        fs::remove_file(path.as_ref())?;
        Ok(())
    }

    /// List document stems (filenames without extension) in a directory.
    pub fn list_files(&self, dir: impl AsRef<Path>, extension: &str) -> StoreResult<Vec<String>> {
        self.guard()?;
        let dir = dir.as_ref();
        if !dir.exists() {
            return Ok(Vec::new());
        }

        let mut ids = Vec::new();
        for entry in fs::read_dir(dir)? {
            let entry = entry?;
            let path = entry.path();
            if !path.is_file() {
                continue;
            }
            if path.extension().and_then(|e| e.to_str()) != Some(extension) {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                ids.push(stem.to_string());
            }
        }
        ids.sort();
        Ok(ids)
    }

    /// Append a line to a JSONL file, creating parents as needed.
    pub fn append_line(&self, path: impl AsRef<Path>, line: &str) -> StoreResult<()> {
        self.guard()?;
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let mut file = OpenOptions::new().create(true).append(true).open(path)?;
        file.write_all(line.as_bytes())?;
        file.write_all(b"\n")?;
        file.flush()?;
        Ok(())
    }

    /// Read all lines of a JSONL file.
    pub fn read_lines(&self, path: impl AsRef<Path>) -> StoreResult<Vec<String>> {
        self.guard()?;
        let content = fs::read_to_string(path.as_ref())?;
        Ok(content
            .lines()
            .filter(|l| !l.trim().is_empty())
            .map(str::to_string)
            .collect())
    }

    /// Read every document in a directory, skipping unreadable ones.
    fn read_all<T: DeserializeOwned>(
        &self,
        dir: impl AsRef<Path>,
        extension: &str,
    ) -> StoreResult<Vec<T>> {
        let dir = dir.as_ref();
        let mut out = Vec::new();
        for stem in self.list_files(dir, extension)? {
            let path = dir.join(format!("{stem}.{extension}"));
            match self.read_json::<T>(&path) {
                Ok(value) => out.push(value),
                Err(e) => {
                    tracing::warn!(document = %stem, error = %e, "skipping unreadable record");
                }
            }
        }
        Ok(out)
    }
}

/// File-backed wallet store.
pub struct FileWalletStore {
    store: Arc<FileStore>,
}

impl FileWalletStore {
    pub fn new(store: Arc<FileStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl WalletStore for FileWalletStore {
    async fn insert(&self, record: WalletRecord) -> StoreResult<()> {
        let path = self.store.paths().wallet(&record.address);
        if self.store.exists(&path) {
            return Err(StoreError::AlreadyExists(format!(
                "wallet {}",
                record.address
            )));
        }
        self.store.write_json(path, &record)
    }

    async fn find_by_address(&self, address: &str) -> StoreResult<Option<WalletRecord>> {
        let path = self.store.paths().wallet(address);
        if !self.store.exists(&path) {
            return Ok(None);
        }
        Ok(Some(self.store.read_json(path)?))
    }

    async fn find_by_id(&self, id: &str) -> StoreResult<Option<WalletRecord>> {
        let all: Vec<WalletRecord> = self
            .store
            .read_all(self.store.paths().wallets_dir(), "json")?;
        Ok(all.into_iter().find(|w| w.id == id))
    }

    async fn list(&self) -> StoreResult<Vec<WalletRecord>> {
        let mut all: Vec<WalletRecord> = self
            .store
            .read_all(self.store.paths().wallets_dir(), "json")?;
        all.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(all)
    }

    async fn update_label(&self, address: &str, label: Option<String>) -> StoreResult<()> {
        let path = self.store.paths().wallet(address);
        if !self.store.exists(&path) {
            return Err(StoreError::NotFound(format!("wallet {address}")));
        }
        let mut record: WalletRecord = self.store.read_json(&path)?;
        record.label = label;
        self.store.write_json(path, &record)
    }
}

/// File-backed transaction store.
pub struct FileTransactionStore {
    store: Arc<FileStore>,
}

impl FileTransactionStore {
    pub fn new(store: Arc<FileStore>) -> Self {
        Self { store }
    }

    fn load(&self, id: &str) -> StoreResult<TransactionRecord> {
        let path = self.store.paths().transaction(id);
        if !self.store.exists(&path) {
            return Err(StoreError::NotFound(format!("transaction {id}")));
        }
        self.store.read_json(path)
    }
}

#[async_trait]
impl TransactionStore for FileTransactionStore {
    async fn insert(&self, record: TransactionRecord) -> StoreResult<()> {
        let path = self.store.paths().transaction(&record.id);
        if self.store.exists(&path) {
            return Err(StoreError::AlreadyExists(format!(
                "transaction {}",
                record.id
            )));
        }
        self.store.write_json(path, &record)
    }

    async fn get(&self, id: &str) -> StoreResult<Option<TransactionRecord>> {
        let path = self.store.paths().transaction(id);
        if !self.store.exists(&path) {
            return Ok(None);
        }
        Ok(Some(self.store.read_json(path)?))
    }

    async fn mark_submitted(&self, id: &str, hash: &str) -> StoreResult<TransactionRecord> {
        let mut record = self.load(id)?;
        record.mark_submitted(hash)?;
        self.store
            .write_json(self.store.paths().transaction(id), &record)?;
        Ok(record)
    }

    async fn mark_failed(&self, id: &str) -> StoreResult<TransactionRecord> {
        let mut record = self.load(id)?;
        record.mark_failed()?;
        self.store
            .write_json(self.store.paths().transaction(id), &record)?;
        Ok(record)
    }

    async fn list_by_wallet(&self, address: &str) -> StoreResult<Vec<TransactionRecord>> {
        let mut all: Vec<TransactionRecord> = self
            .store
            .read_all(self.store.paths().transactions_dir(), "json")?;
        all.retain(|tx| tx.from.eq_ignore_ascii_case(address));
        // Newest first.
        all.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(all)
    }
}

/// File-backed policy store.
pub struct FilePolicyStore {
    store: Arc<FileStore>,
}

impl FilePolicyStore {
    pub fn new(store: Arc<FileStore>) -> Self {
        Self { store }
    }

    fn load_enabled(&self) -> StoreResult<Vec<Policy>> {
        let mut all: Vec<Policy> = self
            .store
            .read_all(self.store.paths().policies_dir(), "json")?;
        all.retain(|p| p.enabled);
        // Deterministic-per-call evaluation order.
        all.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        Ok(all)
    }
}

#[async_trait]
impl PolicyStore for FilePolicyStore {
    async fn insert(&self, policy: Policy) -> StoreResult<()> {
        let path = self.store.paths().policy(&policy.id);
        if self.store.exists(&path) {
            return Err(StoreError::AlreadyExists(format!("policy {}", policy.id)));
        }
        self.store.write_json(path, &policy)
    }

    async fn delete(&self, id: &str) -> StoreResult<()> {
        let path = self.store.paths().policy(id);
        if !self.store.exists(&path) {
            return Err(StoreError::NotFound(format!("policy {id}")));
        }
        self.store.delete(path)
    }

    async fn list(&self) -> StoreResult<Vec<Policy>> {
        let mut all: Vec<Policy> = self
            .store
            .read_all(self.store.paths().policies_dir(), "json")?;
        all.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        Ok(all)
    }

    async fn enabled_global(&self) -> StoreResult<Vec<Policy>> {
        let mut all = self.load_enabled()?;
        all.retain(|p| p.scope == PolicyScope::Global);
        Ok(all)
    }

    async fn enabled_for_wallet(&self, wallet_id: &str) -> StoreResult<Vec<Policy>> {
        let mut all = self.load_enabled()?;
        all.retain(|p| {
            p.scope == PolicyScope::Wallet && p.entity_id.as_deref() == Some(wallet_id)
        });
        Ok(all)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::custody::EncryptedSecret;
    use crate::models::TxStatus;
    use crate::policy::PolicyKind;
    use chrono::Utc;
    use tempfile::TempDir;

    fn setup() -> (TempDir, Arc<FileStore>) {
        let temp = TempDir::new().unwrap();
        let mut store = FileStore::new(StorePaths::new(temp.path()));
        store.initialize().unwrap();
        (temp, Arc::new(store))
    }

    fn wallet(address: &str) -> WalletRecord {
        WalletRecord {
            id: uuid::Uuid::new_v4().to_string(),
            address: address.to_string(),
            key: EncryptedSecret {
                ciphertext: "aabb".to_string(),
                nonce: "ccdd".to_string(),
            },
            label: None,
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn wallet_roundtrip_and_duplicate() {
        let (_temp, store) = setup();
        let wallets = FileWalletStore::new(store);

        let record = wallet("0xAbC1");
        wallets.insert(record.clone()).await.unwrap();

        let loaded = wallets.find_by_address("0xAbC1").await.unwrap().unwrap();
        assert_eq!(loaded.id, record.id);
        assert_eq!(loaded.key.ciphertext, "aabb");

        let dup = wallets.insert(record).await;
        assert!(matches!(dup, Err(StoreError::AlreadyExists(_))));
    }

    #[tokio::test]
    async fn wallet_find_by_id_scans() {
        let (_temp, store) = setup();
        let wallets = FileWalletStore::new(store);

        let record = wallet("0xAbC2");
        wallets.insert(record.clone()).await.unwrap();

        let found = wallets.find_by_id(&record.id).await.unwrap();
        assert!(found.is_some());
        assert!(wallets.find_by_id("nope").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn wallet_label_is_mutable() {
        let (_temp, store) = setup();
        let wallets = FileWalletStore::new(store);

        wallets.insert(wallet("0xAbC3")).await.unwrap();
        wallets
            .update_label("0xAbC3", Some("treasury".to_string()))
            .await
            .unwrap();

        let loaded = wallets.find_by_address("0xAbC3").await.unwrap().unwrap();
        assert_eq!(loaded.label.as_deref(), Some("treasury"));
    }

    #[tokio::test]
    async fn transaction_terminal_transitions() {
        let (_temp, store) = setup();
        let txs = FileTransactionStore::new(store);

        let record = TransactionRecord::new_pending("0xfrom", "0xto", "1", 11155111);
        let id = record.id.clone();
        txs.insert(record).await.unwrap();

        let submitted = txs.mark_submitted(&id, "0xhash").await.unwrap();
        assert_eq!(submitted.status, TxStatus::Submitted);
        assert_eq!(submitted.hash.as_deref(), Some("0xhash"));

        // Terminal records refuse further transitions.
        let err = txs.mark_failed(&id).await.unwrap_err();
        assert!(matches!(err, StoreError::InvalidTransition { .. }));
    }

    #[tokio::test]
    async fn transaction_list_filters_by_wallet() {
        let (_temp, store) = setup();
        let txs = FileTransactionStore::new(store);

        txs.insert(TransactionRecord::new_pending("0xAAAA", "0xto", "1", 1))
            .await
            .unwrap();
        txs.insert(TransactionRecord::new_pending("0xaaaa", "0xto", "2", 1))
            .await
            .unwrap();
        txs.insert(TransactionRecord::new_pending("0xBBBB", "0xto", "3", 1))
            .await
            .unwrap();

        // Address comparison is case-insensitive at the semantic level.
        let list = txs.list_by_wallet("0xAaAa").await.unwrap();
        assert_eq!(list.len(), 2);
    }

    #[tokio::test]
    async fn policy_scoped_queries() {
        let (_temp, store) = setup();
        let policies = FilePolicyStore::new(store);

        let global = Policy::new(
            PolicyKind::TransactionLimit,
            PolicyScope::Global,
            None,
            serde_json::json!({"maxAmount": "10"}),
        );
        let scoped = Policy::new(
            PolicyKind::Whitelist,
            PolicyScope::Wallet,
            Some("wallet-1".to_string()),
            serde_json::json!({"addresses": ["0xAAAA"]}),
        );
        let mut disabled = Policy::new(
            PolicyKind::TransactionLimit,
            PolicyScope::Global,
            None,
            serde_json::json!({"maxAmount": "1"}),
        );
        disabled.enabled = false;

        policies.insert(global).await.unwrap();
        policies.insert(scoped).await.unwrap();
        policies.insert(disabled).await.unwrap();

        assert_eq!(policies.enabled_global().await.unwrap().len(), 1);
        assert_eq!(
            policies.enabled_for_wallet("wallet-1").await.unwrap().len(),
            1
        );
        assert!(policies
            .enabled_for_wallet("wallet-2")
            .await
            .unwrap()
            .is_empty());
        assert_eq!(policies.list().await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn uninitialized_store_errors() {
        let temp = TempDir::new().unwrap();
        let store = FileStore::new(StorePaths::new(temp.path()));
        let result = store.read_json::<WalletRecord>(temp.path().join("x.json"));
        assert!(matches!(result, Err(StoreError::NotInitialized)));
    }

    #[test]
    fn jsonl_append_and_read() {
        let (_temp, store) = setup();
        let path = store.paths().audit_events_file("2026-08-06");

        store.append_line(&path, r#"{"a":1}"#).unwrap();
        store.append_line(&path, r#"{"a":2}"#).unwrap();

        let lines = store.read_lines(&path).unwrap();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0], r#"{"a":1}"#);
    }
}
