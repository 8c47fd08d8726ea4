// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Custodia Project

//! Wallet registry: creation, import, lookup, and signer resolution.
//!
//! The registry is the only component that touches both the wallet store
//! and key custody. A wallet's address is a pure function of its key
//! material, derived once at creation and immutable afterward. Decrypted
//! key material is never retained: it flows straight into a single-use
//! [`SignerHandle`] and is zeroed.

use std::str::FromStr;
use std::sync::Arc;

use alloy::primitives::Address;
use alloy::signers::local::{coins_bip39::English, MnemonicBuilder};
use chrono::Utc;
use k256::ecdsa::SigningKey;
use k256::elliptic_curve::rand_core::OsRng;

use crate::audit::{AuditAction, AuditEntity, AuditRecord, AuditSink};
use crate::custody::{secret::derive_address, KeyCustody, SecretMaterial, SignerHandle};
use crate::error::CustodyError;
use crate::models::{WalletRecord, WalletSummary};
use crate::store::WalletStore;

pub struct WalletRegistry {
    custody: Arc<dyn KeyCustody>,
    wallets: Arc<dyn WalletStore>,
    audit: Arc<dyn AuditSink>,
}

impl WalletRegistry {
    pub fn new(
        custody: Arc<dyn KeyCustody>,
        wallets: Arc<dyn WalletStore>,
        audit: Arc<dyn AuditSink>,
    ) -> Self {
        Self {
            custody,
            wallets,
            audit,
        }
    }

    /// Create a wallet with freshly generated key material.
    ///
    /// Returns only public fields; the key exists in plaintext just long
    /// enough to derive the address and encrypt.
    pub async fn create(
        &self,
        label: Option<String>,
        actor: &str,
    ) -> Result<WalletSummary, CustodyError> {
        let signing_key = SigningKey::random(&mut OsRng);
        let material = SecretMaterial::new(signing_key.to_bytes().to_vec());
        self.store_wallet(label, material, AuditAction::WalletCreate, actor)
            .await
    }

    /// Import externally supplied key material: a raw hex private key
    /// (with or without `0x`) or a BIP-39 mnemonic, which resolves to the
    /// first account on the standard derivation path.
    pub async fn import(
        &self,
        label: Option<String>,
        key_material: &str,
        actor: &str,
    ) -> Result<WalletSummary, CustodyError> {
        let material = decode_key_material(key_material)?;
        self.store_wallet(label, material, AuditAction::WalletImport, actor)
            .await
    }

    async fn store_wallet(
        &self,
        label: Option<String>,
        material: SecretMaterial,
        action: AuditAction,
        actor: &str,
    ) -> Result<WalletSummary, CustodyError> {
        let address = derive_address(material.expose())?;
        let key = self.custody.encrypt(material.expose()).await?;
        drop(material);

        let record = WalletRecord {
            id: uuid::Uuid::new_v4().to_string(),
            address,
            key,
            label,
            created_at: Utc::now(),
        };
        let summary = WalletSummary::from(&record);

        // A colliding derived address is astronomically unlikely but must
        // surface as a persistence error, not be ignored.
        self.wallets.insert(record).await?;

        let audit_record = AuditRecord::new(action, AuditEntity::Wallet, &summary.id, actor)
            .with_metadata(serde_json::json!({ "address": summary.address }));
        if let Err(e) = self.audit.record(&audit_record).await {
            tracing::error!(error = %e, wallet_id = %summary.id,
                "audit sink write failed for wallet registration");
        }

        Ok(summary)
    }

    /// Look up a wallet's public projection, or `None`.
    pub async fn get(&self, address: &str) -> Result<Option<WalletSummary>, CustodyError> {
        let canonical = normalize_address(address)?;
        let record = self.wallets.find_by_address(&canonical).await?;
        Ok(record.as_ref().map(WalletSummary::from))
    }

    /// Resolve a wallet that must exist, by address (normalized to its
    /// canonical checksummed form) or by opaque wallet id.
    pub async fn resolve(&self, wallet_ref: &str) -> Result<WalletSummary, CustodyError> {
        let record = if let Ok(addr) = Address::from_str(wallet_ref.trim()) {
            self.wallets
                .find_by_address(&addr.to_checksum(None))
                .await?
        } else {
            self.wallets.find_by_id(wallet_ref.trim()).await?
        };

        record
            .as_ref()
            .map(WalletSummary::from)
            .ok_or_else(|| CustodyError::WalletNotFound(wallet_ref.to_string()))
    }

    /// List all wallets (public projections only).
    pub async fn list(&self) -> Result<Vec<WalletSummary>, CustodyError> {
        let records = self.wallets.list().await?;
        Ok(records.iter().map(WalletSummary::from).collect())
    }

    /// Update a wallet's label, the only mutable field.
    pub async fn relabel(
        &self,
        address: &str,
        label: Option<String>,
    ) -> Result<(), CustodyError> {
        let canonical = normalize_address(address)?;
        Ok(self.wallets.update_label(&canonical, label).await?)
    }

    /// Build a single-use signing capability for the wallet.
    ///
    /// Decrypts the key material and moves it straight into the handle;
    /// nothing is cached across calls.
    pub async fn signing_capability(&self, address: &str) -> Result<SignerHandle, CustodyError> {
        let canonical = normalize_address(address)?;
        let record = self
            .wallets
            .find_by_address(&canonical)
            .await?
            .ok_or_else(|| CustodyError::WalletNotFound(canonical.clone()))?;

        let material = self.custody.decrypt(&record.key).await?;
        SignerHandle::from_material(material)
    }
}

/// Normalize to the EIP-55 checksummed form used as the storage key.
fn normalize_address(address: &str) -> Result<String, CustodyError> {
    Address::from_str(address.trim())
        .map(|addr| addr.to_checksum(None))
        .map_err(|_| CustodyError::WalletNotFound(address.to_string()))
}

/// Decode externally supplied key material into secret bytes.
fn decode_key_material(input: &str) -> Result<SecretMaterial, CustodyError> {
    let trimmed = input.trim();

    if trimmed.split_whitespace().count() >= 12 {
        // Mnemonic path: standard derivation, first account.
        let signer = MnemonicBuilder::<English>::default()
            .phrase(trimmed)
            .index(0)
            .map_err(|e| CustodyError::InvalidKeyMaterial(e.to_string()))?
            .build()
            .map_err(|e| CustodyError::InvalidKeyMaterial(e.to_string()))?;
        return Ok(SecretMaterial::new(signer.credential().to_bytes().to_vec()));
    }

    let hex_str = trimmed.strip_prefix("0x").unwrap_or(trimmed);
    let bytes = alloy::hex::decode(hex_str)
        .map_err(|e| CustodyError::InvalidKeyMaterial(e.to_string()))?;
    if bytes.len() != 32 {
        return Err(CustodyError::InvalidKeyMaterial(format!(
            "private key must be 32 bytes, got {}",
            bytes.len()
        )));
    }
    Ok(SecretMaterial::new(bytes))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::JsonlAuditSink;
    use crate::custody::{AesGcmKeyCustody, MasterKey};
    use crate::store::{FileStore, FileWalletStore, StorePaths};
    use tempfile::TempDir;

    const TEST_KEY: &str = "ac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";
    const TEST_ADDRESS: &str = "0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266";
    const TEST_MNEMONIC: &str =
        "test test test test test test test test test test test junk";

    fn custody() -> Arc<AesGcmKeyCustody> {
        let key = MasterKey::from_hex(&"11".repeat(32)).unwrap();
        Arc::new(AesGcmKeyCustody::new(key))
    }

    fn registry() -> (TempDir, WalletRegistry, Arc<AesGcmKeyCustody>) {
        let temp = TempDir::new().unwrap();
        let mut store = FileStore::new(StorePaths::new(temp.path()));
        store.initialize().unwrap();
        let store = Arc::new(store);

        let custody = custody();
        let registry = WalletRegistry::new(
            custody.clone(),
            Arc::new(FileWalletStore::new(store.clone())),
            Arc::new(JsonlAuditSink::new(store)),
        );
        (temp, registry, custody)
    }

    #[tokio::test]
    async fn created_address_rederives_from_stored_key() {
        let (temp, registry, custody) = registry();

        let summary = registry
            .create(Some("ops".to_string()), "key-test")
            .await
            .unwrap();
        assert!(summary.address.starts_with("0x"));
        assert_eq!(summary.address.len(), 42);

        // Test-only direct inspection: decrypt the stored blob and check
        // the address is a pure function of the key material.
        let store = FileWalletStore::new({
            let mut fs = FileStore::new(StorePaths::new(temp.path()));
            fs.initialize().unwrap();
            Arc::new(fs)
        });
        let record = store
            .find_by_address(&summary.address)
            .await
            .unwrap()
            .unwrap();
        let material = custody.decrypt(&record.key).await.unwrap();
        assert_eq!(derive_address(material.expose()).unwrap(), summary.address);
    }

    #[tokio::test]
    async fn import_hex_key_with_and_without_prefix() {
        let (_temp, registry, _custody) = registry();

        let summary = registry.import(None, TEST_KEY, "key-test").await.unwrap();
        assert_eq!(summary.address, TEST_ADDRESS);

        // Same key with 0x prefix lands on the same address, and the
        // duplicate record is refused.
        let dup = registry
            .import(None, &format!("0x{TEST_KEY}"), "key-test")
            .await;
        assert!(matches!(dup, Err(CustodyError::Persistence(_))));
    }

    #[tokio::test]
    async fn import_mnemonic_resolves_first_account() {
        let (_temp, registry, _custody) = registry();
        let summary = registry
            .import(None, TEST_MNEMONIC, "key-test")
            .await
            .unwrap();
        assert_eq!(summary.address, TEST_ADDRESS);
    }

    #[tokio::test]
    async fn import_rejects_malformed_material() {
        let (_temp, registry, _custody) = registry();

        for bad in ["zzzz", "0x1234", "not a mnemonic at all"] {
            let result = registry.import(None, bad, "key-test").await;
            assert!(
                matches!(result, Err(CustodyError::InvalidKeyMaterial(_))),
                "expected InvalidKeyMaterial for {bad:?}"
            );
        }
    }

    #[tokio::test]
    async fn signing_capability_normalizes_case() {
        let (_temp, registry, _custody) = registry();
        registry.import(None, TEST_KEY, "key-test").await.unwrap();

        // All-lowercase lookup still resolves the checksummed record.
        let handle = registry
            .signing_capability(&TEST_ADDRESS.to_lowercase())
            .await
            .unwrap();
        assert_eq!(handle.address().to_checksum(None), TEST_ADDRESS);
    }

    #[tokio::test]
    async fn resolve_accepts_address_or_id() {
        let (_temp, registry, _custody) = registry();
        let summary = registry.import(None, TEST_KEY, "key-test").await.unwrap();

        let by_address = registry.resolve(TEST_ADDRESS).await.unwrap();
        assert_eq!(by_address.id, summary.id);

        let by_id = registry.resolve(&summary.id).await.unwrap();
        assert_eq!(by_id.address, TEST_ADDRESS);

        assert!(matches!(
            registry.resolve("no-such-wallet").await,
            Err(CustodyError::WalletNotFound(_))
        ));
    }

    #[tokio::test]
    async fn signing_capability_unknown_wallet() {
        let (_temp, registry, _custody) = registry();
        let result = registry
            .signing_capability("0x0000000000000000000000000000000000000001")
            .await;
        assert!(matches!(result, Err(CustodyError::WalletNotFound(_))));
    }

    #[tokio::test]
    async fn list_and_get_expose_public_fields_only() {
        let (_temp, registry, _custody) = registry();
        registry
            .create(Some("alpha".to_string()), "key-test")
            .await
            .unwrap();
        registry.create(None, "key-test").await.unwrap();

        let all = registry.list().await.unwrap();
        assert_eq!(all.len(), 2);

        let first = registry.get(&all[0].address).await.unwrap().unwrap();
        let json = serde_json::to_string(&first).unwrap();
        assert!(!json.contains("ciphertext"));

        assert!(registry
            .get("0x0000000000000000000000000000000000000002")
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn relabel_updates_only_label() {
        let (_temp, registry, _custody) = registry();
        let summary = registry.import(None, TEST_KEY, "key-test").await.unwrap();

        registry
            .relabel(&summary.address, Some("cold".to_string()))
            .await
            .unwrap();

        let loaded = registry.get(&summary.address).await.unwrap().unwrap();
        assert_eq!(loaded.label.as_deref(), Some("cold"));
        assert_eq!(loaded.address, summary.address);
    }
}
