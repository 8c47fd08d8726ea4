// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Custodia Project

//! Authenticated symmetric encryption for key material.

use aes_gcm::{
    aead::{Aead, AeadCore, KeyInit, OsRng},
    Aes256Gcm, Key, Nonce,
};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use zeroize::{Zeroize, ZeroizeOnDrop};

use super::secret::SecretMaterial;
use crate::error::CustodyError;

/// AES-GCM nonce length in bytes.
const NONCE_LEN: usize = 12;

#[derive(Debug, thiserror::Error)]
#[error("MASTER_KEY must be a 32-byte hex string (64 chars)")]
pub struct MasterKeyError;

/// The 32-byte master secret. Supplied out of band at configuration time;
/// never generated or derived at runtime, never exportable.
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct MasterKey([u8; 32]);

impl MasterKey {
    /// Parse from a 64-character hex string.
    pub fn from_hex(hex_str: &str) -> Result<Self, MasterKeyError> {
        let bytes = alloy::hex::decode(hex_str.trim()).map_err(|_| MasterKeyError)?;
        let bytes: [u8; 32] = bytes.try_into().map_err(|_| MasterKeyError)?;
        Ok(Self(bytes))
    }

    fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl std::fmt::Debug for MasterKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Never print the secret, even in debug output.
        f.write_str("MasterKey(..)")
    }
}

/// Ciphertext (with the 16-byte authentication tag appended) and the nonce
/// used to produce it, both hex-encoded for storage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncryptedSecret {
    pub ciphertext: String,
    pub nonce: String,
}

/// Encryption/decryption capability for raw key material.
///
/// Oblivious to what it is encrypting; no API exists to export the master
/// secret or enumerate wallets. Async so a remote KMS implementation can
/// suspend on I/O without changing callers.
#[async_trait]
pub trait KeyCustody: Send + Sync {
    /// Encrypt plaintext under the master secret with a fresh random
    /// nonce. Two calls with identical plaintext yield different
    /// ciphertext and different nonce.
    async fn encrypt(&self, plaintext: &[u8]) -> Result<EncryptedSecret, CustodyError>;

    /// Decrypt and authenticate. Fails closed with
    /// [`CustodyError::IntegrityViolation`] if ciphertext, nonce, or tag
    /// has been altered.
    async fn decrypt(&self, secret: &EncryptedSecret) -> Result<SecretMaterial, CustodyError>;
}

/// Local AES-256-GCM custody backed by the in-process master secret.
pub struct AesGcmKeyCustody {
    cipher: Aes256Gcm,
}

impl AesGcmKeyCustody {
    pub fn new(master_key: MasterKey) -> Self {
        let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(master_key.as_bytes()));
        // master_key drops (and zeroes) here; the cipher keeps the
        // expanded key schedule internally.
        Self { cipher }
    }
}

#[async_trait]
impl KeyCustody for AesGcmKeyCustody {
    async fn encrypt(&self, plaintext: &[u8]) -> Result<EncryptedSecret, CustodyError> {
        let nonce = Aes256Gcm::generate_nonce(&mut OsRng);
        let ciphertext = self
            .cipher
            .encrypt(&nonce, plaintext)
            .map_err(|_| CustodyError::IntegrityViolation)?;

        Ok(EncryptedSecret {
            ciphertext: alloy::hex::encode(ciphertext),
            nonce: alloy::hex::encode(nonce),
        })
    }

    async fn decrypt(&self, secret: &EncryptedSecret) -> Result<SecretMaterial, CustodyError> {
        let nonce_bytes = alloy::hex::decode(&secret.nonce).map_err(|_| {
            tracing::error!("key custody: malformed nonce encoding, possible tampering");
            CustodyError::IntegrityViolation
        })?;
        if nonce_bytes.len() != NONCE_LEN {
            tracing::error!("key custody: nonce length mismatch, possible tampering");
            return Err(CustodyError::IntegrityViolation);
        }

        let ciphertext = alloy::hex::decode(&secret.ciphertext).map_err(|_| {
            tracing::error!("key custody: malformed ciphertext encoding, possible tampering");
            CustodyError::IntegrityViolation
        })?;

        let plaintext = self
            .cipher
            .decrypt(Nonce::from_slice(&nonce_bytes), ciphertext.as_ref())
            .map_err(|_| {
                // Security event: authentication tag did not verify.
                tracing::error!(
                    "key custody: authentication tag mismatch, ciphertext or nonce altered"
                );
                CustodyError::IntegrityViolation
            })?;

        Ok(SecretMaterial::new(plaintext))
    }
}
