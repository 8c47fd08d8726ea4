// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Custodia Project

//! Scoped-ownership types for decrypted key material.
//!
//! [`SecretMaterial`] holds a plaintext private key for the shortest
//! possible window: it is moved into [`SignerHandle::from_material`] and
//! zeroed immediately after the signer is constructed. The handle itself
//! signs by value, so a capability cannot outlive one signing operation.

use alloy::consensus::{SignableTransaction, TxEip1559, TxEnvelope};
use alloy::eips::eip2718::Encodable2718;
use alloy::network::TxSignerSync;
use alloy::primitives::Address;
use alloy::signers::local::PrivateKeySigner;
use alloy::signers::SignerSync;
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::error::CustodyError;

/// Plaintext key bytes, zeroed on drop. Never cloned, never serialized.
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct SecretMaterial {
    bytes: Vec<u8>,
}

impl SecretMaterial {
    pub fn new(bytes: Vec<u8>) -> Self {
        Self { bytes }
    }

    /// Borrow the raw bytes. Callers must not copy them into long-lived
    /// storage.
    pub fn expose(&self) -> &[u8] {
        &self.bytes
    }
}

impl std::fmt::Debug for SecretMaterial {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("SecretMaterial(..)")
    }
}

/// Derive the EIP-55 checksummed address for raw secp256k1 key bytes.
pub(crate) fn derive_address(key_bytes: &[u8]) -> Result<String, CustodyError> {
    let signer = PrivateKeySigner::from_slice(key_bytes)
        .map_err(|e| CustodyError::InvalidKeyMaterial(e.to_string()))?;
    Ok(signer.address().to_checksum(None))
}

/// Single-use signing capability.
///
/// Constructed by the wallet registry for exactly one pipeline operation;
/// every signing method takes `self` by value so the capability is
/// consumed on use and cannot be cached across calls.
pub struct SignerHandle {
    signer: PrivateKeySigner,
}

impl SignerHandle {
    /// Build a handle, consuming (and thereby zeroing) the plaintext
    /// material.
    pub(crate) fn from_material(material: SecretMaterial) -> Result<Self, CustodyError> {
        let signer = PrivateKeySigner::from_slice(material.expose())
            .map_err(|e| CustodyError::InvalidKeyMaterial(e.to_string()))?;
        // material drops here; its bytes are zeroed.
        Ok(Self { signer })
    }

    /// The address this handle signs for.
    pub fn address(&self) -> Address {
        self.signer.address()
    }

    /// Sign an EIP-1559 transaction and return the raw EIP-2718 encoded
    /// payload ready for broadcast. Consumes the handle.
    pub fn sign_transaction(self, tx: &mut TxEip1559) -> Result<Vec<u8>, CustodyError> {
        let signature = self
            .signer
            .sign_transaction_sync(tx)
            .map_err(|e| CustodyError::Signing(e.to_string()))?;
        let signed = tx.clone().into_signed(signature);
        let envelope = TxEnvelope::Eip1559(signed);
        Ok(envelope.encoded_2718())
    }

    /// Sign an EIP-191 personal message. Consumes the handle.
    pub fn sign_message(self, message: &str) -> Result<String, CustodyError> {
        let signature = self
            .signer
            .sign_message_sync(message.as_bytes())
            .map_err(|e| CustodyError::Signing(e.to_string()))?;
        Ok(format!("0x{}", alloy::hex::encode(signature.as_bytes())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::primitives::{TxKind, U256};

    // Well-known test key (first account of the standard test mnemonic).
    const TEST_KEY: &str = "ac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";
    const TEST_ADDRESS: &str = "0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266";

    fn material() -> SecretMaterial {
        SecretMaterial::new(alloy::hex::decode(TEST_KEY).unwrap())
    }

    #[test]
    fn derive_address_is_checksummed_and_deterministic() {
        let key_bytes = alloy::hex::decode(TEST_KEY).unwrap();
        assert_eq!(derive_address(&key_bytes).unwrap(), TEST_ADDRESS);
    }

    #[test]
    fn derive_address_rejects_bad_material() {
        assert!(matches!(
            derive_address(&[0u8; 5]),
            Err(CustodyError::InvalidKeyMaterial(_))
        ));
    }

    #[test]
    fn handle_address_matches_derivation() {
        let handle = SignerHandle::from_material(material()).unwrap();
        assert_eq!(handle.address().to_checksum(None), TEST_ADDRESS);
    }

    #[test]
    fn sign_message_produces_65_byte_signature() {
        let handle = SignerHandle::from_material(material()).unwrap();
        let signature = handle.sign_message("hello").unwrap();
        assert!(signature.starts_with("0x"));
        // 65 bytes hex-encoded plus prefix.
        assert_eq!(signature.len(), 132);
    }

    #[test]
    fn sign_transaction_yields_broadcastable_payload() {
        let handle = SignerHandle::from_material(material()).unwrap();
        let mut tx = TxEip1559 {
            chain_id: 11155111,
            nonce: 0,
            gas_limit: 21_000,
            max_fee_per_gas: 50_000_000_000,
            max_priority_fee_per_gas: 1_500_000_000,
            to: TxKind::Call(Address::ZERO),
            value: U256::from(1u64),
            access_list: Default::default(),
            input: Default::default(),
        };
        let raw = handle.sign_transaction(&mut tx).unwrap();
        // EIP-2718: typed transaction envelopes start with the type byte.
        assert_eq!(raw[0], 0x02);
        assert!(raw.len() > 64);
    }

    #[test]
    fn secret_material_debug_hides_bytes() {
        let secret = material();
        assert_eq!(format!("{secret:?}"), "SecretMaterial(..)");
    }
}
