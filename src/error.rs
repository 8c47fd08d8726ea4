// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Custodia Project

//! Top-level error taxonomy for custody operations.
//!
//! Policy violations are deliberately *not* part of this enum: a violated
//! rule is an expected, structured rejection (see [`crate::policy`]), not a
//! failure of the invocation.

use crate::chain::ChainError;
use crate::store::StoreError;

#[derive(Debug, thiserror::Error)]
pub enum CustodyError {
    /// No wallet record matches the given address or id.
    #[error("wallet not found: {0}")]
    WalletNotFound(String),

    /// Supplied key material (hex key or mnemonic) could not be parsed.
    #[error("invalid key material: {0}")]
    InvalidKeyMaterial(String),

    /// Authenticated decryption failed: ciphertext, nonce, or tag has been
    /// altered. Treated as a security event and logged distinctly.
    #[error("key custody integrity violation: ciphertext, nonce, or tag has been altered")]
    IntegrityViolation,

    /// Local signing failed before any payload reached the chain.
    #[error("signing failed: {0}")]
    Signing(String),

    /// Broadcast, estimation, or read failure from the chain client.
    #[error(transparent)]
    Chain(#[from] ChainError),

    /// State write or read failure. Fatal for the current invocation: the
    /// pipeline never continues past a failed state write.
    #[error("persistence failure: {0}")]
    Persistence(#[from] StoreError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_errors_convert_to_persistence() {
        let err: CustodyError = StoreError::NotFound("wallet w1".to_string()).into();
        assert!(matches!(err, CustodyError::Persistence(_)));
        assert!(err.to_string().contains("persistence failure"));
    }

    #[test]
    fn integrity_violation_names_the_tamper() {
        let msg = CustodyError::IntegrityViolation.to_string();
        assert!(msg.contains("integrity violation"));
    }
}
