// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Custodia Project

//! # Key Custody Module
//!
//! The single point through which all key material passes in either
//! direction.
//!
//! ## Security Model
//!
//! - Key material is encrypted with AES-256-GCM under a 32-byte master
//!   secret fixed at process configuration.
//! - Every encryption draws a fresh random nonce; determinism across
//!   calls is explicitly disallowed.
//! - Decryption validates the authentication tag and fails closed on any
//!   alteration; no partial plaintext is ever returned.
//! - Decrypted plaintext lives in a [`SecretMaterial`] that is zeroed on
//!   drop and consumed (moved) when a [`SignerHandle`] is built, so a
//!   key exists in memory only for the duration of one signing operation.
//!
//! The [`KeyCustody`] trait is the swap point for a remote key-management
//! service; callers depend only on `encrypt`/`decrypt`.

pub mod manager;
pub mod secret;

pub use manager::{AesGcmKeyCustody, EncryptedSecret, KeyCustody, MasterKey, MasterKeyError};
pub use secret::{SecretMaterial, SignerHandle};
