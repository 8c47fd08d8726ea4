// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Custodia Project

//! Custodia - Custodial Key Management & Policy-Gated Transaction Pipeline
//!
//! This crate holds private keys on behalf of operators, irreversibly
//! encrypted under a master secret, and exposes controlled operations
//! (transfers, contract calls, message signing) that are checked against
//! organizational policy before anything chain-affecting happens. Every
//! transaction moves through a strict `Pending -> Submitted | Failed`
//! lifecycle and every invocation leaves an audit record.
//!
//! ## Modules
//!
//! - `custody` - Authenticated encryption of key material, scoped signers
//! - `registry` - Wallet creation, import, lookup, signer resolution
//! - `policy` - Risk policy model and evaluation engine
//! - `pipeline` - The transaction pipeline (the only lifecycle owner)
//! - `chain` - EVM chain access (alloy) behind a mockable trait
//! - `store` - File-backed persistence behind narrow store traits
//! - `audit` - Audit records and sinks
//! - `events` - Lifecycle event dispatch (webhooks)

pub mod audit;
pub mod chain;
pub mod config;
pub mod custody;
pub mod error;
pub mod events;
pub mod models;
pub mod pipeline;
pub mod policy;
pub mod registry;
pub mod store;
pub mod telemetry;

pub use error::CustodyError;
pub use models::{TransactionRecord, TxStatus, WalletSummary};
pub use pipeline::{ActionOutcome, ActionRequest, TransactionPipeline};
pub use policy::{PolicyEngine, PolicyViolation};
pub use registry::WalletRegistry;
