// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Custodia Project

//! # Chain Module
//!
//! EVM chain access behind the narrow [`ChainClient`] trait: fee/nonce/gas
//! planning, raw payload broadcast, and balance reads. The default
//! implementation ([`EvmChainClient`]) talks JSON-RPC via alloy and wraps
//! every outbound call in a mandatory bounded timeout.
//!
//! Signing never happens here; the pipeline signs with a custody-scoped
//! handle and hands this module a finished payload.

pub mod client;
pub mod erc20;
pub mod types;
pub mod units;

pub use client::{ChainClient, ChainError, EvmChainClient, TxPlan};
pub use types::{ChainProfile, TokenSnapshot};
pub use units::{format_amount, parse_amount, NATIVE_DECIMALS};
