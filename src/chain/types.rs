// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Custodia Project

//! Chain profile and read-model types.

use alloy::primitives::U256;
use serde::{Deserialize, Serialize};

/// Target chain configuration.
#[derive(Debug, Clone)]
pub struct ChainProfile {
    /// Human-readable network name.
    pub name: String,
    /// Chain identifier used in built transactions.
    pub chain_id: u64,
    /// JSON-RPC endpoint.
    pub rpc_url: String,
}

impl ChainProfile {
    /// Sepolia testnet profile.
    pub fn sepolia(rpc_url: impl Into<String>) -> Self {
        Self {
            name: "sepolia".to_string(),
            chain_id: 11155111,
            rpc_url: rpc_url.into(),
        }
    }

    /// Arbitrary network profile.
    pub fn custom(name: impl Into<String>, chain_id: u64, rpc_url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            chain_id,
            rpc_url: rpc_url.into(),
        }
    }
}

/// Point-in-time view of an ERC-20 holding, used by the pipeline's
/// balance/symbol pre-check.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenSnapshot {
    pub symbol: String,
    pub decimals: u8,
    /// Balance in the token's smallest unit.
    pub balance: U256,
    /// Balance formatted with the token's decimals.
    pub balance_formatted: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sepolia_profile_has_expected_chain_id() {
        let profile = ChainProfile::sepolia("http://localhost:8545");
        assert_eq!(profile.chain_id, 11155111);
        assert_eq!(profile.name, "sepolia");
    }
}
