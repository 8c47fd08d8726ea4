// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Custodia Project

//! ERC-20 token contract interactions.

use std::str::FromStr;

use alloy::{
    primitives::{Address, U256},
    providers::Provider,
    sol,
    sol_types::SolCall,
};

use super::client::ChainError;
use super::types::TokenSnapshot;
use super::units::format_amount;

// Minimal ERC-20 surface: metadata for the pre-check, transfer for the
// pipeline's calldata encoding.
sol! {
    #[sol(rpc)]
    interface IERC20 {
        function symbol() external view returns (string);
        function decimals() external view returns (uint8);
        function balanceOf(address account) external view returns (uint256);
        function transfer(address recipient, uint256 amount) external returns (bool);
    }
}

/// Encode a `transfer(recipient, amount)` call for inclusion as calldata.
pub fn encode_transfer(recipient: Address, amount: U256) -> Vec<u8> {
    IERC20::transferCall { recipient, amount }.abi_encode()
}

/// ERC-20 contract wrapper.
pub struct Erc20Contract<P> {
    contract: IERC20::IERC20Instance<P>,
}

impl<P: Provider + Clone> Erc20Contract<P> {
    /// Create a new ERC-20 contract instance.
    pub fn new(provider: &P, contract_address: &str) -> Result<Self, ChainError> {
        let address = Address::from_str(contract_address)
            .map_err(|e| ChainError::InvalidAddress(e.to_string()))?;
        Ok(Self {
            contract: IERC20::new(address, provider.clone()),
        })
    }

    /// Get the token symbol.
    pub async fn symbol(&self) -> Result<String, ChainError> {
        let result = self
            .contract
            .symbol()
            .call()
            .await
            .map_err(|e| ChainError::Contract(e.to_string()))?;
        Ok(result.to_string())
    }

    /// Get the token decimals.
    pub async fn decimals(&self) -> Result<u8, ChainError> {
        self.contract
            .decimals()
            .call()
            .await
            .map_err(|e| ChainError::Contract(e.to_string()))
    }

    /// Read balance plus metadata for the pipeline's pre-check.
    ///
    /// Metadata reads fall back to placeholders so a token with a quirky
    /// `symbol()` implementation cannot block a balance read; `balanceOf`
    /// itself must succeed.
    pub async fn snapshot(&self, holder: &str) -> Result<TokenSnapshot, ChainError> {
        let holder = Address::from_str(holder)
            .map_err(|e| ChainError::InvalidAddress(e.to_string()))?;

        let symbol = self.symbol().await.unwrap_or_else(|_| "???".to_string());
        let decimals = self.decimals().await.unwrap_or(18);

        let balance: U256 = self
            .contract
            .balanceOf(holder)
            .call()
            .await
            .map_err(|e| ChainError::Contract(e.to_string()))?;

        Ok(TokenSnapshot {
            symbol,
            decimals,
            balance,
            balance_formatted: format_amount(balance, decimals),
        })
    }
}
