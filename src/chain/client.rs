// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Custodia Project

//! Chain client trait and the alloy-backed JSON-RPC implementation.

use std::future::Future;
use std::time::Duration;

use alloy::{
    network::Ethereum,
    primitives::{Address, Bytes, U256},
    providers::{
        fillers::{BlobGasFiller, ChainIdFiller, FillProvider, GasFiller, JoinFill, NonceFiller},
        Identity, Provider, ProviderBuilder, RootProvider,
    },
    rpc::types::TransactionRequest,
};
use async_trait::async_trait;

use super::erc20::Erc20Contract;
use super::types::{ChainProfile, TokenSnapshot};

/// HTTP provider type (with all fillers).
type HttpProvider = FillProvider<
    JoinFill<
        Identity,
        JoinFill<GasFiller, JoinFill<BlobGasFiller, JoinFill<NonceFiller, ChainIdFiller>>>,
    >,
    RootProvider<Ethereum>,
>;

/// Errors that can occur during chain operations.
#[derive(Debug, thiserror::Error)]
pub enum ChainError {
    #[error("invalid rpc url: {0}")]
    InvalidRpcUrl(String),

    #[error("invalid address: {0}")]
    InvalidAddress(String),

    #[error("invalid amount: {0}")]
    InvalidAmount(String),

    #[error("invalid calldata: {0}")]
    InvalidCalldata(String),

    #[error("rpc error: {0}")]
    Rpc(String),

    #[error("contract error: {0}")]
    Contract(String),

    #[error("broadcast failed: {0}")]
    Broadcast(String),

    /// An outbound call exceeded the mandatory bound; surfaced to the
    /// pipeline as a failed transition rather than hanging.
    #[error("chain call timed out after {0:?}")]
    Timeout(Duration),

    #[error("insufficient balance: has {available} {symbol}, needed {requested}")]
    InsufficientBalance {
        available: String,
        requested: String,
        symbol: String,
    },

    #[error("token symbol mismatch: expected {expected}, got {actual}")]
    SymbolMismatch { expected: String, actual: String },
}

/// Everything the pipeline needs to assemble a signable transaction.
#[derive(Debug, Clone)]
pub struct TxPlan {
    pub nonce: u64,
    pub gas_limit: u64,
    pub max_fee_per_gas: u128,
    pub max_priority_fee_per_gas: u128,
}

/// Narrow chain-access seam: broadcasts signed payloads and reads state.
/// Independently mockable; the pipeline never sees a provider.
#[async_trait]
pub trait ChainClient: Send + Sync {
    /// Chain identifier baked into built transactions.
    fn chain_id(&self) -> u64;

    /// Resolve nonce, gas limit, and fees for a prospective transaction.
    async fn plan(
        &self,
        from: Address,
        to: Address,
        value: U256,
        input: Bytes,
    ) -> Result<TxPlan, ChainError>;

    /// Submit a signed, EIP-2718 encoded payload. Success means node
    /// acceptance, not on-chain confirmation.
    async fn broadcast(&self, raw_tx: &[u8]) -> Result<String, ChainError>;

    /// Native-currency balance in wei.
    async fn native_balance(&self, address: Address) -> Result<U256, ChainError>;

    /// ERC-20 balance and metadata for the given holder.
    async fn token_snapshot(&self, token: &str, holder: &str)
        -> Result<TokenSnapshot, ChainError>;
}

/// JSON-RPC chain client with a mandatory bound on every outbound call.
pub struct EvmChainClient {
    profile: ChainProfile,
    provider: HttpProvider,
    call_timeout: Duration,
}

impl EvmChainClient {
    pub fn new(profile: ChainProfile, call_timeout: Duration) -> Result<Self, ChainError> {
        let url: url::Url = profile
            .rpc_url
            .parse()
            .map_err(|e: url::ParseError| ChainError::InvalidRpcUrl(e.to_string()))?;

        let provider = ProviderBuilder::new().connect_http(url);

        Ok(Self {
            profile,
            provider,
            call_timeout,
        })
    }

    /// The network profile this client targets.
    pub fn profile(&self) -> &ChainProfile {
        &self.profile
    }

    /// Apply the mandatory timeout to an outbound call.
    async fn bounded<T>(
        &self,
        fut: impl Future<Output = Result<T, ChainError>>,
    ) -> Result<T, ChainError> {
        match tokio::time::timeout(self.call_timeout, fut).await {
            Ok(result) => result,
            Err(_) => Err(ChainError::Timeout(self.call_timeout)),
        }
    }

    /// Current fee estimate: max fee covers a doubled base fee plus the
    /// standard priority tip.
    async fn fees(&self) -> Result<(u128, u128), ChainError> {
        let block = self
            .provider
            .get_block_by_number(alloy::eips::BlockNumberOrTag::Latest)
            .await
            .map_err(|e| ChainError::Rpc(format!("failed to get block: {e}")))?
            .ok_or_else(|| ChainError::Rpc("no latest block".to_string()))?;

        let base_fee: u128 = block
            .header
            .base_fee_per_gas
            .map(|f| f as u128)
            .unwrap_or(25_000_000_000u128);

        let priority_fee: u128 = 1_500_000_000; // 1.5 gwei
        let max_fee = base_fee.saturating_mul(2).saturating_add(priority_fee);

        Ok((max_fee, priority_fee))
    }
}

#[async_trait]
impl ChainClient for EvmChainClient {
    fn chain_id(&self) -> u64 {
        self.profile.chain_id
    }

    async fn plan(
        &self,
        from: Address,
        to: Address,
        value: U256,
        input: Bytes,
    ) -> Result<TxPlan, ChainError> {
        self.bounded(async {
            let nonce = self
                .provider
                .get_transaction_count(from)
                .await
                .map_err(|e| ChainError::Rpc(format!("nonce lookup failed: {e}")))?;

            let request = TransactionRequest::default()
                .from(from)
                .to(to)
                .value(value)
                .input(input.into());

            let gas_limit = self
                .provider
                .estimate_gas(request)
                .await
                .map_err(|e| ChainError::Rpc(format!("gas estimation failed: {e}")))?;

            let (max_fee_per_gas, max_priority_fee_per_gas) = self.fees().await?;

            Ok(TxPlan {
                nonce,
                gas_limit,
                max_fee_per_gas,
                max_priority_fee_per_gas,
            })
        })
        .await
    }

    async fn broadcast(&self, raw_tx: &[u8]) -> Result<String, ChainError> {
        self.bounded(async {
            let pending = self
                .provider
                .send_raw_transaction(raw_tx)
                .await
                .map_err(|e| ChainError::Broadcast(e.to_string()))?;
            Ok(format!("{:?}", pending.tx_hash()))
        })
        .await
    }

    async fn native_balance(&self, address: Address) -> Result<U256, ChainError> {
        self.bounded(async {
            self.provider
                .get_balance(address)
                .await
                .map_err(|e| ChainError::Rpc(e.to_string()))
        })
        .await
    }

    async fn token_snapshot(
        &self,
        token: &str,
        holder: &str,
    ) -> Result<TokenSnapshot, ChainError> {
        let contract = Erc20Contract::new(&self.provider, token)?;
        self.bounded(contract.snapshot(holder)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_malformed_rpc_url() {
        let result = EvmChainClient::new(
            ChainProfile::custom("local", 1, "not a url"),
            Duration::from_secs(5),
        );
        assert!(matches!(result, Err(ChainError::InvalidRpcUrl(_))));
    }

    #[test]
    fn chain_id_comes_from_profile() {
        let client = EvmChainClient::new(
            ChainProfile::sepolia("http://localhost:8545"),
            Duration::from_secs(5),
        )
        .unwrap();
        assert_eq!(client.chain_id(), 11155111);
    }

    #[tokio::test]
    async fn bounded_surfaces_timeout() {
        let client = EvmChainClient::new(
            ChainProfile::sepolia("http://localhost:8545"),
            Duration::from_millis(10),
        )
        .unwrap();

        let result: Result<(), ChainError> = client
            .bounded(async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                Ok(())
            })
            .await;
        assert!(matches!(result, Err(ChainError::Timeout(_))));
    }
}
