// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Custodia Project

//! The transaction pipeline: one state-changing action, end to end.
//!
//! Per invocation: resolve the acting wallet (public record only), check
//! policy, persist a `Pending` transaction, resolve the signer, sign,
//! broadcast, write the terminal status. The ordering is a hard
//! invariant: policy evaluation never follows key decryption or
//! broadcast, and the `Pending` row exists before any chain-mutating
//! call so a crash mid-flight always leaves an auditable record.
//!
//! This is the only component that transitions a transaction's lifecycle
//! state. Exactly one audit record is emitted per invocation, attempted
//! even when the action failed. Idempotency is explicitly not provided:
//! two identical calls produce two records and, absent rejection, two
//! broadcasts.

use std::str::FromStr;
use std::sync::Arc;

use alloy::consensus::TxEip1559;
use alloy::primitives::{Address, Bytes, TxKind, U256};

use crate::audit::{AuditAction, AuditEntity, AuditRecord, AuditSink};
use crate::chain::{erc20, parse_amount, ChainClient, ChainError, NATIVE_DECIMALS};
use crate::error::CustodyError;
use crate::events::{EventDispatcher, LifecycleEvent};
use crate::models::TransactionRecord;
use crate::policy::{ActionContext, PolicyEngine, PolicyError, PolicyViolation};
use crate::registry::WalletRegistry;
use crate::store::TransactionStore;

/// A requested state-changing action.
#[derive(Debug, Clone)]
pub enum ActionRequest {
    /// Transfer of the chain-native currency.
    NativeTransfer {
        from: String,
        to: String,
        /// Amount in native units, decimal string.
        value: String,
    },
    /// ERC-20 token transfer.
    Erc20Transfer {
        from: String,
        token: String,
        to: String,
        /// Amount in token units, decimal string.
        amount: String,
        /// When present, the token's `symbol()` must match before the
        /// action is committed.
        expected_symbol: Option<String>,
    },
    /// Arbitrary contract call with pre-encoded calldata.
    ContractCall {
        from: String,
        contract: String,
        /// Hex-encoded calldata, with or without `0x`.
        calldata: String,
        /// Native value to attach, decimal string.
        value: String,
    },
    /// EIP-191 message signing. No transaction record, no broadcast.
    SignMessage { from: String, message: String },
}

impl ActionRequest {
    /// The acting wallet's address.
    pub fn from_address(&self) -> &str {
        match self {
            ActionRequest::NativeTransfer { from, .. }
            | ActionRequest::Erc20Transfer { from, .. }
            | ActionRequest::ContractCall { from, .. }
            | ActionRequest::SignMessage { from, .. } => from,
        }
    }

    fn audit_action(&self) -> AuditAction {
        match self {
            ActionRequest::NativeTransfer { .. } => AuditAction::TransactionSend,
            ActionRequest::Erc20Transfer { .. } => AuditAction::Erc20Transfer,
            ActionRequest::ContractCall { .. } => AuditAction::ContractCall,
            ActionRequest::SignMessage { .. } => AuditAction::MessageSign,
        }
    }

    fn metadata(&self) -> serde_json::Value {
        match self {
            ActionRequest::NativeTransfer { to, value, .. } => {
                serde_json::json!({ "to": to, "value": value })
            }
            ActionRequest::Erc20Transfer {
                token, to, amount, ..
            } => serde_json::json!({ "token": token, "to": to, "amount": amount }),
            ActionRequest::ContractCall {
                contract, value, ..
            } => serde_json::json!({ "contract": contract, "value": value }),
            // Message content may itself be sensitive; record only its size.
            ActionRequest::SignMessage { message, .. } => {
                serde_json::json!({ "messageLength": message.len() })
            }
        }
    }
}

/// Outcome of a pipeline invocation.
///
/// A policy rejection is an expected outcome, not an error; post-commit
/// failures surface as [`CustodyError`] after the record is marked
/// `Failed`.
#[derive(Debug)]
pub enum ActionOutcome {
    /// Broadcast accepted; the terminal record carries the hash.
    Submitted(TransactionRecord),
    /// Policy rejected the action. No transaction record exists, no
    /// signer was touched.
    Rejected(PolicyViolation),
    /// Message signed; nothing reached the chain.
    Signed { address: String, signature: String },
}

/// Orchestrates custody, policy, persistence, and chain access for one
/// action at a time. Stateless between invocations; no per-wallet lock.
pub struct TransactionPipeline {
    registry: Arc<WalletRegistry>,
    policy: PolicyEngine,
    chain: Arc<dyn ChainClient>,
    transactions: Arc<dyn TransactionStore>,
    audit: Arc<dyn AuditSink>,
    events: Arc<dyn EventDispatcher>,
}

impl TransactionPipeline {
    pub fn new(
        registry: Arc<WalletRegistry>,
        policy: PolicyEngine,
        chain: Arc<dyn ChainClient>,
        transactions: Arc<dyn TransactionStore>,
        audit: Arc<dyn AuditSink>,
        events: Arc<dyn EventDispatcher>,
    ) -> Self {
        Self {
            registry,
            policy,
            chain,
            transactions,
            audit,
            events,
        }
    }

    /// Execute an action end to end.
    pub async fn execute(
        &self,
        action: ActionRequest,
        actor: &str,
    ) -> Result<ActionOutcome, CustodyError> {
        let audit_action = action.audit_action();
        let wallet_address = action.from_address().to_string();
        let metadata = action.metadata();

        let result = self.run(action).await;

        let record = match &result {
            Ok(ActionOutcome::Submitted(tx)) => {
                AuditRecord::new(audit_action, AuditEntity::Transaction, &tx.id, actor)
                    .with_metadata(metadata)
            }
            Ok(ActionOutcome::Signed { address, .. }) => {
                AuditRecord::new(audit_action, AuditEntity::Wallet, address, actor)
                    .with_metadata(metadata)
            }
            Ok(ActionOutcome::Rejected(violation)) => {
                AuditRecord::new(audit_action, AuditEntity::Wallet, &wallet_address, actor)
                    .with_metadata(metadata)
                    .rejected(&violation.reason)
            }
            Err(err) => {
                AuditRecord::new(audit_action, AuditEntity::Wallet, &wallet_address, actor)
                    .with_metadata(metadata)
                    .failed(err.to_string())
            }
        };
        self.record_audit(record).await;

        match &result {
            Ok(ActionOutcome::Submitted(tx)) => {
                self.events
                    .dispatch(LifecycleEvent::transaction_submitted(tx))
                    .await;
            }
            Ok(ActionOutcome::Rejected(violation)) => {
                self.events
                    .dispatch(LifecycleEvent::transaction_rejected(
                        &wallet_address,
                        violation,
                    ))
                    .await;
            }
            _ => {}
        }

        result
    }

    async fn run(&self, action: ActionRequest) -> Result<ActionOutcome, CustodyError> {
        match action {
            ActionRequest::NativeTransfer { from, to, value } => {
                self.run_native(from, to, value).await
            }
            ActionRequest::Erc20Transfer {
                from,
                token,
                to,
                amount,
                expected_symbol,
            } => {
                self.run_erc20(from, token, to, amount, expected_symbol)
                    .await
            }
            ActionRequest::ContractCall {
                from,
                contract,
                calldata,
                value,
            } => self.run_contract_call(from, contract, calldata, value).await,
            ActionRequest::SignMessage { from, message } => self.run_sign(from, message).await,
        }
    }

    async fn run_native(
        &self,
        from: String,
        to: String,
        value: String,
    ) -> Result<ActionOutcome, CustodyError> {
        let wallet = self.registry.resolve(&from).await?;

        if let Some(violation) = self
            .check_policy(ActionContext {
                amount: Some(value.clone()),
                destination: Some(to.clone()),
                wallet_id: Some(wallet.id.clone()),
            })
            .await?
        {
            return Ok(ActionOutcome::Rejected(violation));
        }

        let record = TransactionRecord::new_pending(
            wallet.address.as_str(),
            to.as_str(),
            value.as_str(),
            self.chain.chain_id(),
        );
        self.transactions.insert(record.clone()).await?;

        let attempt = async {
            let value_wei = parse_amount(&value, NATIVE_DECIMALS)?;
            let to_addr = parse_address(&to)?;
            self.sign_and_broadcast(&wallet.address, to_addr, value_wei, Bytes::new())
                .await
        }
        .await;

        self.finalize(&record.id, attempt).await
    }

    async fn run_erc20(
        &self,
        from: String,
        token: String,
        to: String,
        amount: String,
        expected_symbol: Option<String>,
    ) -> Result<ActionOutcome, CustodyError> {
        let wallet = self.registry.resolve(&from).await?;

        // Token amounts are not native-currency amounts, so the limit
        // rule gets no amount here; the whitelist judges the recipient.
        if let Some(violation) = self
            .check_policy(ActionContext {
                amount: None,
                destination: Some(to.clone()),
                wallet_id: Some(wallet.id.clone()),
            })
            .await?
        {
            return Ok(ActionOutcome::Rejected(violation));
        }

        // Balance/symbol pre-check, before any transaction row exists.
        let snapshot = self.chain.token_snapshot(&token, &wallet.address).await?;

        if let Some(expected) = &expected_symbol {
            if snapshot.symbol != *expected {
                return Err(ChainError::SymbolMismatch {
                    expected: expected.clone(),
                    actual: snapshot.symbol,
                }
                .into());
            }
        }

        let amount_units = parse_amount(&amount, snapshot.decimals)?;
        if snapshot.balance < amount_units {
            return Err(ChainError::InsufficientBalance {
                available: snapshot.balance_formatted,
                requested: amount,
                symbol: snapshot.symbol,
            }
            .into());
        }

        // The record reflects the contract interaction: destination is
        // the token contract, native value is zero.
        let record = TransactionRecord::new_pending(
            wallet.address.as_str(),
            token.as_str(),
            "0",
            self.chain.chain_id(),
        );
        self.transactions.insert(record.clone()).await?;

        let attempt = async {
            let token_addr = parse_address(&token)?;
            let recipient = parse_address(&to)?;
            let input = Bytes::from(erc20::encode_transfer(recipient, amount_units));
            self.sign_and_broadcast(&wallet.address, token_addr, U256::ZERO, input)
                .await
        }
        .await;

        self.finalize(&record.id, attempt).await
    }

    async fn run_contract_call(
        &self,
        from: String,
        contract: String,
        calldata: String,
        value: String,
    ) -> Result<ActionOutcome, CustodyError> {
        let wallet = self.registry.resolve(&from).await?;

        if let Some(violation) = self
            .check_policy(ActionContext {
                amount: Some(value.clone()),
                destination: Some(contract.clone()),
                wallet_id: Some(wallet.id.clone()),
            })
            .await?
        {
            return Ok(ActionOutcome::Rejected(violation));
        }

        let record = TransactionRecord::new_pending(
            wallet.address.as_str(),
            contract.as_str(),
            value.as_str(),
            self.chain.chain_id(),
        );
        self.transactions.insert(record.clone()).await?;

        let attempt = async {
            let contract_addr = parse_address(&contract)?;
            let input = decode_calldata(&calldata)?;
            let value_wei = parse_amount(&value, NATIVE_DECIMALS)?;
            self.sign_and_broadcast(&wallet.address, contract_addr, value_wei, input)
                .await
        }
        .await;

        self.finalize(&record.id, attempt).await
    }

    async fn run_sign(&self, from: String, message: String) -> Result<ActionOutcome, CustodyError> {
        let wallet = self.registry.resolve(&from).await?;

        // Amount/destination rules skip themselves on an empty context;
        // wallet-scoped rules still load.
        if let Some(violation) = self
            .check_policy(ActionContext {
                amount: None,
                destination: None,
                wallet_id: Some(wallet.id.clone()),
            })
            .await?
        {
            return Ok(ActionOutcome::Rejected(violation));
        }

        let handle = self.registry.signing_capability(&wallet.address).await?;
        let signature = handle.sign_message(&message)?;

        Ok(ActionOutcome::Signed {
            address: wallet.address,
            signature,
        })
    }

    /// Evaluate policy, separating the expected rejection from fatal
    /// store failures.
    async fn check_policy(
        &self,
        ctx: ActionContext,
    ) -> Result<Option<PolicyViolation>, CustodyError> {
        match self.policy.evaluate(&ctx).await {
            Ok(()) => Ok(None),
            Err(PolicyError::Violation(violation)) => Ok(Some(violation)),
            Err(PolicyError::Store(e)) => Err(e.into()),
        }
    }

    /// Plan, sign, and broadcast. The signer handle is created after all
    /// read-only planning so the decrypted key exists only for the
    /// signing call itself, and it is consumed by that call.
    async fn sign_and_broadcast(
        &self,
        from: &str,
        to: Address,
        value: U256,
        input: Bytes,
    ) -> Result<String, CustodyError> {
        let from_addr = parse_address(from)?;
        let plan = self.chain.plan(from_addr, to, value, input.clone()).await?;

        let handle = self.registry.signing_capability(from).await?;
        let mut tx = TxEip1559 {
            chain_id: self.chain.chain_id(),
            nonce: plan.nonce,
            gas_limit: plan.gas_limit,
            max_fee_per_gas: plan.max_fee_per_gas,
            max_priority_fee_per_gas: plan.max_priority_fee_per_gas,
            to: TxKind::Call(to),
            value,
            access_list: Default::default(),
            input,
        };
        let raw = handle.sign_transaction(&mut tx)?;

        // Past this point the action cannot be cancelled.
        Ok(self.chain.broadcast(&raw).await?)
    }

    /// Write the terminal status. A failed terminal write is fatal and
    /// takes precedence; the original error is preserved in the log.
    async fn finalize(
        &self,
        tx_id: &str,
        attempt: Result<String, CustodyError>,
    ) -> Result<ActionOutcome, CustodyError> {
        match attempt {
            Ok(hash) => {
                let record = self.transactions.mark_submitted(tx_id, &hash).await?;
                Ok(ActionOutcome::Submitted(record))
            }
            Err(err) => {
                if let Err(persist_err) = self.transactions.mark_failed(tx_id).await {
                    tracing::error!(tx_id, original_error = %err, error = %persist_err,
                        "failed to persist terminal Failed status");
                    return Err(persist_err.into());
                }
                Err(err)
            }
        }
    }

    /// Audit is best-effort relative to the primary operation; on sink
    /// failure the serialized record is preserved in the local log.
    async fn record_audit(&self, record: AuditRecord) {
        if let Err(e) = self.audit.record(&record).await {
            let fallback = serde_json::to_string(&record).unwrap_or_default();
            tracing::error!(error = %e, record = %fallback,
                "audit sink write failed; record preserved in local log");
        }
    }
}

fn parse_address(s: &str) -> Result<Address, ChainError> {
    Address::from_str(s.trim()).map_err(|e| ChainError::InvalidAddress(format!("{s}: {e}")))
}

fn decode_calldata(calldata: &str) -> Result<Bytes, ChainError> {
    let trimmed = calldata.trim();
    let stripped = trimmed.strip_prefix("0x").unwrap_or(trimmed);
    alloy::hex::decode(stripped)
        .map(Bytes::from)
        .map_err(|e| ChainError::InvalidCalldata(e.to_string()))
}
