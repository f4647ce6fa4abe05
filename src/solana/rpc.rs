// src/solana/rpc.rs
use crate::error::PipelineError;
use async_trait::async_trait;
use futures::future::try_join_all;
use log::{debug, warn};
use solana_account_decoder::UiAccountEncoding;
use solana_client::{
    nonblocking::rpc_client::RpcClient as NonBlockingRpcClient,
    rpc_config::{RpcAccountInfoConfig, RpcSendTransactionConfig, RpcSimulateTransactionConfig},
    rpc_request::MAX_MULTIPLE_ACCOUNTS,
};
use solana_sdk::{
    account::Account, commitment_config::CommitmentConfig, hash::Hash, pubkey::Pubkey,
    signature::Signature, transaction::VersionedTransaction,
};
use std::sync::Arc;

const DEFAULT_COMMITMENT: CommitmentConfig = CommitmentConfig::confirmed();

/// Result of a single `simulateTransaction` call.
#[derive(Debug, Clone, Default)]
pub struct SimulationOutcome {
    pub err: Option<String>,
    pub logs: Vec<String>,
    pub units_consumed: Option<u64>,
}

/// The chain operations the pipeline depends on.
///
/// Every method is a single attempt: failures propagate to the caller.
#[async_trait]
pub trait ChainRpc: Send + Sync {
    /// Positional result: `None` for addresses with no account on-chain.
    async fn get_multiple_accounts(
        &self,
        addresses: &[Pubkey],
    ) -> Result<Vec<Option<Account>>, PipelineError>;

    async fn get_latest_blockhash(&self) -> Result<Hash, PipelineError>;

    async fn simulate_transaction(
        &self,
        transaction: &VersionedTransaction,
    ) -> Result<SimulationOutcome, PipelineError>;

    /// Broadcasts with preflight disabled.
    async fn send_transaction(
        &self,
        transaction: &VersionedTransaction,
    ) -> Result<Signature, PipelineError>;

    /// Recent per-slot prioritization fees (micro-lamports) touching `accounts`.
    async fn get_recent_prioritization_fees(
        &self,
        accounts: &[Pubkey],
    ) -> Result<Vec<u64>, PipelineError>;
}

pub struct SolanaRpcClient {
    client: Arc<NonBlockingRpcClient>,
}

impl SolanaRpcClient {
    pub fn new(endpoint: &str) -> Self {
        Self {
            client: Arc::new(NonBlockingRpcClient::new_with_commitment(
                endpoint.to_string(),
                DEFAULT_COMMITMENT,
            )),
        }
    }

    pub fn from_client(client: Arc<NonBlockingRpcClient>) -> Self {
        Self { client }
    }

    async fn get_account_chunk(
        client: Arc<NonBlockingRpcClient>,
        chunk: Vec<Pubkey>,
    ) -> Result<Vec<Option<Account>>, PipelineError> {
        let config = RpcAccountInfoConfig {
            encoding: Some(UiAccountEncoding::Base64),
            commitment: Some(DEFAULT_COMMITMENT),
            data_slice: None,
            min_context_slot: None,
        };
        let response = client
            .get_multiple_accounts_with_config(&chunk, config)
            .await?;
        if response.value.len() != chunk.len() {
            return Err(PipelineError::RpcError(format!(
                "getMultipleAccounts returned {} entries for {} addresses",
                response.value.len(),
                chunk.len()
            )));
        }
        Ok(response.value)
    }
}

#[async_trait]
impl ChainRpc for SolanaRpcClient {
    async fn get_multiple_accounts(
        &self,
        addresses: &[Pubkey],
    ) -> Result<Vec<Option<Account>>, PipelineError> {
        if addresses.is_empty() {
            return Ok(Vec::new());
        }
        // The RPC caps each request; chunks are fetched concurrently and the
        // whole read fails if any chunk does.
        let chunks = addresses
            .chunks(MAX_MULTIPLE_ACCOUNTS)
            .map(|chunk| Self::get_account_chunk(Arc::clone(&self.client), chunk.to_vec()));
        let results = try_join_all(chunks).await?;
        debug!(
            "[RPC] getMultipleAccounts: {} addresses in {} chunk(s)",
            addresses.len(),
            results.len()
        );
        Ok(results.into_iter().flatten().collect())
    }

    async fn get_latest_blockhash(&self) -> Result<Hash, PipelineError> {
        Ok(self.client.get_latest_blockhash().await?)
    }

    async fn simulate_transaction(
        &self,
        transaction: &VersionedTransaction,
    ) -> Result<SimulationOutcome, PipelineError> {
        let config = RpcSimulateTransactionConfig {
            sig_verify: false,
            replace_recent_blockhash: false,
            commitment: Some(CommitmentConfig::processed()),
            ..RpcSimulateTransactionConfig::default()
        };
        let response = self
            .client
            .simulate_transaction_with_config(transaction, config)
            .await?;
        let value = response.value;
        Ok(SimulationOutcome {
            err: value.err.map(|e| e.to_string()),
            logs: value.logs.unwrap_or_default(),
            units_consumed: value.units_consumed,
        })
    }

    async fn send_transaction(
        &self,
        transaction: &VersionedTransaction,
    ) -> Result<Signature, PipelineError> {
        let config = RpcSendTransactionConfig {
            skip_preflight: true,
            max_retries: Some(0),
            ..RpcSendTransactionConfig::default()
        };
        self.client
            .send_transaction_with_config(transaction, config)
            .await
            .map_err(|e| {
                warn!("[RPC] sendTransaction failed: {}", e);
                PipelineError::SendError(format!("sendTransaction failed: {}", e))
            })
    }

    async fn get_recent_prioritization_fees(
        &self,
        accounts: &[Pubkey],
    ) -> Result<Vec<u64>, PipelineError> {
        let fees = self.client.get_recent_prioritization_fees(accounts).await?;
        Ok(fees
            .into_iter()
            .map(|fee_info| fee_info.prioritization_fee)
            .collect())
    }
}
