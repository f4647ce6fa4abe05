// src/sender/mod.rs
//! Signing and submission strategies for built transactions.

pub mod direct;
pub mod jito;

pub use direct::DirectSender;
pub use jito::{
    BundleStatus, JitoRelayClient, NextLeader, RelayApi, RelayBundleConfig, RelayBundleSender,
    MAX_BUNDLE_SIZE,
};

use crate::{error::PipelineError, solana::ChainRpc, transaction::BuiltTransaction};
use async_trait::async_trait;
use log::error;
use solana_sdk::{
    pubkey::Pubkey,
    signature::{Keypair, Signature},
    signer::Signer,
    transaction::VersionedTransaction,
};
use std::{fmt, sync::Arc};

/// Identifier returned by a successful submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmissionId {
    Signature(Signature),
    Bundle(String),
}

impl fmt::Display for SubmissionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SubmissionId::Signature(sig) => write!(f, "signature:{}", sig),
            SubmissionId::Bundle(id) => write!(f, "bundle:{}", id),
        }
    }
}

#[async_trait]
pub trait SenderProvider: Send + Sync {
    /// Validates payers, optionally simulates, appends provider extras and signs.
    async fn prepare(
        &self,
        transactions: &[BuiltTransaction],
        payer: &Pubkey,
        signer: &Keypair,
        simulate: bool,
    ) -> Result<Vec<VersionedTransaction>, PipelineError>;

    async fn send(&self, signed: &[VersionedTransaction]) -> Result<SubmissionId, PipelineError>;
}

/// Which submission path to use.
pub enum SenderKind {
    Direct,
    RelayBundle(RelayBundleConfig),
}

pub fn create_sender(kind: SenderKind, rpc: Arc<dyn ChainRpc>) -> Arc<dyn SenderProvider> {
    match kind {
        SenderKind::Direct => Arc::new(DirectSender::new(rpc)),
        SenderKind::RelayBundle(config) => Arc::new(RelayBundleSender::new(rpc, config)),
    }
}

/// Every transaction must be paid by `payer`, and `payer` must be the signer.
pub(crate) fn check_payers(
    transactions: &[BuiltTransaction],
    payer: &Pubkey,
    signer: &Keypair,
) -> Result<(), PipelineError> {
    if signer.pubkey() != *payer {
        return Err(PipelineError::ValidationError(format!(
            "Signer {} is not the declared payer {}",
            signer.pubkey(),
            payer
        )));
    }
    for (idx, tx) in transactions.iter().enumerate() {
        if tx.payer() != payer {
            return Err(PipelineError::ValidationError(format!(
                "Transaction {} is paid by {}, expected {}",
                idx,
                tx.payer(),
                payer
            )));
        }
    }
    Ok(())
}

pub(crate) fn sign_all(
    transactions: &[BuiltTransaction],
    signer: &Keypair,
) -> Result<Vec<VersionedTransaction>, PipelineError> {
    transactions.iter().map(|tx| tx.sign(signer)).collect()
}

/// Simulates each signed transaction in order; the first failure aborts.
pub(crate) async fn simulate_all(
    rpc: &dyn ChainRpc,
    signed: &[VersionedTransaction],
) -> Result<(), PipelineError> {
    for (idx, tx) in signed.iter().enumerate() {
        let outcome = rpc.simulate_transaction(tx).await?;
        if let Some(err) = outcome.err {
            error!("[Sender] Pre-send simulation of transaction {} failed: {}", idx, err);
            return Err(PipelineError::SimulationFailed {
                error: err,
                logs: outcome.logs,
            });
        }
    }
    Ok(())
}
