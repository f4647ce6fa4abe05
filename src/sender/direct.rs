// src/sender/direct.rs
use super::{check_payers, sign_all, simulate_all, SenderProvider, SubmissionId};
use crate::{error::PipelineError, solana::ChainRpc, transaction::BuiltTransaction};
use async_trait::async_trait;
use log::info;
use solana_sdk::{pubkey::Pubkey, signature::Keypair, transaction::VersionedTransaction};
use std::sync::Arc;

/// Broadcasts a single transaction straight to the RPC node.
pub struct DirectSender {
    rpc: Arc<dyn ChainRpc>,
}

impl DirectSender {
    pub fn new(rpc: Arc<dyn ChainRpc>) -> Self {
        Self { rpc }
    }
}

fn require_one<T>(items: &[T]) -> Result<(), PipelineError> {
    if items.len() != 1 {
        return Err(PipelineError::ValidationError(format!(
            "Direct sender handles exactly one transaction, got {}",
            items.len()
        )));
    }
    Ok(())
}

#[async_trait]
impl SenderProvider for DirectSender {
    async fn prepare(
        &self,
        transactions: &[BuiltTransaction],
        payer: &Pubkey,
        signer: &Keypair,
        simulate: bool,
    ) -> Result<Vec<VersionedTransaction>, PipelineError> {
        require_one(transactions)?;
        check_payers(transactions, payer, signer)?;
        let signed = sign_all(transactions, signer)?;
        if simulate {
            simulate_all(self.rpc.as_ref(), &signed).await?;
        }
        Ok(signed)
    }

    async fn send(&self, signed: &[VersionedTransaction]) -> Result<SubmissionId, PipelineError> {
        require_one(signed)?;
        let signature = self.rpc.send_transaction(&signed[0]).await?;
        info!("[DirectSender] Broadcast {}", signature);
        Ok(SubmissionId::Signature(signature))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{built_transfer, MockChainRpc};
    use solana_sdk::signer::Signer;

    #[tokio::test]
    async fn test_direct_sends_exactly_one() {
        let rpc = Arc::new(MockChainRpc::new());
        let sender = DirectSender::new(rpc.clone());
        let payer = Keypair::new();

        let two = vec![built_transfer(&payer.pubkey()), built_transfer(&payer.pubkey())];
        assert!(matches!(
            sender.prepare(&two, &payer.pubkey(), &payer, false).await,
            Err(PipelineError::ValidationError(_))
        ));

        let signed = sender
            .prepare(&two[..1], &payer.pubkey(), &payer, true)
            .await
            .unwrap();
        let id = sender.send(&signed).await.unwrap();

        assert_eq!(id, SubmissionId::Signature(signed[0].signatures[0]));
        assert_eq!(rpc.simulate_calls(), 1);
        assert_eq!(rpc.send_calls(), 1);
    }

    #[tokio::test]
    async fn test_payer_mismatch_is_rejected() {
        let sender = DirectSender::new(Arc::new(MockChainRpc::new()));
        let payer = Keypair::new();
        let other = Keypair::new();
        let txs = vec![built_transfer(&other.pubkey())];

        let result = sender.prepare(&txs, &payer.pubkey(), &payer, false).await;
        assert!(matches!(result, Err(PipelineError::ValidationError(_))));

        let result = sender.prepare(&txs, &other.pubkey(), &payer, false).await;
        assert!(matches!(result, Err(PipelineError::ValidationError(_))));
    }
}
