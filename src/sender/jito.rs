// src/sender/jito.rs
//! Atomic bundle submission through a Jito-style block engine.

use super::{check_payers, sign_all, simulate_all, SenderProvider, SubmissionId};
use crate::{
    error::PipelineError,
    fees::TipEstimator,
    solana::ChainRpc,
    transaction::BuiltTransaction,
};
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use log::{debug, info, warn};
use rand::seq::SliceRandom;
use reqwest::Client;
use serde::{de::DeserializeOwned, Deserialize};
use serde_json::{json, Value};
use solana_sdk::{
    pubkey::Pubkey, signature::Keypair, system_instruction, transaction::VersionedTransaction,
};
use std::{
    str::FromStr,
    sync::Arc,
    time::{Duration, Instant},
};
use tokio::{sync::OnceCell, time::sleep};

/// Block engine limit on transactions per bundle, tip included.
pub const MAX_BUNDLE_SIZE: usize = 5;

/// Submit once the next leader is at most this many slots away.
pub const LEADER_SLOT_THRESHOLD: u64 = 2;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NextLeader {
    pub current_slot: u64,
    pub next_leader_slot: u64,
    #[serde(default)]
    pub next_leader_identity: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct BundleStatus {
    pub bundle_id: String,
    #[serde(default)]
    pub transactions: Vec<String>,
    #[serde(default)]
    pub slot: Option<u64>,
    #[serde(default)]
    pub confirmation_status: Option<String>,
    #[serde(default)]
    pub err: Option<Value>,
}

impl BundleStatus {
    pub fn is_landed(&self) -> bool {
        matches!(
            self.confirmation_status.as_deref(),
            Some("confirmed") | Some("finalized")
        )
    }

    /// The engine reports success as `{"Ok": null}`.
    pub fn error(&self) -> Option<String> {
        match &self.err {
            None | Some(Value::Null) => None,
            Some(Value::Object(map)) if map.contains_key("Ok") => None,
            Some(other) => Some(other.to_string()),
        }
    }
}

#[async_trait]
pub trait RelayApi: Send + Sync {
    async fn get_tip_accounts(&self) -> Result<Vec<Pubkey>, PipelineError>;

    async fn get_next_scheduled_leader(&self) -> Result<NextLeader, PipelineError>;

    /// `transactions` are base64-encoded wire transactions. Returns the bundle id.
    async fn send_bundle(&self, transactions: Vec<String>) -> Result<String, PipelineError>;

    async fn get_bundle_statuses(
        &self,
        bundle_ids: &[String],
    ) -> Result<Vec<BundleStatus>, PipelineError>;
}

#[derive(Debug, Deserialize)]
struct JsonRpcResponse<T> {
    result: Option<T>,
    error: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct ContextValue<T> {
    value: T,
}

/// JSON-RPC client for the block engine bundle API.
#[derive(Debug, Clone)]
pub struct JitoRelayClient {
    client: Client,
    url: String,
}

impl JitoRelayClient {
    pub fn new(url: &str, timeout: Duration) -> Result<Self, PipelineError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| PipelineError::ConfigError(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self {
            client,
            url: url.to_string(),
        })
    }

    async fn call<T: DeserializeOwned>(&self, method: &str, params: Value) -> Result<T, PipelineError> {
        let request = json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": method,
            "params": params,
        });
        let response = self
            .client
            .post(&self.url)
            .json(&request)
            .send()
            .await
            .map_err(|e| PipelineError::SendError(format!("{} unreachable: {}", method, e)))?;
        if !response.status().is_success() {
            return Err(PipelineError::SendError(format!(
                "{} returned HTTP {}",
                method,
                response.status()
            )));
        }
        let body: JsonRpcResponse<T> = response.json().await?;
        if let Some(error) = body.error {
            return Err(PipelineError::SendError(format!("{} rejected: {}", method, error)));
        }
        body.result
            .ok_or_else(|| PipelineError::ParseError(format!("{} returned no result", method)))
    }
}

#[async_trait]
impl RelayApi for JitoRelayClient {
    async fn get_tip_accounts(&self) -> Result<Vec<Pubkey>, PipelineError> {
        let accounts: Vec<String> = self.call("getTipAccounts", json!([])).await?;
        accounts
            .iter()
            .map(|a| {
                Pubkey::from_str(a).map_err(|e| {
                    PipelineError::ParseError(format!("Bad tip account '{}': {}", a, e))
                })
            })
            .collect()
    }

    async fn get_next_scheduled_leader(&self) -> Result<NextLeader, PipelineError> {
        self.call("getNextScheduledLeader", json!([])).await
    }

    async fn send_bundle(&self, transactions: Vec<String>) -> Result<String, PipelineError> {
        self.call("sendBundle", json!([transactions, { "encoding": "base64" }]))
            .await
    }

    async fn get_bundle_statuses(
        &self,
        bundle_ids: &[String],
    ) -> Result<Vec<BundleStatus>, PipelineError> {
        let result: ContextValue<Vec<BundleStatus>> =
            self.call("getBundleStatuses", json!([bundle_ids])).await?;
        Ok(result.value)
    }
}

pub struct RelayBundleConfig {
    pub relay: Arc<dyn RelayApi>,
    pub tip_estimator: Arc<TipEstimator>,
    pub leader_poll_interval: Duration,
    pub max_leader_polls: u32,
    pub bundle_confirm_timeout: Duration,
}

impl RelayBundleConfig {
    pub fn new(relay: Arc<dyn RelayApi>, tip_estimator: Arc<TipEstimator>) -> Self {
        Self {
            relay,
            tip_estimator,
            leader_poll_interval: Duration::from_millis(500),
            max_leader_polls: 120,
            bundle_confirm_timeout: Duration::from_secs(30),
        }
    }
}

pub struct RelayBundleSender {
    rpc: Arc<dyn ChainRpc>,
    config: RelayBundleConfig,
    tip_accounts: OnceCell<Vec<Pubkey>>,
}

impl RelayBundleSender {
    pub fn new(rpc: Arc<dyn ChainRpc>, config: RelayBundleConfig) -> Self {
        Self {
            rpc,
            config,
            tip_accounts: OnceCell::new(),
        }
    }

    async fn pick_tip_account(&self) -> Result<Pubkey, PipelineError> {
        let accounts = self
            .tip_accounts
            .get_or_try_init(|| self.config.relay.get_tip_accounts())
            .await?;
        accounts
            .choose(&mut rand::thread_rng())
            .copied()
            .ok_or_else(|| PipelineError::SendError("Relay published no tip accounts".to_string()))
    }

    async fn tip_transaction(
        &self,
        lead: &VersionedTransaction,
        payer: &Pubkey,
        signer: &Keypair,
    ) -> Result<VersionedTransaction, PipelineError> {
        let tip = self.config.tip_estimator.estimate(lead).await?;
        let tip_account = self.pick_tip_account().await?;
        info!("[Bundle] Tipping {} lamports to {}", tip, tip_account);
        let transfer = system_instruction::transfer(payer, &tip_account, tip);
        let built = BuiltTransaction::compile(
            *payer,
            *lead.message.recent_blockhash(),
            vec![transfer],
            Vec::new(),
            true,
        )?;
        built.sign(signer)
    }

    /// Polls until the next leader is within [`LEADER_SLOT_THRESHOLD`] slots.
    async fn wait_for_leader(&self) -> Result<NextLeader, PipelineError> {
        for poll in 0..self.config.max_leader_polls {
            let leader = self.config.relay.get_next_scheduled_leader().await?;
            let gap = leader.next_leader_slot.saturating_sub(leader.current_slot);
            if gap <= LEADER_SLOT_THRESHOLD {
                debug!(
                    "[Bundle] Leader slot {} is {} slot(s) away after {} poll(s)",
                    leader.next_leader_slot,
                    gap,
                    poll + 1
                );
                return Ok(leader);
            }
            if poll + 1 < self.config.max_leader_polls {
                sleep(self.config.leader_poll_interval).await;
            }
        }
        Err(PipelineError::TimeoutError(format!(
            "No leader within {} slots after {} polls",
            LEADER_SLOT_THRESHOLD, self.config.max_leader_polls
        )))
    }

    /// Waits for `bundle_id` to land as confirmed or finalized.
    pub async fn confirm_bundle(&self, bundle_id: &str) -> Result<BundleStatus, PipelineError> {
        let started = Instant::now();
        let ids = [bundle_id.to_string()];
        loop {
            if started.elapsed() > self.config.bundle_confirm_timeout {
                return Err(PipelineError::TimeoutError(format!(
                    "Bundle {} not confirmed within {:?}",
                    bundle_id, self.config.bundle_confirm_timeout
                )));
            }
            let statuses = self
                .config
                .relay
                .get_bundle_statuses(&ids)
                .await
                .map_err(|e| {
                    warn!("[Bundle] Status poll for {} failed: {}", bundle_id, e);
                    e
                })?;
            if let Some(status) = statuses.into_iter().find(|s| s.bundle_id == bundle_id) {
                if let Some(err) = status.error() {
                    return Err(PipelineError::SendError(format!(
                        "Bundle {} failed: {}",
                        bundle_id, err
                    )));
                }
                if status.is_landed() {
                    info!("[Bundle] {} landed in slot {:?}", bundle_id, status.slot);
                    return Ok(status);
                }
            }
            sleep(self.config.leader_poll_interval).await;
        }
    }
}

fn encode_transaction(tx: &VersionedTransaction) -> Result<String, PipelineError> {
    let bytes = bincode::serialize(tx)
        .map_err(|e| PipelineError::ParseError(format!("Failed to serialize transaction: {}", e)))?;
    Ok(BASE64.encode(bytes))
}

#[async_trait]
impl SenderProvider for RelayBundleSender {
    async fn prepare(
        &self,
        transactions: &[BuiltTransaction],
        payer: &Pubkey,
        signer: &Keypair,
        simulate: bool,
    ) -> Result<Vec<VersionedTransaction>, PipelineError> {
        if transactions.is_empty() {
            return Err(PipelineError::ValidationError(
                "No transactions to prepare".to_string(),
            ));
        }
        if transactions.len() >= MAX_BUNDLE_SIZE {
            return Err(PipelineError::ValidationError(format!(
                "{} transactions plus a tip exceed the bundle limit of {}",
                transactions.len(),
                MAX_BUNDLE_SIZE
            )));
        }
        check_payers(transactions, payer, signer)?;
        let mut signed = sign_all(transactions, signer)?;
        if simulate {
            simulate_all(self.rpc.as_ref(), &signed).await?;
        }

        // A lone transaction gains nothing from bundling and goes out as a plain broadcast.
        if signed.len() >= 2 {
            let tip_tx = self.tip_transaction(&signed[0], payer, signer).await?;
            signed.push(tip_tx);
        }
        Ok(signed)
    }

    async fn send(&self, signed: &[VersionedTransaction]) -> Result<SubmissionId, PipelineError> {
        match signed.len() {
            0 => Err(PipelineError::ValidationError(
                "No transactions to send".to_string(),
            )),
            1 => {
                let signature = self.rpc.send_transaction(&signed[0]).await?;
                info!("[Bundle] Single transaction broadcast directly: {}", signature);
                Ok(SubmissionId::Signature(signature))
            }
            n if n > MAX_BUNDLE_SIZE => Err(PipelineError::ValidationError(format!(
                "Bundle of {} exceeds the limit of {}",
                n, MAX_BUNDLE_SIZE
            ))),
            _ => {
                let encoded = signed
                    .iter()
                    .map(encode_transaction)
                    .collect::<Result<Vec<_>, _>>()?;
                self.wait_for_leader().await?;
                let bundle_id = self.config.relay.send_bundle(encoded).await?;
                info!(
                    "[Bundle] Submitted bundle {} with {} transaction(s)",
                    bundle_id,
                    signed.len()
                );
                Ok(SubmissionId::Bundle(bundle_id))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{budgeted_transfer, MockChainRpc, MockRelay};
    use solana_sdk::{signer::Signer, system_program};

    fn sender(rpc: Arc<MockChainRpc>, relay: Arc<MockRelay>) -> RelayBundleSender {
        let mut config = RelayBundleConfig::new(relay, Arc::new(TipEstimator::from_priority_fee()));
        config.leader_poll_interval = Duration::from_millis(1);
        config.max_leader_polls = 5;
        config.bundle_confirm_timeout = Duration::from_millis(50);
        RelayBundleSender::new(rpc, config)
    }

    #[tokio::test]
    async fn test_single_transaction_is_not_bundled() {
        let rpc = Arc::new(MockChainRpc::new());
        let relay = Arc::new(MockRelay::new());
        let sender = sender(rpc.clone(), relay.clone());
        let payer = Keypair::new();

        let signed = sender
            .prepare(&[budgeted_transfer(&payer.pubkey())], &payer.pubkey(), &payer, false)
            .await
            .unwrap();
        assert_eq!(signed.len(), 1);

        let id = sender.send(&signed).await.unwrap();
        assert!(matches!(id, SubmissionId::Signature(_)));
        assert_eq!(relay.send_bundle_calls(), 0);
        assert_eq!(rpc.send_calls(), 1);
    }

    #[tokio::test]
    async fn test_two_transactions_get_one_tip_and_one_bundle() {
        let rpc = Arc::new(MockChainRpc::new());
        let relay = Arc::new(MockRelay::new());
        let sender = sender(rpc.clone(), relay.clone());
        let payer = Keypair::new();
        let txs = vec![
            budgeted_transfer(&payer.pubkey()),
            budgeted_transfer(&payer.pubkey()),
        ];

        let signed = sender
            .prepare(&txs, &payer.pubkey(), &payer, false)
            .await
            .unwrap();
        assert_eq!(signed.len(), 3);

        let tip_tx = &signed[2];
        let keys = tip_tx.message.static_account_keys();
        let ix = &tip_tx.message.instructions()[0];
        assert_eq!(keys[ix.program_id_index as usize], system_program::id());
        assert!(relay.tip_accounts().contains(&keys[ix.accounts[1] as usize]));

        let id = sender.send(&signed).await.unwrap();
        assert_eq!(id, SubmissionId::Bundle("bundle-1".to_string()));
        assert_eq!(relay.send_bundle_calls(), 1);
        assert_eq!(relay.last_bundle_len(), 3);
        assert_eq!(rpc.send_calls(), 0);
    }

    #[tokio::test]
    async fn test_waits_for_leader_window() {
        let rpc = Arc::new(MockChainRpc::new());
        let relay = Arc::new(MockRelay::new());
        relay.push_leader(100, 110);
        relay.push_leader(105, 110);
        relay.push_leader(108, 110);
        let sender = sender(rpc, relay.clone());

        let leader = sender.wait_for_leader().await.unwrap();

        assert_eq!(leader.current_slot, 108);
        assert_eq!(relay.leader_calls(), 3);
    }

    #[tokio::test]
    async fn test_leader_poll_is_bounded() {
        let relay = Arc::new(MockRelay::new());
        for _ in 0..10 {
            relay.push_leader(100, 200);
        }
        let sender = sender(Arc::new(MockChainRpc::new()), relay.clone());

        let result = sender.wait_for_leader().await;

        assert!(matches!(result, Err(PipelineError::TimeoutError(_))));
        assert_eq!(relay.leader_calls(), 5);
    }

    #[tokio::test]
    async fn test_leader_timeout_returns_without_a_final_sleep() {
        let relay = Arc::new(MockRelay::new());
        relay.push_leader(100, 200);
        let mut config =
            RelayBundleConfig::new(relay.clone(), Arc::new(TipEstimator::from_priority_fee()));
        config.leader_poll_interval = Duration::from_secs(30);
        config.max_leader_polls = 1;
        let sender = RelayBundleSender::new(Arc::new(MockChainRpc::new()), config);

        let result = tokio::time::timeout(Duration::from_secs(1), sender.wait_for_leader())
            .await
            .expect("leader wait should not sleep after its last poll");

        assert!(matches!(result, Err(PipelineError::TimeoutError(_))));
        assert_eq!(relay.leader_calls(), 1);
    }

    #[tokio::test]
    async fn test_bundle_size_limit() {
        let sender = sender(Arc::new(MockChainRpc::new()), Arc::new(MockRelay::new()));
        let payer = Keypair::new();
        let txs: Vec<_> = (0..MAX_BUNDLE_SIZE)
            .map(|_| budgeted_transfer(&payer.pubkey()))
            .collect();
        let result = sender.prepare(&txs, &payer.pubkey(), &payer, false).await;
        assert!(matches!(result, Err(PipelineError::ValidationError(_))));
    }

    #[tokio::test]
    async fn test_confirm_bundle() {
        let relay = Arc::new(MockRelay::new());
        relay.set_bundle_status(BundleStatus {
            bundle_id: "bundle-9".to_string(),
            transactions: vec![],
            slot: Some(42),
            confirmation_status: Some("confirmed".to_string()),
            err: Some(json!({ "Ok": null })),
        });
        let sender = sender(Arc::new(MockChainRpc::new()), relay);
        let status = sender.confirm_bundle("bundle-9").await.unwrap();
        assert_eq!(status.slot, Some(42));

        let missing = sender.confirm_bundle("bundle-unknown").await;
        assert!(matches!(missing, Err(PipelineError::TimeoutError(_))));
    }

    #[tokio::test]
    async fn test_status_poll_failure_surfaces_as_send_error() {
        let relay = Arc::new(MockRelay::with_unreachable_statuses());
        let mut config = RelayBundleConfig::new(
            relay.clone(),
            Arc::new(TipEstimator::from_priority_fee()),
        );
        config.leader_poll_interval = Duration::from_millis(1);
        config.bundle_confirm_timeout = Duration::from_secs(5);
        let sender = RelayBundleSender::new(Arc::new(MockChainRpc::new()), config);

        let result = sender.confirm_bundle("bundle-1").await;

        assert!(matches!(result, Err(PipelineError::SendError(_))));
        assert_eq!(relay.status_calls(), 1);
    }

    #[test]
    fn test_bundle_status_parsing() {
        let body = r#"{
            "context": { "slot": 242806119 },
            "value": [{
                "bundle_id": "892b79ed49138bfb3aa5441f0df6e06ef34f9ee8f3976c15b323605bae0cf51d",
                "transactions": ["3bC2M9fiACSjkTXZDgeNAuQ4ScTsdKGwR42ytFdhUvikqTmBheUxfsR1fDVsM5ADCMMspuwGkdm1uKbU246x5aE3"],
                "slot": 242804011,
                "confirmation_status": "finalized",
                "err": { "Ok": null }
            }]
        }"#;
        let parsed: ContextValue<Vec<BundleStatus>> = serde_json::from_str(body).unwrap();
        assert!(parsed.value[0].is_landed());
        assert_eq!(parsed.value[0].error(), None);
    }

    #[test]
    fn test_next_leader_parsing() {
        let body = r#"{"currentSlot": 100, "nextLeaderSlot": 102,
            "nextLeaderIdentity": "11111111111111111111111111111111"}"#;
        let leader: NextLeader = serde_json::from_str(body).unwrap();
        assert_eq!(leader.next_leader_slot, 102);
        assert!(leader.next_leader_identity.is_some());
    }
}
