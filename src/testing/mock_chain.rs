//! Mock chain, fee, tip-floor and relay endpoints with call counters.

use crate::{
    error::PipelineError,
    fees::{FeeEstimateApi, PriorityFeeLevels, TipFloorApi, TipFloorStats},
    sender::{BundleStatus, NextLeader, RelayApi},
    solana::{ChainRpc, SimulationOutcome},
    transaction::compute_budget::find_compute_budget,
};
use async_trait::async_trait;
use solana_sdk::{
    account::Account, hash::Hash, pubkey::Pubkey, signature::Signature,
    transaction::VersionedTransaction,
};
use std::{
    collections::{HashMap, VecDeque},
    sync::{
        atomic::{AtomicUsize, Ordering},
        Mutex,
    },
};

pub struct MockChainRpc {
    accounts: Mutex<HashMap<Pubkey, Account>>,
    prioritization_fees: Mutex<Vec<u64>>,
    last_fee_accounts: Mutex<Vec<Pubkey>>,
    simulation: Mutex<SimulationOutcome>,
    blockhash: Hash,
    last_simulated: Mutex<Option<VersionedTransaction>>,
    sent: Mutex<Vec<VersionedTransaction>>,
    multiple_accounts_calls: AtomicUsize,
    last_batch_len: AtomicUsize,
    prioritization_fee_calls: AtomicUsize,
    simulate_calls: AtomicUsize,
    send_calls: AtomicUsize,
}

impl Default for MockChainRpc {
    fn default() -> Self {
        Self::new()
    }
}

impl MockChainRpc {
    pub fn new() -> Self {
        Self {
            accounts: Mutex::new(HashMap::new()),
            prioritization_fees: Mutex::new(Vec::new()),
            last_fee_accounts: Mutex::new(Vec::new()),
            simulation: Mutex::new(SimulationOutcome::default()),
            blockhash: Hash::new_unique(),
            last_simulated: Mutex::new(None),
            sent: Mutex::new(Vec::new()),
            multiple_accounts_calls: AtomicUsize::new(0),
            last_batch_len: AtomicUsize::new(0),
            prioritization_fee_calls: AtomicUsize::new(0),
            simulate_calls: AtomicUsize::new(0),
            send_calls: AtomicUsize::new(0),
        }
    }

    pub fn set_account(&self, address: Pubkey, account: Account) {
        self.accounts.lock().unwrap().insert(address, account);
    }

    pub fn set_prioritization_fees(&self, fees: Vec<u64>) {
        *self.prioritization_fees.lock().unwrap() = fees;
    }

    pub fn set_simulation(&self, outcome: SimulationOutcome) {
        *self.simulation.lock().unwrap() = outcome;
    }

    pub fn blockhash(&self) -> Hash {
        self.blockhash
    }

    pub fn multiple_accounts_calls(&self) -> usize {
        self.multiple_accounts_calls.load(Ordering::SeqCst)
    }

    pub fn last_batch_len(&self) -> usize {
        self.last_batch_len.load(Ordering::SeqCst)
    }

    pub fn prioritization_fee_calls(&self) -> usize {
        self.prioritization_fee_calls.load(Ordering::SeqCst)
    }

    /// Accounts passed to the most recent prioritization-fee query.
    pub fn last_fee_accounts(&self) -> Vec<Pubkey> {
        self.last_fee_accounts.lock().unwrap().clone()
    }

    pub fn simulate_calls(&self) -> usize {
        self.simulate_calls.load(Ordering::SeqCst)
    }

    pub fn send_calls(&self) -> usize {
        self.send_calls.load(Ordering::SeqCst)
    }

    pub fn sent_transactions(&self) -> Vec<VersionedTransaction> {
        self.sent.lock().unwrap().clone()
    }

    /// Compute-unit limit carried by the most recently simulated transaction.
    pub fn last_simulated_limit(&self) -> Option<u32> {
        let guard = self.last_simulated.lock().unwrap();
        let tx = guard.as_ref()?;
        let keys = tx.message.static_account_keys();
        let decoded: Vec<(Pubkey, &[u8])> = tx
            .message
            .instructions()
            .iter()
            .filter_map(|ix| {
                keys.get(ix.program_id_index as usize)
                    .map(|program| (*program, ix.data.as_slice()))
            })
            .collect();
        find_compute_budget(decoded.iter().map(|(p, d)| (p, *d))).unit_limit
    }
}

#[async_trait]
impl ChainRpc for MockChainRpc {
    async fn get_multiple_accounts(
        &self,
        addresses: &[Pubkey],
    ) -> Result<Vec<Option<Account>>, PipelineError> {
        self.multiple_accounts_calls.fetch_add(1, Ordering::SeqCst);
        self.last_batch_len.store(addresses.len(), Ordering::SeqCst);
        let accounts = self.accounts.lock().unwrap();
        Ok(addresses.iter().map(|a| accounts.get(a).cloned()).collect())
    }

    async fn get_latest_blockhash(&self) -> Result<Hash, PipelineError> {
        Ok(self.blockhash)
    }

    async fn simulate_transaction(
        &self,
        transaction: &VersionedTransaction,
    ) -> Result<SimulationOutcome, PipelineError> {
        self.simulate_calls.fetch_add(1, Ordering::SeqCst);
        *self.last_simulated.lock().unwrap() = Some(transaction.clone());
        Ok(self.simulation.lock().unwrap().clone())
    }

    async fn send_transaction(
        &self,
        transaction: &VersionedTransaction,
    ) -> Result<Signature, PipelineError> {
        self.send_calls.fetch_add(1, Ordering::SeqCst);
        self.sent.lock().unwrap().push(transaction.clone());
        transaction
            .signatures
            .first()
            .copied()
            .ok_or_else(|| PipelineError::SendError("unsigned transaction".to_string()))
    }

    async fn get_recent_prioritization_fees(
        &self,
        accounts: &[Pubkey],
    ) -> Result<Vec<u64>, PipelineError> {
        self.prioritization_fee_calls.fetch_add(1, Ordering::SeqCst);
        *self.last_fee_accounts.lock().unwrap() = accounts.to_vec();
        Ok(self.prioritization_fees.lock().unwrap().clone())
    }
}

pub struct MockFeeApi {
    levels: Option<PriorityFeeLevels>,
    last_accounts: Mutex<Vec<Pubkey>>,
    calls: AtomicUsize,
}

impl MockFeeApi {
    pub fn with_levels(levels: PriorityFeeLevels) -> Self {
        Self {
            levels: Some(levels),
            last_accounts: Mutex::new(Vec::new()),
            calls: AtomicUsize::new(0),
        }
    }

    /// Every request fails as if the service were down.
    pub fn failing() -> Self {
        Self {
            levels: None,
            last_accounts: Mutex::new(Vec::new()),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn last_accounts(&self) -> Vec<Pubkey> {
        self.last_accounts.lock().unwrap().clone()
    }
}

#[async_trait]
impl FeeEstimateApi for MockFeeApi {
    async fn get_priority_fee_levels(
        &self,
        writable_accounts: &[Pubkey],
    ) -> Result<PriorityFeeLevels, PipelineError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last_accounts.lock().unwrap() = writable_accounts.to_vec();
        self.levels
            .ok_or_else(|| PipelineError::NetworkError("fee service unavailable".to_string()))
    }
}

pub struct MockTipFloorApi {
    stats: TipFloorStats,
}

impl MockTipFloorApi {
    pub fn new(stats: TipFloorStats) -> Self {
        Self { stats }
    }
}

#[async_trait]
impl TipFloorApi for MockTipFloorApi {
    async fn get_tip_floor(&self) -> Result<TipFloorStats, PipelineError> {
        Ok(self.stats)
    }
}

pub struct MockRelay {
    tip_accounts: Vec<Pubkey>,
    leaders: Mutex<VecDeque<NextLeader>>,
    statuses: Mutex<HashMap<String, BundleStatus>>,
    reject_bundles: bool,
    unreachable_statuses: bool,
    leader_calls: AtomicUsize,
    status_calls: AtomicUsize,
    send_bundle_calls: AtomicUsize,
    last_bundle_len: AtomicUsize,
}

impl Default for MockRelay {
    fn default() -> Self {
        Self::new()
    }
}

impl MockRelay {
    pub fn new() -> Self {
        Self {
            tip_accounts: (0..8).map(|_| Pubkey::new_unique()).collect(),
            leaders: Mutex::new(VecDeque::new()),
            statuses: Mutex::new(HashMap::new()),
            reject_bundles: false,
            unreachable_statuses: false,
            leader_calls: AtomicUsize::new(0),
            status_calls: AtomicUsize::new(0),
            send_bundle_calls: AtomicUsize::new(0),
            last_bundle_len: AtomicUsize::new(0),
        }
    }

    /// A relay that refuses every bundle.
    pub fn rejecting() -> Self {
        Self {
            reject_bundles: true,
            ..Self::new()
        }
    }

    /// A relay whose status endpoint cannot be reached.
    pub fn with_unreachable_statuses() -> Self {
        Self {
            unreachable_statuses: true,
            ..Self::new()
        }
    }

    pub fn tip_accounts(&self) -> Vec<Pubkey> {
        self.tip_accounts.clone()
    }

    /// Queues a leader response. Once the queue is empty the leader is one slot away.
    pub fn push_leader(&self, current_slot: u64, next_leader_slot: u64) {
        self.leaders.lock().unwrap().push_back(NextLeader {
            current_slot,
            next_leader_slot,
            next_leader_identity: None,
        });
    }

    pub fn set_bundle_status(&self, status: BundleStatus) {
        self.statuses
            .lock()
            .unwrap()
            .insert(status.bundle_id.clone(), status);
    }

    pub fn leader_calls(&self) -> usize {
        self.leader_calls.load(Ordering::SeqCst)
    }

    pub fn status_calls(&self) -> usize {
        self.status_calls.load(Ordering::SeqCst)
    }

    pub fn send_bundle_calls(&self) -> usize {
        self.send_bundle_calls.load(Ordering::SeqCst)
    }

    pub fn last_bundle_len(&self) -> usize {
        self.last_bundle_len.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RelayApi for MockRelay {
    async fn get_tip_accounts(&self) -> Result<Vec<Pubkey>, PipelineError> {
        Ok(self.tip_accounts.clone())
    }

    async fn get_next_scheduled_leader(&self) -> Result<NextLeader, PipelineError> {
        self.leader_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self
            .leaders
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(NextLeader {
                current_slot: 100,
                next_leader_slot: 101,
                next_leader_identity: None,
            }))
    }

    async fn send_bundle(&self, transactions: Vec<String>) -> Result<String, PipelineError> {
        let n = self.send_bundle_calls.fetch_add(1, Ordering::SeqCst) + 1;
        self.last_bundle_len.store(transactions.len(), Ordering::SeqCst);
        if self.reject_bundles {
            return Err(PipelineError::SendError("sendBundle rejected: bundle dropped".into()));
        }
        Ok(format!("bundle-{}", n))
    }

    async fn get_bundle_statuses(
        &self,
        bundle_ids: &[String],
    ) -> Result<Vec<BundleStatus>, PipelineError> {
        self.status_calls.fetch_add(1, Ordering::SeqCst);
        if self.unreachable_statuses {
            return Err(PipelineError::SendError(
                "getBundleStatuses failed: relay unreachable".into(),
            ));
        }
        let statuses = self.statuses.lock().unwrap();
        Ok(bundle_ids
            .iter()
            .filter_map(|id| statuses.get(id).cloned())
            .collect())
    }
}
