// src/fees/priority.rs
use super::helius::{FeeEstimateApi, PriorityFeeLevels};
use crate::solana::ChainRpc;
use log::{debug, info, warn};
use solana_sdk::{instruction::Instruction, pubkey::Pubkey};
use std::{collections::HashSet, fmt, sync::Arc};

pub const DEFAULT_PRIORITY_FEE_MICRO_LAMPORTS: u64 = 10_000;

/// Percentile of recent on-chain samples used when the fee service is unavailable.
pub const FALLBACK_PERCENTILE: u64 = 75;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SpeedTier {
    #[default]
    Normal,
    Fast,
    Turbo,
}

impl SpeedTier {
    /// Multiplier applied to locally derived prices, as numerator/denominator.
    pub fn buffer(&self) -> (u64, u64) {
        match self {
            SpeedTier::Normal => (11, 10),
            SpeedTier::Fast => (2, 1),
            SpeedTier::Turbo => (4, 1),
        }
    }

    fn service_level(&self, levels: &PriorityFeeLevels) -> f64 {
        match self {
            SpeedTier::Normal => levels.medium,
            SpeedTier::Fast => levels.high,
            SpeedTier::Turbo => levels.very_high,
        }
    }
}

impl fmt::Display for SpeedTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SpeedTier::Normal => write!(f, "normal"),
            SpeedTier::Fast => write!(f, "fast"),
            SpeedTier::Turbo => write!(f, "turbo"),
        }
    }
}

impl std::str::FromStr for SpeedTier {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "normal" => Ok(SpeedTier::Normal),
            "fast" => Ok(SpeedTier::Fast),
            "turbo" => Ok(SpeedTier::Turbo),
            other => Err(format!("unknown speed tier '{}'", other)),
        }
    }
}

/// Writable accounts across `instructions`, deduplicated in first-seen order.
pub fn writable_accounts(instructions: &[Instruction]) -> Vec<Pubkey> {
    let mut seen = HashSet::new();
    instructions
        .iter()
        .flat_map(|ix| ix.accounts.iter())
        .filter(|meta| meta.is_writable)
        .filter(|meta| seen.insert(meta.pubkey))
        .map(|meta| meta.pubkey)
        .collect()
}

/// Linearly interpolated percentile of an ascending slice, scaled by 100.
///
/// `[10, 20, 30, 40]` at 75 gives `3250` (32.5).
pub fn percentile_x100(sorted: &[u64], percentile: u64) -> Option<u128> {
    if sorted.is_empty() {
        return None;
    }
    let span = percentile.min(100) as u128 * (sorted.len() as u128 - 1);
    let lo_idx = (span / 100) as usize;
    let rem = span % 100;
    let lo = sorted[lo_idx] as u128;
    let hi = sorted.get(lo_idx + 1).copied().unwrap_or(sorted[lo_idx]) as u128;
    Some(lo * 100 + (hi.saturating_sub(lo)) * rem)
}

/// `ceil(value_x100 / 100 * buffer)` in exact integer arithmetic.
pub fn apply_speed_buffer(value_x100: u128, speed: SpeedTier) -> u64 {
    let (num, den) = speed.buffer();
    let numerator = value_x100 * num as u128;
    let denominator = 100 * den as u128;
    let price = numerator.div_ceil(denominator);
    u64::try_from(price).unwrap_or(u64::MAX)
}

pub struct PriorityFeeEstimator {
    rpc: Arc<dyn ChainRpc>,
    fee_api: Option<Arc<dyn FeeEstimateApi>>,
    default_price: u64,
}

impl PriorityFeeEstimator {
    pub fn new(rpc: Arc<dyn ChainRpc>, fee_api: Option<Arc<dyn FeeEstimateApi>>) -> Self {
        Self {
            rpc,
            fee_api,
            default_price: DEFAULT_PRIORITY_FEE_MICRO_LAMPORTS,
        }
    }

    pub fn with_default_price(mut self, default_price: u64) -> Self {
        self.default_price = default_price;
        self
    }

    /// Micro-lamport per-CU price for `instructions` at `speed`, never above `max_price`.
    ///
    /// Does not fail: service errors fall back to recent chain samples, and
    /// those fall back to the default price.
    pub async fn estimate(
        &self,
        instructions: &[Instruction],
        speed: SpeedTier,
        max_price: Option<u64>,
    ) -> u64 {
        let accounts = writable_accounts(instructions);
        let price = match self.from_service(&accounts, speed).await {
            Some(price) => price,
            None => self.from_recent_samples(&accounts, speed).await,
        };

        match max_price {
            Some(ceiling) if price > ceiling => {
                info!(
                    "[PriorityFee] Estimated {} exceeds ceiling {}; using ceiling",
                    price, ceiling
                );
                ceiling
            }
            _ => price,
        }
    }

    async fn from_service(&self, accounts: &[Pubkey], speed: SpeedTier) -> Option<u64> {
        let api = self.fee_api.as_ref()?;
        match api.get_priority_fee_levels(accounts).await {
            Ok(levels) => {
                let level = speed.service_level(&levels);
                if !level.is_finite() || level < 0.0 {
                    warn!("[PriorityFee] Service returned unusable {} level {}", speed, level);
                    return None;
                }
                let price = level.ceil() as u64;
                debug!("[PriorityFee] Service {} level: {}", speed, price);
                Some(price)
            }
            Err(e) => {
                warn!("[PriorityFee] Fee service failed, using recent samples: {}", e);
                None
            }
        }
    }

    async fn from_recent_samples(&self, accounts: &[Pubkey], speed: SpeedTier) -> u64 {
        let mut samples = match self.rpc.get_recent_prioritization_fees(accounts).await {
            Ok(fees) => fees,
            Err(e) => {
                warn!("[PriorityFee] Recent fee query failed: {}", e);
                Vec::new()
            }
        };
        samples.retain(|fee| *fee > 0);
        samples.sort_unstable();

        let base_x100 = percentile_x100(&samples, FALLBACK_PERCENTILE).unwrap_or_else(|| {
            debug!(
                "[PriorityFee] No nonzero samples; defaulting to {}",
                self.default_price
            );
            self.default_price as u128 * 100
        });
        apply_speed_buffer(base_x100, speed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{MockChainRpc, MockFeeApi};
    use solana_sdk::instruction::AccountMeta;

    fn swap_ix(writable: &[Pubkey], readonly: &[Pubkey]) -> Instruction {
        let mut accounts: Vec<AccountMeta> =
            writable.iter().map(|k| AccountMeta::new(*k, false)).collect();
        accounts.extend(readonly.iter().map(|k| AccountMeta::new_readonly(*k, false)));
        Instruction::new_with_bytes(Pubkey::new_unique(), &[1], accounts)
    }

    #[test]
    fn test_percentile_interpolates_between_ranks() {
        assert_eq!(percentile_x100(&[10, 20, 30, 40], 75), Some(3250));
        assert_eq!(percentile_x100(&[1000, 2000, 3000], 75), Some(250_000));
        assert_eq!(percentile_x100(&[7], 75), Some(700));
        assert_eq!(percentile_x100(&[], 75), None);
    }

    #[test]
    fn test_speed_buffer_rounds_up() {
        assert_eq!(apply_speed_buffer(3250, SpeedTier::Normal), 36);
        assert_eq!(apply_speed_buffer(250_000, SpeedTier::Normal), 2750);
        assert_eq!(apply_speed_buffer(3250, SpeedTier::Fast), 65);
        assert_eq!(apply_speed_buffer(3250, SpeedTier::Turbo), 130);
    }

    #[test]
    fn test_writable_accounts_dedup_in_order() {
        let a = Pubkey::new_unique();
        let b = Pubkey::new_unique();
        let ro = Pubkey::new_unique();
        let ixs = vec![swap_ix(&[b, a], &[ro]), swap_ix(&[a], &[])];
        assert_eq!(writable_accounts(&ixs), vec![b, a]);
    }

    #[tokio::test]
    async fn test_fallback_samples_with_service_down() {
        let rpc = Arc::new(MockChainRpc::new());
        rpc.set_prioritization_fees(vec![0, 3000, 1000, 2000]);
        let api = Arc::new(MockFeeApi::failing());
        let estimator = PriorityFeeEstimator::new(rpc.clone(), Some(api.clone()));
        let x = Pubkey::new_unique();
        let y = Pubkey::new_unique();
        let readonly = Pubkey::new_unique();
        let ixs = vec![swap_ix(&[x, y], &[readonly]), swap_ix(&[y], &[readonly])];

        let price = estimator.estimate(&ixs, SpeedTier::Normal, None).await;

        assert_eq!(price, 2750);
        assert_eq!(api.calls(), 1);
        assert_eq!(api.last_accounts(), vec![x, y]);
        assert_eq!(rpc.last_fee_accounts(), vec![x, y]);
    }

    #[tokio::test]
    async fn test_service_level_selected_by_speed() {
        let rpc = Arc::new(MockChainRpc::new());
        let api = Arc::new(MockFeeApi::with_levels(PriorityFeeLevels {
            medium: 1500.2,
            high: 4000.0,
            very_high: 9000.0,
            ..PriorityFeeLevels::default()
        }));
        let estimator = PriorityFeeEstimator::new(rpc.clone(), Some(api));

        assert_eq!(estimator.estimate(&[], SpeedTier::Normal, None).await, 1501);
        assert_eq!(estimator.estimate(&[], SpeedTier::Turbo, None).await, 9000);
        assert_eq!(rpc.prioritization_fee_calls(), 0);
    }

    #[tokio::test]
    async fn test_ceiling_wins() {
        let rpc = Arc::new(MockChainRpc::new());
        rpc.set_prioritization_fees(vec![10, 20, 30, 40]);
        let estimator = PriorityFeeEstimator::new(rpc, None);

        assert_eq!(estimator.estimate(&[], SpeedTier::Normal, Some(30)).await, 30);
        assert_eq!(estimator.estimate(&[], SpeedTier::Normal, Some(100)).await, 36);
    }

    #[tokio::test]
    async fn test_default_price_without_samples() {
        let rpc = Arc::new(MockChainRpc::new());
        let estimator = PriorityFeeEstimator::new(rpc, None);
        assert_eq!(estimator.estimate(&[], SpeedTier::Normal, None).await, 11_000);
        assert_eq!(estimator.estimate(&[], SpeedTier::Fast, None).await, 20_000);
    }
}
