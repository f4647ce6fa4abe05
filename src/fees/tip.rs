// src/fees/tip.rs
//! Relay tip sizing.

use crate::{error::PipelineError, transaction::compute_budget::find_compute_budget};
use async_trait::async_trait;
use log::{debug, info};
use reqwest::Client;
use serde::Deserialize;
use solana_sdk::{
    native_token::LAMPORTS_PER_SOL, pubkey::Pubkey, transaction::VersionedTransaction,
};
use std::{sync::Arc, time::Duration};

/// Micro-lamports per lamport.
pub const TIP_SCALE_DIVISOR: u64 = 1_000_000;

/// Smallest tip the block engine accepts.
pub const MIN_TIP_LAMPORTS: u64 = 1_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TipStrategy {
    /// Mirror the priority fee already paid by the bundled transaction.
    FromPriorityFee,
    /// Use a percentile of recently landed tips.
    TipFloor { percentile: u8 },
}

/// One entry of the published tip-floor ladder, in SOL.
#[derive(Debug, Clone, Copy, Default, PartialEq, Deserialize)]
pub struct TipFloorStats {
    pub landed_tips_25th_percentile: f64,
    pub landed_tips_50th_percentile: f64,
    pub landed_tips_75th_percentile: f64,
    pub landed_tips_95th_percentile: f64,
    pub landed_tips_99th_percentile: f64,
}

impl TipFloorStats {
    /// Lamports at `percentile`; anything other than 25/50/75/95/99 reads the 75th.
    pub fn lamports_at(&self, percentile: u8) -> u64 {
        let sol = match percentile {
            25 => self.landed_tips_25th_percentile,
            50 => self.landed_tips_50th_percentile,
            95 => self.landed_tips_95th_percentile,
            99 => self.landed_tips_99th_percentile,
            _ => self.landed_tips_75th_percentile,
        };
        if !sol.is_finite() || sol <= 0.0 {
            return 0;
        }
        (sol * LAMPORTS_PER_SOL as f64).ceil() as u64
    }
}

#[async_trait]
pub trait TipFloorApi: Send + Sync {
    async fn get_tip_floor(&self) -> Result<TipFloorStats, PipelineError>;
}

#[derive(Debug, Clone)]
pub struct JitoTipFloorClient {
    client: Client,
    url: String,
}

impl JitoTipFloorClient {
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
}

#[async_trait]
impl TipFloorApi for JitoTipFloorClient {
    async fn get_tip_floor(&self) -> Result<TipFloorStats, PipelineError> {
        let response = self.client.get(&self.url).send().await?;
        if !response.status().is_success() {
            return Err(PipelineError::NetworkError(format!(
                "Tip floor endpoint returned HTTP {}",
                response.status()
            )));
        }
        let ladder: Vec<TipFloorStats> = response.json().await?;
        ladder
            .into_iter()
            .next()
            .ok_or_else(|| PipelineError::ParseError("Tip floor response was empty".to_string()))
    }
}

pub struct TipEstimator {
    strategy: TipStrategy,
    tip_floor: Option<Arc<dyn TipFloorApi>>,
    min_tip: u64,
    max_tip: Option<u64>,
}

impl TipEstimator {
    pub fn from_priority_fee() -> Self {
        Self {
            strategy: TipStrategy::FromPriorityFee,
            tip_floor: None,
            min_tip: MIN_TIP_LAMPORTS,
            max_tip: None,
        }
    }

    pub fn tip_floor(api: Arc<dyn TipFloorApi>, percentile: u8) -> Self {
        Self {
            strategy: TipStrategy::TipFloor { percentile },
            tip_floor: Some(api),
            min_tip: MIN_TIP_LAMPORTS,
            max_tip: None,
        }
    }

    pub fn with_bounds(mut self, min_tip: u64, max_tip: Option<u64>) -> Self {
        self.min_tip = min_tip;
        self.max_tip = max_tip;
        self
    }

    pub fn strategy(&self) -> TipStrategy {
        self.strategy
    }

    /// `(min, max)` lamports every estimate is clamped to.
    pub fn bounds(&self) -> (u64, Option<u64>) {
        (self.min_tip, self.max_tip)
    }

    /// Tip in lamports for a bundle led by `transaction`.
    pub async fn estimate(&self, transaction: &VersionedTransaction) -> Result<u64, PipelineError> {
        let raw = match self.strategy {
            TipStrategy::FromPriorityFee => tip_from_priority_fee(transaction)?,
            TipStrategy::TipFloor { percentile } => {
                let api = self.tip_floor.as_ref().ok_or_else(|| {
                    PipelineError::ConfigError("Tip floor strategy has no tip floor client".into())
                })?;
                let stats = api.get_tip_floor().await?;
                let tip = stats.lamports_at(percentile);
                debug!("[Tip] Tip floor p{}: {} lamports", percentile, tip);
                tip
            }
        };

        let mut tip = raw.max(self.min_tip);
        if let Some(max) = self.max_tip {
            tip = tip.min(max);
        }
        if tip != raw {
            info!("[Tip] Clamped tip {} -> {} lamports", raw, tip);
        }
        Ok(tip)
    }
}

/// `limit × price / TIP_SCALE_DIVISOR`, reading the budget instructions wherever they sit.
pub fn tip_from_priority_fee(transaction: &VersionedTransaction) -> Result<u64, PipelineError> {
    let message = &transaction.message;
    let keys = message.static_account_keys();
    let decoded: Vec<(Pubkey, &[u8])> = message
        .instructions()
        .iter()
        .filter_map(|ix| {
            keys.get(ix.program_id_index as usize)
                .map(|program| (*program, ix.data.as_slice()))
        })
        .collect();

    let budget = find_compute_budget(decoded.iter().map(|(p, d)| (p, *d)));
    let limit = budget.unit_limit.ok_or_else(|| {
        PipelineError::ValidationError("Transaction has no SetComputeUnitLimit instruction".into())
    })?;
    let price = budget.unit_price.ok_or_else(|| {
        PipelineError::ValidationError("Transaction has no SetComputeUnitPrice instruction".into())
    })?;

    let tip = (limit as u128 * price as u128) / TIP_SCALE_DIVISOR as u128;
    Ok(u64::try_from(tip).unwrap_or(u64::MAX))
}
