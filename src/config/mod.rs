pub mod settings;

pub use settings::Config;

use crate::{
    error::PipelineError,
    fees::{SpeedTier, TipEstimator, TipFloorApi},
    sender::{RelayApi, RelayBundleConfig, SenderKind},
    transaction::{ComputeBudgetConfig, ComputeBudgetMode, FeeDestination},
    utils::load_keypair,
};
use solana_sdk::{pubkey::Pubkey, signature::Keypair};
use std::{str::FromStr, sync::Arc, time::Duration};

/// Loads `.env` (if present), reads the environment and validates the result.
///
/// Nothing is logged here; call [`Config::validate_and_log`] once logging is up.
pub fn load_config() -> Result<Arc<Config>, PipelineError> {
    dotenv::dotenv().ok();

    let config = Config::from_env();
    validate(&config)?;

    Ok(Arc::new(config))
}

pub fn validate(config: &Config) -> Result<(), PipelineError> {
    if config.rpc_url.is_empty() {
        return Err(PipelineError::ConfigError("RPC_URL cannot be empty".to_string()));
    }
    if !matches!(config.sender_kind.as_str(), "direct" | "jito") {
        return Err(PipelineError::ConfigError(format!(
            "SENDER_KIND must be 'direct' or 'jito', got '{}'",
            config.sender_kind
        )));
    }
    if !matches!(config.tip_strategy.as_str(), "priority_fee" | "tip_floor") {
        return Err(PipelineError::ConfigError(format!(
            "TIP_STRATEGY must be 'priority_fee' or 'tip_floor', got '{}'",
            config.tip_strategy
        )));
    }
    if config.leader_poll_interval_ms == 0 {
        return Err(PipelineError::ConfigError(
            "LEADER_POLL_INTERVAL_MS must be positive".to_string(),
        ));
    }
    if config.max_leader_polls == 0 {
        return Err(PipelineError::ConfigError(
            "MAX_LEADER_POLLS must be positive".to_string(),
        ));
    }
    if let (min, Some(max)) = (config.min_tip_lamports, config.max_tip_lamports) {
        if max < min {
            return Err(PipelineError::ConfigError(format!(
                "MAX_TIP_LAMPORTS ({}) is below MIN_TIP_LAMPORTS ({})",
                max, min
            )));
        }
    }
    if let Some(program_id) = &config.protocol_program_id {
        Pubkey::from_str(program_id).map_err(|e| {
            PipelineError::ConfigError(format!("PROTOCOL_PROGRAM_ID is not a pubkey: {}", e))
        })?;
    }
    Ok(())
}

impl Config {
    pub fn http_timeout(&self) -> Duration {
        Duration::from_millis(self.http_timeout_ms)
    }

    /// TTL for account and mint caches; `None` keeps entries until invalidated.
    pub fn account_cache_ttl(&self) -> Option<Duration> {
        self.account_cache_ttl_secs.map(Duration::from_secs)
    }

    pub fn protocol_program(&self) -> Result<Option<Pubkey>, PipelineError> {
        self.protocol_program_id
            .as_deref()
            .map(|id| {
                Pubkey::from_str(id).map_err(|e| {
                    PipelineError::ConfigError(format!("PROTOCOL_PROGRAM_ID is not a pubkey: {}", e))
                })
            })
            .transpose()
    }

    /// Dynamic, priced budget at `speed`, capped at the configured maximum price.
    pub fn compute_budget(&self, speed: SpeedTier) -> Result<ComputeBudgetConfig, PipelineError> {
        ComputeBudgetConfig::new(
            FeeDestination::Priced,
            ComputeBudgetMode::Dynamic {
                speed,
                max_price: Some(self.max_priority_fee_micro_lamports),
            },
            None,
            self.compute_unit_buffer_pct,
        )
    }

    /// Tip estimator for `TIP_STRATEGY`. `tip_floor` is only used by the
    /// `tip_floor` strategy.
    pub fn tip_estimator(
        &self,
        tip_floor: Arc<dyn TipFloorApi>,
    ) -> Result<TipEstimator, PipelineError> {
        let estimator = match self.tip_strategy.as_str() {
            "priority_fee" => TipEstimator::from_priority_fee(),
            "tip_floor" => TipEstimator::tip_floor(tip_floor, self.tip_percentile),
            other => {
                return Err(PipelineError::ConfigError(format!(
                    "Unknown TIP_STRATEGY '{}'",
                    other
                )))
            }
        };
        Ok(estimator.with_bounds(self.min_tip_lamports, self.max_tip_lamports))
    }

    /// Submission path for `SENDER_KIND`. `relay` and `tips` are only used by `jito`.
    pub fn sender_kind(
        &self,
        relay: Arc<dyn RelayApi>,
        tips: Arc<TipEstimator>,
    ) -> Result<SenderKind, PipelineError> {
        match self.sender_kind.as_str() {
            "direct" => Ok(SenderKind::Direct),
            "jito" => {
                let mut bundle = RelayBundleConfig::new(relay, tips);
                bundle.leader_poll_interval = Duration::from_millis(self.leader_poll_interval_ms);
                bundle.max_leader_polls = self.max_leader_polls;
                bundle.bundle_confirm_timeout = Duration::from_secs(self.bundle_confirm_timeout_secs);
                Ok(SenderKind::RelayBundle(bundle))
            }
            other => Err(PipelineError::ConfigError(format!(
                "Unknown SENDER_KIND '{}'",
                other
            ))),
        }
    }

    pub fn load_trader_keypair(&self) -> Result<Keypair, PipelineError> {
        load_keypair(&self.trader_wallet_keypair_path)
    }
}
