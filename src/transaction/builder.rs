// src/transaction/builder.rs
//! Two-pass transaction construction: price, compile, simulate once, tighten the limit.

use super::{
    compute_budget::{buffered_unit_limit, ComputeBudgetMode, FeeDestination},
    types::{BuildRequest, BuiltTransaction},
};
use crate::{error::PipelineError, fees::PriorityFeeEstimator, solana::ChainRpc};
use log::{debug, error, info};
use std::sync::Arc;

pub struct TransactionBuilder {
    rpc: Arc<dyn ChainRpc>,
    fee_estimator: Arc<PriorityFeeEstimator>,
}

impl TransactionBuilder {
    pub fn new(rpc: Arc<dyn ChainRpc>, fee_estimator: Arc<PriorityFeeEstimator>) -> Self {
        Self { rpc, fee_estimator }
    }

    pub async fn build(&self, request: BuildRequest) -> Result<BuiltTransaction, PipelineError> {
        request.validate()?;
        let budget = request.budget;

        let unit_price = match (budget.destination(), budget.mode()) {
            (FeeDestination::RelayOnly, _) => 0,
            (FeeDestination::Priced, ComputeBudgetMode::Fixed { price }) => price,
            (FeeDestination::Priced, ComputeBudgetMode::Dynamic { speed, max_price }) => {
                self.fee_estimator
                    .estimate(&request.instructions.merged(), speed, max_price)
                    .await
            }
        };
        let initial_limit = budget.initial_unit_limit();

        let blockhash = self.rpc.get_latest_blockhash().await?;
        let built = BuiltTransaction::compile_with_budget(
            request.payer,
            blockhash,
            initial_limit,
            unit_price,
            &request.instructions,
            request.lookup_tables,
            request.tip_only,
        )?;
        debug!(
            "[Builder] Pass 1: {} instruction(s), limit {}, price {}",
            built.instructions().len(),
            initial_limit,
            unit_price
        );

        if built.is_tip_only() {
            return Ok(built);
        }

        let simulation = self.rpc.simulate_transaction(&built.unsigned()).await?;
        if let Some(err) = simulation.err {
            error!("[Builder] Simulation failed: {}", err);
            for line in &simulation.logs {
                debug!("[Builder]   {}", line);
            }
            return Err(PipelineError::SimulationFailed {
                error: err,
                logs: simulation.logs,
            });
        }

        if budget.pinned_unit_limit().is_some() {
            return Ok(built);
        }
        match simulation.units_consumed {
            Some(units) => {
                let limit = buffered_unit_limit(units, budget.buffer_pct());
                info!(
                    "[Builder] Simulation consumed {} CU; setting limit to {}",
                    units, limit
                );
                built.with_compute_unit_limit(limit)
            }
            None => {
                debug!("[Builder] Simulation reported no unit consumption; keeping initial limit");
                Ok(built)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        fees::SpeedTier,
        solana::SimulationOutcome,
        testing::MockChainRpc,
        transaction::{ComputeBudgetConfig, InstructionSet, MAX_COMPUTE_UNIT_LIMIT},
    };
    use pretty_assertions::assert_eq;
    use solana_sdk::{pubkey::Pubkey, system_instruction};

    fn transfer_set(payer: &Pubkey) -> InstructionSet {
        InstructionSet::new(vec![system_instruction::transfer(
            payer,
            &Pubkey::new_unique(),
            1_000,
        )])
    }

    fn builder(rpc: Arc<MockChainRpc>) -> TransactionBuilder {
        let estimator = Arc::new(PriorityFeeEstimator::new(rpc.clone(), None));
        TransactionBuilder::new(rpc, estimator)
    }

    #[tokio::test]
    async fn test_fixed_budget_is_not_adjusted() {
        let rpc = Arc::new(MockChainRpc::new());
        rpc.set_simulation(SimulationOutcome {
            units_consumed: Some(12_345),
            ..SimulationOutcome::default()
        });
        let payer = Pubkey::new_unique();
        let request = BuildRequest::new(
            payer,
            transfer_set(&payer),
            ComputeBudgetConfig::fixed(200_000, 5_000).unwrap(),
        );

        let built = builder(rpc.clone()).build(request).await.unwrap();

        assert_eq!(built.instructions()[0].data[0], 2);
        assert_eq!(built.compute_unit_limit(), Some(200_000));
        assert_eq!(built.instructions()[1].data[0], 3);
        assert_eq!(built.compute_unit_price(), Some(5_000));
        assert_eq!(rpc.prioritization_fee_calls(), 0);
        assert_eq!(rpc.simulate_calls(), 1);
    }

    #[tokio::test]
    async fn test_dynamic_limit_tightened_after_one_simulation() {
        let rpc = Arc::new(MockChainRpc::new());
        rpc.set_simulation(SimulationOutcome {
            units_consumed: Some(50_001),
            ..SimulationOutcome::default()
        });
        let payer = Pubkey::new_unique();
        let request = BuildRequest::new(
            payer,
            transfer_set(&payer),
            ComputeBudgetConfig::dynamic(SpeedTier::Normal, None).unwrap(),
        );

        let built = builder(rpc.clone()).build(request).await.unwrap();

        // ceil(50_001 * 1.2)
        assert_eq!(built.compute_unit_limit(), Some(60_002));
        assert_eq!(built.compute_unit_price(), Some(11_000));
        assert_eq!(rpc.simulate_calls(), 1);
        assert_eq!(rpc.last_simulated_limit(), Some(MAX_COMPUTE_UNIT_LIMIT));
    }

    #[tokio::test]
    async fn test_simulation_error_is_returned_with_logs() {
        let rpc = Arc::new(MockChainRpc::new());
        rpc.set_simulation(SimulationOutcome {
            err: Some("InstructionError(0, Custom(1))".to_string()),
            logs: vec!["Program log: insufficient funds".to_string()],
            units_consumed: Some(3_000),
        });
        let payer = Pubkey::new_unique();
        let request = BuildRequest::new(
            payer,
            transfer_set(&payer),
            ComputeBudgetConfig::dynamic(SpeedTier::Fast, None).unwrap(),
        );

        let err = builder(rpc.clone()).build(request).await.unwrap_err();

        match err {
            PipelineError::SimulationFailed { error, logs } => {
                assert_eq!(error, "InstructionError(0, Custom(1))");
                assert_eq!(logs.len(), 1);
            }
            other => panic!("unexpected error: {:?}", other),
        }
        assert_eq!(rpc.send_calls(), 0);
    }

    #[tokio::test]
    async fn test_tip_only_skips_simulation_and_relay_only_prices_zero() {
        let rpc = Arc::new(MockChainRpc::new());
        let payer = Pubkey::new_unique();
        let request = BuildRequest::new(
            payer,
            transfer_set(&payer),
            ComputeBudgetConfig::relay_only(None).unwrap(),
        )
        .tip_only();

        let built = builder(rpc.clone()).build(request).await.unwrap();

        assert!(built.is_tip_only());
        assert_eq!(built.compute_unit_price(), Some(0));
        assert_eq!(built.compute_unit_limit(), Some(MAX_COMPUTE_UNIT_LIMIT));
        assert_eq!(rpc.simulate_calls(), 0);
    }

    #[tokio::test]
    async fn test_missing_units_consumed_keeps_initial_limit() {
        let rpc = Arc::new(MockChainRpc::new());
        let payer = Pubkey::new_unique();
        let request = BuildRequest::new(
            payer,
            transfer_set(&payer),
            ComputeBudgetConfig::dynamic(SpeedTier::Normal, Some(500)).unwrap(),
        );

        let built = builder(rpc).build(request).await.unwrap();

        assert_eq!(built.compute_unit_limit(), Some(MAX_COMPUTE_UNIT_LIMIT));
        assert_eq!(built.compute_unit_price(), Some(500));
    }
}
