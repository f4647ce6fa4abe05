// src/transaction/compute_budget.rs
use crate::{error::PipelineError, fees::SpeedTier};
use solana_sdk::{
    compute_budget::{self, ComputeBudgetInstruction},
    instruction::Instruction,
    pubkey::Pubkey,
};

/// Protocol ceiling on compute units per transaction.
pub const MAX_COMPUTE_UNIT_LIMIT: u32 = 1_400_000;

pub const DEFAULT_COMPUTE_UNIT_BUFFER_PCT: u32 = 120;

pub(crate) const SET_COMPUTE_UNIT_LIMIT_TAG: u8 = 2;
const SET_COMPUTE_UNIT_PRICE_TAG: u8 = 3;

/// Budget values decoded out of an instruction list.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ComputeBudgetValues {
    pub unit_limit: Option<u32>,
    /// Micro-lamports per compute unit.
    pub unit_price: Option<u64>,
}

pub fn is_compute_budget_instruction(ix: &Instruction) -> bool {
    ix.program_id == compute_budget::id()
}

/// Scans `(program_id, data)` pairs for the limit and price instructions.
/// Position in the list does not matter; the last occurrence wins.
pub fn find_compute_budget<'a>(
    instructions: impl IntoIterator<Item = (&'a Pubkey, &'a [u8])>,
) -> ComputeBudgetValues {
    let mut values = ComputeBudgetValues::default();
    for (program_id, data) in instructions {
        if *program_id != compute_budget::id() {
            continue;
        }
        match data.first() {
            Some(&SET_COMPUTE_UNIT_LIMIT_TAG) => {
                if let Some(bytes) = data.get(1..5).and_then(|b| <[u8; 4]>::try_from(b).ok()) {
                    values.unit_limit = Some(u32::from_le_bytes(bytes));
                }
            }
            Some(&SET_COMPUTE_UNIT_PRICE_TAG) => {
                if let Some(bytes) = data.get(1..9).and_then(|b| <[u8; 8]>::try_from(b).ok()) {
                    values.unit_price = Some(u64::from_le_bytes(bytes));
                }
            }
            _ => {}
        }
    }
    values
}

pub fn find_in_instructions(instructions: &[Instruction]) -> ComputeBudgetValues {
    find_compute_budget(
        instructions
            .iter()
            .map(|ix| (&ix.program_id, ix.data.as_slice())),
    )
}

/// `ceil(units × buffer_pct / 100)`, within `1..=`[`MAX_COMPUTE_UNIT_LIMIT`].
pub fn buffered_unit_limit(units_consumed: u64, buffer_pct: u32) -> u32 {
    let buffered = (units_consumed as u128 * buffer_pct as u128).div_ceil(100);
    buffered.clamp(1, MAX_COMPUTE_UNIT_LIMIT as u128) as u32
}

/// Whether the transaction pays a priority fee or relies on a relay tip.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FeeDestination {
    #[default]
    Priced,
    /// Fee-less relay path: the price instruction carries zero.
    RelayOnly,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComputeBudgetMode {
    Dynamic {
        speed: SpeedTier,
        max_price: Option<u64>,
    },
    Fixed {
        price: u64,
    },
}

/// Validated, immutable compute-budget settings for one build.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ComputeBudgetConfig {
    destination: FeeDestination,
    mode: ComputeBudgetMode,
    unit_limit: Option<u32>,
    buffer_pct: u32,
}

impl ComputeBudgetConfig {
    pub fn new(
        destination: FeeDestination,
        mode: ComputeBudgetMode,
        unit_limit: Option<u32>,
        buffer_pct: u32,
    ) -> Result<Self, PipelineError> {
        if let Some(limit) = unit_limit {
            if limit == 0 || limit > MAX_COMPUTE_UNIT_LIMIT {
                return Err(PipelineError::ValidationError(format!(
                    "Compute unit limit {} outside 1..={}",
                    limit, MAX_COMPUTE_UNIT_LIMIT
                )));
            }
        }
        if buffer_pct < 100 {
            return Err(PipelineError::ValidationError(format!(
                "Compute unit buffer {}% is below 100%",
                buffer_pct
            )));
        }
        if let ComputeBudgetMode::Dynamic {
            max_price: Some(0), ..
        } = mode
        {
            return Err(PipelineError::ValidationError(
                "Dynamic max price must be positive".to_string(),
            ));
        }
        Ok(Self {
            destination,
            mode,
            unit_limit,
            buffer_pct,
        })
    }

    pub fn dynamic(speed: SpeedTier, max_price: Option<u64>) -> Result<Self, PipelineError> {
        Self::new(
            FeeDestination::Priced,
            ComputeBudgetMode::Dynamic { speed, max_price },
            None,
            DEFAULT_COMPUTE_UNIT_BUFFER_PCT,
        )
    }

    /// Pinned limit and price: no estimation, no post-simulation adjustment.
    pub fn fixed(unit_limit: u32, price: u64) -> Result<Self, PipelineError> {
        Self::new(
            FeeDestination::Priced,
            ComputeBudgetMode::Fixed { price },
            Some(unit_limit),
            DEFAULT_COMPUTE_UNIT_BUFFER_PCT,
        )
    }

    pub fn relay_only(unit_limit: Option<u32>) -> Result<Self, PipelineError> {
        Self::new(
            FeeDestination::RelayOnly,
            ComputeBudgetMode::Fixed { price: 0 },
            unit_limit,
            DEFAULT_COMPUTE_UNIT_BUFFER_PCT,
        )
    }

    pub fn destination(&self) -> FeeDestination {
        self.destination
    }

    pub fn mode(&self) -> ComputeBudgetMode {
        self.mode
    }

    pub fn pinned_unit_limit(&self) -> Option<u32> {
        self.unit_limit
    }

    pub fn initial_unit_limit(&self) -> u32 {
        self.unit_limit.unwrap_or(MAX_COMPUTE_UNIT_LIMIT)
    }

    pub fn buffer_pct(&self) -> u32 {
        self.buffer_pct
    }
}

/// Limit first, price second.
pub fn budget_instructions(unit_limit: u32, unit_price: u64) -> [Instruction; 2] {
    [
        ComputeBudgetInstruction::set_compute_unit_limit(unit_limit),
        ComputeBudgetInstruction::set_compute_unit_price(unit_price),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decodes_budget_instructions() {
        let [limit, price] = budget_instructions(200_000, 5_000);
        let memo = Instruction::new_with_bytes(Pubkey::new_unique(), &[2, 1, 0, 0, 0], vec![]);
        let values = find_in_instructions(&[memo, price, limit]);
        assert_eq!(values.unit_limit, Some(200_000));
        assert_eq!(values.unit_price, Some(5_000));
    }

    #[test]
    fn test_buffered_unit_limit() {
        assert_eq!(buffered_unit_limit(100_000, 120), 120_000);
        assert_eq!(buffered_unit_limit(33_333, 120), 40_000);
        assert_eq!(buffered_unit_limit(33_334, 120), 40_001);
        assert_eq!(buffered_unit_limit(1_300_000, 120), MAX_COMPUTE_UNIT_LIMIT);
        assert_eq!(buffered_unit_limit(0, 120), 1);
    }

    #[test]
    fn test_config_validation() {
        assert!(ComputeBudgetConfig::fixed(0, 1).is_err());
        assert!(ComputeBudgetConfig::fixed(MAX_COMPUTE_UNIT_LIMIT + 1, 1).is_err());
        assert!(ComputeBudgetConfig::new(
            FeeDestination::Priced,
            ComputeBudgetMode::Fixed { price: 1 },
            None,
            90
        )
        .is_err());
        assert!(ComputeBudgetConfig::dynamic(SpeedTier::Fast, Some(0)).is_err());

        let config = ComputeBudgetConfig::dynamic(SpeedTier::Fast, None).unwrap();
        assert_eq!(config.initial_unit_limit(), MAX_COMPUTE_UNIT_LIMIT);
        assert_eq!(config.buffer_pct(), 120);
    }
}
