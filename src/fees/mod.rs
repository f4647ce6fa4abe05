pub mod helius;
pub mod priority;
pub mod tip;

pub use helius::{FeeEstimateApi, HeliusFeeClient, PriorityFeeLevels};
pub use priority::{PriorityFeeEstimator, SpeedTier, DEFAULT_PRIORITY_FEE_MICRO_LAMPORTS};
pub use tip::{JitoTipFloorClient, TipEstimator, TipFloorApi, TipFloorStats, TipStrategy};
