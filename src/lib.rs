pub mod cache; // Read-through account and mint caches
pub mod config;
pub mod dex; // Swap venues and fallback routing
pub mod error;
pub mod fees; // Priority fee and relay tip estimation
pub mod sender; // Direct and bundled submission
pub mod solana;
pub mod testing; // Testing infrastructure
pub mod transaction;
pub mod utils;

pub use cache::{AccountCache, AccountDecoder, MintCache};
pub use dex::{QuoteResult, SwapRequest, SwapRouter, SwapVenue, VenueKind};
pub use error::{ErrorCategory, PipelineError};
pub use fees::{PriorityFeeEstimator, SpeedTier, TipEstimator, TipStrategy};
pub use sender::{create_sender, SenderKind, SenderProvider, SubmissionId};
pub use transaction::{
    BuildRequest, BuiltTransaction, ComputeBudgetConfig, InstructionSet, TransactionBuilder,
};
