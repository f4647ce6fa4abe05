// src/dex/mod.rs
//! Swap venues and the fallback router.

pub mod jupiter;
pub mod jupiter_api;
pub mod math;
pub mod pool;
pub mod router;

pub use jupiter::JupiterVenue;
pub use pool::{FullPoolAccounts, PoolAccountResolver, PoolSwapAccounts, PoolVenue};
pub use router::SwapRouter;

use crate::{error::PipelineError, transaction::InstructionSet};
use async_trait::async_trait;
use solana_sdk::{address_lookup_table::AddressLookupTableAccount, pubkey::Pubkey};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VenueKind {
    /// Routing aggregator quoting across many pools.
    Aggregator,
    /// A single protocol-listed pool.
    Pool,
}

impl VenueKind {
    pub fn alternate(&self) -> VenueKind {
        match self {
            VenueKind::Aggregator => VenueKind::Pool,
            VenueKind::Pool => VenueKind::Aggregator,
        }
    }
}

impl fmt::Display for VenueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VenueKind::Aggregator => write!(f, "aggregator"),
            VenueKind::Pool => write!(f, "pool"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SwapMode {
    #[default]
    ExactIn,
    ExactOut,
}

impl fmt::Display for SwapMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SwapMode::ExactIn => write!(f, "ExactIn"),
            SwapMode::ExactOut => write!(f, "ExactOut"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct SwapRequest {
    pub user: Pubkey,
    pub input_mint: Pubkey,
    pub output_mint: Pubkey,
    /// Input amount for ExactIn, output amount for ExactOut.
    pub amount: u64,
    pub slippage_bps: u16,
    pub mode: SwapMode,
    /// Required by the pool venue.
    pub pool: Option<Pubkey>,
    pub only_direct_routes: bool,
    pub max_accounts: Option<u16>,
    pub wrap_and_unwrap_sol: bool,
    /// Pays rent for accounts the aggregator creates, when not `user`.
    pub payer: Option<Pubkey>,
}

impl SwapRequest {
    pub fn exact_in(
        user: Pubkey,
        input_mint: Pubkey,
        output_mint: Pubkey,
        amount: u64,
        slippage_bps: u16,
    ) -> Self {
        Self {
            user,
            input_mint,
            output_mint,
            amount,
            slippage_bps,
            mode: SwapMode::ExactIn,
            pool: None,
            only_direct_routes: false,
            max_accounts: None,
            wrap_and_unwrap_sol: false,
            payer: None,
        }
    }

    pub fn with_mode(mut self, mode: SwapMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_pool(mut self, pool: Pubkey) -> Self {
        self.pool = Some(pool);
        self
    }
}

/// A venue's quote together with the instructions that execute it.
#[derive(Debug, Clone)]
pub struct QuoteResult {
    pub venue: VenueKind,
    pub in_amount: u64,
    pub out_amount: u64,
    /// Minimum out (ExactIn) or maximum in (ExactOut) after slippage.
    pub other_amount_threshold: u64,
    pub instructions: InstructionSet,
    pub lookup_tables: Vec<AddressLookupTableAccount>,
}

#[async_trait]
pub trait SwapVenue: Send + Sync {
    fn kind(&self) -> VenueKind;

    async fn quote_and_build(&self, request: &SwapRequest) -> Result<QuoteResult, PipelineError>;
}
