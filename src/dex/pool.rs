// src/dex/pool.rs
//! Single-pool venue for the protocol's own constant-product pools.

use super::{math, QuoteResult, SwapMode, SwapRequest, SwapVenue, VenueKind};
use crate::{
    cache::{AccountCache, AccountDecoder, MintCache},
    error::PipelineError,
    solana::TokenAccountInfo,
    transaction::InstructionSet,
};
use async_trait::async_trait;
use log::{debug, info};
use solana_sdk::{
    account::Account,
    instruction::{AccountMeta, Instruction},
    pubkey::Pubkey,
};
use spl_associated_token_account::get_associated_token_address_with_program_id;
use std::sync::Arc;

pub const POOL_ACCOUNT_DISCRIMINATOR: [u8; 8] = [241, 154, 109, 4, 17, 177, 109, 188];
pub const SWAP_DISCRIMINATOR: [u8; 8] = [248, 198, 158, 145, 225, 117, 135, 200];

/// discriminator, four pubkeys, fee (u16), side (u8)
pub const POOL_ACCOUNT_LEN: usize = 8 + 32 * 4 + 2 + 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PositionSide {
    Long,
    Short,
}

impl PositionSide {
    fn as_byte(&self) -> u8 {
        match self {
            PositionSide::Long => 0,
            PositionSide::Short => 1,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SwapDirection {
    BaseToQuote,
    QuoteToBase,
}

impl SwapDirection {
    fn as_byte(&self) -> u8 {
        match self {
            SwapDirection::BaseToQuote => 0,
            SwapDirection::QuoteToBase => 1,
        }
    }
}

/// Decoded pool account.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolState {
    pub base_mint: Pubkey,
    pub quote_mint: Pubkey,
    pub base_vault: Pubkey,
    pub quote_vault: Pubkey,
    pub fee_bps: u16,
    pub side: PositionSide,
}

fn read_pubkey(data: &[u8], offset: usize) -> Option<Pubkey> {
    data.get(offset..offset + 32)
        .and_then(|bytes| <[u8; 32]>::try_from(bytes).ok())
        .map(Pubkey::new_from_array)
}

impl PoolState {
    pub fn unpack(data: &[u8]) -> Option<Self> {
        if data.len() < POOL_ACCOUNT_LEN || data[..8] != POOL_ACCOUNT_DISCRIMINATOR {
            return None;
        }
        let fee_bps = u16::from_le_bytes([data[136], data[137]]);
        let side = match data[138] {
            0 => PositionSide::Long,
            1 => PositionSide::Short,
            _ => return None,
        };
        Some(Self {
            base_mint: read_pubkey(data, 8)?,
            quote_mint: read_pubkey(data, 40)?,
            base_vault: read_pubkey(data, 72)?,
            quote_vault: read_pubkey(data, 104)?,
            fee_bps,
            side,
        })
    }

    pub fn pack(&self) -> Vec<u8> {
        let mut data = Vec::with_capacity(POOL_ACCOUNT_LEN);
        data.extend_from_slice(&POOL_ACCOUNT_DISCRIMINATOR);
        data.extend_from_slice(self.base_mint.as_ref());
        data.extend_from_slice(self.quote_mint.as_ref());
        data.extend_from_slice(self.base_vault.as_ref());
        data.extend_from_slice(self.quote_vault.as_ref());
        data.extend_from_slice(&self.fee_bps.to_le_bytes());
        data.push(self.side.as_byte());
        data
    }
}

#[derive(Debug, Clone, Copy)]
pub struct PoolDecoder {
    pub program_id: Pubkey,
}

impl AccountDecoder<PoolState> for PoolDecoder {
    fn decode(&self, address: &Pubkey, account: &Account) -> Result<PoolState, PipelineError> {
        if account.owner != self.program_id {
            return Err(PipelineError::ParseError(format!(
                "Pool {} is owned by {}, expected {}",
                address, account.owner, self.program_id
            )));
        }
        PoolState::unpack(&account.data)
            .ok_or_else(|| PipelineError::ParseError(format!("Pool {} has an invalid layout", address)))
    }
}

/// Everything the swap instruction touches, derived from the pool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FullPoolAccounts {
    pub pool: Pubkey,
    pub base_mint: Pubkey,
    pub quote_mint: Pubkey,
    pub base_vault: Pubkey,
    pub quote_vault: Pubkey,
    pub base_token_program: Pubkey,
    pub quote_token_program: Pubkey,
    pub fee_bps: u16,
    pub side: PositionSide,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PoolSwapAccounts {
    /// Only the pool is known; the rest is read from chain.
    Minimal { pool: Pubkey },
    Full(FullPoolAccounts),
}

pub struct PoolAccountResolver {
    pools: Arc<AccountCache<PoolState>>,
    mints: Arc<MintCache>,
}

impl PoolAccountResolver {
    pub fn new(pools: Arc<AccountCache<PoolState>>, mints: Arc<MintCache>) -> Self {
        Self { pools, mints }
    }

    pub async fn resolve(&self, accounts: PoolSwapAccounts) -> Result<FullPoolAccounts, PipelineError> {
        match accounts {
            PoolSwapAccounts::Full(full) => Ok(full),
            PoolSwapAccounts::Minimal { pool } => {
                let state = self.pool_state(&pool).await?;
                self.expand(pool, &state).await
            }
        }
    }

    pub async fn pool_state(&self, pool: &Pubkey) -> Result<Arc<PoolState>, PipelineError> {
        self.pools
            .get_account(pool)
            .await?
            .ok_or_else(|| PipelineError::venue(VenueKind::Pool, format!("pool {} not found", pool)))
    }

    async fn expand(&self, pool: Pubkey, state: &PoolState) -> Result<FullPoolAccounts, PipelineError> {
        let mints = self
            .mints
            .get_mints(&[state.base_mint, state.quote_mint])
            .await?;
        let token_program = |mint: &Pubkey| {
            mints.get(mint).map(|info| info.token_program).ok_or_else(|| {
                PipelineError::venue(VenueKind::Pool, format!("mint {} not found", mint))
            })
        };
        Ok(FullPoolAccounts {
            pool,
            base_mint: state.base_mint,
            quote_mint: state.quote_mint,
            base_vault: state.base_vault,
            quote_vault: state.quote_vault,
            base_token_program: token_program(&state.base_mint)?,
            quote_token_program: token_program(&state.quote_mint)?,
            fee_bps: state.fee_bps,
            side: state.side,
        })
    }
}

pub struct PoolVenue {
    program_id: Pubkey,
    resolver: PoolAccountResolver,
    vaults: Arc<AccountCache<TokenAccountInfo>>,
}

impl PoolVenue {
    pub fn new(
        program_id: Pubkey,
        resolver: PoolAccountResolver,
        vaults: Arc<AccountCache<TokenAccountInfo>>,
    ) -> Self {
        Self {
            program_id,
            resolver,
            vaults,
        }
    }

    /// Current (base, quote) vault balances, always read from chain.
    async fn read_reserves(&self, state: &PoolState) -> Result<(u64, u64), PipelineError> {
        let vaults = self
            .vaults
            .refresh(&[state.base_vault, state.quote_vault])
            .await?;
        let amount = |vault: &Pubkey| {
            vaults.get(vault).map(|v| v.amount).ok_or_else(|| {
                PipelineError::venue(VenueKind::Pool, format!("vault {} not found", vault))
            })
        };
        Ok((amount(&state.base_vault)?, amount(&state.quote_vault)?))
    }

    fn swap_instruction(
        &self,
        user: &Pubkey,
        accounts: &FullPoolAccounts,
        amount: u64,
        threshold: u64,
        mode: SwapMode,
        direction: SwapDirection,
    ) -> Instruction {
        let user_base = get_associated_token_address_with_program_id(
            user,
            &accounts.base_mint,
            &accounts.base_token_program,
        );
        let user_quote = get_associated_token_address_with_program_id(
            user,
            &accounts.quote_mint,
            &accounts.quote_token_program,
        );

        let mut data = Vec::with_capacity(8 + 8 + 8 + 3);
        data.extend_from_slice(&SWAP_DISCRIMINATOR);
        data.extend_from_slice(&amount.to_le_bytes());
        data.extend_from_slice(&threshold.to_le_bytes());
        data.push(match mode {
            SwapMode::ExactIn => 0,
            SwapMode::ExactOut => 1,
        });
        data.push(direction.as_byte());
        data.push(accounts.side.as_byte());

        Instruction {
            program_id: self.program_id,
            accounts: vec![
                AccountMeta::new(*user, true),
                AccountMeta::new(accounts.pool, false),
                AccountMeta::new_readonly(accounts.base_mint, false),
                AccountMeta::new_readonly(accounts.quote_mint, false),
                AccountMeta::new(accounts.base_vault, false),
                AccountMeta::new(accounts.quote_vault, false),
                AccountMeta::new(user_base, false),
                AccountMeta::new(user_quote, false),
                AccountMeta::new_readonly(accounts.base_token_program, false),
                AccountMeta::new_readonly(accounts.quote_token_program, false),
            ],
            data,
        }
    }

    async fn quote_inner(&self, request: &SwapRequest) -> Result<QuoteResult, PipelineError> {
        let pool = request
            .pool
            .ok_or_else(|| PipelineError::venue(VenueKind::Pool, "pool id required"))?;
        let state = self.resolver.pool_state(&pool).await?;
        let (accounts, (base_reserve, quote_reserve)) = tokio::try_join!(
            self.resolver.expand(pool, &state),
            self.read_reserves(&state)
        )?;

        let direction = swap_direction(&accounts, request)?;
        let (reserve_in, reserve_out) = match direction {
            SwapDirection::BaseToQuote => (base_reserve, quote_reserve),
            SwapDirection::QuoteToBase => (quote_reserve, base_reserve),
        };
        debug!(
            "[Pool] {} {:?}: reserves in {} out {}, fee {} bps",
            pool, direction, reserve_in, reserve_out, accounts.fee_bps
        );

        let (in_amount, out_amount, threshold) = match request.mode {
            SwapMode::ExactIn => {
                let out = math::amount_out(request.amount, reserve_in, reserve_out, accounts.fee_bps)
                    .filter(|out| *out > 0)
                    .ok_or_else(|| {
                        PipelineError::venue(VenueKind::Pool, "insufficient liquidity for input")
                    })?;
                (
                    request.amount,
                    out,
                    math::min_out_with_slippage(out, request.slippage_bps),
                )
            }
            SwapMode::ExactOut => {
                let input = math::amount_in(request.amount, reserve_in, reserve_out, accounts.fee_bps)
                    .ok_or_else(|| {
                        PipelineError::venue(VenueKind::Pool, "insufficient liquidity for output")
                    })?;
                (
                    input,
                    request.amount,
                    math::max_in_with_slippage(input, request.slippage_bps),
                )
            }
        };

        let ix = self.swap_instruction(
            &request.user,
            &accounts,
            request.amount,
            threshold,
            request.mode,
            direction,
        );
        info!(
            "[Pool] {} {}: in {} out {} (threshold {})",
            pool, request.mode, in_amount, out_amount, threshold
        );

        Ok(QuoteResult {
            venue: VenueKind::Pool,
            in_amount,
            out_amount,
            other_amount_threshold: threshold,
            instructions: InstructionSet::new(vec![ix]),
            lookup_tables: Vec::new(),
        })
    }
}

/// Input mint decides the direction; the output must be the pool's other mint.
///
/// The pool's long/short side does not change which vault pays out. The
/// program reads it from the side byte of the swap instruction instead.
pub fn swap_direction(
    accounts: &FullPoolAccounts,
    request: &SwapRequest,
) -> Result<SwapDirection, PipelineError> {
    let direction = if request.input_mint == accounts.base_mint {
        SwapDirection::BaseToQuote
    } else if request.input_mint == accounts.quote_mint {
        SwapDirection::QuoteToBase
    } else {
        return Err(PipelineError::venue(
            VenueKind::Pool,
            format!("input mint {} is not in pool {}", request.input_mint, accounts.pool),
        ));
    };
    let expected_out = match direction {
        SwapDirection::BaseToQuote => accounts.quote_mint,
        SwapDirection::QuoteToBase => accounts.base_mint,
    };
    if request.output_mint != expected_out {
        return Err(PipelineError::venue(
            VenueKind::Pool,
            format!("output mint {} is not the pool's counter mint", request.output_mint),
        ));
    }
    Ok(direction)
}

#[async_trait]
impl SwapVenue for PoolVenue {
    fn kind(&self) -> VenueKind {
        VenueKind::Pool
    }

    async fn quote_and_build(&self, request: &SwapRequest) -> Result<QuoteResult, PipelineError> {
        self.quote_inner(request).await.map_err(|e| match e {
            venue @ PipelineError::VenueError { .. } => venue,
            other => PipelineError::venue(VenueKind::Pool, other.to_string()),
        })
    }
}
