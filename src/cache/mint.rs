// src/cache/mint.rs
use super::AccountCache;
use crate::{
    error::PipelineError,
    solana::{
        accounts::{MintDecoder, MintInfo},
        ChainRpc,
    },
};
use solana_sdk::pubkey::Pubkey;
use std::{collections::HashMap, ops::Deref, sync::Arc, time::Duration};

/// Mint metadata cache: decimals and owning token program.
///
/// Derefs to the underlying [`AccountCache`] for `insert`/`invalidate`.
#[derive(Debug)]
pub struct MintCache {
    inner: AccountCache<MintInfo>,
}

impl MintCache {
    pub fn new(rpc: Arc<dyn ChainRpc>, ttl: Option<Duration>) -> Self {
        Self {
            inner: AccountCache::new(rpc, MintDecoder, ttl),
        }
    }

    pub async fn get_mints(
        &self,
        mints: &[Pubkey],
    ) -> Result<HashMap<Pubkey, MintInfo>, PipelineError> {
        Ok(self
            .inner
            .get_accounts(mints)
            .await?
            .into_iter()
            .map(|(mint, info)| (mint, *info))
            .collect())
    }

    pub async fn get_decimals(
        &self,
        mints: &[Pubkey],
    ) -> Result<HashMap<Pubkey, u8>, PipelineError> {
        Ok(self
            .get_mints(mints)
            .await?
            .into_iter()
            .map(|(mint, info)| (mint, info.decimals))
            .collect())
    }

    /// Owning token program of `mint`. A mint that does not exist is a validation error.
    pub async fn token_program(&self, mint: &Pubkey) -> Result<Pubkey, PipelineError> {
        self.inner
            .get_account(mint)
            .await?
            .map(|info| info.token_program)
            .ok_or_else(|| PipelineError::ValidationError(format!("Mint {} not found", mint)))
    }
}

impl Deref for MintCache {
    type Target = AccountCache<MintInfo>;

    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}
