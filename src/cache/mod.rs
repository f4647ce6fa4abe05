// src/cache/mod.rs
//! In-process read-through cache of decoded on-chain accounts.
//!
//! One instance is built at startup and shared by `Arc` between the fee
//! estimator, the swap venues and the transaction builder.

pub mod mint;

pub use mint::MintCache;

use crate::{error::PipelineError, solana::ChainRpc};
use dashmap::DashMap;
use log::{debug, trace};
use solana_sdk::{account::Account, pubkey::Pubkey};
use std::{
    collections::{HashMap, HashSet},
    fmt,
    sync::Arc,
    time::{Duration, Instant},
};

/// Turns raw account data into a typed record.
pub trait AccountDecoder<T>: Send + Sync {
    fn decode(&self, address: &Pubkey, account: &Account) -> Result<T, PipelineError>;
}

#[derive(Debug)]
pub struct CachedAccount<T> {
    pub address: Pubkey,
    pub value: Arc<T>,
    pub fetched_at: Instant,
}

impl<T> Clone for CachedAccount<T> {
    fn clone(&self) -> Self {
        Self {
            address: self.address,
            value: Arc::clone(&self.value),
            fetched_at: self.fetched_at,
        }
    }
}

impl<T> CachedAccount<T> {
    fn is_fresh(&self, ttl: Option<Duration>) -> bool {
        match ttl {
            Some(ttl) => self.fetched_at.elapsed() < ttl,
            None => true,
        }
    }
}

pub struct AccountCache<T> {
    rpc: Arc<dyn ChainRpc>,
    decoder: Arc<dyn AccountDecoder<T>>,
    entries: DashMap<Pubkey, CachedAccount<T>>,
    ttl: Option<Duration>,
}

impl<T> fmt::Debug for AccountCache<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccountCache")
            .field("entries", &self.entries.len())
            .field("ttl", &self.ttl)
            .finish()
    }
}

impl<T: Send + Sync + 'static> AccountCache<T> {
    pub fn new(
        rpc: Arc<dyn ChainRpc>,
        decoder: impl AccountDecoder<T> + 'static,
        ttl: Option<Duration>,
    ) -> Self {
        Self {
            rpc,
            decoder: Arc::new(decoder),
            entries: DashMap::new(),
            ttl,
        }
    }

    /// Returns decoded records for every address that exists on-chain.
    ///
    /// Hits are served from memory. All misses are fetched in a single
    /// `get_multiple_accounts` call. Addresses with no account are omitted.
    pub async fn get_accounts(
        &self,
        addresses: &[Pubkey],
    ) -> Result<HashMap<Pubkey, Arc<T>>, PipelineError> {
        let mut found = HashMap::with_capacity(addresses.len());
        let mut seen = HashSet::with_capacity(addresses.len());
        let mut missing = Vec::new();

        for address in addresses {
            if !seen.insert(*address) {
                continue;
            }
            // The shard guard is dropped at the end of this block, before any await.
            let hit = self
                .entries
                .get(address)
                .filter(|entry| entry.is_fresh(self.ttl))
                .map(|entry| Arc::clone(&entry.value));
            match hit {
                Some(value) => {
                    found.insert(*address, value);
                }
                None => missing.push(*address),
            }
        }

        trace!(
            "[AccountCache] {} hit(s), {} miss(es)",
            found.len(),
            missing.len()
        );
        if missing.is_empty() {
            return Ok(found);
        }

        found.extend(self.fetch_and_store(&missing).await?);
        Ok(found)
    }

    pub async fn get_account(&self, address: &Pubkey) -> Result<Option<Arc<T>>, PipelineError> {
        let mut result = self.get_accounts(std::slice::from_ref(address)).await?;
        Ok(result.remove(address))
    }

    /// Re-reads `addresses` regardless of what is cached and overwrites the entries.
    pub async fn refresh(
        &self,
        addresses: &[Pubkey],
    ) -> Result<HashMap<Pubkey, Arc<T>>, PipelineError> {
        let mut seen = HashSet::with_capacity(addresses.len());
        let unique: Vec<Pubkey> = addresses
            .iter()
            .filter(|address| seen.insert(**address))
            .copied()
            .collect();
        if unique.is_empty() {
            return Ok(HashMap::new());
        }
        self.fetch_and_store(&unique).await
    }

    pub fn insert(&self, address: Pubkey, value: T) -> Arc<T> {
        let value = Arc::new(value);
        self.entries.insert(
            address,
            CachedAccount {
                address,
                value: Arc::clone(&value),
                fetched_at: Instant::now(),
            },
        );
        value
    }

    pub fn invalidate(&self, address: &Pubkey) -> bool {
        self.entries.remove(address).is_some()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    async fn fetch_and_store(
        &self,
        addresses: &[Pubkey],
    ) -> Result<HashMap<Pubkey, Arc<T>>, PipelineError> {
        let accounts = self.rpc.get_multiple_accounts(addresses).await?;
        let mut fetched = HashMap::with_capacity(addresses.len());

        for (address, account) in addresses.iter().zip(accounts) {
            let Some(account) = account else {
                debug!("[AccountCache] Account {} not found on-chain", address);
                continue;
            };
            let value = self.decoder.decode(address, &account)?;
            fetched.insert(*address, self.insert(*address, value));
        }
        Ok(fetched)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        solana::accounts::TokenAccountDecoder,
        testing::{token_account, MockChainRpc},
    };
    use pretty_assertions::assert_eq;

    fn vault_cache(rpc: Arc<MockChainRpc>, ttl: Option<Duration>) -> AccountCache<crate::solana::TokenAccountInfo> {
        AccountCache::new(rpc, TokenAccountDecoder, ttl)
    }

    #[tokio::test]
    async fn test_hit_avoids_second_fetch() {
        let rpc = Arc::new(MockChainRpc::new());
        let vault = Pubkey::new_unique();
        rpc.set_account(
            vault,
            token_account(Pubkey::new_unique(), Pubkey::new_unique(), 500, spl_token::id()),
        );
        let cache = vault_cache(Arc::clone(&rpc), None);

        let first = cache.get_accounts(&[vault]).await.unwrap();
        let second = cache.get_accounts(&[vault]).await.unwrap();

        assert_eq!(first[&vault].amount, 500);
        assert_eq!(second[&vault].amount, 500);
        assert_eq!(rpc.multiple_accounts_calls(), 1);
    }

    #[tokio::test]
    async fn test_misses_share_one_batch_and_absent_accounts_are_omitted() {
        let rpc = Arc::new(MockChainRpc::new());
        let a = Pubkey::new_unique();
        let b = Pubkey::new_unique();
        let absent = Pubkey::new_unique();
        for address in [a, b] {
            rpc.set_account(
                address,
                token_account(Pubkey::new_unique(), Pubkey::new_unique(), 1, spl_token::id()),
            );
        }
        let cache = vault_cache(Arc::clone(&rpc), None);

        let result = cache.get_accounts(&[a, b, absent, a]).await.unwrap();

        assert_eq!(result.len(), 2);
        assert!(!result.contains_key(&absent));
        assert_eq!(rpc.multiple_accounts_calls(), 1);
        assert_eq!(rpc.last_batch_len(), 3);
    }

    #[tokio::test]
    async fn test_refresh_bypasses_hits() {
        let rpc = Arc::new(MockChainRpc::new());
        let vault = Pubkey::new_unique();
        let mint = Pubkey::new_unique();
        let owner = Pubkey::new_unique();
        rpc.set_account(vault, token_account(mint, owner, 100, spl_token::id()));
        let cache = vault_cache(Arc::clone(&rpc), None);
        cache.get_accounts(&[vault]).await.unwrap();

        rpc.set_account(vault, token_account(mint, owner, 250, spl_token::id()));
        let refreshed = cache.refresh(&[vault]).await.unwrap();

        assert_eq!(refreshed[&vault].amount, 250);
        assert_eq!(cache.get_account(&vault).await.unwrap().unwrap().amount, 250);
        assert_eq!(rpc.multiple_accounts_calls(), 2);
    }

    #[tokio::test]
    async fn test_expired_entries_are_refetched() {
        let rpc = Arc::new(MockChainRpc::new());
        let vault = Pubkey::new_unique();
        rpc.set_account(
            vault,
            token_account(Pubkey::new_unique(), Pubkey::new_unique(), 7, spl_token::id()),
        );
        let cache = vault_cache(Arc::clone(&rpc), Some(Duration::from_millis(0)));

        cache.get_accounts(&[vault]).await.unwrap();
        cache.get_accounts(&[vault]).await.unwrap();

        assert_eq!(rpc.multiple_accounts_calls(), 2);
    }

    #[tokio::test]
    async fn test_invalidate() {
        let rpc = Arc::new(MockChainRpc::new());
        let cache = vault_cache(rpc, None);
        let address = Pubkey::new_unique();
        cache.insert(
            address,
            crate::solana::TokenAccountInfo {
                mint: Pubkey::new_unique(),
                owner: Pubkey::new_unique(),
                amount: 1,
                token_program: spl_token::id(),
            },
        );
        assert_eq!(cache.len(), 1);
        assert!(cache.invalidate(&address));
        assert!(cache.is_empty());
    }
}
