//! Decoders for the account kinds the pipeline reads through the cache.

use crate::{cache::AccountDecoder, error::PipelineError};
use solana_sdk::{
    account::Account,
    address_lookup_table::{state::AddressLookupTable, AddressLookupTableAccount},
    pubkey::Pubkey,
};
use spl_token_2022::{
    extension::StateWithExtensions,
    state::{Account as TokenAccountState, Mint},
};

/// Returns the owning token program if `owner` is one of the token interfaces.
pub fn token_program_for_owner(owner: &Pubkey) -> Option<Pubkey> {
    if *owner == spl_token::id() {
        Some(spl_token::id())
    } else if *owner == spl_token_2022::id() {
        Some(spl_token_2022::id())
    } else {
        None
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MintInfo {
    pub decimals: u8,
    pub supply: u64,
    /// SPL Token or Token-2022; instructions touching this mint must use it.
    pub token_program: Pubkey,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct MintDecoder;

impl AccountDecoder<MintInfo> for MintDecoder {
    fn decode(&self, address: &Pubkey, account: &Account) -> Result<MintInfo, PipelineError> {
        let token_program = token_program_for_owner(&account.owner).ok_or_else(|| {
            PipelineError::ParseError(format!(
                "Mint {} is owned by {}, not a token program",
                address, account.owner
            ))
        })?;
        // Legacy mints are exactly the base layout, which unpacks the same way.
        let mint = StateWithExtensions::<Mint>::unpack(&account.data).map_err(|e| {
            PipelineError::ParseError(format!("Failed to unpack mint {}: {}", address, e))
        })?;
        Ok(MintInfo {
            decimals: mint.base.decimals,
            supply: mint.base.supply,
            token_program,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TokenAccountInfo {
    pub mint: Pubkey,
    pub owner: Pubkey,
    pub amount: u64,
    pub token_program: Pubkey,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct TokenAccountDecoder;

impl AccountDecoder<TokenAccountInfo> for TokenAccountDecoder {
    fn decode(
        &self,
        address: &Pubkey,
        account: &Account,
    ) -> Result<TokenAccountInfo, PipelineError> {
        let token_program = token_program_for_owner(&account.owner).ok_or_else(|| {
            PipelineError::ParseError(format!(
                "Token account {} is owned by {}, not a token program",
                address, account.owner
            ))
        })?;
        let state = StateWithExtensions::<TokenAccountState>::unpack(&account.data).map_err(
            |e| PipelineError::ParseError(format!("Failed to unpack token account {}: {}", address, e)),
        )?;
        Ok(TokenAccountInfo {
            mint: state.base.mint,
            owner: state.base.owner,
            amount: state.base.amount,
            token_program,
        })
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct LookupTableDecoder;

impl AccountDecoder<AddressLookupTableAccount> for LookupTableDecoder {
    fn decode(
        &self,
        address: &Pubkey,
        account: &Account,
    ) -> Result<AddressLookupTableAccount, PipelineError> {
        let table = AddressLookupTable::deserialize(&account.data).map_err(|e| {
            PipelineError::ParseError(format!("Failed to decode lookup table {}: {}", address, e))
        })?;
        Ok(AddressLookupTableAccount {
            key: *address,
            addresses: table.addresses.to_vec(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{mint_account, token_account};

    #[test]
    fn test_mint_decoder_reads_both_token_programs() {
        let mint = Pubkey::new_unique();

        let legacy = MintDecoder
            .decode(&mint, &mint_account(6, spl_token::id()))
            .unwrap();
        assert_eq!(legacy.decimals, 6);
        assert_eq!(legacy.token_program, spl_token::id());

        let t22 = MintDecoder
            .decode(&mint, &mint_account(9, spl_token_2022::id()))
            .unwrap();
        assert_eq!(t22.decimals, 9);
        assert_eq!(t22.token_program, spl_token_2022::id());
    }

    #[test]
    fn test_mint_decoder_rejects_foreign_owner() {
        let mint = Pubkey::new_unique();
        let account = mint_account(6, Pubkey::new_unique());
        assert!(matches!(
            MintDecoder.decode(&mint, &account),
            Err(PipelineError::ParseError(_))
        ));
    }

    #[test]
    fn test_token_account_decoder_reads_amount() {
        let mint = Pubkey::new_unique();
        let owner = Pubkey::new_unique();
        let account = token_account(mint, owner, 42_000, spl_token::id());
        let decoded = TokenAccountDecoder
            .decode(&Pubkey::new_unique(), &account)
            .unwrap();
        assert_eq!(decoded.mint, mint);
        assert_eq!(decoded.owner, owner);
        assert_eq!(decoded.amount, 42_000);
    }
}
