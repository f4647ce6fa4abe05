//! Test infrastructure: in-memory stand-ins for the chain, fee service,
//! relay and swap venues, plus account fixtures.

pub mod mock_chain;
pub mod mock_venue;

pub use mock_chain::{MockChainRpc, MockFeeApi, MockRelay, MockTipFloorApi};
pub use mock_venue::MockVenue;

use crate::transaction::{BuiltTransaction, InstructionSet};
use solana_sdk::{
    account::Account,
    address_lookup_table::{
        self,
        state::{AddressLookupTable, LookupTableMeta},
    },
    hash::Hash,
    instruction::Instruction,
    message::{v0, VersionedMessage},
    pubkey::Pubkey,
    signature::Keypair,
    system_instruction,
    transaction::VersionedTransaction,
};
use spl_token::solana_program::{program_option::COption, program_pack::Pack};
use std::borrow::Cow;

/// An initialized mint owned by `token_program`.
pub fn mint_account(decimals: u8, token_program: Pubkey) -> Account {
    let mint = spl_token::state::Mint {
        mint_authority: COption::None,
        supply: 1_000_000_000,
        decimals,
        is_initialized: true,
        freeze_authority: COption::None,
    };
    let mut data = vec![0u8; spl_token::state::Mint::LEN];
    mint.pack_into_slice(&mut data);
    Account {
        lamports: 1_461_600,
        data,
        owner: token_program,
        executable: false,
        rent_epoch: 0,
    }
}

/// An initialized token account holding `amount` of `mint`.
pub fn token_account(mint: Pubkey, owner: Pubkey, amount: u64, token_program: Pubkey) -> Account {
    let state = spl_token::state::Account {
        mint,
        owner,
        amount,
        delegate: COption::None,
        state: spl_token::state::AccountState::Initialized,
        is_native: COption::None,
        delegated_amount: 0,
        close_authority: COption::None,
    };
    let mut data = vec![0u8; spl_token::state::Account::LEN];
    state.pack_into_slice(&mut data);
    Account {
        lamports: 2_039_280,
        data,
        owner: token_program,
        executable: false,
        rent_epoch: 0,
    }
}

/// An active address lookup table holding `addresses`.
pub fn lookup_table_account(addresses: &[Pubkey]) -> Account {
    let table = AddressLookupTable {
        meta: LookupTableMeta::default(),
        addresses: Cow::Owned(addresses.to_vec()),
    };
    Account {
        lamports: 1_000_000,
        data: table
            .serialize_for_tests()
            .expect("fixture lookup table serializes"),
        owner: address_lookup_table::program::id(),
        executable: false,
        rent_epoch: 0,
    }
}

/// Compiles and signs `instructions` with `payer` as fee payer.
pub fn signed_transaction(payer: &Keypair, instructions: &[Instruction]) -> VersionedTransaction {
    use solana_sdk::signer::Signer;
    let message = v0::Message::try_compile(&payer.pubkey(), instructions, &[], Hash::new_unique())
        .expect("fixture message compiles");
    VersionedTransaction::try_new(VersionedMessage::V0(message), &[payer])
        .expect("fixture transaction signs")
}

/// A one-transfer transaction without compute-budget instructions.
pub fn built_transfer(payer: &Pubkey) -> BuiltTransaction {
    BuiltTransaction::compile(
        *payer,
        Hash::new_unique(),
        vec![system_instruction::transfer(payer, &Pubkey::new_unique(), 5_000)],
        Vec::new(),
        false,
    )
    .expect("fixture transfer compiles")
}

/// A one-transfer transaction with limit 200 000 and price 10 000.
pub fn budgeted_transfer(payer: &Pubkey) -> BuiltTransaction {
    let payload = InstructionSet::new(vec![system_instruction::transfer(
        payer,
        &Pubkey::new_unique(),
        5_000,
    )]);
    BuiltTransaction::compile_with_budget(
        *payer,
        Hash::new_unique(),
        200_000,
        10_000,
        &payload,
        Vec::new(),
        false,
    )
    .expect("fixture transfer compiles")
}
