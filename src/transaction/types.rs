// src/transaction/types.rs
use super::compute_budget::{
    budget_instructions, find_in_instructions, is_compute_budget_instruction, ComputeBudgetConfig,
    SET_COMPUTE_UNIT_LIMIT_TAG,
};
use crate::error::PipelineError;
use solana_sdk::{
    address_lookup_table::AddressLookupTableAccount,
    compute_budget::ComputeBudgetInstruction,
    hash::Hash,
    instruction::Instruction,
    message::{v0, VersionedMessage},
    pubkey::Pubkey,
    signature::{Keypair, Signature},
    transaction::VersionedTransaction,
};

/// Payload instructions in execution order: setup, core, cleanup.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InstructionSet {
    pub setup: Vec<Instruction>,
    pub core: Vec<Instruction>,
    pub cleanup: Vec<Instruction>,
}

impl InstructionSet {
    pub fn new(core: Vec<Instruction>) -> Self {
        Self {
            core,
            ..Self::default()
        }
    }

    pub fn with_setup(mut self, setup: Vec<Instruction>) -> Self {
        self.setup = setup;
        self
    }

    pub fn with_cleanup(mut self, cleanup: Vec<Instruction>) -> Self {
        self.cleanup = cleanup;
        self
    }

    /// Appends `other` section by section, so its setup still runs before any core.
    pub fn extend(&mut self, other: InstructionSet) {
        self.setup.extend(other.setup);
        self.core.extend(other.core);
        self.cleanup.extend(other.cleanup);
    }

    pub fn merged(&self) -> Vec<Instruction> {
        self.setup
            .iter()
            .chain(self.core.iter())
            .chain(self.cleanup.iter())
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.setup.len() + self.core.len() + self.cleanup.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Debug, Clone)]
pub struct BuildRequest {
    pub payer: Pubkey,
    pub instructions: InstructionSet,
    pub budget: ComputeBudgetConfig,
    pub lookup_tables: Vec<AddressLookupTableAccount>,
    /// Tip-only transactions are never simulated.
    pub tip_only: bool,
}

impl BuildRequest {
    pub fn new(payer: Pubkey, instructions: InstructionSet, budget: ComputeBudgetConfig) -> Self {
        Self {
            payer,
            instructions,
            budget,
            lookup_tables: Vec::new(),
            tip_only: false,
        }
    }

    pub fn with_lookup_tables(mut self, lookup_tables: Vec<AddressLookupTableAccount>) -> Self {
        self.lookup_tables = lookup_tables;
        self
    }

    pub fn tip_only(mut self) -> Self {
        self.tip_only = true;
        self
    }

    pub(crate) fn validate(&self) -> Result<(), PipelineError> {
        if self.instructions.core.is_empty() {
            return Err(PipelineError::ValidationError(
                "Instruction set has no core instructions".to_string(),
            ));
        }
        let all = self
            .instructions
            .setup
            .iter()
            .chain(&self.instructions.core)
            .chain(&self.instructions.cleanup);
        for ix in all {
            if is_compute_budget_instruction(ix) {
                return Err(PipelineError::ValidationError(
                    "Compute-budget instructions are added by the builder; remove them from the request"
                        .to_string(),
                ));
            }
        }
        Ok(())
    }
}

/// A compiled v0 transaction, ready to sign. Never mutated after creation.
#[derive(Debug, Clone)]
pub struct BuiltTransaction {
    payer: Pubkey,
    blockhash: Hash,
    instructions: Vec<Instruction>,
    lookup_tables: Vec<AddressLookupTableAccount>,
    message: VersionedMessage,
    tip_only: bool,
}

impl BuiltTransaction {
    pub fn compile(
        payer: Pubkey,
        blockhash: Hash,
        instructions: Vec<Instruction>,
        lookup_tables: Vec<AddressLookupTableAccount>,
        tip_only: bool,
    ) -> Result<Self, PipelineError> {
        let message = v0::Message::try_compile(&payer, &instructions, &lookup_tables, blockhash)?;
        Ok(Self {
            payer,
            blockhash,
            instructions,
            lookup_tables,
            message: VersionedMessage::V0(message),
            tip_only,
        })
    }

    /// Budget instructions followed by the merged payload.
    pub(crate) fn compile_with_budget(
        payer: Pubkey,
        blockhash: Hash,
        unit_limit: u32,
        unit_price: u64,
        payload: &InstructionSet,
        lookup_tables: Vec<AddressLookupTableAccount>,
        tip_only: bool,
    ) -> Result<Self, PipelineError> {
        let mut instructions = budget_instructions(unit_limit, unit_price).to_vec();
        instructions.extend(payload.merged());
        Self::compile(payer, blockhash, instructions, lookup_tables, tip_only)
    }

    /// A new transaction identical to this one except for the compute-unit limit.
    pub fn with_compute_unit_limit(&self, unit_limit: u32) -> Result<Self, PipelineError> {
        let limit_ix = ComputeBudgetInstruction::set_compute_unit_limit(unit_limit);
        let mut instructions = self.instructions.clone();
        match instructions.iter().position(|ix| {
            is_compute_budget_instruction(ix) && ix.data.first() == Some(&SET_COMPUTE_UNIT_LIMIT_TAG)
        }) {
            Some(idx) => instructions[idx] = limit_ix,
            None => instructions.insert(0, limit_ix),
        }
        Self::compile(
            self.payer,
            self.blockhash,
            instructions,
            self.lookup_tables.clone(),
            self.tip_only,
        )
    }

    pub fn payer(&self) -> &Pubkey {
        &self.payer
    }

    pub fn blockhash(&self) -> &Hash {
        &self.blockhash
    }

    pub fn instructions(&self) -> &[Instruction] {
        &self.instructions
    }

    pub fn lookup_tables(&self) -> &[AddressLookupTableAccount] {
        &self.lookup_tables
    }

    pub fn message(&self) -> &VersionedMessage {
        &self.message
    }

    pub fn is_tip_only(&self) -> bool {
        self.tip_only
    }

    pub fn compute_unit_limit(&self) -> Option<u32> {
        find_in_instructions(&self.instructions).unit_limit
    }

    pub fn compute_unit_price(&self) -> Option<u64> {
        find_in_instructions(&self.instructions).unit_price
    }

    /// Placeholder signatures; only valid for simulation with `sig_verify: false`.
    pub fn unsigned(&self) -> VersionedTransaction {
        let required = self.message.header().num_required_signatures as usize;
        VersionedTransaction {
            signatures: vec![Signature::default(); required],
            message: self.message.clone(),
        }
    }

    pub fn sign(&self, signer: &Keypair) -> Result<VersionedTransaction, PipelineError> {
        Ok(VersionedTransaction::try_new(self.message.clone(), &[signer])?)
    }
}
