use crate::{
    dex::{QuoteResult, SwapRequest, SwapVenue, VenueKind},
    error::PipelineError,
    transaction::InstructionSet,
};
use async_trait::async_trait;
use solana_sdk::{
    instruction::{AccountMeta, Instruction},
    pubkey::Pubkey,
};
use std::sync::atomic::{AtomicUsize, Ordering};

/// A venue that always quotes `out_amount` or always fails with `reason`.
pub struct MockVenue {
    kind: VenueKind,
    outcome: Result<u64, String>,
    program_id: Pubkey,
    calls: AtomicUsize,
}

impl MockVenue {
    pub fn succeeding(kind: VenueKind, out_amount: u64) -> Self {
        Self {
            kind,
            outcome: Ok(out_amount),
            program_id: Pubkey::new_unique(),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn failing(kind: VenueKind, reason: &str) -> Self {
        Self {
            kind,
            outcome: Err(reason.to_string()),
            program_id: Pubkey::new_unique(),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn program_id(&self) -> Pubkey {
        self.program_id
    }
}

#[async_trait]
impl SwapVenue for MockVenue {
    fn kind(&self) -> VenueKind {
        self.kind
    }

    async fn quote_and_build(&self, request: &SwapRequest) -> Result<QuoteResult, PipelineError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let out_amount = self
            .outcome
            .clone()
            .map_err(|reason| PipelineError::venue(self.kind, reason))?;
        let swap_ix = Instruction::new_with_bytes(
            self.program_id,
            &out_amount.to_le_bytes(),
            vec![AccountMeta::new(request.user, true)],
        );
        Ok(QuoteResult {
            venue: self.kind,
            in_amount: request.amount,
            out_amount,
            other_amount_threshold: out_amount,
            instructions: InstructionSet::new(vec![swap_ix]),
            lookup_tables: Vec::new(),
        })
    }
}
