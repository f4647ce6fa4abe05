//! Jupiter V6 quote and swap-instructions payloads.

use crate::error::PipelineError;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use serde::{Deserialize, Serialize};
use solana_sdk::{
    instruction::{AccountMeta, Instruction},
    pubkey::Pubkey,
};
use std::str::FromStr;

/// Query parameters for `GET /quote`.
#[derive(Debug, Clone, Serialize)]
pub struct QuoteRequest {
    #[serde(rename = "inputMint")]
    pub input_mint: String,

    #[serde(rename = "outputMint")]
    pub output_mint: String,

    pub amount: u64,

    #[serde(rename = "slippageBps")]
    pub slippage_bps: u16,

    /// `ExactIn` or `ExactOut`
    #[serde(rename = "swapMode")]
    pub swap_mode: String,

    #[serde(rename = "onlyDirectRoutes")]
    pub only_direct_routes: bool,

    #[serde(rename = "maxAccounts", skip_serializing_if = "Option::is_none")]
    pub max_accounts: Option<u16>,
}

/// The fields read from a `/quote` response. The raw JSON is forwarded
/// unchanged to `/swap-instructions`.
#[derive(Debug, Clone, Deserialize)]
pub struct QuoteResponse {
    #[serde(rename = "inputMint")]
    pub input_mint: String,

    #[serde(rename = "inAmount")]
    pub in_amount: String,

    #[serde(rename = "outputMint")]
    pub output_mint: String,

    #[serde(rename = "outAmount")]
    pub out_amount: String,

    #[serde(rename = "otherAmountThreshold")]
    pub other_amount_threshold: String,

    #[serde(rename = "swapMode", default)]
    pub swap_mode: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SwapInstructionsRequest {
    #[serde(rename = "userPublicKey")]
    pub user_public_key: String,

    #[serde(rename = "quoteResponse")]
    pub quote_response: serde_json::Value,

    #[serde(rename = "wrapAndUnwrapSol")]
    pub wrap_and_unwrap_sol: bool,

    #[serde(rename = "payer", skip_serializing_if = "Option::is_none")]
    pub payer: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiAccountMeta {
    pub pubkey: String,
    #[serde(rename = "isSigner")]
    pub is_signer: bool,
    #[serde(rename = "isWritable")]
    pub is_writable: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiInstruction {
    #[serde(rename = "programId")]
    pub program_id: String,
    pub accounts: Vec<ApiAccountMeta>,
    /// base64
    pub data: String,
}

impl ApiInstruction {
    pub fn to_instruction(&self) -> Result<Instruction, PipelineError> {
        let program_id = parse_pubkey(&self.program_id)?;
        let accounts = self
            .accounts
            .iter()
            .map(|meta| {
                Ok(AccountMeta {
                    pubkey: parse_pubkey(&meta.pubkey)?,
                    is_signer: meta.is_signer,
                    is_writable: meta.is_writable,
                })
            })
            .collect::<Result<Vec<_>, PipelineError>>()?;
        let data = BASE64.decode(&self.data).map_err(|e| {
            PipelineError::ParseError(format!("Instruction data is not base64: {}", e))
        })?;
        Ok(Instruction {
            program_id,
            accounts,
            data,
        })
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SwapInstructionsResponse {
    #[serde(rename = "tokenLedgerInstruction", default)]
    pub token_ledger_instruction: Option<ApiInstruction>,

    #[serde(rename = "computeBudgetInstructions", default)]
    pub compute_budget_instructions: Vec<ApiInstruction>,

    #[serde(rename = "setupInstructions", default)]
    pub setup_instructions: Vec<ApiInstruction>,

    #[serde(rename = "swapInstruction")]
    pub swap_instruction: ApiInstruction,

    #[serde(rename = "cleanupInstruction", default)]
    pub cleanup_instruction: Option<ApiInstruction>,

    #[serde(rename = "addressLookupTableAddresses", default)]
    pub address_lookup_table_addresses: Vec<String>,
}

pub fn parse_pubkey(value: &str) -> Result<Pubkey, PipelineError> {
    Pubkey::from_str(value)
        .map_err(|e| PipelineError::ParseError(format!("Invalid pubkey '{}': {}", value, e)))
}

pub fn parse_amount(field: &str, value: &str) -> Result<u64, PipelineError> {
    value
        .parse::<u64>()
        .map_err(|e| PipelineError::ParseError(format!("Invalid {} '{}': {}", field, value, e)))
}
