// src/dex/jupiter.rs
//! Aggregator venue backed by the Jupiter V6 HTTP API.

use super::{
    jupiter_api::{
        parse_amount, parse_pubkey, QuoteRequest, QuoteResponse, SwapInstructionsRequest,
        SwapInstructionsResponse,
    },
    QuoteResult, SwapRequest, SwapVenue, VenueKind,
};
use crate::{
    cache::AccountCache,
    error::PipelineError,
    transaction::{compute_budget::is_compute_budget_instruction, InstructionSet},
};
use async_trait::async_trait;
use log::{debug, info};
use reqwest::Client;
use solana_sdk::{address_lookup_table::AddressLookupTableAccount, pubkey::Pubkey};
use std::{sync::Arc, time::Duration};

pub struct JupiterVenue {
    client: Client,
    base_url: String,
    lookup_tables: Arc<AccountCache<AddressLookupTableAccount>>,
}

impl JupiterVenue {
    pub fn new(
        base_url: &str,
        timeout: Duration,
        lookup_tables: Arc<AccountCache<AddressLookupTableAccount>>,
    ) -> Result<Self, PipelineError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| PipelineError::ConfigError(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            lookup_tables,
        })
    }

    async fn get_quote(
        &self,
        request: &SwapRequest,
    ) -> Result<(QuoteResponse, serde_json::Value), PipelineError> {
        let query = QuoteRequest {
            input_mint: request.input_mint.to_string(),
            output_mint: request.output_mint.to_string(),
            amount: request.amount,
            slippage_bps: request.slippage_bps,
            swap_mode: request.mode.to_string(),
            only_direct_routes: request.only_direct_routes,
            max_accounts: request.max_accounts,
        };
        let url = format!("{}/quote", self.base_url);
        debug!("[Jupiter] GET {} {:?}", url, query);

        let response = self.client.get(&url).query(&query).send().await?;
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(PipelineError::venue(
                VenueKind::Aggregator,
                format!("quote returned HTTP {}: {}", status, body),
            ));
        }
        let raw: serde_json::Value = response.json().await?;
        let quote: QuoteResponse = serde_json::from_value(raw.clone())?;
        Ok((quote, raw))
    }

    async fn get_swap_instructions(
        &self,
        request: &SwapRequest,
        raw_quote: serde_json::Value,
    ) -> Result<SwapInstructionsResponse, PipelineError> {
        let body = SwapInstructionsRequest {
            user_public_key: request.user.to_string(),
            quote_response: raw_quote,
            wrap_and_unwrap_sol: request.wrap_and_unwrap_sol,
            payer: request.payer.map(|p| p.to_string()),
        };
        let url = format!("{}/swap-instructions", self.base_url);
        let response = self.client.post(&url).json(&body).send().await?;
        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(PipelineError::venue(
                VenueKind::Aggregator,
                format!("swap-instructions returned HTTP {}: {}", status, text),
            ));
        }
        Ok(response.json().await?)
    }

    async fn resolve_lookup_tables(
        &self,
        addresses: &[String],
    ) -> Result<Vec<AddressLookupTableAccount>, PipelineError> {
        let keys = addresses
            .iter()
            .map(|a| parse_pubkey(a))
            .collect::<Result<Vec<Pubkey>, _>>()?;
        let found = self.lookup_tables.get_accounts(&keys).await?;
        keys.iter()
            .map(|key| {
                found.get(key).map(|table| (**table).clone()).ok_or_else(|| {
                    PipelineError::venue(
                        VenueKind::Aggregator,
                        format!("lookup table {} not found", key),
                    )
                })
            })
            .collect()
    }

    async fn quote_inner(&self, request: &SwapRequest) -> Result<QuoteResult, PipelineError> {
        let (quote, raw) = self.get_quote(request).await?;
        let swap = self.get_swap_instructions(request, raw).await?;
        let tables = self
            .resolve_lookup_tables(&swap.address_lookup_table_addresses)
            .await?;
        let result = assemble_quote(&quote, swap, tables)?;
        info!(
            "[Jupiter] {} -> {}: in {} out {} (threshold {})",
            request.input_mint,
            request.output_mint,
            result.in_amount,
            result.out_amount,
            result.other_amount_threshold
        );
        Ok(result)
    }
}

/// Normalizes an aggregator response. The token ledger instruction leads the
/// setup list and aggregator compute-budget instructions are dropped.
pub fn assemble_quote(
    quote: &QuoteResponse,
    swap: SwapInstructionsResponse,
    lookup_tables: Vec<AddressLookupTableAccount>,
) -> Result<QuoteResult, PipelineError> {
    let mut setup = Vec::with_capacity(swap.setup_instructions.len() + 1);
    if let Some(ledger) = &swap.token_ledger_instruction {
        setup.push(ledger.to_instruction()?);
    }
    for ix in &swap.setup_instructions {
        setup.push(ix.to_instruction()?);
    }
    setup.retain(|ix| !is_compute_budget_instruction(ix));

    let core = vec![swap.swap_instruction.to_instruction()?];
    let cleanup = swap
        .cleanup_instruction
        .as_ref()
        .map(|ix| ix.to_instruction())
        .transpose()?
        .into_iter()
        .collect();

    debug!(
        "[Jupiter] Dropped {} aggregator compute-budget instruction(s)",
        swap.compute_budget_instructions.len()
    );

    Ok(QuoteResult {
        venue: VenueKind::Aggregator,
        in_amount: parse_amount("inAmount", &quote.in_amount)?,
        out_amount: parse_amount("outAmount", &quote.out_amount)?,
        other_amount_threshold: parse_amount(
            "otherAmountThreshold",
            &quote.other_amount_threshold,
        )?,
        instructions: InstructionSet::new(core)
            .with_setup(setup)
            .with_cleanup(cleanup),
        lookup_tables,
    })
}

#[async_trait]
impl SwapVenue for JupiterVenue {
    fn kind(&self) -> VenueKind {
        VenueKind::Aggregator
    }

    async fn quote_and_build(&self, request: &SwapRequest) -> Result<QuoteResult, PipelineError> {
        self.quote_inner(request).await.map_err(|e| match e {
            venue @ PipelineError::VenueError { .. } => venue,
            other => PipelineError::venue(VenueKind::Aggregator, other.to_string()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        solana::accounts::LookupTableDecoder,
        testing::{lookup_table_account, MockChainRpc},
    };
    use mockito::{Matcher, Server};
    use pretty_assertions::assert_eq;
    use serde_json::json;

    const SWAP_INSTRUCTIONS: &str = r#"{
        "tokenLedgerInstruction": {
            "programId": "JUP6LkbZbjS1jKKwapdHNy74zcZ3tLUZoi5QNyVTaV4",
            "accounts": [{"pubkey": "11111111111111111111111111111111", "isSigner": false, "isWritable": true}],
            "data": "AQ=="
        },
        "computeBudgetInstructions": [{
            "programId": "ComputeBudget111111111111111111111111111111",
            "accounts": [],
            "data": "AsBcFQA="
        }],
        "setupInstructions": [{
            "programId": "ATokenGPvbdGVxr1b2hvZbsiqW5xWH25efTNsLJA8knL",
            "accounts": [],
            "data": "AQ=="
        }],
        "swapInstruction": {
            "programId": "JUP6LkbZbjS1jKKwapdHNy74zcZ3tLUZoi5QNyVTaV4",
            "accounts": [],
            "data": "5RfLl3rjrSoBAAAAAA=="
        },
        "cleanupInstruction": null,
        "addressLookupTableAddresses": []
    }"#;

    #[test]
    fn test_assemble_orders_ledger_first_and_drops_budget() {
        let quote: QuoteResponse = serde_json::from_str(
            r#"{"inputMint":"So11111111111111111111111111111111111111112","inAmount":"1000000",
                "outputMint":"EPjFWdd5AufqSSqeM2qN1xzybapC8G4wEGGkZwyTDt1v","outAmount":"150000",
                "otherAmountThreshold":"149250","swapMode":"ExactIn","slippageBps":50,
                "routePlan":[],"contextSlot":1,"timeTaken":0.01,"priceImpactPct":"0"}"#,
        )
        .unwrap();
        let swap: SwapInstructionsResponse = serde_json::from_str(SWAP_INSTRUCTIONS).unwrap();

        let result = assemble_quote(&quote, swap, vec![]).unwrap();

        assert_eq!(result.venue, VenueKind::Aggregator);
        assert_eq!(result.in_amount, 1_000_000);
        assert_eq!(result.other_amount_threshold, 149_250);
        assert_eq!(result.instructions.setup.len(), 2);
        assert_eq!(
            result.instructions.setup[0].program_id.to_string(),
            "JUP6LkbZbjS1jKKwapdHNy74zcZ3tLUZoi5QNyVTaV4"
        );
        assert_eq!(result.instructions.core.len(), 1);
        assert!(result.instructions.cleanup.is_empty());
        assert!(!result
            .instructions
            .merged()
            .iter()
            .any(is_compute_budget_instruction));
    }

    const INPUT_MINT: &str = "So11111111111111111111111111111111111111112";
    const OUTPUT_MINT: &str = "EPjFWdd5AufqSSqeM2qN1xzybapC8G4wEGGkZwyTDt1v";
    const JUPITER_PROGRAM: &str = "JUP6LkbZbjS1jKKwapdHNy74zcZ3tLUZoi5QNyVTaV4";

    fn quote_body() -> serde_json::Value {
        json!({
            "inputMint": INPUT_MINT,
            "inAmount": "1000000",
            "outputMint": OUTPUT_MINT,
            "outAmount": "150000",
            "otherAmountThreshold": "149250",
            "swapMode": "ExactIn",
            "slippageBps": 50,
            "routePlan": [{ "percent": 100 }],
            "contextSlot": 77
        })
    }

    fn swap_instructions_body(tables: &[Pubkey]) -> serde_json::Value {
        json!({
            "computeBudgetInstructions": [{
                "programId": "ComputeBudget111111111111111111111111111111",
                "accounts": [],
                "data": "AsBcFQA="
            }],
            "setupInstructions": [],
            "swapInstruction": {
                "programId": JUPITER_PROGRAM,
                "accounts": [],
                "data": "5RfLl3rjrSoBAAAAAA=="
            },
            "cleanupInstruction": null,
            "addressLookupTableAddresses": tables.iter().map(|t| t.to_string()).collect::<Vec<_>>()
        })
    }

    fn venue(server: &Server, rpc: Arc<MockChainRpc>) -> JupiterVenue {
        let tables = Arc::new(AccountCache::new(rpc, LookupTableDecoder, None));
        JupiterVenue::new(&server.url(), Duration::from_secs(5), tables).unwrap()
    }

    fn request() -> SwapRequest {
        let mut request = SwapRequest::exact_in(
            Pubkey::new_unique(),
            parse_pubkey(INPUT_MINT).unwrap(),
            parse_pubkey(OUTPUT_MINT).unwrap(),
            1_000_000,
            50,
        );
        request.wrap_and_unwrap_sol = true;
        request.payer = Some(Pubkey::new_unique());
        request
    }

    #[tokio::test]
    async fn test_quote_forwarded_to_swap_instructions() {
        let mut server = Server::new_async().await;
        let rpc = Arc::new(MockChainRpc::new());
        let table = Pubkey::new_unique();
        let table_entries = vec![Pubkey::new_unique(), Pubkey::new_unique()];
        rpc.set_account(table, lookup_table_account(&table_entries));
        let request = request();

        let quote_mock = server
            .mock("GET", "/quote")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("inputMint".into(), INPUT_MINT.into()),
                Matcher::UrlEncoded("outputMint".into(), OUTPUT_MINT.into()),
                Matcher::UrlEncoded("amount".into(), "1000000".into()),
                Matcher::UrlEncoded("slippageBps".into(), "50".into()),
                Matcher::UrlEncoded("swapMode".into(), "ExactIn".into()),
            ]))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(quote_body().to_string())
            .create_async()
            .await;
        let swap_mock = server
            .mock("POST", "/swap-instructions")
            .match_body(Matcher::PartialJson(json!({
                "userPublicKey": request.user.to_string(),
                "wrapAndUnwrapSol": true,
                "payer": request.payer.unwrap().to_string(),
                "quoteResponse": { "routePlan": [{ "percent": 100 }], "contextSlot": 77 }
            })))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(swap_instructions_body(&[table]).to_string())
            .create_async()
            .await;

        let result = venue(&server, rpc.clone())
            .quote_and_build(&request)
            .await
            .unwrap();

        quote_mock.assert_async().await;
        swap_mock.assert_async().await;
        assert_eq!(result.out_amount, 150_000);
        assert_eq!(result.instructions.core.len(), 1);
        assert!(result.instructions.setup.is_empty());
        assert_eq!(result.lookup_tables.len(), 1);
        assert_eq!(result.lookup_tables[0].key, table);
        assert_eq!(result.lookup_tables[0].addresses, table_entries);
        assert_eq!(rpc.multiple_accounts_calls(), 1);
    }

    #[tokio::test]
    async fn test_http_failure_is_an_aggregator_venue_error() {
        let mut server = Server::new_async().await;
        let quote_mock = server
            .mock("GET", "/quote")
            .match_query(Matcher::Any)
            .with_status(429)
            .with_body("rate limited")
            .create_async()
            .await;
        let swap_mock = server
            .mock("POST", "/swap-instructions")
            .expect(0)
            .create_async()
            .await;

        let err = venue(&server, Arc::new(MockChainRpc::new()))
            .quote_and_build(&request())
            .await
            .unwrap_err();

        quote_mock.assert_async().await;
        swap_mock.assert_async().await;
        match err {
            PipelineError::VenueError { venue, reason } => {
                assert_eq!(venue, VenueKind::Aggregator);
                assert!(reason.contains("429"));
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_missing_lookup_table_fails_the_venue() {
        let mut server = Server::new_async().await;
        let _quote = server
            .mock("GET", "/quote")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(quote_body().to_string())
            .create_async()
            .await;
        let _swap = server
            .mock("POST", "/swap-instructions")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(swap_instructions_body(&[Pubkey::new_unique()]).to_string())
            .create_async()
            .await;

        let result = venue(&server, Arc::new(MockChainRpc::new()))
            .quote_and_build(&request())
            .await;

        assert!(matches!(
            result,
            Err(PipelineError::VenueError { venue: VenueKind::Aggregator, .. })
        ));
    }
}
