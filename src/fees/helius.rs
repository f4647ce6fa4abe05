// src/fees/helius.rs
//! Client for the `getPriorityFeeEstimate` JSON-RPC method.

use crate::error::PipelineError;
use async_trait::async_trait;
use log::debug;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use solana_sdk::pubkey::Pubkey;
use std::time::Duration;

/// Fee levels in micro-lamports per compute unit, as published by the service.
#[derive(Debug, Clone, Copy, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PriorityFeeLevels {
    #[serde(default)]
    pub min: f64,
    #[serde(default)]
    pub low: f64,
    #[serde(default)]
    pub medium: f64,
    #[serde(default)]
    pub high: f64,
    #[serde(default)]
    pub very_high: f64,
    #[serde(default)]
    pub unsafe_max: f64,
}

#[async_trait]
pub trait FeeEstimateApi: Send + Sync {
    async fn get_priority_fee_levels(
        &self,
        writable_accounts: &[Pubkey],
    ) -> Result<PriorityFeeLevels, PipelineError>;
}

#[derive(Debug, Deserialize)]
struct RpcResponse {
    result: Option<EstimateResult>,
    error: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EstimateResult {
    priority_fee_levels: Option<PriorityFeeLevels>,
}

#[derive(Debug, Clone)]
pub struct HeliusFeeClient {
    client: Client,
    url: String,
}

impl HeliusFeeClient {
    pub fn new(url: &str, timeout: Duration) -> Result<Self, PipelineError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| PipelineError::ConfigError(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self {
            client,
            url: url.to_string(),
        })
    }
}

#[async_trait]
impl FeeEstimateApi for HeliusFeeClient {
    async fn get_priority_fee_levels(
        &self,
        writable_accounts: &[Pubkey],
    ) -> Result<PriorityFeeLevels, PipelineError> {
        let account_keys: Vec<String> = writable_accounts.iter().map(|k| k.to_string()).collect();
        let request = json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": "getPriorityFeeEstimate",
            "params": [{
                "accountKeys": account_keys,
                "options": { "includeAllPriorityFeeLevels": true }
            }]
        });
        debug!(
            "[FeeApi] getPriorityFeeEstimate for {} writable account(s)",
            writable_accounts.len()
        );

        let response = self.client.post(&self.url).json(&request).send().await?;
        if !response.status().is_success() {
            return Err(PipelineError::NetworkError(format!(
                "Fee API returned HTTP {}",
                response.status()
            )));
        }
        let body: RpcResponse = response.json().await?;
        if let Some(error) = body.error {
            return Err(PipelineError::NetworkError(format!(
                "getPriorityFeeEstimate failed: {}",
                error
            )));
        }
        body.result
            .and_then(|r| r.priority_fee_levels)
            .ok_or_else(|| {
                PipelineError::ParseError("getPriorityFeeEstimate returned no fee levels".into())
            })
    }
}
