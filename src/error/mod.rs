use crate::dex::VenueKind;
use solana_sdk::{message::CompileError, signer::SignerError};
use thiserror::Error;

#[derive(Debug, Clone, Error)]
pub enum PipelineError {
    /// Missing or malformed input, rejected before any network call
    #[error("Validation Error: {0}")]
    ValidationError(String),

    /// The transaction would fail on-chain. Never broadcast.
    #[error("Simulation Failed: {error}")]
    SimulationFailed { error: String, logs: Vec<String> },

    /// Broadcast or bundle rejected, or relay unreachable
    #[error("Send Error: {0}")]
    SendError(String),

    /// A single venue could not quote or build a swap
    #[error("Venue Error ({venue}): {reason}")]
    VenueError { venue: VenueKind, reason: String },

    /// Preferred venue and its alternate both failed
    #[error("All venues failed: preferred: {preferred}; alternate: {alternate}")]
    AllVenuesFailed { preferred: String, alternate: String },

    /// A bounded poll (leader slot, bundle confirmation) ran out
    #[error("Timeout Error: {0}")]
    TimeoutError(String),

    /// Chain RPC failures
    #[error("RPC Error: {0}")]
    RpcError(String),

    /// HTTP transport failures against fee, tip or aggregator APIs
    #[error("Network Error: {0}")]
    NetworkError(String),

    /// Undecodable account data or API payloads
    #[error("Parse Error: {0}")]
    ParseError(String),

    #[error("Config Error: {0}")]
    ConfigError(String),

    #[error("Signing Error: {0}")]
    SigningError(String),
}

impl From<serde_json::Error> for PipelineError {
    fn from(err: serde_json::Error) -> Self {
        PipelineError::ParseError(format!("JSON serialization/deserialization error: {}", err))
    }
}

impl From<reqwest::Error> for PipelineError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            PipelineError::TimeoutError(format!("HTTP request timed out: {}", err))
        } else if err.is_decode() {
            PipelineError::ParseError(format!("HTTP response decode error: {}", err))
        } else {
            PipelineError::NetworkError(format!("HTTP request failed: {}", err))
        }
    }
}

impl From<solana_client::client_error::ClientError> for PipelineError {
    fn from(err: solana_client::client_error::ClientError) -> Self {
        PipelineError::RpcError(format!("Solana client error: {}", err))
    }
}

impl From<CompileError> for PipelineError {
    fn from(err: CompileError) -> Self {
        PipelineError::ValidationError(format!("Message compile error: {}", err))
    }
}

impl From<SignerError> for PipelineError {
    fn from(err: SignerError) -> Self {
        PipelineError::SigningError(err.to_string())
    }
}

impl PipelineError {
    pub fn venue(venue: VenueKind, reason: impl Into<String>) -> Self {
        PipelineError::VenueError {
            venue,
            reason: reason.into(),
        }
    }

    /// Whether the same call may succeed if the caller tries again later.
    /// Simulation failures need a changed input (re-quote), not a retry.
    pub fn is_recoverable(&self) -> bool {
        match self {
            PipelineError::ValidationError(_) => false,
            PipelineError::SimulationFailed { .. } => false,
            PipelineError::SendError(_) => true,
            PipelineError::VenueError { .. } => true,
            PipelineError::AllVenuesFailed { .. } => true,
            PipelineError::TimeoutError(_) => true,
            PipelineError::RpcError(_) => true,
            PipelineError::NetworkError(_) => true,
            PipelineError::ParseError(_) => false,
            PipelineError::ConfigError(_) => false,
            PipelineError::SigningError(_) => false,
        }
    }

    pub fn categorize(&self) -> ErrorCategory {
        match self {
            PipelineError::ValidationError(_) => ErrorCategory::Input,
            PipelineError::SimulationFailed { .. } => ErrorCategory::OnChain,
            PipelineError::SendError(_) => ErrorCategory::Network,
            PipelineError::VenueError { .. } => ErrorCategory::Venue,
            PipelineError::AllVenuesFailed { .. } => ErrorCategory::Venue,
            PipelineError::TimeoutError(_) => ErrorCategory::Network,
            PipelineError::RpcError(_) | PipelineError::NetworkError(_) => ErrorCategory::Network,
            PipelineError::ParseError(_) => ErrorCategory::Input,
            PipelineError::ConfigError(_) => ErrorCategory::Configuration,
            PipelineError::SigningError(_) => ErrorCategory::Configuration,
        }
    }

    /// Simulation logs, when the error carries them.
    pub fn logs(&self) -> &[String] {
        match self {
            PipelineError::SimulationFailed { logs, .. } => logs,
            _ => &[],
        }
    }
}

/// Coarse buckets a caller uses to pick abort, retry or re-quote.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Would fail on-chain
    OnChain,
    /// Network, RPC or relay problem
    Network,
    /// Bad input
    Input,
    /// Liquidity venue could not serve the swap
    Venue,
    Configuration,
}

pub type Result<T> = std::result::Result<T, PipelineError>;
