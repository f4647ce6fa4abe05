use std::env;

#[derive(Debug, Clone)]
pub struct Config {
    pub rpc_url: String,
    pub fee_api_url: Option<String>,
    pub jito_block_engine_url: String,
    pub jito_tip_floor_url: String,
    pub jupiter_api_url: String,
    pub http_timeout_ms: u64,
    pub default_priority_fee_micro_lamports: u64,
    pub max_priority_fee_micro_lamports: u64,
    pub compute_unit_buffer_pct: u32,
    pub account_cache_ttl_secs: Option<u64>,
    pub sender_kind: String,
    pub tip_strategy: String,
    pub tip_percentile: u8,
    pub min_tip_lamports: u64,
    pub max_tip_lamports: Option<u64>,
    pub leader_poll_interval_ms: u64,
    pub max_leader_polls: u32,
    pub bundle_confirm_timeout_secs: u64,
    pub protocol_program_id: Option<String>,
    pub trader_wallet_keypair_path: String,
    pub log_level: String,
}

impl Config {
    pub fn from_env() -> Self {
        Config {
            rpc_url: env::var("RPC_URL")
                .unwrap_or_else(|_| "https://api.mainnet-beta.solana.com".to_string()),
            fee_api_url: env::var("FEE_API_URL").ok().filter(|s| !s.is_empty()),
            jito_block_engine_url: env::var("JITO_BLOCK_ENGINE_URL").unwrap_or_else(|_| {
                "https://mainnet.block-engine.jito.wtf/api/v1/bundles".to_string()
            }),
            jito_tip_floor_url: env::var("JITO_TIP_FLOOR_URL").unwrap_or_else(|_| {
                "https://bundles.jito.wtf/api/v1/bundles/tip_floor".to_string()
            }),
            jupiter_api_url: env::var("JUPITER_API_URL")
                .unwrap_or_else(|_| "https://quote-api.jup.ag/v6".to_string()),
            http_timeout_ms: env::var("HTTP_TIMEOUT_MS")
                .unwrap_or_else(|_| "5000".to_string())
                .parse()
                .unwrap_or(5000),
            default_priority_fee_micro_lamports: env::var("DEFAULT_PRIORITY_FEE_MICRO_LAMPORTS")
                .unwrap_or_else(|_| "10000".to_string())
                .parse()
                .unwrap_or(10_000),
            max_priority_fee_micro_lamports: env::var("MAX_PRIORITY_FEE_MICRO_LAMPORTS")
                .unwrap_or_else(|_| "2000000".to_string())
                .parse()
                .unwrap_or(2_000_000),
            compute_unit_buffer_pct: env::var("COMPUTE_UNIT_BUFFER_PCT")
                .unwrap_or_else(|_| "120".to_string())
                .parse()
                .unwrap_or(120),
            account_cache_ttl_secs: env::var("ACCOUNT_CACHE_TTL_SECS")
                .ok()
                .and_then(|v| v.parse().ok()),
            sender_kind: env::var("SENDER_KIND").unwrap_or_else(|_| "direct".to_string()),
            tip_strategy: env::var("TIP_STRATEGY").unwrap_or_else(|_| "tip_floor".to_string()),
            tip_percentile: env::var("TIP_PERCENTILE")
                .unwrap_or_else(|_| "75".to_string())
                .parse()
                .unwrap_or(75),
            min_tip_lamports: env::var("MIN_TIP_LAMPORTS")
                .unwrap_or_else(|_| "1000".to_string())
                .parse()
                .unwrap_or(1_000),
            max_tip_lamports: env::var("MAX_TIP_LAMPORTS")
                .ok()
                .and_then(|v| v.parse().ok()),
            leader_poll_interval_ms: env::var("LEADER_POLL_INTERVAL_MS")
                .unwrap_or_else(|_| "500".to_string())
                .parse()
                .unwrap_or(500),
            max_leader_polls: env::var("MAX_LEADER_POLLS")
                .unwrap_or_else(|_| "120".to_string())
                .parse()
                .unwrap_or(120),
            bundle_confirm_timeout_secs: env::var("BUNDLE_CONFIRM_TIMEOUT_SECS")
                .unwrap_or_else(|_| "30".to_string())
                .parse()
                .unwrap_or(30),
            protocol_program_id: env::var("PROTOCOL_PROGRAM_ID").ok(),
            trader_wallet_keypair_path: env::var("TRADER_WALLET_KEYPAIR_PATH")
                .unwrap_or_else(|_| ".config/solana/id.json".to_string()),
            log_level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
        }
    }

    /// Defaults with no environment lookups, for tests.
    pub fn test_default() -> Self {
        Config {
            rpc_url: "http://127.0.0.1:8899".to_string(),
            fee_api_url: None,
            jito_block_engine_url: "http://127.0.0.1:8898/api/v1/bundles".to_string(),
            jito_tip_floor_url: "http://127.0.0.1:8898/api/v1/bundles/tip_floor".to_string(),
            jupiter_api_url: "http://127.0.0.1:8897/v6".to_string(),
            http_timeout_ms: 1000,
            default_priority_fee_micro_lamports: 10_000,
            max_priority_fee_micro_lamports: 2_000_000,
            compute_unit_buffer_pct: 120,
            account_cache_ttl_secs: None,
            sender_kind: "direct".to_string(),
            tip_strategy: "tip_floor".to_string(),
            tip_percentile: 75,
            min_tip_lamports: 1_000,
            max_tip_lamports: None,
            leader_poll_interval_ms: 500,
            max_leader_polls: 120,
            bundle_confirm_timeout_secs: 30,
            protocol_program_id: None,
            trader_wallet_keypair_path: ".config/solana/id.json".to_string(),
            log_level: "info".to_string(),
        }
    }

    pub fn validate_and_log(&self) {
        log::info!("Application Configuration Loaded: {:?}", self);
        if self.compute_unit_buffer_pct < 100 {
            log::warn!(
                "COMPUTE_UNIT_BUFFER_PCT={} is below 100; simulated limits will be undercut.",
                self.compute_unit_buffer_pct
            );
        }
    }
}
