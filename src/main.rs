// src/main.rs
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use log::info;
use solana_margin_pipeline::{
    cache::AccountCache,
    config::load_config,
    dex::{JupiterVenue, SwapRequest, SwapVenue},
    fees::{
        FeeEstimateApi, HeliusFeeClient, JitoTipFloorClient, PriorityFeeEstimator, SpeedTier,
        TipFloorApi,
    },
    sender::{create_sender, JitoRelayClient, RelayApi},
    solana::{accounts::LookupTableDecoder, ChainRpc, SolanaRpcClient},
    transaction::ComputeBudgetMode,
    utils::setup_logging,
};
use solana_sdk::{
    instruction::{AccountMeta, Instruction},
    pubkey::Pubkey,
    signer::Signer,
};
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "margin-pipeline", about = "Diagnostics for the margin transaction pipeline")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Priority fee (micro-lamports per CU) for an instruction touching the given accounts
    EstimateFee {
        #[arg(long)]
        program: Pubkey,
        /// Writable accounts of the instruction
        #[arg(long = "account", num_args = 1..)]
        accounts: Vec<Pubkey>,
        #[arg(long, default_value = "normal")]
        speed: SpeedTier,
    },
    /// Current relay tip floor
    TipFloor {
        #[arg(long)]
        percentile: Option<u8>,
    },
    /// Landing status of submitted bundles
    BundleStatus {
        #[arg(required = true)]
        bundle_ids: Vec<String>,
    },
    /// Aggregator quote for the trader wallet
    Quote {
        #[arg(long)]
        input_mint: Pubkey,
        #[arg(long)]
        output_mint: Pubkey,
        #[arg(long)]
        amount: u64,
        #[arg(long, default_value_t = 50)]
        slippage_bps: u16,
    },
    /// Build every configured component and report the wiring
    CheckConfig,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = load_config().context("loading configuration")?;
    setup_logging(&config.log_level).context("initializing logging")?;
    config.validate_and_log();
    let http_timeout = config.http_timeout();

    match cli.command {
        Command::EstimateFee {
            program,
            accounts,
            speed,
        } => {
            let rpc = Arc::new(SolanaRpcClient::new(&config.rpc_url));
            let fee_api = match &config.fee_api_url {
                Some(url) => Some(
                    Arc::new(HeliusFeeClient::new(url, http_timeout)?) as Arc<dyn FeeEstimateApi>
                ),
                None => None,
            };
            let estimator = PriorityFeeEstimator::new(rpc, fee_api)
                .with_default_price(config.default_priority_fee_micro_lamports);
            let instruction = Instruction::new_with_bytes(
                program,
                &[],
                accounts.iter().map(|a| AccountMeta::new(*a, false)).collect(),
            );
            let max_price = match config.compute_budget(speed)?.mode() {
                ComputeBudgetMode::Dynamic { max_price, .. } => max_price,
                ComputeBudgetMode::Fixed { price } => Some(price),
            };
            let price = estimator.estimate(&[instruction], speed, max_price).await;
            info!("Estimated {} priority fee: {} micro-lamports/CU", speed, price);
            println!("{}", price);
        }
        Command::TipFloor { percentile } => {
            let client = JitoTipFloorClient::new(&config.jito_tip_floor_url, http_timeout)?;
            let stats = client.get_tip_floor().await?;
            let percentile = percentile.unwrap_or(config.tip_percentile);
            println!("{:#?}", stats);
            println!("p{}: {} lamports", percentile, stats.lamports_at(percentile));
        }
        Command::BundleStatus { bundle_ids } => {
            let relay = JitoRelayClient::new(&config.jito_block_engine_url, http_timeout)?;
            let statuses = relay.get_bundle_statuses(&bundle_ids).await?;
            if statuses.is_empty() {
                println!("No status reported for {} bundle(s)", bundle_ids.len());
            }
            for status in statuses {
                println!(
                    "{}: {:?} at slot {:?} (err: {:?})",
                    status.bundle_id,
                    status.confirmation_status,
                    status.slot,
                    status.error()
                );
            }
        }
        Command::Quote {
            input_mint,
            output_mint,
            amount,
            slippage_bps,
        } => {
            let trader = config.load_trader_keypair()?;
            let rpc: Arc<dyn ChainRpc> = Arc::new(SolanaRpcClient::new(&config.rpc_url));
            let lookup_tables = Arc::new(AccountCache::new(
                rpc,
                LookupTableDecoder,
                config.account_cache_ttl(),
            ));
            let venue = JupiterVenue::new(&config.jupiter_api_url, http_timeout, lookup_tables)?;
            let mut request =
                SwapRequest::exact_in(trader.pubkey(), input_mint, output_mint, amount, slippage_bps);
            request.wrap_and_unwrap_sol = true;
            let quote = venue.quote_and_build(&request).await?;
            println!(
                "in {} out {} (min {}), {} instruction(s), {} lookup table(s)",
                quote.in_amount,
                quote.out_amount,
                quote.other_amount_threshold,
                quote.instructions.len(),
                quote.lookup_tables.len()
            );
        }
        Command::CheckConfig => {
            let trader = config.load_trader_keypair()?;
            let rpc: Arc<dyn ChainRpc> = Arc::new(SolanaRpcClient::new(&config.rpc_url));
            let tip_floor = Arc::new(JitoTipFloorClient::new(&config.jito_tip_floor_url, http_timeout)?);
            let relay = Arc::new(JitoRelayClient::new(&config.jito_block_engine_url, http_timeout)?);
            let tips = Arc::new(config.tip_estimator(tip_floor)?);
            let _sender = create_sender(config.sender_kind(relay, tips.clone())?, rpc);
            let budget = config.compute_budget(SpeedTier::Normal)?;
            println!("payer: {}", trader.pubkey());
            println!("sender: {}", config.sender_kind);
            println!("tip strategy: {:?}, bounds {:?}", tips.strategy(), tips.bounds());
            println!("compute budget: {:?}", budget);
            match config.protocol_program()? {
                Some(program) => println!("protocol program: {}", program),
                None => println!("protocol program: not set"),
            }
        }
    }

    Ok(())
}
