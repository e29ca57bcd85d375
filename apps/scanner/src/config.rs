use anyhow::{Result, anyhow};
use clap::{Parser, Subcommand, ValueEnum};
use schema::{AmountPolicy, PUMP_FUN_PROGRAM_ID, ScanConfig};
use std::{env, path::PathBuf};

#[derive(Parser, Debug, Clone)]
#[command(name = "scanner", about = "pump.fun swap and token-creation scanner")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// RPC URL (overrides RPC_URL)
    #[arg(long, global = true)]
    pub rpc_url: Option<String>,

    /// Write emitted events as JSON lines to this file instead of stdout
    #[arg(long, global = true)]
    pub out: Option<PathBuf>,

    /// Also publish emitted events to KAFKA_TOPIC
    #[arg(long, global = true)]
    pub kafka: bool,

    /// Concurrent enrichment chunks
    #[arg(long, global = true, default_value_t = 4)]
    pub concurrency: usize,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Swaps of one mint, newest first
    Swaps {
        /// Target mint (falls back to TARGET_MINT)
        #[arg(long)]
        mint: Option<String>,

        /// Stop after this many finalized signatures
        #[arg(long)]
        limit: Option<usize>,

        /// Append raw enriched records to this jsonl file
        #[arg(long)]
        record: Option<PathBuf>,
    },

    /// Tokens created between two unix timestamps
    Tokens {
        #[arg(long)]
        start: i64,

        #[arg(long)]
        end: i64,

        #[arg(long)]
        limit: Option<usize>,

        #[arg(long)]
        record: Option<PathBuf>,
    },

    /// Full SOL and token deltas of individual transactions
    Deltas {
        #[arg(required = true)]
        signatures: Vec<String>,

        /// Treat unparseable token amounts as zero
        #[arg(long)]
        zero_fill: bool,

        #[arg(long)]
        record: Option<PathBuf>,
    },

    /// Re-classify a recorded jsonl file offline
    Replay {
        #[arg(long)]
        from_file: PathBuf,

        #[arg(long, value_enum)]
        kind: ReplayKind,

        /// Target mint for swap replay (falls back to TARGET_MINT)
        #[arg(long)]
        mint: Option<String>,

        #[arg(long)]
        zero_fill: bool,
    },
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplayKind {
    Swaps,
    Mints,
    Deltas,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub rpc_url: String,
    pub rpc_concurrency: u32,
    pub rpc_min_delay_ms: u64,

    pub enrich_api_url: String,
    pub enrich_api_key: Option<String>,

    pub target_mint: Option<String>,
    pub swap_program_id: String,
    pub create_program_id: String,
    pub min_sol_amount: f64,
    pub require_counterparties: bool,
    pub tx_source: Option<String>,
    pub tx_type: Option<String>,

    pub kafka_broker: String,
    pub kafka_topic: String,
}

fn parse_bool(v: Option<String>, default: bool) -> bool {
    match v.as_deref() {
        Some("1") | Some("true") | Some("TRUE") | Some("yes") | Some("YES") => true,
        Some("0") | Some("false") | Some("FALSE") | Some("no") | Some("NO") => false,
        None => default,
        _ => default,
    }
}

fn non_empty(v: Option<String>) -> Option<String> {
    v.map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
}

pub fn load(cli: &Cli) -> Result<Config> {
    from_vars(cli, |key| env::var(key).ok())
}

/// Build the config from any variable lookup.
pub fn from_vars(cli: &Cli, var: impl Fn(&str) -> Option<String>) -> Result<Config> {
    let rpc_url = cli
        .rpc_url
        .clone()
        .or_else(|| non_empty(var("RPC_URL")))
        .unwrap_or_else(|| "https://api.mainnet-beta.solana.com".to_string());

    let rpc_concurrency = match non_empty(var("RPC_CONCURRENCY")) {
        Some(s) => s.parse().map_err(|_| anyhow!("Invalid RPC_CONCURRENCY={s}"))?,
        None => 4,
    };
    if rpc_concurrency == 0 {
        return Err(anyhow!("RPC_CONCURRENCY must be at least 1"));
    }

    let rpc_min_delay_ms = match non_empty(var("RPC_MIN_DELAY_MS")) {
        Some(s) => s.parse().map_err(|_| anyhow!("Invalid RPC_MIN_DELAY_MS={s}"))?,
        None => 0,
    };

    let enrich_api_url =
        non_empty(var("ENRICH_API_URL")).unwrap_or_else(|| "https://api.helius.xyz".to_string());
    let enrich_api_key = non_empty(var("ENRICH_API_KEY"));

    let target_mint = non_empty(var("TARGET_MINT"));
    let swap_program_id =
        non_empty(var("PUMP_FUN_PROGRAM_ID")).unwrap_or_else(|| PUMP_FUN_PROGRAM_ID.to_string());
    let create_program_id =
        non_empty(var("CREATE_PROGRAM_ID")).unwrap_or_else(|| swap_program_id.clone());

    let min_sol_amount: f64 = match non_empty(var("MIN_SOL_AMOUNT")) {
        Some(s) => s.parse().map_err(|_| anyhow!("Invalid MIN_SOL_AMOUNT={s}"))?,
        None => 0.0,
    };
    if !min_sol_amount.is_finite() || min_sol_amount < 0.0 {
        return Err(anyhow!("MIN_SOL_AMOUNT must be a non-negative number"));
    }

    let require_counterparties = parse_bool(var("REQUIRE_COUNTERPARTIES"), true);
    let tx_source = non_empty(var("TX_SOURCE"));
    let tx_type = non_empty(var("TX_TYPE"));

    let kafka_broker = var("KAFKA_BROKER").unwrap_or_else(|| "localhost:19092".to_string());
    let kafka_topic = var("KAFKA_TOPIC").unwrap_or_else(|| "pump_events".to_string());

    Ok(Config {
        rpc_url,
        rpc_concurrency,
        rpc_min_delay_ms,
        enrich_api_url,
        enrich_api_key,
        target_mint,
        swap_program_id,
        create_program_id,
        min_sol_amount,
        require_counterparties,
        tx_source,
        tx_type,
        kafka_broker,
        kafka_topic,
    })
}

impl Config {
    /// Classification settings for `target_mint`.
    pub fn scan_config(&self, target_mint: &str) -> ScanConfig {
        ScanConfig::new(target_mint)
            .with_swap_program(&self.swap_program_id)
            .with_create_program(&self.create_program_id)
            .with_min_sol_amount(self.min_sol_amount)
            .with_require_counterparties(self.require_counterparties)
            .with_labels(self.tx_source.clone(), self.tx_type.clone())
    }

    /// `--mint` first, then TARGET_MINT.
    pub fn resolve_mint(&self, flag: Option<&str>) -> Result<String> {
        flag.map(str::to_string)
            .or_else(|| self.target_mint.clone())
            .ok_or_else(|| anyhow!("Missing target mint: pass --mint or set TARGET_MINT"))
    }

    pub fn require_api_key(&self) -> Result<&str> {
        self.enrich_api_key
            .as_deref()
            .ok_or_else(|| anyhow!("Missing ENRICH_API_KEY"))
    }
}

pub fn amount_policy(zero_fill: bool) -> AmountPolicy {
    if zero_fill {
        AmountPolicy::ZeroFill
    } else {
        AmountPolicy::Strict
    }
}
