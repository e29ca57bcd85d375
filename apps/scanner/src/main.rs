use anyhow::Result;
use clap::Parser;
use log::info;

mod config;
mod enrich;
mod kafka;
mod pipeline;
mod replay;
mod rpc;
mod sink;
mod timerange;
mod types;

use config::{Command, Config, ReplayKind};
use enrich::EnrichClient;
use rpc::RpcClient;
use sink::KafkaTarget;

fn setup_logging() {
    let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .try_init();
}

fn log_config(cfg: &Config) {
    info!("scanner starting:");
    info!("  rpc_url={}", cfg.rpc_url);
    info!("  rpc_concurrency={}", cfg.rpc_concurrency);
    info!("  rpc_min_delay_ms={}", cfg.rpc_min_delay_ms);
    info!("  enrich_api_url={}", cfg.enrich_api_url);
    info!("  enrich_api_key={}", if cfg.enrich_api_key.is_some() { "set" } else { "unset" });
    info!("  swap_program_id={}", cfg.swap_program_id);
    info!("  create_program_id={}", cfg.create_program_id);
    info!("  min_sol_amount={}", cfg.min_sol_amount);
    info!("  require_counterparties={}", cfg.require_counterparties);
    if let Some(ref s) = cfg.tx_source {
        info!("  tx_source={}", s);
    }
    if let Some(ref t) = cfg.tx_type {
        info!("  tx_type={}", t);
    }
}

fn rpc_client(cfg: &Config) -> Result<RpcClient> {
    RpcClient::new(cfg.rpc_url.clone(), cfg.rpc_concurrency, cfg.rpc_min_delay_ms)
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    setup_logging();

    let cli = config::Cli::parse();
    let cfg = config::load(&cli)?;
    log_config(&cfg);

    let kafka = if cli.kafka {
        info!("  kafka_broker={} kafka_topic={}", cfg.kafka_broker, cfg.kafka_topic);
        Some(KafkaTarget {
            producer: kafka::create_producer(&cfg.kafka_broker)?,
            topic: cfg.kafka_topic.clone(),
        })
    } else {
        None
    };

    let mut out = sink::open_output(cli.out.as_deref(), kafka)?;
    if let Some(path) = &cli.out {
        info!("writing events to {}", path.display());
    }

    match &cli.command {
        Command::Swaps { mint, limit, record } => {
            let mint = cfg.resolve_mint(mint.as_deref())?;
            let rpc = rpc_client(&cfg)?;
            let enrich = EnrichClient::new(&cfg.enrich_api_url, cfg.require_api_key()?)?;

            pipeline::run_swaps(
                &rpc,
                &enrich,
                &mut out,
                &cfg.scan_config(&mint),
                *limit,
                cli.concurrency,
                record.as_deref(),
            )
            .await?;
        }
        Command::Tokens { start, end, limit, record } => {
            let rpc = rpc_client(&cfg)?;
            let enrich = EnrichClient::new(&cfg.enrich_api_url, cfg.require_api_key()?)?;
            let mint = cfg.target_mint.clone().unwrap_or_default();

            pipeline::run_tokens(
                &rpc,
                &enrich,
                &mut out,
                &cfg.scan_config(&mint),
                *start,
                *end,
                *limit,
                cli.concurrency,
                record.as_deref(),
            )
            .await?;
        }
        Command::Deltas { signatures, zero_fill, record } => {
            let rpc = rpc_client(&cfg)?;

            pipeline::run_deltas(
                &rpc,
                &mut out,
                signatures,
                config::amount_policy(*zero_fill),
                record.as_deref(),
            )
            .await?;
        }
        Command::Replay { from_file, kind, mint, zero_fill } => {
            let mint = match kind {
                ReplayKind::Swaps => cfg.resolve_mint(mint.as_deref())?,
                _ => mint.clone().or_else(|| cfg.target_mint.clone()).unwrap_or_default(),
            };

            replay::replay_file(
                from_file,
                *kind,
                &cfg.scan_config(&mint),
                config::amount_policy(*zero_fill),
                &mut out,
            )
            .await?;
        }
    }

    out.flush()?;
    info!("emitted {} events", out.emitted());
    Ok(())
}
