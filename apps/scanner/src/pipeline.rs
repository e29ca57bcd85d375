use anyhow::{Result, anyhow};
use futures::{StreamExt, stream};
use log::{info, warn};
use schema::{
    AmountPolicy, BatchOutcome, BatchReport, ScanConfig, full_deltas, scan_mints, scan_swaps,
};
use serde::Serialize;
use serde_json::Value;
use std::{path::Path, time::Duration};
use tokio::time::sleep;

use crate::{
    enrich::{EnrichClient, chunk_signatures},
    rpc::RpcClient,
    sink::{Keyed, OutputSink, Recorder},
    timerange,
};

/// Largest page `getSignaturesForAddress` returns
const SIGNATURE_PAGE_SIZE: usize = 1000;

const DELTA_REQUEST_DELAY: Duration = Duration::from_millis(200);

/// Finalized signatures of `address`, newest first, paging backwards from
/// `before` until an empty page, `until`, or `limit`.
pub async fn fetch_finalized_signatures(
    rpc: &RpcClient,
    address: &str,
    mut before: Option<String>,
    until: Option<&str>,
    limit: Option<usize>,
) -> Result<Vec<String>> {
    let mut signatures: Vec<String> = Vec::new();

    loop {
        if limit.is_some_and(|l| signatures.len() >= l) {
            break;
        }

        let page = rpc
            .get_signatures_for_address(address, before.as_deref(), until, SIGNATURE_PAGE_SIZE)
            .await
            .map_err(|e| anyhow!("getSignaturesForAddress failed: {e:?}"))?;

        let Some(last) = page.last() else {
            break;
        };
        before = Some(last.signature.clone());

        signatures.extend(
            page.iter()
                .filter(|s| s.is_finalized())
                .map(|s| s.signature.clone()),
        );

        info!(
            "collected signatures: {} (page oldest slot={} block_time={:?})",
            signatures.len(),
            last.slot,
            last.block_time
        );
    }

    if let Some(l) = limit {
        signatures.truncate(l);
    }
    if signatures.is_empty() {
        warn!("No transactions found for: {address}");
    }

    Ok(signatures)
}

/// Enrich `signatures` chunk by chunk and stream each chunk through `scan`.
///
/// Chunks are fetched concurrently but handled in signature order.
async fn scan_enriched<T, F>(
    enrich: &EnrichClient,
    signatures: &[String],
    concurrency: usize,
    recorder: &mut Option<Recorder>,
    sink: &mut OutputSink,
    scan: F,
) -> Result<BatchReport>
where
    T: Serialize + Keyed,
    F: Fn(&[Value]) -> BatchOutcome<T>,
{
    let chunks = chunk_signatures(signatures);
    let total = chunks.len();
    info!("fetching {} signatures in {} chunks…", signatures.len(), total);

    let mut stream = stream::iter(chunks)
        .map(|chunk| {
            let enrich = enrich.clone();
            async move { enrich.fetch_chunk(&chunk).await }
        })
        .buffered(concurrency.max(1));

    let mut report = BatchReport::default();
    let mut done = 0usize;

    while let Some(res) = stream.next().await {
        let records = res?;

        if let Some(rec) = recorder.as_mut() {
            rec.record_all(&records)?;
        }

        let outcome = scan(&records);
        sink.emit_all(&outcome.events).await?;
        report.merge(&outcome.report);

        done += 1;
        if done.is_multiple_of(10) || done == total {
            info!(
                "progress chunks={}/{} seen={} emitted={} malformed={} rejected={}",
                done, total, report.seen, report.emitted, report.malformed, report.rejected
            );
        }
    }

    Ok(report)
}

fn open_recorder(record: Option<&Path>) -> Result<Option<Recorder>> {
    record.map(Recorder::open).transpose()
}

fn finish_recorder(recorder: Option<Recorder>) -> Result<()> {
    if let Some(rec) = recorder {
        let n = rec.finish()?;
        info!("recorded {n} raw records");
    }
    Ok(())
}

pub fn log_report(label: &str, report: &BatchReport) {
    info!(
        "{} done. seen={} emitted={} malformed={} rejected={} lookup_miss={} below_threshold={}",
        label,
        report.seen,
        report.emitted,
        report.malformed,
        report.rejected,
        report.lookup_miss,
        report.below_threshold
    );
}

/// Swaps of `cfg.target_mint` over its whole finalized history.
#[allow(clippy::too_many_arguments)]
pub async fn run_swaps(
    rpc: &RpcClient,
    enrich: &EnrichClient,
    sink: &mut OutputSink,
    cfg: &ScanConfig,
    limit: Option<usize>,
    concurrency: usize,
    record: Option<&Path>,
) -> Result<BatchReport> {
    info!(
        "swaps: mint={} limit={:?} concurrency={} min_sol_amount={}",
        cfg.target_mint, limit, concurrency, cfg.min_sol_amount
    );

    let signatures = fetch_finalized_signatures(rpc, &cfg.target_mint, None, None, limit).await?;

    let mut recorder = open_recorder(record)?;
    let report = scan_enriched(enrich, &signatures, concurrency, &mut recorder, sink, |values| {
        scan_swaps(values, cfg)
    })
    .await?;
    finish_recorder(recorder)?;

    log_report("swap scan", &report);
    Ok(report)
}

/// Tokens created by `cfg.create_program_id` between two unix timestamps.
#[allow(clippy::too_many_arguments)]
pub async fn run_tokens(
    rpc: &RpcClient,
    enrich: &EnrichClient,
    sink: &mut OutputSink,
    cfg: &ScanConfig,
    start: i64,
    end: i64,
    limit: Option<usize>,
    concurrency: usize,
    record: Option<&Path>,
) -> Result<BatchReport> {
    if start >= end {
        return Err(anyhow!("--start ({start}) must be before --end ({end})"));
    }
    info!(
        "tokens: program={} start={} end={} limit={:?}",
        cfg.create_program_id, start, end, limit
    );

    let start_block = timerange::block_at(rpc, start).await?;
    let end_block = timerange::block_at(rpc, end).await?;
    info!(
        "window: slot {} ({}) .. slot {} ({})",
        start_block.slot, start_block.first_signature, end_block.slot, end_block.first_signature
    );

    let signatures = fetch_finalized_signatures(
        rpc,
        &cfg.create_program_id,
        Some(end_block.first_signature),
        Some(&start_block.first_signature),
        limit,
    )
    .await?;

    let mut recorder = open_recorder(record)?;
    let report = scan_enriched(enrich, &signatures, concurrency, &mut recorder, sink, |values| {
        scan_mints(values, cfg)
    })
    .await?;
    finish_recorder(recorder)?;

    log_report("token scan", &report);
    Ok(report)
}

/// Full balance deltas for each signature, fetched one at a time.
pub async fn run_deltas(
    rpc: &RpcClient,
    sink: &mut OutputSink,
    signatures: &[String],
    policy: AmountPolicy,
    record: Option<&Path>,
) -> Result<BatchReport> {
    info!("deltas: {} signatures policy={:?}", signatures.len(), policy);

    let mut recorder = open_recorder(record)?;
    let mut report = BatchReport::default();

    for (i, sig) in signatures.iter().enumerate() {
        if i > 0 {
            sleep(DELTA_REQUEST_DELAY).await;
        }

        let tx = rpc.get_transaction_json_parsed(sig).await?;
        if tx.is_null() {
            warn!("transaction not found sig={sig}");
            report.seen += 1;
            report.malformed += 1;
            continue;
        }

        if let Some(rec) = recorder.as_mut() {
            rec.record(sig, &tx)?;
        }

        let outcome = full_deltas(std::slice::from_ref(&tx), policy);
        if outcome.report.malformed > 0 {
            warn!("could not compute deltas sig={sig}");
        }
        sink.emit_all(&outcome.events).await?;
        report.merge(&outcome.report);
    }
    finish_recorder(recorder)?;

    log_report("deltas", &report);
    Ok(report)
}
