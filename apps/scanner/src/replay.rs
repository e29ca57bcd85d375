use anyhow::Result;
use log::{info, warn};
use schema::{AmountPolicy, BatchReport, ScanConfig, full_deltas, scan_mints, scan_swaps};
use serde_json::Value;
use std::{
    fs::File,
    io::{BufRead, BufReader},
    path::Path,
};

use crate::{config::ReplayKind, pipeline::log_report, sink::OutputSink};

const REPLAY_BATCH: usize = 500;

/// One recorded line: a `{"signature", "tx"}` envelope or a bare record.
///
/// Blank lines yield `None`.
pub fn parse_recorded_line(line: &str) -> Result<Option<Value>> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }

    let mut v: Value = serde_json::from_str(line)?;
    if let Some(tx) = v.get_mut("tx") {
        return Ok(Some(tx.take()));
    }
    Ok(Some(v))
}

async fn process_batch(
    kind: ReplayKind,
    values: &[Value],
    cfg: &ScanConfig,
    policy: AmountPolicy,
    sink: &mut OutputSink,
) -> Result<BatchReport> {
    let report = match kind {
        ReplayKind::Swaps => {
            let out = scan_swaps(values, cfg);
            sink.emit_all(&out.events).await?;
            out.report
        }
        ReplayKind::Mints => {
            let out = scan_mints(values, cfg);
            sink.emit_all(&out.events).await?;
            out.report
        }
        ReplayKind::Deltas => {
            let out = full_deltas(values, policy);
            sink.emit_all(&out.events).await?;
            out.report
        }
    };
    Ok(report)
}

/// Re-classify a recorded jsonl file without touching the network.
pub async fn replay_file(
    path: &Path,
    kind: ReplayKind,
    cfg: &ScanConfig,
    policy: AmountPolicy,
    sink: &mut OutputSink,
) -> Result<BatchReport> {
    info!("replay {:?} from {}", kind, path.display());

    let r = BufReader::new(File::open(path)?);

    let mut report = BatchReport::default();
    let mut batch: Vec<Value> = Vec::with_capacity(REPLAY_BATCH);

    for (n, line) in r.lines().enumerate() {
        let line = line?;
        match parse_recorded_line(&line) {
            Ok(Some(v)) => batch.push(v),
            Ok(None) => continue,
            Err(e) => {
                warn!("skip unreadable line {}: {e}", n + 1);
                report.seen += 1;
                report.malformed += 1;
                continue;
            }
        }

        if batch.len() == REPLAY_BATCH {
            let part = process_batch(kind, &batch, cfg, policy, sink).await?;
            report.merge(&part);
            batch.clear();
            info!("progress seen={} emitted={}", report.seen, report.emitted);
        }
    }

    if !batch.is_empty() {
        let part = process_batch(kind, &batch, cfg, policy, sink).await?;
        report.merge(&part);
    }

    log_report("replay", &report);
    Ok(report)
}
