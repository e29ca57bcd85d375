//! Batch helpers over raw JSON records.
//!
//! Every record is handled independently. Ingestion failures, rejections and
//! skips are counted and logged at debug level; none of them stops the batch.
//! Emitted events keep input order.

use log::debug;
use serde::Serialize;
use serde_json::Value;

use crate::config::ScanConfig;
use crate::deltas::AmountPolicy;
use crate::enriched::EnrichedTransaction;
use crate::mint::{MintClassifier, MintedToken};
use crate::swap::{SwapClassifier, SwapEvent, SwapSkip};
use crate::tx_facts::TxFacts;
use crate::validator::TransactionValidator;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BatchReport {
    pub seen: usize,
    /// Failed ingestion or delta computation
    pub malformed: usize,
    /// Not an event candidate
    pub rejected: usize,
    /// Candidate whose counterparty had no balance entry
    pub lookup_miss: usize,
    /// Candidate at or below the SOL threshold
    pub below_threshold: usize,
    pub emitted: usize,
}

impl BatchReport {
    pub fn merge(&mut self, other: &BatchReport) {
        self.seen += other.seen;
        self.malformed += other.malformed;
        self.rejected += other.rejected;
        self.lookup_miss += other.lookup_miss;
        self.below_threshold += other.below_threshold;
        self.emitted += other.emitted;
    }
}

#[derive(Debug, Clone)]
pub struct BatchOutcome<T> {
    pub events: Vec<T>,
    pub report: BatchReport,
}

impl<T> Default for BatchOutcome<T> {
    fn default() -> Self {
        Self {
            events: Vec::new(),
            report: BatchReport::default(),
        }
    }
}

fn signature_of(value: &Value) -> &str {
    value.get("signature").and_then(|v| v.as_str()).unwrap_or("?")
}

/// Swap events for `cfg.target_mint` found in a batch of enriched records.
pub fn scan_swaps(values: &[Value], cfg: &ScanConfig) -> BatchOutcome<SwapEvent> {
    let validator = TransactionValidator::new(cfg);
    let classifier = SwapClassifier::new(cfg);
    let mut out = BatchOutcome::default();

    for value in values {
        out.report.seen += 1;

        let tx = match EnrichedTransaction::from_json(value) {
            Ok(tx) => tx,
            Err(e) => {
                debug!("skip malformed record sig={}: {e}", signature_of(value));
                out.report.malformed += 1;
                continue;
            }
        };

        let candidate = match validator.check_swap(&tx) {
            Ok(c) => c,
            Err(reason) => {
                debug!("not a swap candidate sig={} reason={reason}", tx.signature);
                out.report.rejected += 1;
                continue;
            }
        };

        match classifier.evaluate_transfer(candidate.tx, candidate.transfer) {
            Ok(event) => {
                out.report.emitted += 1;
                out.events.push(event);
            }
            Err(skip) => {
                debug!("swap skipped sig={} reason={skip}", tx.signature);
                match skip {
                    SwapSkip::BelowThreshold => out.report.below_threshold += 1,
                    SwapSkip::LookupMiss => out.report.lookup_miss += 1,
                    SwapSkip::NoMatchingTransfer => out.report.rejected += 1,
                }
            }
        }
    }

    out
}

/// Tokens created in a batch of enriched records.
pub fn scan_mints(values: &[Value], cfg: &ScanConfig) -> BatchOutcome<MintedToken> {
    let validator = TransactionValidator::new(cfg);
    let classifier = MintClassifier::new();
    let mut out = BatchOutcome::default();

    for value in values {
        out.report.seen += 1;

        let tx = match EnrichedTransaction::from_json(value) {
            Ok(tx) => tx,
            Err(e) => {
                debug!("skip malformed record sig={}: {e}", signature_of(value));
                out.report.malformed += 1;
                continue;
            }
        };

        match validator.check_mint(&tx) {
            Ok(candidate) => {
                out.report.emitted += 1;
                out.events.push(classifier.classify(candidate));
            }
            Err(reason) => {
                debug!("not a mint candidate sig={} reason={reason}", tx.signature);
                out.report.rejected += 1;
            }
        }
    }

    out
}

/// Full balance deltas for a batch of `getTransaction` results.
pub fn full_deltas(values: &[Value], policy: AmountPolicy) -> BatchOutcome<TxFacts> {
    let mut out = BatchOutcome::default();

    for value in values {
        out.report.seen += 1;

        match TxFacts::from_json(value, "", policy) {
            Ok(facts) => {
                out.report.emitted += 1;
                out.events.push(facts);
            }
            Err(e) => {
                debug!("skip transaction: {e}");
                out.report.malformed += 1;
            }
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PUMP_FUN_PROGRAM_ID;
    use serde_json::json;

    fn swap(sig: &str, change: i64) -> Value {
        json!({
            "slot": 1,
            "signature": sig,
            "timestamp": 1733000000,
            "feePayer": "Buyer",
            "accountData": [ { "account": "Curve", "nativeBalanceChange": change } ],
            "tokenTransfers": [
                { "mint": "M", "fromUserAccount": "Curve", "toUserAccount": "Buyer",
                  "tokenAmount": 5.0 }
            ],
            "instructions": [ { "programId": PUMP_FUN_PROGRAM_ID } ]
        })
    }

    #[test]
    fn test_scan_swaps_counts_every_outcome() {
        let mut failed = swap("failed", 900000000);
        failed["transactionError"] = json!("err");
        let mut no_lookup = swap("no_lookup", 900000000);
        no_lookup["accountData"] = json!([]);

        let values = vec![
            swap("a", 1000000000),
            json!({ "signature": "broken" }),
            failed,
            swap("tiny", 1000),
            no_lookup,
            swap("b", -250000000),
        ];

        let cfg = ScanConfig::new("M").with_min_sol_amount(0.01);
        let out = scan_swaps(&values, &cfg);

        assert_eq!(
            out.report,
            BatchReport {
                seen: 6,
                malformed: 1,
                rejected: 1,
                lookup_miss: 1,
                below_threshold: 1,
                emitted: 2,
            }
        );
        let sigs: Vec<&str> = out.events.iter().map(|e| e.signature.as_str()).collect();
        assert_eq!(sigs, vec!["a", "b"]);
        assert!(out.events.iter().all(|e| e.is_buy));
    }

    #[test]
    fn test_scan_mints() {
        let create = json!({
            "slot": 2,
            "signature": "create",
            "feePayer": "P",
            "accountData": [],
            "tokenTransfers": [
                { "mint": "NewMint", "fromUserAccount": null, "fromTokenAccount": null,
                  "toUserAccount": "Curve", "tokenAmount": 1000000000.0 }
            ],
            "instructions": [ { "programId": PUMP_FUN_PROGRAM_ID } ]
        });

        let values = vec![create, swap("swap", 1000000000)];
        let out = scan_mints(&values, &ScanConfig::new("M"));

        assert_eq!(out.report.seen, 2);
        assert_eq!(out.report.emitted, 1);
        assert_eq!(out.report.rejected, 1);
        assert_eq!(out.events[0].mint, "NewMint");
        assert_eq!(out.events[0].signature, "create");
    }

    #[test]
    fn test_full_deltas_skips_malformed() {
        let good = json!({
            "slot": 5,
            "meta": { "err": null, "preBalances": [10], "postBalances": [4] },
            "transaction": { "message": { "accountKeys": ["A"] }, "signatures": ["s1"] }
        });
        let bad = json!({
            "slot": 6,
            "meta": { "err": null, "preBalances": [10, 1], "postBalances": [4] },
            "transaction": { "message": { "accountKeys": ["A"] }, "signatures": ["s2"] }
        });

        let out = full_deltas(&[good, bad], AmountPolicy::Strict);
        assert_eq!(out.report.emitted, 1);
        assert_eq!(out.report.malformed, 1);
        assert_eq!(out.events[0].signature, "s1");
        assert_eq!(out.events[0].sol_delta_for("A"), Some(-6));
    }

    #[test]
    fn test_report_merge() {
        let mut a = BatchReport { seen: 2, emitted: 1, rejected: 1, ..Default::default() };
        let b = BatchReport { seen: 3, malformed: 1, below_threshold: 2, ..Default::default() };
        a.merge(&b);

        assert_eq!(a.seen, 5);
        assert_eq!(a.malformed, 1);
        assert_eq!(a.below_threshold, 2);
        assert_eq!(a.emitted, 1);
    }
}
