//! pump.fun scan tests
//!
//! Tests for:
//! - Enriched batch classification (swaps and token creations)
//! - Full balance deltas from a jsonParsed RPC transaction
//! - Report counters for every skip path

use serde_json::Value;
use std::fs;

use schema::{
    AmountPolicy, BatchReport, EnrichedTransaction, MintClassifier, ScanConfig, SwapClassifier,
    TransactionValidator, TxFacts, full_deltas, scan_mints, scan_swaps,
};

const FIXTURES_DIR: &str = "tests/fixtures";

const TARGET_MINT: &str = "KbCZjfexzrExJr7DmTcg8rqKCqrc5cxTPVvopoKJGwg";
const CURVE: &str = "CebN5WGQ4jvEPvsVU4EoHEpgzq1VV7AbicfhtW4xC9iM";
const BUYER: &str = "7xKXtg2CW87d97TXJSDpbD5jBkheTqA83TZRuJosgAsU";
const SELLER: &str = "5tzFkiKscXHK5ZXCGbXZxdw7gTjjD1mBwuoFbhUvuAi9";

fn load_fixture(name: &str) -> Value {
    let path = format!("{}/{}.json", FIXTURES_DIR, name);
    let content = fs::read_to_string(&path)
        .unwrap_or_else(|e| panic!("Failed to read fixture {}: {}", path, e));
    serde_json::from_str(&content)
        .unwrap_or_else(|e| panic!("Failed to parse fixture {}: {}", path, e))
}

fn load_batch() -> Vec<Value> {
    load_fixture("enriched_pump_batch")
        .as_array()
        .cloned()
        .expect("batch fixture is an array")
}

fn scan_config() -> ScanConfig {
    ScanConfig::new(TARGET_MINT).with_min_sol_amount(0.01)
}

// =============================================================================
// Swap scan
// =============================================================================

mod swap_scan_tests {
    use super::*;

    #[test]
    fn test_swap_batch_report() {
        let out = scan_swaps(&load_batch(), &scan_config());

        assert_eq!(
            out.report,
            BatchReport {
                seen: 6,
                malformed: 1,
                rejected: 2,
                lookup_miss: 0,
                below_threshold: 1,
                emitted: 2,
            }
        );
    }

    #[test]
    fn test_buy_event() {
        let out = scan_swaps(&load_batch(), &scan_config());
        let buy = &out.events[0];

        assert!(buy.is_buy);
        assert_eq!(buy.user_address, BUYER);
        assert_eq!(buy.mint, TARGET_MINT);
        assert_eq!(buy.sol_amount, 1.25);
        assert_eq!(buy.token_amount, 3512408.123456);
        assert_eq!(buy.slot, 301228500);
        assert_eq!(buy.timestamp, "2024-11-30T21:10:00Z");
    }

    #[test]
    fn test_sell_event() {
        let out = scan_swaps(&load_batch(), &scan_config());
        let sell = &out.events[1];

        assert!(!sell.is_buy);
        assert_eq!(sell.user_address, SELLER);
        assert_eq!(sell.sol_amount, 0.6);
        assert_eq!(sell.token_amount, 2000000.0);
    }

    #[test]
    fn test_failed_transaction_never_emits() {
        let batch = load_batch();
        let failed = EnrichedTransaction::from_json(&batch[2]).unwrap();
        let cfg = ScanConfig::new(TARGET_MINT);

        assert!(failed.is_failed());
        assert!(!TransactionValidator::new(&cfg).is_swap_candidate(&failed));
        assert!(!TransactionValidator::new(&cfg).is_mint_candidate(&failed));
        assert!(MintClassifier::new().classify_tx(&cfg, &failed).is_none());
    }

    #[test]
    fn test_lower_threshold_admits_dust_swap() {
        let cfg = ScanConfig::new(TARGET_MINT).with_min_sol_amount(0.00001);
        let out = scan_swaps(&load_batch(), &cfg);

        assert_eq!(out.report.emitted, 3);
        assert_eq!(out.report.below_threshold, 0);
        assert_eq!(out.events[2].sol_amount, 0.0001);
    }

    #[test]
    fn test_source_label_filter() {
        let cfg = scan_config().with_labels(Some("PUMP_FUN".into()), Some("SWAP".into()));
        let out = scan_swaps(&load_batch(), &cfg);

        // The aggregator-routed swap is labelled JUPITER
        assert_eq!(out.report.rejected, 3);
        assert_eq!(out.report.below_threshold, 0);
        assert_eq!(out.report.emitted, 2);
    }

    #[test]
    fn test_classifier_alone_matches_batch() {
        let cfg = scan_config();
        let buy = EnrichedTransaction::from_json(&load_batch()[0]).unwrap();

        let ev = SwapClassifier::new(&cfg).classify(&buy).unwrap();
        assert_eq!(ev, scan_swaps(&load_batch(), &cfg).events[0]);
    }
}

// =============================================================================
// Token creation scan
// =============================================================================

mod mint_scan_tests {
    use super::*;

    #[test]
    fn test_mint_batch() {
        let out = scan_mints(&load_batch(), &scan_config());

        assert_eq!(out.report.seen, 6);
        assert_eq!(out.report.malformed, 1);
        assert_eq!(out.report.rejected, 4);
        assert_eq!(out.report.emitted, 1);

        let minted = &out.events[0];
        assert_eq!(minted.mint, "2bTp9hUFyZ4QmFfJ8FoU9jYJ1XQ6PcWnbyV8mwQ9pump");
        let expected_sig = concat!(
            "61tPv5kBo6t6u9Js5PQ8Mqj1uHTVKzHn3a4sVQsXo7kqCGnN",
            "dyBXf3kZJBj9bWQMcHTYN8R6iFmvRbpV2i9Q7Ujx"
        );
        assert_eq!(minted.signature, expected_sig);
    }

    #[test]
    fn test_create_program_filter() {
        let cfg = scan_config().with_create_program("SomeOtherLaunchpad1111111111111111111111111");
        let out = scan_mints(&load_batch(), &cfg);

        assert_eq!(out.report.emitted, 0);
    }
}

// =============================================================================
// Full deltas
// =============================================================================

mod full_delta_tests {
    use super::*;

    #[test]
    fn test_rpc_sol_deltas() {
        let tx = load_fixture("rpc_pump_buy_parsed");
        let facts = TxFacts::from_json(&tx, "", AmountPolicy::Strict).unwrap();

        let expected_sig = concat!(
            "4pQ8mSLbYsRaRwnSnH1kP1c4LJFqkKJ5Qb6TQ1qFJrQcN",
            "TC2uDKbHqS3XbWm5bnYhA8h9WvK8cdVwU7BfYk2Tz1"
        );
        assert_eq!(facts.signature, expected_sig);
        assert!(facts.is_success);
        assert_eq!(facts.sol_deltas.len(), 4);
        assert_eq!(facts.sol_delta_for(BUYER), Some(-1267605000));
        assert_eq!(facts.sol_delta_for(CURVE), Some(1250000000));
        let rent_payee = "9WzDXwBbmkg8ZTbNMqUxvQRAyrZzDsGYdLVL9zYtAWWM";
        assert_eq!(facts.sol_delta_for(rent_payee), Some(2039280));

        // Index order is preserved
        let accounts: Vec<&str> = facts.sol_deltas.iter().map(|d| d.account.as_str()).collect();
        assert_eq!(accounts[0], BUYER);
        assert_eq!(accounts[1], CURVE);
    }

    #[test]
    fn test_rpc_sol_deltas_conserve_totals() {
        let tx = load_fixture("rpc_pump_buy_parsed");
        let facts = TxFacts::from_json(&tx, "", AmountPolicy::Strict).unwrap();

        let sum_of = |ptr: &str| -> i64 {
            tx.pointer(ptr)
                .and_then(|v| v.as_array())
                .unwrap()
                .iter()
                .map(|v| v.as_i64().unwrap())
                .sum()
        };
        let delta_sum: i64 = facts.sol_deltas.iter().map(|d| d.delta_lamports).sum();
        assert_eq!(delta_sum, sum_of("/meta/postBalances") - sum_of("/meta/preBalances"));
    }

    #[test]
    fn test_rpc_token_deltas_reconcile_union() {
        let tx = load_fixture("rpc_pump_buy_parsed");
        let facts = TxFacts::from_json(&tx, "", AmountPolicy::Strict).unwrap();

        assert_eq!(facts.token_deltas.len(), 3);
        // Curve vault paid out
        assert_eq!(facts.token_delta_for(CURVE, TARGET_MINT), Some(-3512408123456));
        // Buyer token account created in this transaction
        assert_eq!(facts.token_delta_for(BUYER, TARGET_MINT), Some(3512408123456));
        // Wrapped SOL account closed in this transaction
        assert_eq!(
            facts.token_delta_for(BUYER, "So11111111111111111111111111111111111111112"),
            Some(-1000000)
        );
    }

    #[test]
    fn test_full_deltas_batch() {
        let tx = load_fixture("rpc_pump_buy_parsed");
        let mut broken = tx.clone();
        broken["meta"]["preTokenBalances"][0]["uiTokenAmount"]["amount"] = Value::from("n/a");

        let strict = full_deltas(&[tx.clone(), broken.clone()], AmountPolicy::Strict);
        assert_eq!(strict.report.emitted, 1);
        assert_eq!(strict.report.malformed, 1);

        let lenient = full_deltas(&[broken], AmountPolicy::ZeroFill);
        assert_eq!(lenient.report.emitted, 1);
        assert_eq!(
            lenient.events[0].token_delta_for(CURVE, TARGET_MINT),
            Some(796487591876544)
        );
    }
}
