//! Balance delta computation.
//!
//! SOL deltas are index-aligned with the account key list. Token deltas are
//! reconciled over the union of `(owner, mint)` keys seen before and after
//! the transaction, so drained and newly created token accounts are measured
//! against an implicit zero.

use log::debug;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::config::LAMPORTS_PER_SOL;
use crate::enriched::AccountData;
use crate::error::{Result, SchemaError};
use crate::tx_facts::TokenBalance;

/// SOL balance change of one account (lamports, nonzero)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SolDelta {
    pub account: String,
    pub delta_lamports: i64,
}

/// Key of a token delta set
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TokenKey {
    pub owner: String,
    pub mint: String,
}

/// Token balance change for one (owner, mint) pair (base units, nonzero)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenDelta {
    pub owner: String,
    pub mint: String,
    pub delta_amount: i128,
}

/// How to treat a token amount string that is not an integer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum AmountPolicy {
    /// Fail the record with `ParseDegradation`
    #[default]
    Strict,
    /// Count the balance as zero and keep going
    ZeroFill,
}

impl AmountPolicy {
    /// SPL amounts are `u64`; anything wider is treated as unparseable.
    fn parse(self, field: &str, raw: &str) -> Result<u64> {
        match raw.trim().parse::<u64>() {
            Ok(v) => Ok(v),
            Err(_) => match self {
                AmountPolicy::Strict => Err(SchemaError::ParseDegradation {
                    field: field.to_string(),
                    value: raw.to_string(),
                }),
                AmountPolicy::ZeroFill => {
                    debug!("zero-filling unparseable amount {field}={raw:?}");
                    Ok(0)
                }
            },
        }
    }
}

/// Per-account lamport deltas, in account index order.
///
/// Walks `pre` by index; accounts beyond the key list are labelled
/// `unknown_<i>`. Extra trailing `post` entries are ignored, a `post`
/// shorter than `pre` is malformed.
pub fn compute_sol_deltas(
    account_keys: &[String],
    pre: &[u64],
    post: &[u64],
) -> Result<Vec<SolDelta>> {
    if post.len() < pre.len() {
        return Err(SchemaError::MalformedInput(format!(
            "postBalances has {} entries, preBalances has {}",
            post.len(),
            pre.len()
        )));
    }

    let mut deltas = Vec::new();

    for (i, (pre_bal, post_bal)) in pre.iter().zip(post).enumerate() {
        if pre_bal == post_bal {
            continue;
        }

        let account = account_keys
            .get(i)
            .cloned()
            .unwrap_or_else(|| format!("unknown_{i}"));

        deltas.push(SolDelta {
            account,
            delta_lamports: post_bal.wrapping_sub(*pre_bal) as i64,
        });
    }

    Ok(deltas)
}

fn token_amounts(
    balances: &[TokenBalance],
    field: &str,
    policy: AmountPolicy,
) -> Result<BTreeMap<TokenKey, u128>> {
    let mut out: BTreeMap<TokenKey, u128> = BTreeMap::new();

    for b in balances {
        let Some(owner) = b.owner.as_deref().filter(|o| !o.is_empty()) else {
            debug!("skipping {field} entry without owner, mint={}", b.mint);
            continue;
        };

        let raw = &b.ui_token_amount.amount;
        let amount = u128::from(policy.parse(field, raw)?);
        let key = TokenKey {
            owner: owner.to_string(),
            mint: b.mint.clone(),
        };

        // Several token accounts may share one owner and mint
        let total = out.entry(key).or_insert(0);
        *total = total
            .checked_add(amount)
            .ok_or_else(|| SchemaError::ParseDegradation {
                field: field.to_string(),
                value: raw.to_string(),
            })?;
    }

    Ok(out)
}

/// Token deltas keyed by `(owner, mint)`, over the union of pre and post keys.
pub fn compute_token_deltas(
    pre: &[TokenBalance],
    post: &[TokenBalance],
    policy: AmountPolicy,
) -> Result<BTreeMap<TokenKey, TokenDelta>> {
    let pre_map = token_amounts(pre, "preTokenBalances", policy)?;
    let post_map = token_amounts(post, "postTokenBalances", policy)?;

    let mut deltas = BTreeMap::new();

    for key in pre_map.keys().chain(post_map.keys()) {
        if deltas.contains_key(key) {
            continue;
        }

        let pre_amount = pre_map.get(key).copied().unwrap_or(0);
        let post_amount = post_map.get(key).copied().unwrap_or(0);
        if pre_amount == post_amount {
            continue;
        }
        let delta_amount = signed_difference(post_amount, pre_amount).ok_or_else(|| {
            SchemaError::MalformedInput(format!(
                "token delta for {}/{} does not fit i128",
                key.owner, key.mint
            ))
        })?;

        deltas.insert(
            key.clone(),
            TokenDelta {
                owner: key.owner.clone(),
                mint: key.mint.clone(),
                delta_amount,
            },
        );
    }

    Ok(deltas)
}

fn signed_difference(post: u128, pre: u128) -> Option<i128> {
    if post >= pre {
        i128::try_from(post - pre).ok()
    } else {
        i128::try_from(pre - post).ok().map(|d| -d)
    }
}

/// Absolute native balance change of `target`, in SOL.
///
/// `None` when no `accountData` entry matches; the caller decides what a
/// miss means.
pub fn native_balance_change_sol(account_data: &[AccountData], target: &str) -> Option<f64> {
    account_data
        .iter()
        .find(|a| a.account.trim() == target)
        .map(|a| a.native_balance_change.unsigned_abs() as f64 / LAMPORTS_PER_SOL as f64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tx_facts::UiTokenAmount;

    fn keys(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    fn bal(owner: &str, mint: &str, amount: &str) -> TokenBalance {
        TokenBalance {
            account_index: 0,
            owner: Some(owner.to_string()),
            mint: mint.to_string(),
            ui_token_amount: UiTokenAmount {
                amount: amount.to_string(),
                decimals: Some(6),
            },
        }
    }

    #[test]
    fn test_sol_deltas_two_accounts() {
        let deltas = compute_sol_deltas(&keys(&["A", "B"]), &[100, 50], &[40, 110]).unwrap();

        assert_eq!(
            deltas,
            vec![
                SolDelta { account: "A".into(), delta_lamports: -60 },
                SolDelta { account: "B".into(), delta_lamports: 60 },
            ]
        );
    }

    #[test]
    fn test_sol_deltas_skip_unchanged_and_label_unknown() {
        let deltas = compute_sol_deltas(&keys(&["A"]), &[10, 20, 30], &[10, 25, 0]).unwrap();

        assert_eq!(deltas.len(), 2);
        assert_eq!(deltas[0].account, "unknown_1");
        assert_eq!(deltas[0].delta_lamports, 5);
        assert_eq!(deltas[1].account, "unknown_2");
        assert_eq!(deltas[1].delta_lamports, -30);
    }

    #[test]
    fn test_sol_deltas_conserve_totals() {
        let pre = [5_000_000_000u64, 12, 0, 890_880, 42];
        let post = [4_899_995_000u64, 12, 100_000_000, 890_880, 5_042];
        let deltas = compute_sol_deltas(&keys(&["a", "b", "c", "d", "e"]), &pre, &post).unwrap();

        let sum: i64 = deltas.iter().map(|d| d.delta_lamports).sum();
        let expected = post.iter().sum::<u64>() as i64 - pre.iter().sum::<u64>() as i64;
        assert_eq!(sum, expected);
        assert!(deltas.iter().all(|d| d.delta_lamports != 0));
    }

    #[test]
    fn test_sol_deltas_short_post_is_malformed() {
        let err = compute_sol_deltas(&keys(&["A", "B"]), &[1, 2], &[1]).unwrap_err();
        assert!(matches!(err, SchemaError::MalformedInput(_)));
    }

    #[test]
    fn test_sol_deltas_ignore_trailing_post_entries() {
        let deltas = compute_sol_deltas(&keys(&["A"]), &[100], &[40, 7]).unwrap();

        assert_eq!(deltas, vec![SolDelta { account: "A".into(), delta_lamports: -60 }]);
    }

    #[test]
    fn test_sol_deltas_extreme_balances() {
        let deltas = compute_sol_deltas(&keys(&["A"]), &[u64::MAX], &[u64::MAX - 5]).unwrap();
        assert_eq!(deltas[0].delta_lamports, -5);
    }

    #[test]
    fn test_token_delta_drained_account() {
        let deltas =
            compute_token_deltas(&[bal("X", "M", "1000")], &[], AmountPolicy::Strict).unwrap();

        assert_eq!(deltas.len(), 1);
        let d = deltas.values().next().unwrap();
        assert_eq!(d.owner, "X");
        assert_eq!(d.mint, "M");
        assert_eq!(d.delta_amount, -1000);
    }

    #[test]
    fn test_token_delta_new_account() {
        let deltas =
            compute_token_deltas(&[], &[bal("Y", "M", "250")], AmountPolicy::Strict).unwrap();

        let key = TokenKey { owner: "Y".into(), mint: "M".into() };
        assert_eq!(deltas[&key].delta_amount, 250);
    }

    #[test]
    fn test_token_delta_unchanged_is_dropped() {
        let deltas = compute_token_deltas(
            &[bal("X", "M", "7"), bal("X", "N", "1")],
            &[bal("X", "M", "7"), bal("X", "N", "3")],
            AmountPolicy::Strict,
        )
        .unwrap();

        assert_eq!(deltas.len(), 1);
        assert!(deltas.values().all(|d| d.delta_amount != 0));
        assert_eq!(deltas.values().next().unwrap().mint, "N");
    }

    #[test]
    fn test_token_delta_sums_accounts_with_same_owner_and_mint() {
        let deltas = compute_token_deltas(
            &[bal("X", "M", "100"), bal("X", "M", "50")],
            &[bal("X", "M", "100")],
            AmountPolicy::Strict,
        )
        .unwrap();

        assert_eq!(deltas.len(), 1);
        assert_eq!(deltas.values().next().unwrap().delta_amount, -50);
    }

    #[test]
    fn test_strict_policy_surfaces_bad_amount() {
        let err = compute_token_deltas(&[bal("X", "M", "12.5")], &[], AmountPolicy::Strict)
            .unwrap_err();

        match err {
            SchemaError::ParseDegradation { field, value } => {
                assert_eq!(field, "preTokenBalances");
                assert_eq!(value, "12.5");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_zero_fill_policy_treats_bad_amount_as_zero() {
        let deltas = compute_token_deltas(
            &[bal("X", "M", "garbage")],
            &[bal("X", "M", "40")],
            AmountPolicy::ZeroFill,
        )
        .unwrap();

        assert_eq!(deltas.values().next().unwrap().delta_amount, 40);
    }

    #[test]
    fn test_amount_wider_than_u64_is_rejected() {
        let huge = "200000000000000000000000000000000000000";

        let err = compute_token_deltas(&[], &[bal("X", "M", huge)], AmountPolicy::Strict)
            .unwrap_err();
        match err {
            SchemaError::ParseDegradation { field, value } => {
                assert_eq!(field, "postTokenBalances");
                assert_eq!(value, huge);
            }
            other => panic!("unexpected error: {other:?}"),
        }

        let deltas = compute_token_deltas(
            &[bal("X", "M", "5")],
            &[bal("X", "M", huge)],
            AmountPolicy::ZeroFill,
        )
        .unwrap();
        assert_eq!(deltas.values().next().unwrap().delta_amount, -5);
    }

    #[test]
    fn test_large_amounts_sum_without_sign_flip() {
        let max = u64::MAX.to_string();
        let deltas = compute_token_deltas(
            &[bal("X", "M", &max), bal("X", "M", &max)],
            &[bal("X", "M", "1")],
            AmountPolicy::Strict,
        )
        .unwrap();

        let expected = 1 - 2 * i128::from(u64::MAX);
        assert_eq!(deltas.values().next().unwrap().delta_amount, expected);
        assert!(expected < 0);
    }

    #[test]
    fn test_entries_without_owner_are_skipped() {
        let mut orphan = bal("", "M", "900");
        orphan.owner = None;

        let deltas = compute_token_deltas(
            &[orphan, bal("X", "M", "10")],
            &[bal("X", "M", "30")],
            AmountPolicy::Strict,
        )
        .unwrap();

        assert_eq!(deltas.len(), 1);
        let key = TokenKey { owner: "X".into(), mint: "M".into() };
        assert_eq!(deltas[&key].delta_amount, 20);
    }

    #[test]
    fn test_native_balance_change_sol_trims_and_scales() {
        let data = vec![
            AccountData { account: " U1 ".into(), native_balance_change: -2_000_000_000 },
            AccountData { account: "U2".into(), native_balance_change: 1_500_000 },
        ];

        assert_eq!(native_balance_change_sol(&data, "U1"), Some(2.0));
        assert_eq!(native_balance_change_sol(&data, "U2"), Some(0.0015));
        assert_eq!(native_balance_change_sol(&data, "U3"), None);
    }
}
