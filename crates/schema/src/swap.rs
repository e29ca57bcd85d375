//! Swap classification.
//!
//! Direction rule: a swap is a buy when the fee payer is the receiving
//! wallet of the target-mint transfer (`feePayer == toUserAccount`), and a
//! sell otherwise. A third-party fee payer therefore classifies as a sell.
//!
//! The SOL amount is the native balance change of the counterparty on the
//! other side of the token movement: the sender for a buy, the receiver for
//! a sell.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::config::ScanConfig;
use crate::deltas::native_balance_change_sol;
use crate::enriched::{EnrichedTransaction, TokenTransfer};

/// Swap of SOL for the target mint (or back)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SwapEvent {
    pub schema_version: u16,
    pub slot: u64,
    pub signature: String,
    pub mint: String,
    /// Fee payer of the transaction
    pub user_address: String,
    /// SOL moved by the counterparty (always positive)
    pub sol_amount: f64,
    /// Declared transfer amount, unscaled
    pub token_amount: f64,
    pub is_buy: bool,
    /// UTC ISO-8601 with a trailing `Z`, empty when the timestamp is unknown
    pub timestamp: String,
}

impl SwapEvent {
    pub const SCHEMA_VERSION: u16 = 1;
}

/// Why a transaction produced no swap event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SwapSkip {
    /// No qualifying transfer of the target mint
    NoMatchingTransfer,
    /// The counterparty has no `accountData` entry
    LookupMiss,
    /// SOL amount at or below `min_sol_amount`
    BelowThreshold,
}

impl fmt::Display for SwapSkip {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SwapSkip::NoMatchingTransfer => "no_matching_transfer",
            SwapSkip::LookupMiss => "lookup_miss",
            SwapSkip::BelowThreshold => "below_threshold",
        };
        f.write_str(s)
    }
}

/// Render unix seconds as `YYYY-MM-DDTHH:MM:SSZ`.
pub fn format_timestamp(timestamp: Option<i64>) -> String {
    timestamp
        .and_then(|ts| DateTime::<Utc>::from_timestamp(ts, 0))
        .map(|dt| dt.format("%Y-%m-%dT%H:%M:%SZ").to_string())
        .unwrap_or_default()
}

#[derive(Debug, Clone, Copy)]
pub struct SwapClassifier<'c> {
    cfg: &'c ScanConfig,
}

impl<'c> SwapClassifier<'c> {
    pub fn new(cfg: &'c ScanConfig) -> Self {
        Self { cfg }
    }

    pub fn classify(&self, tx: &EnrichedTransaction) -> Option<SwapEvent> {
        self.evaluate(tx).ok()
    }

    /// Like `classify`, but reports why no event was produced.
    pub fn evaluate(&self, tx: &EnrichedTransaction) -> Result<SwapEvent, SwapSkip> {
        let transfer = tx
            .first_transfer_of(&self.cfg.target_mint, self.cfg.require_counterparties)
            .ok_or(SwapSkip::NoMatchingTransfer)?;

        self.evaluate_transfer(tx, transfer)
    }

    /// Classify a transfer already selected by the validator.
    pub fn evaluate_transfer(
        &self,
        tx: &EnrichedTransaction,
        transfer: &TokenTransfer,
    ) -> Result<SwapEvent, SwapSkip> {
        let is_buy = transfer.to_user() == Some(tx.fee_payer.as_str());

        let counterparty = if is_buy { transfer.from_user() } else { transfer.to_user() };
        let sol_amount = counterparty
            .and_then(|account| native_balance_change_sol(&tx.account_data, account))
            .ok_or(SwapSkip::LookupMiss)?;

        if sol_amount <= self.cfg.min_sol_amount {
            return Err(SwapSkip::BelowThreshold);
        }

        Ok(SwapEvent {
            schema_version: SwapEvent::SCHEMA_VERSION,
            slot: tx.slot,
            signature: tx.signature.clone(),
            mint: transfer.mint.clone(),
            user_address: tx.fee_payer.clone(),
            sol_amount,
            token_amount: transfer.token_amount,
            is_buy,
            timestamp: format_timestamp(tx.timestamp),
        })
    }
}
