//! Candidate checks for swap and token-creation events.
//!
//! A passing check returns a candidate that borrows the transfer which
//! proved eligibility, so classifiers never have to re-establish it.

use std::fmt;

use crate::config::ScanConfig;
use crate::enriched::{EnrichedTransaction, TokenTransfer};
use crate::instructions::matches_program;

/// Why a transaction is not an event candidate
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    /// `transactionError` is set
    TransactionFailed,
    /// The required program is not invoked (top level or one level nested)
    ProgramNotInvoked,
    /// No qualifying transfer of the target mint
    NoMatchingTransfer,
    /// No transfer without a sender
    NoMintOrigin,
    /// Enrichment `source`/`type` labels differ from the configured filter
    LabelMismatch,
}

impl Rejection {
    pub fn as_str(&self) -> &'static str {
        match self {
            Rejection::TransactionFailed => "transaction_failed",
            Rejection::ProgramNotInvoked => "program_not_invoked",
            Rejection::NoMatchingTransfer => "no_matching_transfer",
            Rejection::NoMintOrigin => "no_mint_origin",
            Rejection::LabelMismatch => "label_mismatch",
        }
    }
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Transaction proven to carry a qualifying transfer of the target mint
#[derive(Debug, Clone, Copy)]
pub struct SwapCandidate<'a> {
    pub tx: &'a EnrichedTransaction,
    pub transfer: &'a TokenTransfer,
}

/// Transaction proven to carry a mint-origin transfer
#[derive(Debug, Clone, Copy)]
pub struct MintCandidate<'a> {
    pub tx: &'a EnrichedTransaction,
    pub transfer: &'a TokenTransfer,
}

#[derive(Debug, Clone, Copy)]
pub struct TransactionValidator<'c> {
    cfg: &'c ScanConfig,
}

fn label_matches(filter: &Option<String>, value: &Option<String>) -> bool {
    match filter {
        Some(want) => value.as_deref() == Some(want.as_str()),
        None => true,
    }
}

impl<'c> TransactionValidator<'c> {
    pub fn new(cfg: &'c ScanConfig) -> Self {
        Self { cfg }
    }

    pub fn check_swap<'a>(
        &self,
        tx: &'a EnrichedTransaction,
    ) -> Result<SwapCandidate<'a>, Rejection> {
        if tx.is_failed() {
            return Err(Rejection::TransactionFailed);
        }
        if !label_matches(&self.cfg.tx_source, &tx.source)
            || !label_matches(&self.cfg.tx_type, &tx.tx_type)
        {
            return Err(Rejection::LabelMismatch);
        }
        if !matches_program(&tx.instructions, &self.cfg.swap_program_id) {
            return Err(Rejection::ProgramNotInvoked);
        }

        let transfer = tx
            .first_transfer_of(&self.cfg.target_mint, self.cfg.require_counterparties)
            .ok_or(Rejection::NoMatchingTransfer)?;

        Ok(SwapCandidate { tx, transfer })
    }

    pub fn check_mint<'a>(
        &self,
        tx: &'a EnrichedTransaction,
    ) -> Result<MintCandidate<'a>, Rejection> {
        if tx.is_failed() {
            return Err(Rejection::TransactionFailed);
        }
        if !matches_program(&tx.instructions, &self.cfg.create_program_id) {
            return Err(Rejection::ProgramNotInvoked);
        }

        let transfer = tx.first_mint_origin().ok_or(Rejection::NoMintOrigin)?;

        Ok(MintCandidate { tx, transfer })
    }

    pub fn is_swap_candidate(&self, tx: &EnrichedTransaction) -> bool {
        self.check_swap(tx).is_ok()
    }

    pub fn is_mint_candidate(&self, tx: &EnrichedTransaction) -> bool {
        self.check_mint(tx).is_ok()
    }
}
