//! Immutable scan configuration shared by the validator and classifiers.

use serde::{Deserialize, Serialize};

/// pump.fun bonding-curve program (mainnet)
pub const PUMP_FUN_PROGRAM_ID: &str = "6EF8rrecthR5Dkzon8Nwu78hRvfCKubJ14M5uBEwF6P";

/// Lamports in one SOL
pub const LAMPORTS_PER_SOL: u64 = 1_000_000_000;

/// What to look for in a batch of enriched transactions.
///
/// Built once by the caller and borrowed by every component; nothing in the
/// core mutates it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanConfig {
    /// Mint whose swaps are classified
    pub target_mint: String,

    /// Program that must be invoked for a swap candidate
    pub swap_program_id: String,

    /// Program that must be invoked for a token-creation candidate
    pub create_program_id: String,

    /// Swaps moving this many SOL or fewer are dropped (strict `>`)
    pub min_sol_amount: f64,

    /// Require both `fromUserAccount` and `toUserAccount` on the swap transfer
    pub require_counterparties: bool,

    /// Enrichment `source` label filter (e.g. "PUMP_FUN")
    pub tx_source: Option<String>,

    /// Enrichment `type` label filter (e.g. "SWAP")
    pub tx_type: Option<String>,
}

impl ScanConfig {
    pub fn new(target_mint: impl Into<String>) -> Self {
        Self {
            target_mint: target_mint.into(),
            swap_program_id: PUMP_FUN_PROGRAM_ID.to_string(),
            create_program_id: PUMP_FUN_PROGRAM_ID.to_string(),
            min_sol_amount: 0.0,
            require_counterparties: true,
            tx_source: None,
            tx_type: None,
        }
    }

    pub fn with_swap_program(mut self, program_id: impl Into<String>) -> Self {
        self.swap_program_id = program_id.into();
        self
    }

    pub fn with_create_program(mut self, program_id: impl Into<String>) -> Self {
        self.create_program_id = program_id.into();
        self
    }

    pub fn with_min_sol_amount(mut self, min_sol_amount: f64) -> Self {
        self.min_sol_amount = min_sol_amount;
        self
    }

    pub fn with_require_counterparties(mut self, require: bool) -> Self {
        self.require_counterparties = require;
        self
    }

    pub fn with_labels(mut self, tx_source: Option<String>, tx_type: Option<String>) -> Self {
        self.tx_source = tx_source;
        self.tx_type = tx_type;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_target_pump_fun() {
        let cfg = ScanConfig::new("MintAAA");
        assert_eq!(cfg.target_mint, "MintAAA");
        assert_eq!(cfg.swap_program_id, PUMP_FUN_PROGRAM_ID);
        assert_eq!(cfg.create_program_id, PUMP_FUN_PROGRAM_ID);
        assert_eq!(cfg.min_sol_amount, 0.0);
        assert!(cfg.require_counterparties);
        assert!(cfg.tx_source.is_none());
    }

    #[test]
    fn test_builder_overrides() {
        let cfg = ScanConfig::new("MintAAA")
            .with_swap_program("SwapProg")
            .with_create_program("CreateProg")
            .with_min_sol_amount(0.5)
            .with_require_counterparties(false)
            .with_labels(Some("PUMP_FUN".into()), Some("SWAP".into()));

        assert_eq!(cfg.swap_program_id, "SwapProg");
        assert_eq!(cfg.create_program_id, "CreateProg");
        assert_eq!(cfg.min_sol_amount, 0.5);
        assert!(!cfg.require_counterparties);
        assert_eq!(cfg.tx_source.as_deref(), Some("PUMP_FUN"));
        assert_eq!(cfg.tx_type.as_deref(), Some("SWAP"));
    }
}
