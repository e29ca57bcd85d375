//! Token-creation classification.

use serde::{Deserialize, Serialize};

use crate::config::ScanConfig;
use crate::enriched::EnrichedTransaction;
use crate::validator::{MintCandidate, TransactionValidator};

/// Newly created token
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MintedToken {
    pub mint: String,
    pub signature: String,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct MintClassifier;

impl MintClassifier {
    pub fn new() -> Self {
        Self
    }

    /// Build the record from a validated candidate.
    pub fn classify(&self, candidate: MintCandidate<'_>) -> MintedToken {
        MintedToken {
            mint: candidate.transfer.mint.clone(),
            signature: candidate.tx.signature.clone(),
        }
    }

    /// Validate against `cfg`, then classify.
    pub fn classify_tx(&self, cfg: &ScanConfig, tx: &EnrichedTransaction) -> Option<MintedToken> {
        TransactionValidator::new(cfg)
            .check_mint(tx)
            .ok()
            .map(|candidate| self.classify(candidate))
    }
}
