//! Enrichment-service transaction shape.
//!
//! These structs mirror the parsed-transaction records returned by an
//! enrichment API (`/v0/transactions`). Deserializing into them is the
//! ingestion boundary: a record missing `accountData` or `tokenTransfers`
//! is rejected here as `MalformedInput` and never reaches the classifiers.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::Result;

/// Native balance change of one account
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountData {
    pub account: String,

    /// Signed change in lamports
    #[serde(default)]
    pub native_balance_change: i64,
}

/// SPL token movement as reported by the enrichment service.
///
/// Counterparty fields arrive as a string, an empty string, or null.
/// Use the accessor methods, which treat empty and null alike.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenTransfer {
    pub mint: String,

    #[serde(default)]
    pub from_user_account: Option<String>,

    #[serde(default)]
    pub to_user_account: Option<String>,

    #[serde(default)]
    pub from_token_account: Option<String>,

    #[serde(default)]
    pub to_token_account: Option<String>,

    /// UI amount as provided upstream (not scaled)
    #[serde(default)]
    pub token_amount: f64,
}

fn non_empty(v: &Option<String>) -> Option<&str> {
    v.as_deref().filter(|s| !s.is_empty())
}

impl TokenTransfer {
    pub fn from_user(&self) -> Option<&str> {
        non_empty(&self.from_user_account)
    }

    pub fn to_user(&self) -> Option<&str> {
        non_empty(&self.to_user_account)
    }

    pub fn from_token(&self) -> Option<&str> {
        non_empty(&self.from_token_account)
    }

    /// Tokens that come from nowhere: no sending wallet and no sending token account.
    pub fn is_mint_origin(&self) -> bool {
        self.from_user().is_none() && self.from_token().is_none()
    }

    pub fn has_counterparties(&self) -> bool {
        self.from_user().is_some() && self.to_user().is_some()
    }
}

/// Inner (CPI) instruction. Only the program id is kept.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InnerInstruction {
    pub program_id: String,
}

/// Top-level instruction with its inner instructions
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Instruction {
    pub program_id: String,

    #[serde(default)]
    pub inner_instructions: Vec<InnerInstruction>,
}

/// One enriched transaction record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnrichedTransaction {
    pub slot: u64,

    pub signature: String,

    /// Block timestamp (Unix seconds)
    #[serde(default)]
    pub timestamp: Option<i64>,

    pub fee_payer: String,

    /// Present (non-null) when the transaction failed on chain
    #[serde(default)]
    pub transaction_error: Option<Value>,

    /// Enrichment label for the originating venue (e.g. "PUMP_FUN")
    #[serde(default)]
    pub source: Option<String>,

    /// Enrichment label for the event kind (e.g. "SWAP")
    #[serde(default, rename = "type")]
    pub tx_type: Option<String>,

    pub account_data: Vec<AccountData>,

    pub token_transfers: Vec<TokenTransfer>,

    #[serde(default)]
    pub instructions: Vec<Instruction>,
}

impl EnrichedTransaction {
    /// Ingest one raw JSON record.
    pub fn from_json(value: &Value) -> Result<Self> {
        Ok(Self::deserialize(value)?)
    }

    pub fn is_failed(&self) -> bool {
        self.transaction_error.is_some()
    }

    /// First transfer of `mint`, optionally requiring both counterparties.
    pub fn first_transfer_of(
        &self,
        mint: &str,
        require_counterparties: bool,
    ) -> Option<&TokenTransfer> {
        self.token_transfers
            .iter()
            .find(|tt| tt.mint == mint && (!require_counterparties || tt.has_counterparties()))
    }

    /// First transfer with no sender, i.e. freshly minted supply.
    pub fn first_mint_origin(&self) -> Option<&TokenTransfer> {
        self.token_transfers.iter().find(|tt| tt.is_mint_origin())
    }
}
