use serde::Deserialize;

/// One entry of `getSignaturesForAddress`
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignatureInfo {
    pub signature: String,
    #[serde(default)]
    pub slot: u64,
    #[serde(default)]
    pub confirmation_status: Option<String>,
    #[serde(default)]
    pub block_time: Option<i64>,
}

impl SignatureInfo {
    pub fn is_finalized(&self) -> bool {
        self.confirmation_status.as_deref() == Some("finalized")
    }
}

/// `getBlock` with `transactionDetails: "signatures"`
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockSummary {
    #[serde(default)]
    pub block_time: Option<i64>,
    #[serde(default)]
    pub signatures: Vec<String>,
}

impl BlockSummary {
    pub fn first_signature(&self) -> Option<&str> {
        self.signatures.first().map(String::as_str)
    }
}
