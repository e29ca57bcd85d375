//! Error types for record ingestion and delta computation.
//!
//! Every variant is local to a single record. Batch helpers log and count
//! them instead of propagating, so one bad record never aborts a batch.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SchemaError {
    /// A required field is missing or has the wrong type.
    ///
    /// Raised at the ingestion boundary when a raw JSON record does not
    /// conform to the enrichment-service or RPC shape.
    #[error("malformed input: {0}")]
    MalformedInput(String),

    /// A numeric string could not be parsed.
    ///
    /// Only raised under `AmountPolicy::Strict`; `AmountPolicy::ZeroFill`
    /// replaces the value with zero instead.
    #[error("unparseable amount in {field}: {value:?}")]
    ParseDegradation { field: String, value: String },
}

impl From<serde_json::Error> for SchemaError {
    fn from(e: serde_json::Error) -> Self {
        SchemaError::MalformedInput(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, SchemaError>;
