pub mod batch;
pub mod config;
pub mod deltas;
pub mod enriched;
pub mod error;
pub mod instructions;
pub mod mint;
pub mod swap;
pub mod tx_facts;
pub mod validator;

pub use error::{Result, SchemaError};

// Configuration
pub use config::{LAMPORTS_PER_SOL, PUMP_FUN_PROGRAM_ID, ScanConfig};

// Raw record shapes
pub use enriched::{AccountData, EnrichedTransaction, InnerInstruction, Instruction, TokenTransfer};
pub use tx_facts::{AccountKey, RpcTransaction, TokenBalance, TxFacts, UiTokenAmount};

// Delta computation
pub use deltas::{
    AmountPolicy, SolDelta, TokenDelta, TokenKey, compute_sol_deltas, compute_token_deltas,
    native_balance_change_sol,
};

// Validation and classification
pub use instructions::matches_program;
pub use mint::{MintClassifier, MintedToken};
pub use swap::{SwapClassifier, SwapEvent, SwapSkip, format_timestamp};
pub use validator::{MintCandidate, Rejection, SwapCandidate, TransactionValidator};

// Batch helpers
pub use batch::{BatchOutcome, BatchReport, full_deltas, scan_mints, scan_swaps};
