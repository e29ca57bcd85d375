//! TxFacts: full balance deltas for one RPC transaction.
//!
//! This module defines the `getTransaction` result shape (jsonParsed or raw
//! json encoding) and extracts every SOL and token balance change from it in
//! one pass, without any RPC calls.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

use crate::deltas::{
    AmountPolicy, SolDelta, TokenDelta, TokenKey, compute_sol_deltas, compute_token_deltas,
};
use crate::error::Result;

/// Raw token amount
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UiTokenAmount {
    /// Amount in base units (string for precision)
    pub amount: String,

    pub decimals: Option<u8>,
}

/// Token balance snapshot for one token account
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenBalance {
    #[serde(default)]
    pub account_index: u32,

    pub mint: String,

    /// Owner wallet of the token account; some RPC nodes omit it
    #[serde(default)]
    pub owner: Option<String>,

    pub ui_token_amount: UiTokenAmount,
}

/// Account key as it appears in `message.accountKeys`.
///
/// jsonParsed encoding yields objects with a `pubkey` field, raw json
/// encoding yields plain strings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AccountKey {
    Raw(String),
    Parsed { pubkey: String },
}

impl AccountKey {
    pub fn pubkey(&self) -> &str {
        match self {
            AccountKey::Raw(s) => s,
            AccountKey::Parsed { pubkey } => pubkey,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RpcMessage {
    pub account_keys: Vec<AccountKey>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RpcTxBody {
    pub message: RpcMessage,

    #[serde(default)]
    pub signatures: Vec<String>,
}

/// Addresses loaded from lookup tables (v0 transactions)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LoadedAddresses {
    #[serde(default)]
    pub writable: Vec<String>,

    #[serde(default)]
    pub readonly: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RpcTxMeta {
    #[serde(default)]
    pub err: Option<Value>,

    #[serde(default)]
    pub pre_balances: Vec<u64>,

    #[serde(default)]
    pub post_balances: Vec<u64>,

    #[serde(default)]
    pub pre_token_balances: Vec<TokenBalance>,

    #[serde(default)]
    pub post_token_balances: Vec<TokenBalance>,

    #[serde(default)]
    pub loaded_addresses: Option<LoadedAddresses>,
}

/// `getTransaction` result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RpcTransaction {
    #[serde(default)]
    pub slot: u64,

    #[serde(default)]
    pub block_time: Option<i64>,

    pub transaction: RpcTxBody,

    pub meta: RpcTxMeta,
}

impl RpcTransaction {
    pub fn from_json(value: &Value) -> Result<Self> {
        Ok(Self::deserialize(value)?)
    }

    /// Account keys in balance-array order.
    ///
    /// jsonParsed messages already list lookup-table addresses. Raw messages
    /// only hold the static keys, so loaded writable then readonly addresses
    /// are appended.
    pub fn account_keys(&self) -> Vec<String> {
        let static_keys = &self.transaction.message.account_keys;
        let mut keys: Vec<String> = static_keys.iter().map(|k| k.pubkey().to_string()).collect();

        let raw_encoding = static_keys.iter().all(|k| matches!(k, AccountKey::Raw(_)));
        if raw_encoding {
            if let Some(loaded) = &self.meta.loaded_addresses {
                keys.extend(loaded.writable.iter().cloned());
                keys.extend(loaded.readonly.iter().cloned());
            }
        }

        keys
    }

    pub fn first_signature(&self) -> Option<&str> {
        self.transaction.signatures.first().map(|s| s.as_str())
    }
}

/// Balance facts about one transaction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TxFacts {
    pub signature: String,

    pub slot: u64,

    /// Block timestamp (Unix seconds)
    pub block_time: Option<i64>,

    pub is_success: bool,

    /// Nonzero lamport changes in account index order
    pub sol_deltas: Vec<SolDelta>,

    /// Nonzero token changes keyed by owner and mint
    #[serde(with = "token_delta_list")]
    pub token_deltas: BTreeMap<TokenKey, TokenDelta>,
}

impl TxFacts {
    /// Extract all facts from a `getTransaction` JSON result.
    ///
    /// An empty `signature` falls back to the first signature in the message.
    pub fn from_json(tx: &Value, signature: &str, policy: AmountPolicy) -> Result<Self> {
        let rpc = RpcTransaction::from_json(tx)?;
        Self::from_rpc(&rpc, signature, policy)
    }

    pub fn from_rpc(tx: &RpcTransaction, signature: &str, policy: AmountPolicy) -> Result<Self> {
        let signature = if signature.is_empty() {
            tx.first_signature().unwrap_or_default().to_string()
        } else {
            signature.to_string()
        };

        let meta = &tx.meta;
        let sol_deltas =
            compute_sol_deltas(&tx.account_keys(), &meta.pre_balances, &meta.post_balances)?;
        let token_deltas =
            compute_token_deltas(&meta.pre_token_balances, &meta.post_token_balances, policy)?;

        Ok(Self {
            signature,
            slot: tx.slot,
            block_time: tx.block_time,
            is_success: tx.meta.err.is_none(),
            sol_deltas,
            token_deltas,
        })
    }

    /// Lamport delta of one account, `None` if it did not change.
    pub fn sol_delta_for(&self, account: &str) -> Option<i64> {
        self.sol_deltas
            .iter()
            .find(|d| d.account == account)
            .map(|d| d.delta_lamports)
    }

    /// Token delta for an (owner, mint) pair, `None` if it did not change.
    pub fn token_delta_for(&self, owner: &str, mint: &str) -> Option<i128> {
        let key = TokenKey {
            owner: owner.to_string(),
            mint: mint.to_string(),
        };
        self.token_deltas.get(&key).map(|d| d.delta_amount)
    }

    /// Token deltas for a specific owner
    pub fn token_deltas_for_owner(&self, owner: &str) -> Vec<&TokenDelta> {
        self.token_deltas.values().filter(|d| d.owner == owner).collect()
    }
}

/// Serializes the keyed map as a plain list; the key is repeated inside each delta.
mod token_delta_list {
    use super::{TokenDelta, TokenKey};
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::collections::BTreeMap;

    pub fn serialize<S: Serializer>(
        map: &BTreeMap<TokenKey, TokenDelta>,
        s: S,
    ) -> Result<S::Ok, S::Error> {
        let list: Vec<&TokenDelta> = map.values().collect();
        list.serialize(s)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        d: D,
    ) -> Result<BTreeMap<TokenKey, TokenDelta>, D::Error> {
        let list = Vec::<TokenDelta>::deserialize(d)?;
        Ok(list
            .into_iter()
            .map(|t| {
                let key = TokenKey {
                    owner: t.owner.clone(),
                    mint: t.mint.clone(),
                };
                (key, t)
            })
            .collect())
    }
}
