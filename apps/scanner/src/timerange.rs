//! Locate the block produced closest to a unix timestamp.
//!
//! Slots are estimated from a known anchor at one slot per
//! `SLOT_DURATION_MS`, then refined against the real block time of the
//! estimate until it matches or stops moving. Slots without a block are
//! stepped over forwards.

use anyhow::{Result, anyhow};
use log::{debug, info, warn};

use crate::rpc::RpcClient;
use crate::types::BlockSummary;

pub const SLOT_DURATION_MS: i64 = 400;

const MAX_REFINEMENTS: usize = 32;
const MAX_SKIPPED_SLOTS: u64 = 64;

/// A block with at least one transaction
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocatedBlock {
    pub slot: u64,
    pub block_time: i64,
    pub first_signature: String,
}

pub trait BlockSource {
    async fn latest_slot(&self) -> Result<u64>;
    async fn block(&self, slot: u64) -> Result<Option<BlockSummary>>;
}

impl BlockSource for RpcClient {
    async fn latest_slot(&self) -> Result<u64> {
        self.get_slot().await
    }

    async fn block(&self, slot: u64) -> Result<Option<BlockSummary>> {
        self.get_block_summary(slot).await
    }
}

/// Slot expected at `target_time`, given that `anchor_slot` was produced at `anchor_time`.
pub fn estimate_slot(anchor_slot: u64, anchor_time: i64, target_time: i64) -> u64 {
    let slot_delta = ((anchor_time - target_time) * 1000).div_euclid(SLOT_DURATION_MS);
    (anchor_slot as i64 - slot_delta).max(0) as u64
}

/// First block with a block time and a transaction at or after `slot`.
async fn next_block<S: BlockSource>(source: &S, slot: u64) -> Result<LocatedBlock> {
    for candidate in slot..slot + MAX_SKIPPED_SLOTS {
        let Some(block) = source.block(candidate).await? else {
            debug!("slot {candidate} has no block, stepping forward");
            continue;
        };
        let (Some(block_time), Some(sig)) = (block.block_time, block.first_signature()) else {
            debug!("slot {candidate} has no block time or transactions, stepping forward");
            continue;
        };
        return Ok(LocatedBlock {
            slot: candidate,
            block_time,
            first_signature: sig.to_string(),
        });
    }

    Err(anyhow!("no usable block in slots {}..{}", slot, slot + MAX_SKIPPED_SLOTS))
}

/// Block whose time is closest to `target_time`.
pub async fn block_at<S: BlockSource>(source: &S, target_time: i64) -> Result<LocatedBlock> {
    let latest = source.latest_slot().await?;
    let mut anchor = next_block(source, latest.saturating_sub(MAX_SKIPPED_SLOTS)).await?;

    if target_time > anchor.block_time {
        return Err(anyhow!(
            "timestamp {target_time} is newer than the latest finalized block ({})",
            anchor.block_time
        ));
    }

    let mut best = anchor.clone();

    for _ in 0..MAX_REFINEMENTS {
        if anchor.block_time == target_time {
            break;
        }

        let proxy = estimate_slot(anchor.slot, anchor.block_time, target_time);
        if proxy == anchor.slot {
            break;
        }

        let found = next_block(source, proxy).await?;
        debug!(
            "target={} proxy_slot={} found slot={} time={}",
            target_time, proxy, found.slot, found.block_time
        );

        if (found.block_time - target_time).abs() < (best.block_time - target_time).abs() {
            best = found.clone();
        }
        if found == anchor {
            break;
        }
        anchor = found;
    }

    if best.block_time != target_time {
        warn!(
            "no block at exactly {}, using slot {} at {}",
            target_time, best.slot, best.block_time
        );
    }
    info!("timestamp {} -> slot {}", target_time, best.slot);
    Ok(best)
}
