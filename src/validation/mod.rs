//! Header chain validation
//!
//! Accepts a block when it links to the current tip and its hash satisfies
//! the proof-of-work target. Targets come from the packed "bits" encoding,
//! are recomputed every 2016 blocks from the observed timespan (clamped to a
//! factor of four), and on testnets obey the 20-minute minimum-difficulty
//! exception.

use anyhow::Result;
use num_bigint::BigUint;
use num_traits::Zero;

use crate::codec::hashing::hash_to_hex;
use crate::codec::messages::BlockMessage;
use crate::config::Network;
use crate::storage::{BlockStore, StoredBlock};

/// Blocks between difficulty retargets
pub const RETARGET_INTERVAL: u32 = 2016;

/// Intended duration of one retarget window: two weeks
pub const TARGET_TIMESPAN: i64 = 14 * 24 * 60 * 60;

/// Packed form of the maximum (minimum-difficulty) target
pub const MAX_TARGET_BITS: u32 = 0x1D00FFFF;

/// Seconds after which a testnet block may use the maximum target
const TESTNET_MAX_TARGET_GAP: i64 = 20 * 60;

/// Why a block was not accepted
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RejectReason {
    #[error("previous block hash {got} does not match chain tip {expected}")]
    PrevHashMismatch { expected: String, got: String },

    #[error("block hash {hash} exceeds the proof-of-work target")]
    PowFailed { hash: String },
}

/// Validation outcome for one block
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    Accept,
    Reject(RejectReason),
}

impl Verdict {
    pub fn is_accept(&self) -> bool {
        matches!(self, Self::Accept)
    }
}

/// Expand a packed target: the low 24 bits are the mantissa, the high byte
/// an exponent of 256. `bits == 0` expands to the unsatisfiable target zero.
pub fn bits_to_target(bits: u32) -> BigUint {
    let exponent = bits >> 24;
    let mantissa = BigUint::from(bits & 0x00FF_FFFF);
    if exponent <= 3 {
        mantissa >> (8 * (3 - exponent))
    } else {
        mantissa << (8 * (exponent - 3))
    }
}

/// Pack a target, keeping the three most significant bytes. A leading byte
/// above 0x7F shifts right one byte so the mantissa's sign bit stays clear.
pub fn target_to_bits(target: &BigUint) -> u32 {
    if target.is_zero() {
        return 0;
    }
    let mut bytes = target.to_bytes_be();
    if bytes[0] > 0x7F {
        bytes.insert(0, 0);
    }
    let exponent = bytes.len() as u32;
    let mut mantissa = 0u32;
    for i in 0..3 {
        mantissa = (mantissa << 8) | u32::from(bytes.get(i).copied().unwrap_or(0));
    }
    (exponent << 24) | mantissa
}

/// The maximum target any block may claim
pub fn max_target() -> BigUint {
    bits_to_target(MAX_TARGET_BITS)
}

/// Compute the target the next block must satisfy given the current tip.
///
/// On testnets, 20-minute-rule blocks carry the maximum target in their
/// `bits`, so the inherited target walks back to the most recent real one
/// (stopping at a retarget boundary).
pub fn expected_target(
    store: &impl BlockStore,
    network: Network,
    block: &BlockMessage,
    prev: &StoredBlock,
) -> Result<BigUint> {
    let current_height = prev.height + 1;
    let max = max_target();
    let mut target = bits_to_target(prev.bits);

    if network.is_testnet() {
        let mut height = prev.height;
        while target == max && height > 0 && height % RETARGET_INTERVAL != 0 {
            height -= 1;
            target = bits_to_target(store.by_height(height)?.bits);
        }
    }

    if current_height % RETARGET_INTERVAL == 0 {
        target = retarget(store, prev, &target)?;
    }

    if network.is_testnet()
        && current_height % RETARGET_INTERVAL != 0
        && i64::from(block.timestamp) - i64::from(prev.timestamp) > TESTNET_MAX_TARGET_GAP
    {
        target = max;
    }

    Ok(target)
}

/// Every 2016 blocks, scale the target by the observed timespan over the
/// wanted timespan, clamp the adjustment to a factor of four, round through
/// the packed representation and cap at the maximum target.
fn retarget(store: &impl BlockStore, prev: &StoredBlock, prev_target: &BigUint) -> Result<BigUint> {
    let current_height = prev.height + 1;
    let window_start = store.by_height(current_height.saturating_sub(RETARGET_INTERVAL))?;

    let timespan = (i64::from(prev.timestamp) - i64::from(window_start.timestamp))
        .clamp(TARGET_TIMESPAN / 4, TARGET_TIMESPAN * 4);

    let adjusted = prev_target * BigUint::from(timespan as u64) / BigUint::from(TARGET_TIMESPAN as u64);
    let rounded = bits_to_target(target_to_bits(&adjusted));

    let max = max_target();
    Ok(if rounded > max { max } else { rounded })
}

/// Validate a block against the current tip
pub fn validate_block(
    store: &impl BlockStore,
    network: Network,
    block: &BlockMessage,
    prev: &StoredBlock,
) -> Result<Verdict> {
    let tip_hash = prev.hash();
    if block.prev_block_hash != tip_hash {
        return Ok(Verdict::Reject(RejectReason::PrevHashMismatch {
            expected: hash_to_hex(&tip_hash),
            got: hash_to_hex(&block.prev_block_hash),
        }));
    }

    let target = expected_target(store, network, block, prev)?;
    let hash = block.block_hash();
    // The digest is compared as a little-endian integer
    if BigUint::from_bytes_le(&hash) > target {
        return Ok(Verdict::Reject(RejectReason::PowFailed {
            hash: hash_to_hex(&hash),
        }));
    }

    Ok(Verdict::Accept)
}
