//! Block headers: the 80-byte wire form, proof-of-work checks over the
//! compact target encoding, and the every-2016-blocks retarget arithmetic.

use std::io::Read;

use serde::{Deserialize, Serialize};

use crate::encode::{read_array, read_u32_le};
use crate::error::{Error, Result};
use crate::hash::{hash256, H256};
use crate::u256::U256;

pub type Target = U256;
pub type Work = U256;

/// Blocks between difficulty adjustments.
pub const BLOCKS_PER_ADJUSTMENT: u64 = 2016;
/// Two weeks in seconds; the timespan one epoch is aimed at.
pub const TARGET_TIMESPAN_SECS: u64 = 14 * 24 * 60 * 60;

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub struct Header {
    /// Block version, now repurposed for soft fork signalling.
    pub version: u32,
    /// Reference to the previous block in the chain, internal byte order.
    pub prev_block: H256,
    /// The root hash of the merkle tree of transactions in the block.
    pub merkle_root: H256,
    /// The timestamp of the block, as claimed by the miner.
    pub timestamp: u32,
    /// Compact encoding of the target the block hash must lie below.
    pub bits: u32,
    /// The nonce, selected to obtain a low enough block hash.
    pub nonce: u32,
}

impl Header {
    /// Serialized length: version, prev hash, merkle root, time, bits,
    /// nonce.
    pub const SIZE: usize = 4 + 32 + 32 + 4 + 4 + 4; // 80

    pub fn parse(reader: &mut impl Read) -> Result<Header> {
        Ok(Header {
            version: read_u32_le(reader)?,
            prev_block: H256(read_array(reader)?),
            merkle_root: H256(read_array(reader)?),
            timestamp: read_u32_le(reader)?,
            bits: read_u32_le(reader)?,
            nonce: read_u32_le(reader)?,
        })
    }

    pub fn serialize(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(Self::SIZE);
        out.extend_from_slice(&self.version.to_le_bytes());
        out.extend_from_slice(&self.prev_block.0);
        out.extend_from_slice(&self.merkle_root.0);
        out.extend_from_slice(&self.timestamp.to_le_bytes());
        out.extend_from_slice(&self.bits.to_le_bytes());
        out.extend_from_slice(&self.nonce.to_le_bytes());
        out
    }

    /// HASH256 of the serialized header, internal byte order.
    pub fn hash(&self) -> H256 {
        hash256(&self.serialize())
    }

    /// The block id as the familiar big-endian hex string.
    pub fn id(&self) -> String {
        self.hash().to_display_hex()
    }

    /// The target this header claims: any hash at or above it is invalid.
    pub fn target(&self) -> Target {
        U256::from_compact_bits(self.bits)
    }

    /// Chain-work contribution of a block mined at this target.
    pub fn work(&self) -> Work {
        self.target().inverse()
    }

    /// Proof of work: the header hash, read as a little-endian integer,
    /// must be below the claimed target.
    pub fn check_pow(&self) -> bool {
        U256::from_le_bytes(&self.hash().0) < self.target()
    }
}

/// Computes the compact bits for the epoch after one that ran from
/// `first_timestamp` to `last_timestamp` at `prev_bits`.
///
/// The elapsed time is clamped to [timespan/4, timespan*4] and the target
/// scaled proportionally, capped at `pow_limit`. The measured span covers
/// 2015 intervals rather than 2016; the off-by-one is consensus and must
/// not be repaired.
pub fn retarget_bits(
    prev_bits: u32,
    first_timestamp: u32,
    last_timestamp: u32,
    pow_limit: Target,
) -> Result<u32> {
    let elapsed = i64::from(last_timestamp) - i64::from(first_timestamp);
    let min = TARGET_TIMESPAN_SECS / 4;
    let max = TARGET_TIMESPAN_SECS * 4;
    let clamped = u64::try_from(elapsed.max(0)).expect("non-negative after max(0)").clamp(min, max);

    let prev_target = U256::from_compact_bits(prev_bits);
    let (scaled, overflow) = prev_target.overflowing_mul(clamped);
    if overflow {
        return Err(Error::Crypto(format!(
            "retarget overflow from bits 0x{prev_bits:08x}"
        )));
    }
    let mut new_target = scaled / U256::from(TARGET_TIMESPAN_SECS);
    if new_target > pow_limit {
        new_target = pow_limit;
    }
    Ok(new_target.to_compact_bits())
}
