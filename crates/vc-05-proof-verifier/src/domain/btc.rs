//! # Bitcoin Primitives
//!
//! Headers, compact targets, chain work, retargeting, merkle branches and
//! the transaction parsing needed for BIP34 heights and witness-stripped
//! txids.
//!
//! Hashes are kept in internal (little-endian) byte order; RPC strings use
//! the reversed display order.

use crate::config::BtcParams;
use crate::domain::errors::VerificationError;
use vc_01_byte_codec::{bytes_to_hex, double_sha256, Hash, U256};

/// Serialized header size.
pub const HEADER_SIZE: usize = 80;

/// 80-byte block header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BtcHeader {
    /// Block version
    pub version: u32,
    /// Previous block hash (internal order)
    pub prev_hash: Hash,
    /// Transaction merkle root (internal order)
    pub merkle_root: Hash,
    /// Block time
    pub time: u32,
    /// Compact target
    pub bits: u32,
    /// Nonce
    pub nonce: u32,
    raw: [u8; HEADER_SIZE],
}

impl BtcHeader {
    /// Parse exactly [`HEADER_SIZE`] bytes.
    pub fn parse(bytes: &[u8]) -> Result<Self, VerificationError> {
        let raw: [u8; HEADER_SIZE] = bytes.try_into().map_err(|_| {
            VerificationError::InvalidProofData(format!(
                "header must be {HEADER_SIZE} bytes, got {}",
                bytes.len()
            ))
        })?;
        let word = |at: usize| u32::from_le_bytes([raw[at], raw[at + 1], raw[at + 2], raw[at + 3]]);
        let mut prev_hash = [0u8; 32];
        prev_hash.copy_from_slice(&raw[4..36]);
        let mut merkle_root = [0u8; 32];
        merkle_root.copy_from_slice(&raw[36..68]);
        Ok(Self {
            version: word(0),
            prev_hash,
            merkle_root,
            time: word(68),
            bits: word(72),
            nonce: word(76),
            raw,
        })
    }

    /// Serialize.
    pub fn to_bytes(&self) -> [u8; HEADER_SIZE] {
        let mut raw = [0u8; HEADER_SIZE];
        raw[0..4].copy_from_slice(&self.version.to_le_bytes());
        raw[4..36].copy_from_slice(&self.prev_hash);
        raw[36..68].copy_from_slice(&self.merkle_root);
        raw[68..72].copy_from_slice(&self.time.to_le_bytes());
        raw[72..76].copy_from_slice(&self.bits.to_le_bytes());
        raw[76..80].copy_from_slice(&self.nonce.to_le_bytes());
        raw
    }

    /// Header hash in internal order.
    pub fn hash(&self) -> Hash {
        double_sha256(&self.raw)
    }

    /// Header hash in display order.
    pub fn display_hash(&self) -> Hash {
        reversed(&self.hash())
    }

    /// Decoded target.
    pub fn target(&self) -> Result<U256, VerificationError> {
        compact_to_target(self.bits)
    }

    /// Check the hash is at or below the header's own target.
    pub fn check_pow(&self) -> Result<(), VerificationError> {
        let target = self.target()?;
        if U256::from_little_endian(&self.hash()) > target {
            return Err(VerificationError::InvalidProofOfWork {
                hash: bytes_to_hex(&self.display_hash()),
            });
        }
        Ok(())
    }
}

/// Split concatenated headers.
pub fn parse_headers(bytes: &[u8]) -> Result<Vec<BtcHeader>, VerificationError> {
    if bytes.len() % HEADER_SIZE != 0 {
        return Err(VerificationError::InvalidProofData(format!(
            "header list length {} is not a multiple of {HEADER_SIZE}",
            bytes.len()
        )));
    }
    bytes.chunks_exact(HEADER_SIZE).map(BtcHeader::parse).collect()
}

/// Reverse a 32-byte hash between internal and display order.
pub fn reversed(hash: &Hash) -> Hash {
    let mut out = *hash;
    out.reverse();
    out
}

/// Check that each finality header builds on the previous one, starting
/// from `block`. Runs before any proof-of-work check.
pub fn check_linkage(block: &BtcHeader, finality: &[BtcHeader]) -> Result<(), VerificationError> {
    let mut parent = block.hash();
    for (index, header) in finality.iter().enumerate() {
        if header.prev_hash != parent {
            return Err(VerificationError::ChainLinkage { index });
        }
        parent = header.hash();
    }
    Ok(())
}

// =============================================================================
// TARGETS AND WORK
// =============================================================================

/// Decode a compact target.
pub fn compact_to_target(bits: u32) -> Result<U256, VerificationError> {
    let exponent = bits >> 24;
    let mantissa = bits & 0x007f_ffff;
    if mantissa != 0 && bits & 0x0080_0000 != 0 {
        return Err(VerificationError::InvalidProofData(format!(
            "negative compact target {bits:#010x}"
        )));
    }
    if mantissa != 0
        && (exponent > 34 || (mantissa > 0xff && exponent > 33) || (mantissa > 0xffff && exponent > 32))
    {
        return Err(VerificationError::InvalidProofData(format!(
            "compact target overflows {bits:#010x}"
        )));
    }
    let mantissa = U256::from(mantissa);
    Ok(if exponent <= 3 {
        mantissa >> (8 * (3 - exponent) as usize)
    } else {
        mantissa << (8 * (exponent - 3) as usize)
    })
}

/// Encode a target in compact form.
pub fn target_to_compact(target: U256) -> u32 {
    let mut size = (target.bits() + 7) / 8;
    let shifted = if size <= 3 {
        target.low_u64() << (8 * (3 - size))
    } else {
        (target >> (8 * (size - 3))).low_u64()
    };
    let mut compact = shifted as u32;
    if compact & 0x0080_0000 != 0 {
        compact >>= 8;
        size += 1;
    }
    compact | ((size as u32) << 24)
}

/// Expected number of hashes to meet `target`: `2^256 / (target + 1)`.
pub fn work(target: U256) -> U256 {
    match target.checked_add(U256::one()) {
        Some(divisor) => (!target / divisor) + U256::one(),
        None => U256::one(),
    }
}

/// Difficulty period a height belongs to.
pub fn period_of(height: u64, params: &BtcParams) -> u64 {
    height / params.retarget_interval
}

/// Target of the next period after one that took `actual_timespan`
/// seconds at `previous` target.
pub fn next_target(previous: U256, actual_timespan: u64, params: &BtcParams) -> Result<U256, VerificationError> {
    let expected = params.target_timespan_secs;
    let clamped = actual_timespan.clamp(expected / 4, expected * 4);
    let limit = compact_to_target(params.pow_limit_bits)?;
    let next = previous
        .checked_mul(U256::from(clamped))
        .map_or(limit, |scaled| scaled / U256::from(expected));
    Ok(next.min(limit))
}

/// Range a period's target may move to from `previous` in one retarget.
pub fn retarget_bounds(previous: U256, params: &BtcParams) -> Result<(U256, U256), VerificationError> {
    let limit = compact_to_target(params.pow_limit_bits)?;
    let max = previous.checked_mul(U256::from(4u8)).unwrap_or(limit).min(limit);
    Ok((previous / U256::from(4u8), max))
}

/// Whether `actual` is within `percent` of `expected`.
pub fn within_deviation(expected: U256, actual: U256, percent: u32) -> bool {
    let diff = if actual > expected {
        actual - expected
    } else {
        expected - actual
    };
    // Compare diff * 100 <= expected * percent without overflow.
    let allowed = expected / U256::from(100u8) * U256::from(percent)
        + expected % U256::from(100u8) * U256::from(percent) / U256::from(100u8);
    diff <= allowed
}

// =============================================================================
// MERKLE BRANCHES
// =============================================================================

/// Fold a merkle branch from a leaf at `index` up to the root.
pub fn merkle_root_from_branch(leaf: Hash, mut index: u64, branch: &[Hash]) -> Hash {
    let mut node = leaf;
    let mut buf = [0u8; 64];
    for sibling in branch {
        if index & 1 == 1 {
            buf[..32].copy_from_slice(sibling);
            buf[32..].copy_from_slice(&node);
        } else {
            buf[..32].copy_from_slice(&node);
            buf[32..].copy_from_slice(sibling);
        }
        node = double_sha256(&buf);
        index >>= 1;
    }
    node
}

/// Split concatenated 32-byte branch hashes.
pub fn parse_branch(bytes: &[u8]) -> Result<Vec<Hash>, VerificationError> {
    if bytes.len() % 32 != 0 {
        return Err(VerificationError::InvalidProofData(
            "merkle branch is not a multiple of 32 bytes".into(),
        ));
    }
    Ok(bytes
        .chunks_exact(32)
        .map(|chunk| {
            let mut hash = [0u8; 32];
            hash.copy_from_slice(chunk);
            hash
        })
        .collect())
}

/// Merkle root over txids (internal order), duplicating odd tails.
pub fn merkle_root(txids: &[Hash]) -> Hash {
    if txids.is_empty() {
        return [0u8; 32];
    }
    let mut level = txids.to_vec();
    while level.len() > 1 {
        if level.len() % 2 == 1 {
            if let Some(last) = level.last().copied() {
                level.push(last);
            }
        }
        level = level
            .chunks_exact(2)
            .map(|pair| {
                let mut buf = [0u8; 64];
                buf[..32].copy_from_slice(&pair[0]);
                buf[32..].copy_from_slice(&pair[1]);
                double_sha256(&buf)
            })
            .collect();
    }
    level[0]
}

/// Sibling hashes proving leaf `index` (fixture helper).
pub fn merkle_branch(txids: &[Hash], mut index: usize) -> Vec<Hash> {
    let mut branch = Vec::new();
    let mut level = txids.to_vec();
    while level.len() > 1 {
        if level.len() % 2 == 1 {
            if let Some(last) = level.last().copied() {
                level.push(last);
            }
        }
        branch.push(level[index ^ 1]);
        level = level
            .chunks_exact(2)
            .map(|pair| {
                let mut buf = [0u8; 64];
                buf[..32].copy_from_slice(&pair[0]);
                buf[32..].copy_from_slice(&pair[1]);
                double_sha256(&buf)
            })
            .collect();
        index /= 2;
    }
    branch
}

// =============================================================================
// TRANSACTIONS
// =============================================================================

/// Parsed view of a serialized transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BtcTransaction {
    /// Serialization without witness data.
    pub stripped: Vec<u8>,
    /// Whether the input carried witness data.
    pub has_witness: bool,
    /// Whether the first input spends the null outpoint.
    pub is_coinbase: bool,
    /// Script of the first input.
    pub first_input_script: Vec<u8>,
}

struct Reader<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn take(&mut self, len: usize) -> Result<&'a [u8], VerificationError> {
        let end = self
            .pos
            .checked_add(len)
            .filter(|end| *end <= self.bytes.len())
            .ok_or_else(|| VerificationError::InvalidProofData("transaction truncated".into()))?;
        let slice = &self.bytes[self.pos..end];
        self.pos = end;
        Ok(slice)
    }

    fn varint(&mut self) -> Result<u64, VerificationError> {
        let first = self.take(1)?[0];
        Ok(match first {
            0xfd => u64::from(u16::from_le_bytes([self.take(1)?[0], self.take(1)?[0]])),
            0xfe => {
                let b = self.take(4)?;
                u64::from(u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
            }
            0xff => {
                let b = self.take(8)?;
                let mut word = [0u8; 8];
                word.copy_from_slice(b);
                u64::from_le_bytes(word)
            }
            small => u64::from(small),
        })
    }

    fn var_bytes(&mut self) -> Result<&'a [u8], VerificationError> {
        let len = self.varint()?;
        self.take(usize::try_from(len).map_err(|_| {
            VerificationError::InvalidProofData("length overflow".into())
        })?)
    }
}

impl BtcTransaction {
    /// Parse a serialized transaction (with or without witness).
    pub fn parse(raw: &[u8]) -> Result<Self, VerificationError> {
        let (tx, used) = Self::parse_prefix(raw)?;
        if used != raw.len() {
            return Err(VerificationError::InvalidProofData(
                "trailing bytes after transaction".into(),
            ));
        }
        Ok(tx)
    }

    /// Parse the transaction at the start of `raw`, returning it and the
    /// number of bytes it occupies.
    pub fn parse_prefix(raw: &[u8]) -> Result<(Self, usize), VerificationError> {
        let mut reader = Reader { bytes: raw, pos: 0 };
        let version = reader.take(4)?;
        let has_witness = raw.get(4) == Some(&0x00) && raw.get(5) == Some(&0x01);
        if has_witness {
            reader.take(2)?;
        }

        let body_start = reader.pos;
        let inputs = reader.varint()?;
        if inputs == 0 {
            return Err(VerificationError::InvalidProofData(
                "transaction without inputs".into(),
            ));
        }
        let mut is_coinbase = false;
        let mut first_input_script = Vec::new();
        for i in 0..inputs {
            let outpoint = reader.take(36)?;
            let script = reader.var_bytes()?;
            reader.take(4)?;
            if i == 0 {
                is_coinbase = outpoint[..32].iter().all(|b| *b == 0) && outpoint[32..] == [0xff; 4];
                first_input_script = script.to_vec();
            }
        }
        let outputs = reader.varint()?;
        for _ in 0..outputs {
            reader.take(8)?;
            reader.var_bytes()?;
        }
        let body_end = reader.pos;

        if has_witness {
            for _ in 0..inputs {
                let items = reader.varint()?;
                for _ in 0..items {
                    reader.var_bytes()?;
                }
            }
        }
        let lock_time = reader.take(4)?;

        let mut stripped = Vec::with_capacity(body_end - body_start + 8);
        stripped.extend_from_slice(version);
        stripped.extend_from_slice(&raw[body_start..body_end]);
        stripped.extend_from_slice(lock_time);
        Ok((
            Self {
                stripped,
                has_witness,
                is_coinbase,
                first_input_script,
            },
            reader.pos,
        ))
    }

    /// Transaction id (internal order).
    pub fn txid(&self) -> Hash {
        double_sha256(&self.stripped)
    }

    /// Block height committed by a BIP34 coinbase.
    pub fn bip34_height(&self) -> Result<u64, VerificationError> {
        if !self.is_coinbase {
            return Err(VerificationError::InvalidProofData(
                "height requested from a non-coinbase transaction".into(),
            ));
        }
        let script = &self.first_input_script;
        let op = *script
            .first()
            .ok_or_else(|| VerificationError::InvalidProofData("empty coinbase script".into()))?;
        match op {
            0x00 => Ok(0),
            0x51..=0x60 => Ok(u64::from(op - 0x50)),
            1..=8 => {
                let len = usize::from(op);
                let digits = script.get(1..1 + len).ok_or_else(|| {
                    VerificationError::InvalidProofData("coinbase height truncated".into())
                })?;
                Ok(digits
                    .iter()
                    .rev()
                    .fold(0u64, |acc, b| (acc << 8) | u64::from(*b)))
            }
            other => Err(VerificationError::InvalidProofData(format!(
                "coinbase script does not start with a height push ({other:#04x})"
            ))),
        }
    }
}

/// Header and transactions of a serialized block.
pub fn parse_block(raw: &[u8]) -> Result<(BtcHeader, Vec<BtcTransaction>), VerificationError> {
    let header_bytes = raw
        .get(..HEADER_SIZE)
        .ok_or_else(|| VerificationError::InvalidProofData("block shorter than header".into()))?;
    let header = BtcHeader::parse(header_bytes)?;
    let mut reader = Reader {
        bytes: raw,
        pos: HEADER_SIZE,
    };
    let count = reader.varint()?;
    let mut transactions = Vec::new();
    for _ in 0..count {
        let (tx, used) = BtcTransaction::parse_prefix(&raw[reader.pos..])?;
        reader.pos += used;
        transactions.push(tx);
    }
    if reader.pos != raw.len() {
        return Err(VerificationError::InvalidProofData(
            "trailing bytes after block".into(),
        ));
    }
    Ok((header, transactions))
}
