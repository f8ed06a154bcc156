//! # Big-Endian Integer Codecs
//!
//! Encoding is always minimal (no leading zero bytes, zero is the empty
//! string), which is what RLP requires for scalars. Decoding accepts up to
//! 32 bytes with leading zeros.

use crate::errors::CodecError;
use primitive_types::U256;

const MAX_WORD: usize = 32;

/// Decode a big-endian unsigned integer into a `u64`.
///
/// Fails with `IntegerOverflow` if the input is longer than 32 bytes or the
/// value needs more than 8 significant bytes.
pub fn be_to_u64(bytes: &[u8]) -> Result<u64, CodecError> {
    if bytes.len() > MAX_WORD {
        return Err(CodecError::IntegerOverflow {
            len: bytes.len(),
            max: MAX_WORD,
        });
    }
    let significant = strip_leading_zeros(bytes);
    if significant.len() > 8 {
        return Err(CodecError::IntegerOverflow {
            len: significant.len(),
            max: 8,
        });
    }
    Ok(significant
        .iter()
        .fold(0u64, |acc, &b| (acc << 8) | u64::from(b)))
}

/// Decode a big-endian integer keeping only its low 64 bits.
///
/// Callers must document why dropping the high bytes is acceptable at their
/// call site (e.g. gas values that are bounded by protocol rules).
pub fn be_to_u64_truncating(bytes: &[u8]) -> Result<u64, CodecError> {
    if bytes.len() > MAX_WORD {
        return Err(CodecError::IntegerOverflow {
            len: bytes.len(),
            max: MAX_WORD,
        });
    }
    let start = bytes.len().saturating_sub(8);
    Ok(bytes[start..]
        .iter()
        .fold(0u64, |acc, &b| (acc << 8) | u64::from(b)))
}

/// Decode a big-endian integer of at most 32 bytes into a `U256`.
pub fn be_to_u256(bytes: &[u8]) -> Result<U256, CodecError> {
    if bytes.len() > MAX_WORD {
        return Err(CodecError::IntegerOverflow {
            len: bytes.len(),
            max: MAX_WORD,
        });
    }
    Ok(U256::from_big_endian(bytes))
}

/// Minimal big-endian encoding of a `u64` (zero encodes as empty).
pub fn u64_to_be_minimal(value: u64) -> Vec<u8> {
    strip_leading_zeros(&value.to_be_bytes()).to_vec()
}

/// Minimal big-endian encoding of a `U256` (zero encodes as empty).
pub fn u256_to_be_minimal(value: &U256) -> Vec<u8> {
    let mut buf = [0u8; 32];
    value.to_big_endian(&mut buf);
    strip_leading_zeros(&buf).to_vec()
}

/// Left-pad a value of at most 32 bytes to a full 32-byte word.
pub fn pad_left_32(bytes: &[u8]) -> Result<[u8; 32], CodecError> {
    if bytes.len() > MAX_WORD {
        return Err(CodecError::InvalidLength {
            expected: MAX_WORD,
            actual: bytes.len(),
        });
    }
    let mut out = [0u8; 32];
    out[MAX_WORD - bytes.len()..].copy_from_slice(bytes);
    Ok(out)
}

fn strip_leading_zeros(bytes: &[u8]) -> &[u8] {
    let start = bytes.iter().position(|&b| b != 0).unwrap_or(bytes.len());
    &bytes[start..]
}
