//! # Hex Codec
//!
//! JSON-RPC carries every binary value as a `0x`-prefixed hex string. Two
//! flavours exist on the wire:
//!
//! - **data** (`0x0a1b...`): even number of digits, possibly fixed length
//! - **quantity** (`0x1a`): minimal digits, may be odd-length

use crate::errors::CodecError;

/// Remove an optional `0x`/`0X` prefix.
pub fn strip_hex_prefix(input: &str) -> &str {
    input
        .strip_prefix("0x")
        .or_else(|| input.strip_prefix("0X"))
        .unwrap_or(input)
}

/// Decode a hex string into bytes.
///
/// With `declared_len = None` odd-length input is accepted as a quantity and
/// left-padded with a zero nibble. With `Some(len)` the input must have an
/// even number of digits and decode to at most `len` bytes; shorter values
/// are left-padded with zero bytes to exactly `len`.
pub fn hex_to_bytes(input: &str, declared_len: Option<usize>) -> Result<Vec<u8>, CodecError> {
    let digits = strip_hex_prefix(input);

    let bytes = if digits.len() % 2 == 1 {
        if declared_len.is_some() {
            return Err(CodecError::InvalidHex(format!(
                "odd number of digits ({}) for fixed-length value",
                digits.len()
            )));
        }
        let mut padded = String::with_capacity(digits.len() + 1);
        padded.push('0');
        padded.push_str(digits);
        decode_even(&padded)?
    } else {
        decode_even(digits)?
    };

    match declared_len {
        None => Ok(bytes),
        Some(len) if bytes.len() > len => Err(CodecError::InvalidLength {
            expected: len,
            actual: bytes.len(),
        }),
        Some(len) => {
            let mut out = vec![0u8; len - bytes.len()];
            out.extend_from_slice(&bytes);
            Ok(out)
        }
    }
}

/// Decode a hex string that must be exactly `N` bytes long.
pub fn hex_to_array<const N: usize>(input: &str) -> Result<[u8; N], CodecError> {
    let digits = strip_hex_prefix(input);
    if digits.len() != N * 2 {
        return Err(CodecError::InvalidLength {
            expected: N,
            actual: digits.len() / 2,
        });
    }
    let mut out = [0u8; N];
    ::hex::decode_to_slice(digits, &mut out).map_err(|e| CodecError::InvalidHex(e.to_string()))?;
    Ok(out)
}

/// Encode bytes as a `0x`-prefixed lowercase hex string.
pub fn bytes_to_hex(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(2 + bytes.len() * 2);
    out.push_str("0x");
    out.push_str(&::hex::encode(bytes));
    out
}

/// Encode an integer as a JSON-RPC quantity (`0x0`, `0x1a`).
pub fn quantity_to_hex(value: u64) -> String {
    format!("0x{:x}", value)
}

fn decode_even(digits: &str) -> Result<Vec<u8>, CodecError> {
    ::hex::decode(digits).map_err(|e| CodecError::InvalidHex(e.to_string()))
}
