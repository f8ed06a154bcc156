//! # RLP (Recursive Length Prefix)
//!
//! Encoding follows the Ethereum Yellow Paper, Appendix B. Decoding works on
//! borrowed slices: every item is returned as a view into the input buffer,
//! and every length prefix is checked against the remaining input before it
//! is used.
//!
//! Canonical form is enforced on decode:
//! - a single byte below `0x80` must not be wrapped in a `0x81` header
//! - long-form lengths must not have leading zeros and must be >= 56

use crate::errors::CodecError;
use crate::int::{u256_to_be_minimal, u64_to_be_minimal};
use primitive_types::U256;

/// Kind of a decoded RLP item.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RlpKind {
    /// Byte string.
    Value,
    /// List of items.
    List,
}

/// Owned RLP tree used for encoding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RlpItem {
    /// Byte string.
    Bytes(Vec<u8>),
    /// Nested list.
    List(Vec<RlpItem>),
}

impl RlpItem {
    /// Byte-string item from a minimal big-endian `u64`.
    pub fn uint(value: u64) -> Self {
        RlpItem::Bytes(u64_to_be_minimal(value))
    }

    /// Byte-string item from a minimal big-endian `U256`.
    pub fn u256(value: &U256) -> Self {
        RlpItem::Bytes(u256_to_be_minimal(value))
    }

    /// Byte-string item copied from a slice.
    pub fn bytes(data: &[u8]) -> Self {
        RlpItem::Bytes(data.to_vec())
    }
}

// =============================================================================
// ENCODING
// =============================================================================

/// Encode an RLP tree.
pub fn encode(item: &RlpItem) -> Vec<u8> {
    match item {
        RlpItem::Bytes(data) => encode_bytes(data),
        RlpItem::List(items) => {
            let encoded: Vec<Vec<u8>> = items.iter().map(encode).collect();
            encode_list(&encoded)
        }
    }
}

/// RLP-encode a byte slice.
pub fn encode_bytes(data: &[u8]) -> Vec<u8> {
    if data.len() == 1 && data[0] < 0x80 {
        return vec![data[0]];
    }
    let mut result = encode_header(0x80, data.len());
    result.extend_from_slice(data);
    result
}

/// Wrap already-encoded items into a list.
pub fn encode_list(encoded_items: &[Vec<u8>]) -> Vec<u8> {
    let total_len: usize = encoded_items.iter().map(Vec::len).sum();
    let mut result = encode_header(0xc0, total_len);
    result.reserve(total_len);
    for encoded in encoded_items {
        result.extend_from_slice(encoded);
    }
    result
}

/// RLP-encode an integer scalar.
pub fn encode_u64(value: u64) -> Vec<u8> {
    encode_bytes(&u64_to_be_minimal(value))
}

fn encode_header(offset: u8, len: usize) -> Vec<u8> {
    if len < 56 {
        vec![offset + len as u8]
    } else {
        let len_bytes = u64_to_be_minimal(len as u64);
        let mut header = Vec::with_capacity(1 + len_bytes.len());
        header.push(offset + 55 + len_bytes.len() as u8);
        header.extend_from_slice(&len_bytes);
        header
    }
}

// =============================================================================
// DECODING
// =============================================================================

/// Decode the item starting at `index`.
///
/// Returns the item kind, a view of its payload and the index just past the
/// item. Single bytes below `0x80` are their own payload.
pub fn decode_at(bytes: &[u8], index: usize) -> Result<(RlpKind, &[u8], usize), CodecError> {
    let prefix = *bytes
        .get(index)
        .ok_or_else(|| CodecError::rlp(index, "unexpected end of input"))?;

    match prefix {
        0x00..=0x7f => Ok((RlpKind::Value, &bytes[index..index + 1], index + 1)),
        0x80..=0xb7 => {
            let len = usize::from(prefix - 0x80);
            let payload = payload(bytes, index, index + 1, len)?;
            if len == 1 && payload[0] < 0x80 {
                return Err(CodecError::rlp(index, "non-canonical single byte"));
            }
            Ok((RlpKind::Value, payload, index + 1 + len))
        }
        0xb8..=0xbf => {
            let len_of_len = usize::from(prefix - 0xb7);
            let len = long_length(bytes, index, len_of_len)?;
            let start = index + 1 + len_of_len;
            Ok((RlpKind::Value, payload(bytes, index, start, len)?, start + len))
        }
        0xc0..=0xf7 => {
            let len = usize::from(prefix - 0xc0);
            Ok((
                RlpKind::List,
                payload(bytes, index, index + 1, len)?,
                index + 1 + len,
            ))
        }
        0xf8..=0xff => {
            let len_of_len = usize::from(prefix - 0xf7);
            let len = long_length(bytes, index, len_of_len)?;
            let start = index + 1 + len_of_len;
            Ok((RlpKind::List, payload(bytes, index, start, len)?, start + len))
        }
    }
}

/// Decode a buffer that must hold exactly one item.
pub fn decode_single(bytes: &[u8]) -> Result<(RlpKind, &[u8]), CodecError> {
    let (kind, payload, next) = decode_at(bytes, 0)?;
    if next != bytes.len() {
        return Err(CodecError::rlp(next, "trailing bytes after item"));
    }
    Ok((kind, payload))
}

/// Decode a byte-string item occupying the whole buffer.
pub fn decode_value(bytes: &[u8]) -> Result<&[u8], CodecError> {
    match decode_single(bytes)? {
        (RlpKind::Value, payload) => Ok(payload),
        (RlpKind::List, _) => Err(CodecError::rlp(0, "expected value, found list")),
    }
}

/// Split a list (occupying the whole buffer) into its raw encoded items.
pub fn list_items(bytes: &[u8]) -> Result<Vec<&[u8]>, CodecError> {
    let payload = match decode_single(bytes)? {
        (RlpKind::List, payload) => payload,
        (RlpKind::Value, _) => return Err(CodecError::rlp(0, "expected list, found value")),
    };
    split_payload(payload)
}

/// Split a list into `(kind, payload)` pairs of its items.
pub fn list_payloads(bytes: &[u8]) -> Result<Vec<(RlpKind, &[u8])>, CodecError> {
    list_items(bytes)?
        .into_iter()
        .map(decode_single)
        .collect()
}

/// Number of items in a list.
pub fn item_count(bytes: &[u8]) -> Result<usize, CodecError> {
    list_items(bytes).map(|items| items.len())
}

/// Split a list payload into the raw encoded items it contains.
pub fn split_payload(payload: &[u8]) -> Result<Vec<&[u8]>, CodecError> {
    let mut items = Vec::new();
    let mut pos = 0;
    while pos < payload.len() {
        let (_, _, next) = decode_at(payload, pos)?;
        items.push(&payload[pos..next]);
        pos = next;
    }
    Ok(items)
}

fn payload(bytes: &[u8], header: usize, start: usize, len: usize) -> Result<&[u8], CodecError> {
    let end = start
        .checked_add(len)
        .ok_or_else(|| CodecError::rlp(header, "length overflow"))?;
    bytes
        .get(start..end)
        .ok_or_else(|| CodecError::rlp(header, "length prefix overruns buffer"))
}

fn long_length(bytes: &[u8], header: usize, len_of_len: usize) -> Result<usize, CodecError> {
    if len_of_len > std::mem::size_of::<usize>() {
        return Err(CodecError::rlp(header, "length of length too large"));
    }
    let len_bytes = payload(bytes, header, header + 1, len_of_len)?;
    if len_bytes[0] == 0 {
        return Err(CodecError::rlp(header, "leading zero in length"));
    }
    let len = len_bytes
        .iter()
        .fold(0usize, |acc, &b| (acc << 8) | usize::from(b));
    if len < 56 {
        return Err(CodecError::rlp(header, "long form used for short length"));
    }
    Ok(len)
}
