//! # IPFS Content Ids
//!
//! Content is wrapped as a single-chunk UnixFS file inside a DAG-PB node,
//! hashed with sha2-256 and rendered as a base58btc CIDv0 (`Qm...`).

use crate::domain::errors::VerificationError;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use vc_01_byte_codec::{bytes_to_hex, hex_to_bytes, sha256};

/// Largest payload a single UnixFS chunk holds.
pub const MAX_CHUNK_SIZE: usize = 262_144;

const MULTIHASH_SHA2_256: u8 = 0x12;
const UNIXFS_FILE: u64 = 2;

/// Content encoding of `ipfs_get` / `ipfs_put` payloads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentEncoding {
    /// `0x` hex
    Hex,
    /// Standard base64
    Base64,
    /// Plain UTF-8 text
    Utf8,
}

impl ContentEncoding {
    /// Parse the encoding name used in request params.
    pub fn from_name(name: &str) -> Result<Self, VerificationError> {
        match name {
            "hex" => Ok(ContentEncoding::Hex),
            "base64" => Ok(ContentEncoding::Base64),
            "utf8" => Ok(ContentEncoding::Utf8),
            other => Err(VerificationError::InvalidProofData(format!(
                "unknown content encoding {other}"
            ))),
        }
    }

    /// Decode a payload.
    pub fn decode(self, text: &str) -> Result<Vec<u8>, VerificationError> {
        match self {
            ContentEncoding::Hex => Ok(hex_to_bytes(text, None)?),
            ContentEncoding::Base64 => STANDARD
                .decode(text)
                .map_err(|e| VerificationError::InvalidProofData(format!("base64: {e}"))),
            ContentEncoding::Utf8 => Ok(text.as_bytes().to_vec()),
        }
    }

    /// Encode a payload.
    pub fn encode(self, bytes: &[u8]) -> Result<String, VerificationError> {
        match self {
            ContentEncoding::Hex => Ok(bytes_to_hex(bytes)),
            ContentEncoding::Base64 => Ok(STANDARD.encode(bytes)),
            ContentEncoding::Utf8 => String::from_utf8(bytes.to_vec())
                .map_err(|_| VerificationError::InvalidProofData("content is not UTF-8".into())),
        }
    }
}

fn put_varint(out: &mut Vec<u8>, mut value: u64) {
    while value >= 0x80 {
        out.push((value as u8 & 0x7f) | 0x80);
        value >>= 7;
    }
    out.push(value as u8);
}

fn put_bytes_field(out: &mut Vec<u8>, tag: u8, bytes: &[u8]) {
    out.push(tag);
    put_varint(out, bytes.len() as u64);
    out.extend_from_slice(bytes);
}

/// DAG-PB node holding `content` as a UnixFS file.
pub fn unixfs_file_node(content: &[u8]) -> Vec<u8> {
    // UnixFS Data { Type = File, Data, filesize }
    let mut data = vec![0x08];
    put_varint(&mut data, UNIXFS_FILE);
    if !content.is_empty() {
        put_bytes_field(&mut data, 0x12, content);
    }
    data.push(0x18);
    put_varint(&mut data, content.len() as u64);

    // PBNode { Data }
    let mut node = Vec::with_capacity(data.len() + 4);
    put_bytes_field(&mut node, 0x0a, &data);
    node
}

/// CIDv0 of `content` stored as a single chunk.
pub fn content_id(content: &[u8]) -> Result<String, VerificationError> {
    if content.len() > MAX_CHUNK_SIZE {
        return Err(VerificationError::InvalidProofData(format!(
            "content of {} bytes spans multiple chunks",
            content.len()
        )));
    }
    let digest = sha256(&unixfs_file_node(content));
    let mut multihash = Vec::with_capacity(34);
    multihash.push(MULTIHASH_SHA2_256);
    multihash.push(32);
    multihash.extend_from_slice(&digest);
    Ok(bs58::encode(multihash).into_string())
}

/// Check that `content` hashes to `expected`.
pub fn verify_content(expected: &str, content: &[u8]) -> Result<(), VerificationError> {
    let computed = content_id(content)?;
    if computed != expected {
        return Err(VerificationError::ContentHashMismatch {
            expected: expected.to_string(),
            computed,
        });
    }
    Ok(())
}
