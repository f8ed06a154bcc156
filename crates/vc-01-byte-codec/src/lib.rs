//! # VC-01 Byte Codec
//!
//! Canonical encoders and decoders shared by every other component.
//!
//! **Component ID:** 01
//! **Dependencies:** none inside the workspace (leaf crate)
//!
//! ## Purpose
//!
//! All proof data arrives as hex strings wrapping RLP or raw binary
//! structures. This crate turns them into bounds-checked byte views:
//!
//! | Module | Contents |
//! |--------|----------|
//! | `hex_codec` | `0x` hex strings to bytes and back |
//! | `rlp` | Recursive Length Prefix encoding/decoding |
//! | `int` | Big-endian integer codecs (minimal on encode) |
//! | `hash` | keccak256, sha256, double sha256 |
//!
//! Every decoder returns a [`CodecError`] instead of reading past the end of
//! a buffer.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod errors;
pub mod hash;
pub mod hex_codec;
pub mod int;
pub mod rlp;

pub use errors::CodecError;
pub use hash::{double_sha256, keccak256, sha256, KECCAK_EMPTY};
pub use hex_codec::{bytes_to_hex, hex_to_array, hex_to_bytes, quantity_to_hex, strip_hex_prefix};
pub use int::{
    be_to_u256, be_to_u64, be_to_u64_truncating, pad_left_32, u256_to_be_minimal,
    u64_to_be_minimal,
};
pub use rlp::{RlpItem, RlpKind};

/// 32-byte hash (keccak256 or sha256 output).
pub type Hash = [u8; 32];

/// 20-byte account address.
pub type Address = [u8; 20];

/// Re-export of the 256-bit unsigned integer used across the workspace.
pub use primitive_types::U256;

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    #[test]
    fn test_version() {
        assert!(!super::VERSION.is_empty());
    }
}
