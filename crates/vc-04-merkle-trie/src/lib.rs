//! # VC-04 Merkle Patricia Trie
//!
//! Verification of Ethereum Merkle-Patricia proofs (state, storage,
//! transaction and receipt tries) plus a small in-memory builder.
//!
//! **Component ID:** 04
//! **Dependencies:** vc-01-byte-codec
//!
//! ## Security
//!
//! | Defense | Description |
//! |---------|-------------|
//! | Iterative walk | No recursion over untrusted input |
//! | Depth limit | [`MAX_PROOF_DEPTH`] nodes per walk |
//! | Hash chaining | Each node must hash to its parent's reference |
//! | Strict decoding | Bounds-checked RLP, validated hex-prefix flags |

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod builder;
pub mod errors;
pub mod nibbles;
pub mod node;
pub mod verify;

pub use builder::{ordered_trie, ordered_trie_root, TrieBuilder};
pub use errors::TrieError;
pub use nibbles::Nibbles;
pub use node::{NodeRef, TrieNode};
pub use verify::{verify_proof, verify_value, MAX_PROOF_DEPTH};

use vc_01_byte_codec::Hash;

/// Root of the empty trie: `keccak256(rlp(""))`.
pub const EMPTY_TRIE_ROOT: Hash = [
    0x56, 0xe8, 0x1f, 0x17, 0x1b, 0xcc, 0x55, 0xa6, 0xff, 0x83, 0x45, 0xe6, 0x92, 0xc0, 0xf8, 0x6e,
    0x5b, 0x48, 0xe0, 0x1b, 0x99, 0x6c, 0xad, 0xc0, 0x01, 0x62, 0x2f, 0xb5, 0xe3, 0x63, 0xb4, 0x21,
];

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_trie_root_constant() {
        assert_eq!(vc_01_byte_codec::keccak256(&[0x80]), EMPTY_TRIE_ROOT);
    }

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }
}
