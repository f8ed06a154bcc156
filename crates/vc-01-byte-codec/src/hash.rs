//! # Hash Functions
//!
//! Pure digest helpers. Keccak256 is the Ethereum hash; double SHA-256 is
//! the Bitcoin block and transaction hash; SHA-256 is the IPFS multihash.

use crate::Hash;
use sha2::Sha256;
use sha3::{Digest, Keccak256};

/// keccak256 of the empty byte string (code hash of accounts without code).
pub const KECCAK_EMPTY: Hash = [
    0xc5, 0xd2, 0x46, 0x01, 0x86, 0xf7, 0x23, 0x3c, 0x92, 0x7e, 0x7d, 0xb2, 0xdc, 0xc7, 0x03, 0xc0,
    0xe5, 0x00, 0xb6, 0x53, 0xca, 0x82, 0x27, 0x3b, 0x7b, 0xfa, 0xd8, 0x04, 0x5d, 0x85, 0xa4, 0x70,
];

/// Compute Keccak256 hash.
pub fn keccak256(data: &[u8]) -> Hash {
    let mut hasher = Keccak256::new();
    hasher.update(data);
    hasher.finalize().into()
}

/// Compute SHA-256 hash.
pub fn sha256(data: &[u8]) -> Hash {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hasher.finalize().into()
}

/// SHA-256 applied twice, as used for Bitcoin headers and transactions.
pub fn double_sha256(data: &[u8]) -> Hash {
    sha256(&sha256(data))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hex_codec::hex_to_array;

    #[test]
    fn test_keccak_empty_constant() {
        assert_eq!(keccak256(&[]), KECCAK_EMPTY);
    }

    #[test]
    fn test_keccak_of_empty_rlp_string_is_empty_trie_root() {
        let expected: Hash =
            hex_to_array("0x56e81f171bcc55a6ff8345e692c0f86e5b48e01b996cadc001622fb5e363b421")
                .unwrap();
        assert_eq!(keccak256(&[0x80]), expected);
    }

    #[test]
    fn test_sha256_abc() {
        let expected: Hash =
            hex_to_array("ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad")
                .unwrap();
        assert_eq!(sha256(b"abc"), expected);
    }

    #[test]
    fn test_double_sha256_empty() {
        let expected: Hash =
            hex_to_array("5df6e0e2761359d30a8275058e299fcc0381534545f55cf43e41983f5d4c9456")
                .unwrap();
        assert_eq!(double_sha256(&[]), expected);
    }
}
