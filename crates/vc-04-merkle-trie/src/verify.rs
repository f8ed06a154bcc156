//! # Iterative Proof Verification
//!
//! The walk is a loop over node references, never recursion, so a hostile
//! proof cannot exhaust the stack. Every hash-referenced node consumes the
//! next proof element and must hash to the reference; inline children are
//! decoded in place and consume nothing.

use crate::errors::TrieError;
use crate::nibbles::Nibbles;
use crate::node::{NodeRef, TrieNode};
use crate::EMPTY_TRIE_ROOT;
use vc_01_byte_codec::{keccak256, Hash};

/// Maximum number of nodes visited in one walk (64 key nibbles, each
/// possibly behind an extension, plus the terminal node).
pub const MAX_PROOF_DEPTH: usize = 130;

/// Walk `proof` from `root` along `key`.
///
/// Returns `Ok(Some(value))` for a proven inclusion and `Ok(None)` for a
/// proven absence. `key` is the raw trie key (callers hash it first for
/// secure tries).
pub fn verify_proof(
    root: &Hash,
    key: &[u8],
    proof: &[Vec<u8>],
) -> Result<Option<Vec<u8>>, TrieError> {
    if proof.len() > MAX_PROOF_DEPTH {
        return Err(TrieError::ProofTooDeep {
            depth: proof.len(),
            max: MAX_PROOF_DEPTH,
        });
    }
    if proof.is_empty() {
        return if *root == EMPTY_TRIE_ROOT {
            Ok(None)
        } else {
            Err(TrieError::MissingNode { depth: 0 })
        };
    }

    let key = Nibbles::from_bytes(key);
    let key = key.as_slice();
    let mut pos = 0usize;
    let mut used = 0usize;
    let mut depth = 0usize;
    let mut next = NodeRef::Hash(*root);

    let found = loop {
        if depth >= MAX_PROOF_DEPTH {
            return Err(TrieError::ProofTooDeep {
                depth,
                max: MAX_PROOF_DEPTH,
            });
        }

        let node_bytes: &[u8] = match next {
            NodeRef::Empty => break None,
            NodeRef::Inline(bytes) => bytes,
            NodeRef::Hash(expected) => {
                let bytes = proof
                    .get(used)
                    .ok_or(TrieError::MissingNode { depth })?;
                if keccak256(bytes) != expected {
                    return Err(TrieError::BrokenChain { depth });
                }
                used += 1;
                bytes
            }
        };

        let rest = &key[pos..];
        match TrieNode::decode(node_bytes)? {
            TrieNode::Leaf { path, value } => {
                let path = path.as_slice();
                if rest == path {
                    break Some(value.to_vec());
                }
                if rest.len() < path.len() && path.starts_with(rest) {
                    return Err(TrieError::KeyMismatch { depth });
                }
                break None;
            }
            TrieNode::Extension { path, child } => {
                let path = path.as_slice();
                if rest.starts_with(path) {
                    pos += path.len();
                    next = child;
                } else if path.starts_with(rest) {
                    return Err(TrieError::KeyMismatch { depth });
                } else {
                    break None;
                }
            }
            TrieNode::Branch { children, value } => match rest.first() {
                None => break value.map(<[u8]>::to_vec),
                Some(&nibble) => {
                    pos += 1;
                    next = children[usize::from(nibble)];
                }
            },
        }
        depth += 1;
    };

    if used < proof.len() {
        return Err(TrieError::UnusedNodes {
            count: proof.len() - used,
        });
    }
    Ok(found)
}

/// Verify that `proof` proves `expected` (`None` = absence) under `key`.
pub fn verify_value(
    root: &Hash,
    key: &[u8],
    proof: &[Vec<u8>],
    expected: Option<&[u8]>,
) -> Result<(), TrieError> {
    let proven = verify_proof(root, key, proof)?;
    if proven.as_deref() == expected {
        Ok(())
    } else {
        Err(TrieError::ValueMismatch)
    }
}
