//! # Trie Builder
//!
//! In-memory trie used to compute roots of ordered lists (transactions,
//! receipts) and to produce proofs. Nodes are rebuilt from the sorted key
//! set on every query; this is meant for block-sized tries, not state.

use crate::nibbles::{encode_hex_prefix, Nibbles};
use crate::EMPTY_TRIE_ROOT;
use std::collections::BTreeMap;
use vc_01_byte_codec::rlp::{encode_bytes, encode_list, encode_u64};
use vc_01_byte_codec::{keccak256, Hash};

/// Sorted key/value set with trie hashing.
#[derive(Debug, Clone, Default)]
pub struct TrieBuilder {
    entries: BTreeMap<Nibbles, Vec<u8>>,
}

impl TrieBuilder {
    /// Empty trie.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or overwrite a value. An empty value removes the key.
    pub fn insert(&mut self, key: &[u8], value: Vec<u8>) {
        let path = Nibbles::from_bytes(key);
        if value.is_empty() {
            self.entries.remove(&path);
        } else {
            self.entries.insert(path, value);
        }
    }

    /// Number of keys.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// `true` if no key is stored.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Root hash ([`EMPTY_TRIE_ROOT`] when empty).
    pub fn root_hash(&self) -> Hash {
        let entries = self.sorted();
        if entries.is_empty() {
            return EMPTY_TRIE_ROOT;
        }
        keccak256(&encode_node(&entries, 0, None, &mut Vec::new()))
    }

    /// Proof of `key`: the root followed by every hash-referenced node on
    /// the key's path. Works for absent keys too.
    pub fn proof(&self, key: &[u8]) -> Vec<Vec<u8>> {
        let entries = self.sorted();
        if entries.is_empty() {
            return Vec::new();
        }
        let target = Nibbles::from_bytes(key);
        let mut path_nodes = Vec::new();
        encode_node(&entries, 0, Some(target.as_slice()), &mut path_nodes);
        path_nodes.reverse();

        let mut proof = Vec::with_capacity(path_nodes.len());
        for (i, node) in path_nodes.into_iter().enumerate() {
            if i == 0 || node.len() >= 32 {
                proof.push(node);
            }
        }
        proof
    }

    fn sorted(&self) -> Vec<(&[u8], &[u8])> {
        self.entries
            .iter()
            .map(|(k, v)| (k.as_slice(), v.as_slice()))
            .collect()
    }
}

/// Root of the trie mapping `rlp(index)` to each item.
pub fn ordered_trie_root<T: AsRef<[u8]>>(items: &[T]) -> Hash {
    ordered_trie(items).root_hash()
}

/// Trie mapping `rlp(index)` to each item.
pub fn ordered_trie<T: AsRef<[u8]>>(items: &[T]) -> TrieBuilder {
    let mut trie = TrieBuilder::new();
    for (index, item) in items.iter().enumerate() {
        trie.insert(&encode_u64(index as u64), item.as_ref().to_vec());
    }
    trie
}

/// Encode the node covering `entries` (sorted, sharing the first `depth`
/// nibbles). Nodes on `target`'s path are appended to `path_nodes`
/// deepest first.
fn encode_node(
    entries: &[(&[u8], &[u8])],
    depth: usize,
    target: Option<&[u8]>,
    path_nodes: &mut Vec<Vec<u8>>,
) -> Vec<u8> {
    let encoded = if entries.len() == 1 {
        let (key, value) = entries[0];
        encode_list(&[
            encode_bytes(&encode_hex_prefix(&key[depth..], true)),
            encode_bytes(value),
        ])
    } else {
        let first = entries[0].0;
        let last = entries[entries.len() - 1].0;
        let shared = first[depth..]
            .iter()
            .zip(&last[depth..])
            .take_while(|(a, b)| a == b)
            .count();

        if shared > 0 {
            let prefix = &first[depth..depth + shared];
            let child_target = target.filter(|t| t.len() >= depth + shared && &t[depth..depth + shared] == prefix);
            let child = encode_node(entries, depth + shared, child_target, path_nodes);
            encode_list(&[
                encode_bytes(&encode_hex_prefix(prefix, false)),
                child_reference(child),
            ])
        } else {
            let mut items: Vec<Vec<u8>> = Vec::with_capacity(17);
            let mut value = vec![0x80];
            let mut start = 0;
            if first.len() == depth {
                value = encode_bytes(entries[0].1);
                start = 1;
            }
            let mut rest = &entries[start..];
            for nibble in 0u8..16 {
                let count = rest.iter().take_while(|(k, _)| k[depth] == nibble).count();
                if count == 0 {
                    items.push(vec![0x80]);
                    continue;
                }
                let (group, tail) = rest.split_at(count);
                rest = tail;
                let child_target = target.filter(|t| t.get(depth) == Some(&nibble));
                let child = encode_node(group, depth + 1, child_target, path_nodes);
                items.push(child_reference(child));
            }
            items.push(value);
            encode_list(&items)
        }
    };

    if target.is_some() {
        path_nodes.push(encoded.clone());
    }
    encoded
}

fn child_reference(encoded: Vec<u8>) -> Vec<u8> {
    if encoded.len() < 32 {
        encoded
    } else {
        encode_bytes(&keccak256(&encoded))
    }
}
