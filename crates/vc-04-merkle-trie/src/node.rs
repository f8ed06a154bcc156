//! # Trie Nodes
//!
//! Borrowed views of RLP-encoded trie nodes:
//!
//! - Leaf: `[hp(path, leaf=true), value]`
//! - Extension: `[hp(path, leaf=false), child]`
//! - Branch: `[child_0, ..., child_15, value]`
//!
//! A child reference is the empty string, a 32-byte hash, or the node
//! itself inlined as a list when its encoding is shorter than 32 bytes.

use crate::errors::TrieError;
use crate::nibbles::Nibbles;
use vc_01_byte_codec::rlp::{self, RlpKind};
use vc_01_byte_codec::Hash;

/// Reference from a parent node to a child.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeRef<'a> {
    /// No child.
    Empty,
    /// keccak256 of the child's encoding.
    Hash(Hash),
    /// Child encoding embedded in the parent.
    Inline(&'a [u8]),
}

impl<'a> NodeRef<'a> {
    /// Decode one raw RLP item of a node as a child reference.
    pub fn decode(raw: &'a [u8]) -> Result<Self, TrieError> {
        match rlp::decode_single(raw)? {
            (RlpKind::List, _) if raw.len() < 32 => Ok(NodeRef::Inline(raw)),
            (RlpKind::List, _) => Err(TrieError::MalformedNode(
                "inline child of 32 bytes or more".into(),
            )),
            (RlpKind::Value, payload) if payload.is_empty() => Ok(NodeRef::Empty),
            (RlpKind::Value, payload) => {
                let hash: Hash = payload.try_into().map_err(|_| {
                    TrieError::MalformedNode(format!("child reference of {} bytes", payload.len()))
                })?;
                Ok(NodeRef::Hash(hash))
            }
        }
    }
}

/// Decoded trie node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TrieNode<'a> {
    /// Terminal node.
    Leaf {
        /// Remaining key path
        path: Nibbles,
        /// Stored value
        value: &'a [u8],
    },
    /// Shared path prefix.
    Extension {
        /// Shared nibbles
        path: Nibbles,
        /// Next node
        child: NodeRef<'a>,
    },
    /// 16-way fork.
    Branch {
        /// One slot per nibble
        children: [NodeRef<'a>; 16],
        /// Value of a key ending here
        value: Option<&'a [u8]>,
    },
}

impl<'a> TrieNode<'a> {
    /// Decode an RLP-encoded node.
    pub fn decode(bytes: &'a [u8]) -> Result<Self, TrieError> {
        let items = rlp::list_items(bytes)?;
        match items.len() {
            2 => {
                let encoded_path = rlp::decode_value(items[0])?;
                let (path, is_leaf) = Nibbles::decode_hex_prefix(encoded_path)?;
                if is_leaf {
                    Ok(TrieNode::Leaf {
                        path,
                        value: rlp::decode_value(items[1])?,
                    })
                } else {
                    if path.is_empty() {
                        return Err(TrieError::MalformedNode("extension with empty path".into()));
                    }
                    match NodeRef::decode(items[1])? {
                        NodeRef::Empty => Err(TrieError::MalformedNode(
                            "extension without child".into(),
                        )),
                        child => Ok(TrieNode::Extension { path, child }),
                    }
                }
            }
            17 => {
                let mut children = [NodeRef::Empty; 16];
                for (slot, raw) in children.iter_mut().zip(items.iter()) {
                    *slot = NodeRef::decode(raw)?;
                }
                let value = rlp::decode_value(items[16])?;
                Ok(TrieNode::Branch {
                    children,
                    value: (!value.is_empty()).then_some(value),
                })
            }
            n => Err(TrieError::MalformedNode(format!("node with {n} items"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vc_01_byte_codec::rlp::{encode_bytes, encode_list};

    #[test]
    fn test_decode_leaf() {
        let encoded = encode_list(&[encode_bytes(&[0x20, 0xab]), encode_bytes(b"value")]);
        match TrieNode::decode(&encoded).unwrap() {
            TrieNode::Leaf { path, value } => {
                assert_eq!(path.as_slice(), &[0xa, 0xb]);
                assert_eq!(value, b"value");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_decode_extension_with_hash() {
        let encoded = encode_list(&[encode_bytes(&[0x11, 0x23]), encode_bytes(&[7u8; 32])]);
        match TrieNode::decode(&encoded).unwrap() {
            TrieNode::Extension { path, child } => {
                assert_eq!(path.as_slice(), &[1, 2, 3]);
                assert_eq!(child, NodeRef::Hash([7u8; 32]));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_decode_branch_with_inline_child() {
        let inline = encode_list(&[encode_bytes(&[0x20]), encode_bytes(b"x")]);
        let mut items: Vec<Vec<u8>> = vec![vec![0x80]; 17];
        items[3] = inline.clone();
        items[16] = encode_bytes(b"v");
        let encoded = encode_list(&items);
        match TrieNode::decode(&encoded).unwrap() {
            TrieNode::Branch { children, value } => {
                assert_eq!(children[3], NodeRef::Inline(&inline));
                assert_eq!(children[0], NodeRef::Empty);
                assert_eq!(value, Some(&b"v"[..]));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_rejects_bad_shapes() {
        let three = encode_list(&[vec![0x80], vec![0x80], vec![0x80]]);
        assert!(matches!(
            TrieNode::decode(&three),
            Err(TrieError::MalformedNode(_))
        ));

        let short_hash = encode_list(&[encode_bytes(&[0x11]), encode_bytes(&[1u8; 31])]);
        assert!(TrieNode::decode(&short_hash).is_err());

        assert!(TrieNode::decode(&encode_bytes(b"not a list")).is_err());
        assert!(TrieNode::decode(&[0xc5, 0x01]).is_err());
    }
}
