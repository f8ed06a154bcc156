//! # Trie Errors

use thiserror::Error;
use vc_01_byte_codec::CodecError;

/// Proof verification errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TrieError {
    /// Node is not a valid 2- or 17-item trie node.
    #[error("Malformed trie node: {0}")]
    MalformedNode(String),

    /// A proof node does not hash to the reference held by its parent
    /// (or, at depth 0, to the root).
    #[error("Broken hash chain at depth {depth}")]
    BrokenChain {
        /// Position of the offending node in the walk
        depth: usize,
    },

    /// The key ended inside a leaf or extension path.
    #[error("Key exhausted inside node path at depth {depth}")]
    KeyMismatch {
        /// Position of the node in the walk
        depth: usize,
    },

    /// The walk needs a hash-referenced node the proof does not contain.
    #[error("Proof ends with a pending node reference at depth {depth}")]
    MissingNode {
        /// Depth of the missing node
        depth: usize,
    },

    /// The proof carries nodes the walk never reached.
    #[error("Proof contains {count} unused nodes")]
    UnusedNodes {
        /// Number of surplus nodes
        count: usize,
    },

    /// Walk exceeded the depth limit.
    #[error("Proof too deep: {depth} > {max}")]
    ProofTooDeep {
        /// Depth reached
        depth: usize,
        /// Limit
        max: usize,
    },

    /// Proven value differs from the expected one.
    #[error("Proven value does not match the expected value")]
    ValueMismatch,
}

impl From<CodecError> for TrieError {
    fn from(e: CodecError) -> Self {
        TrieError::MalformedNode(e.to_string())
    }
}
