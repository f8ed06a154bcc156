//! # Token Errors

use crate::document::TokenKind;
use thiserror::Error;
use vc_01_byte_codec::CodecError;

/// Errors produced while parsing or reading a token tree.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TokenError {
    /// Input is not valid JSON (unterminated string, trailing data,
    /// unbalanced depth, non-integer number).
    #[error("Invalid JSON: {0}")]
    InvalidJson(String),

    /// Input is not a valid compact binary document.
    #[error("Invalid binary token at offset {offset}: {reason}")]
    InvalidBinary {
        /// Offset of the offending header byte
        offset: usize,
        /// What was wrong
        reason: &'static str,
    },

    /// Token has a different kind than the accessor requires.
    #[error("Type mismatch: expected {expected}, found {found}")]
    TypeMismatch {
        /// Kind the accessor needs
        expected: TokenKind,
        /// Kind of the token
        found: TokenKind,
    },

    /// Object has no entry with the requested key.
    #[error("Missing key: {0}")]
    MissingKey(String),

    /// Array index is past the end.
    #[error("Index {index} out of range (len {len})")]
    IndexOutOfRange {
        /// Requested index
        index: usize,
        /// Array length
        len: usize,
    },

    /// A string token did not hold valid hex / integer data.
    #[error(transparent)]
    Codec(#[from] CodecError),
}

impl TokenError {
    pub(crate) fn binary(offset: usize, reason: &'static str) -> Self {
        TokenError::InvalidBinary { offset, reason }
    }
}
