//! # Codec Errors

use thiserror::Error;

/// Errors produced by the byte codecs.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CodecError {
    /// Input is not valid hex (bad character, or odd length where a fixed
    /// length was required).
    #[error("Invalid hex: {0}")]
    InvalidHex(String),

    /// Decoded value does not have the required length.
    #[error("Invalid length: expected {expected} bytes, got {actual}")]
    InvalidLength {
        /// Required length
        expected: usize,
        /// Length found
        actual: usize,
    },

    /// RLP structure is malformed.
    #[error("Malformed RLP at offset {offset}: {reason}")]
    MalformedRlp {
        /// Byte offset of the offending item header
        offset: usize,
        /// What was wrong
        reason: &'static str,
    },

    /// Integer does not fit the target word size.
    #[error("Integer overflow: {len} significant bytes exceed {max}")]
    IntegerOverflow {
        /// Number of significant bytes in the input
        len: usize,
        /// Maximum accepted
        max: usize,
    },
}

impl CodecError {
    pub(crate) fn rlp(offset: usize, reason: &'static str) -> Self {
        CodecError::MalformedRlp { offset, reason }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_malformed_rlp_message() {
        let err = CodecError::rlp(7, "length prefix overruns buffer");
        assert!(err.to_string().contains("offset 7"));
        assert!(err.to_string().contains("overruns"));
    }

    #[test]
    fn test_invalid_length_message() {
        let err = CodecError::InvalidLength {
            expected: 32,
            actual: 33,
        };
        assert!(err.to_string().contains("32"));
        assert!(err.to_string().contains("33"));
    }
}
