//! # Verification Errors
//!
//! Every parse failure on proof data surfaces here; verifiers never panic.

use thiserror::Error;
use vc_01_byte_codec::CodecError;
use vc_02_token_model::TokenError;
use vc_04_merkle_trie::TrieError;

/// Errors raised while verifying a response.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum VerificationError {
    /// A proven value differs from the value in the result.
    #[error("Proof mismatch: {0}")]
    ProofMismatch(String),

    /// The response lacks a proof element the method requires.
    #[error("Missing proof: {0}")]
    MissingProof(&'static str),

    /// Proof element present but unusable.
    #[error("Invalid proof data: {0}")]
    InvalidProofData(String),

    /// Header does not hash to the claimed block hash.
    #[error("Block hash mismatch: expected {expected}, computed {computed}")]
    BlockHashMismatch {
        /// Claimed hash (hex)
        expected: String,
        /// Hash of the encoded header (hex)
        computed: String,
    },

    /// A proven log does not satisfy the request's filter.
    #[error("Log does not match filter: {0}")]
    FilterMismatch(String),

    /// Request filter could not be parsed.
    #[error("Invalid log filter: {0}")]
    InvalidFilter(String),

    /// A signature does not recover to an acceptable signer.
    #[error("Signature mismatch: {0}")]
    SignatureMismatch(String),

    /// Too few valid node signatures.
    #[error("Insufficient signatures: {got} < {required}")]
    InsufficientSignatures {
        /// Valid distinct signers
        got: usize,
        /// Required by the request policy
        required: usize,
    },

    /// Block sealed by an address outside the validator set.
    #[error("Unknown validator {signer} at block {block}")]
    UnknownValidator {
        /// Block number
        block: u64,
        /// Recovered signer (hex)
        signer: String,
    },

    /// Not enough distinct validators sealed the finality headers.
    #[error("Insufficient finality: {got} of {required} validators")]
    InsufficientFinality {
        /// Distinct signers found
        got: usize,
        /// Distinct signers required
        required: usize,
    },

    /// Validator transitions applied out of block order.
    #[error("Validator history out of order: last {last}, offered {offered}")]
    ValidatorHistoryOrder {
        /// Latest recorded block
        last: u64,
        /// Block offered
        offered: u64,
    },

    /// A header does not link to its predecessor.
    #[error("Broken chain linkage at finality header {index}")]
    ChainLinkage {
        /// Index within the finality headers
        index: usize,
    },

    /// Header hash above its compact target.
    #[error("Invalid proof of work for block {hash}")]
    InvalidProofOfWork {
        /// Block hash (display order, hex)
        hash: String,
    },

    /// Header target differs from the period's expected target.
    #[error("Target mismatch: expected bits {expected:#010x}, got {actual:#010x}")]
    TargetMismatch {
        /// Expected compact target
        expected: u32,
        /// Header compact target
        actual: u32,
    },

    /// Block and finality headers carry too little work.
    #[error("Insufficient cumulative work")]
    InsufficientWork,

    /// Returned content does not hash to the requested id.
    #[error("Content hash mismatch: expected {expected}, computed {computed}")]
    ContentHashMismatch {
        /// Requested id
        expected: String,
        /// Id of the returned content
        computed: String,
    },

    /// No verifier accepts the method.
    #[error("Unsupported method: {0}")]
    UnsupportedMethod(String),

    /// Merkle-Patricia proof failure.
    #[error(transparent)]
    Trie(#[from] TrieError),

    /// Hex / RLP / integer decoding failure.
    #[error(transparent)]
    Codec(#[from] CodecError),

    /// Token navigation failure.
    #[error(transparent)]
    Token(#[from] TokenError),

    /// A nested verified request failed.
    #[error("Sub-request failed: {0}")]
    SubRequest(String),
}

impl VerificationError {
    /// `ProofMismatch` for a named field.
    pub fn mismatch(field: &str) -> Self {
        VerificationError::ProofMismatch(format!("{field} does not match proof"))
    }
}
