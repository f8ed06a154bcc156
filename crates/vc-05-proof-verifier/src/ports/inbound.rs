//! Inbound port: the verifier strategy.

use crate::domain::chain::ChainSpec;
use crate::domain::errors::VerificationError;
use crate::ports::outbound::SubRequester;
use vc_01_byte_codec::Address;
use vc_02_token_model::Token;

/// Verification requirements of one request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProofPolicy {
    /// Node addresses asked to sign the block hash.
    pub signers: Vec<Address>,
    /// Valid signatures required.
    pub signature_count: usize,
    /// Percentage of validators that must seal finality headers.
    pub finality: u32,
    /// Whether account proofs must carry the contract code.
    pub include_code: bool,
    /// Whether the full proof set was requested.
    pub full_proof: bool,
}

/// Everything a verifier sees about one response.
#[derive(Clone, Copy)]
pub struct ProofContext<'a> {
    /// JSON-RPC method
    pub method: &'a str,
    /// Request params array
    pub params: Token<'a>,
    /// Response `result`
    pub result: Token<'a>,
    /// Response `in3.proof`, when present
    pub proof: Option<Token<'a>>,
    /// Chain the request targets
    pub chain: &'a ChainSpec,
    /// Request policy
    pub policy: &'a ProofPolicy,
    /// Nested request channel
    pub sub: Option<&'a dyn SubRequester>,
}

impl<'a> ProofContext<'a> {
    /// The proof object or `MissingProof`.
    pub fn require_proof(&self) -> Result<Token<'a>, VerificationError> {
        self.proof
            .filter(|p| !p.is_null())
            .ok_or(VerificationError::MissingProof("in3.proof"))
    }

    /// A required field of the proof object.
    pub fn proof_field(&self, key: &'static str) -> Result<Token<'a>, VerificationError> {
        self.require_proof()?
            .get(key)
            .filter(|t| !t.is_null())
            .ok_or(VerificationError::MissingProof(key))
    }

    /// Request parameter at `index`, if present and non-null.
    pub fn param(&self, index: usize) -> Option<Token<'a>> {
        self.params.at(index).filter(|t| !t.is_null())
    }

    /// The nested request channel or an error naming what needed it.
    pub fn sub_requester(&self, purpose: &str) -> Result<&'a dyn SubRequester, VerificationError> {
        self.sub.ok_or_else(|| {
            VerificationError::SubRequest(format!("no sub-request channel for {purpose}"))
        })
    }
}

impl std::fmt::Debug for ProofContext<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProofContext")
            .field("method", &self.method)
            .field("chain_id", &self.chain.chain_id())
            .field("has_proof", &self.proof.is_some())
            .finish()
    }
}

/// A proof strategy for a family of methods.
pub trait Verifier: Send + Sync {
    /// Name used in logs.
    fn name(&self) -> &'static str;

    /// Whether this verifier handles `method`.
    fn supports(&self, method: &str) -> bool;

    /// Verify the response described by `ctx`.
    fn verify(&self, ctx: &ProofContext<'_>) -> Result<(), VerificationError>;
}
