//! # Verifier Registry
//!
//! Verifiers are kept per chain family in registration order; the first
//! one whose `supports` accepts the method handles it.

pub mod basic;
pub mod btc;
pub mod common;
pub mod eth_account;
pub mod eth_block;
pub mod eth_logs;
pub mod eth_receipt;
pub mod eth_tx;
pub mod ipfs;

use crate::config::ChainFamily;
use crate::domain::errors::VerificationError;
use crate::ports::{ProofContext, Verifier};
use std::collections::HashMap;
use tracing::{debug, warn};

pub use basic::{
    ChainIdVerifier, NodelistVerifier, SendRawTransactionVerifier, UnverifiableVerifier,
};
pub use btc::BtcVerifier;
pub use eth_account::EthAccountVerifier;
pub use eth_block::EthBlockVerifier;
pub use eth_logs::EthLogVerifier;
pub use eth_receipt::EthReceiptVerifier;
pub use eth_tx::EthTransactionVerifier;
pub use ipfs::IpfsVerifier;

/// Ordered verifiers per chain family.
#[derive(Default)]
pub struct VerifierRegistry {
    verifiers: HashMap<ChainFamily, Vec<Box<dyn Verifier>>>,
}

impl VerifierRegistry {
    /// Empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with every built-in verifier.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry
            .register(ChainFamily::Ethereum, Box::new(UnverifiableVerifier))
            .register(ChainFamily::Ethereum, Box::new(ChainIdVerifier))
            .register(ChainFamily::Ethereum, Box::new(NodelistVerifier))
            .register(ChainFamily::Ethereum, Box::new(SendRawTransactionVerifier))
            .register(ChainFamily::Ethereum, Box::new(EthBlockVerifier))
            .register(ChainFamily::Ethereum, Box::new(EthTransactionVerifier))
            .register(ChainFamily::Ethereum, Box::new(EthAccountVerifier))
            .register(ChainFamily::Ethereum, Box::new(EthReceiptVerifier))
            .register(ChainFamily::Ethereum, Box::new(EthLogVerifier))
            .register(ChainFamily::Bitcoin, Box::new(BtcVerifier))
            .register(ChainFamily::Ipfs, Box::new(IpfsVerifier));
        registry
    }

    /// Append a verifier for `family`.
    pub fn register(&mut self, family: ChainFamily, verifier: Box<dyn Verifier>) -> &mut Self {
        self.verifiers.entry(family).or_default().push(verifier);
        self
    }

    /// First verifier of `family` that supports `method`.
    pub fn find(&self, family: ChainFamily, method: &str) -> Option<&dyn Verifier> {
        self.verifiers
            .get(&family)?
            .iter()
            .find(|v| v.supports(method))
            .map(|v| v.as_ref())
    }

    /// Verify a response with the matching verifier.
    pub fn verify(&self, ctx: &ProofContext<'_>) -> Result<(), VerificationError> {
        let family = ctx.chain.family();
        let Some(verifier) = self.find(family, ctx.method) else {
            warn!(method = ctx.method, ?family, "[vc-05] No verifier for method");
            return Err(VerificationError::UnsupportedMethod(ctx.method.to_string()));
        };
        verifier.verify(ctx).inspect_err(|e| {
            debug!(
                method = ctx.method,
                verifier = verifier.name(),
                error = %e,
                "[vc-05] Verification failed"
            );
        })
    }
}

impl std::fmt::Debug for VerifierRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let names: HashMap<_, Vec<_>> = self
            .verifiers
            .iter()
            .map(|(family, list)| (family, list.iter().map(|v| v.name()).collect()))
            .collect();
        f.debug_struct("VerifierRegistry").field("verifiers", &names).finish()
    }
}
