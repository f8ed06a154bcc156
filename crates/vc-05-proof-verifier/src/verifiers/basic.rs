//! Methods whose results cannot be proven, or are checked without a proof.

use crate::domain::errors::VerificationError;
use crate::ports::{ProofContext, Verifier};
use crate::verifiers::common::ensure;
use std::collections::BTreeSet;
use vc_01_byte_codec::{keccak256, U256};

/// Methods accepted as returned.
pub const UNVERIFIABLE_METHODS: &[&str] = &[
    "eth_blockNumber",
    "eth_gasPrice",
    "net_version",
    "web3_clientVersion",
];

/// Accepts results that no proof can cover.
#[derive(Debug, Default)]
pub struct UnverifiableVerifier;

impl Verifier for UnverifiableVerifier {
    fn name(&self) -> &'static str {
        "unverifiable"
    }

    fn supports(&self, method: &str) -> bool {
        UNVERIFIABLE_METHODS.contains(&method)
    }

    fn verify(&self, _ctx: &ProofContext<'_>) -> Result<(), VerificationError> {
        Ok(())
    }
}

/// `eth_chainId` must report the configured chain.
#[derive(Debug, Default)]
pub struct ChainIdVerifier;

impl Verifier for ChainIdVerifier {
    fn name(&self) -> &'static str {
        "chain-id"
    }

    fn supports(&self, method: &str) -> bool {
        method == "eth_chainId"
    }

    fn verify(&self, ctx: &ProofContext<'_>) -> Result<(), VerificationError> {
        ensure(ctx.result.as_u64()? == ctx.chain.chain_id(), "chainId")
    }
}

/// `eth_sendRawTransaction` must return the hash of the submitted bytes.
#[derive(Debug, Default)]
pub struct SendRawTransactionVerifier;

impl Verifier for SendRawTransactionVerifier {
    fn name(&self) -> &'static str {
        "send-raw-transaction"
    }

    fn supports(&self, method: &str) -> bool {
        method == "eth_sendRawTransaction"
    }

    fn verify(&self, ctx: &ProofContext<'_>) -> Result<(), VerificationError> {
        let raw = ctx
            .param(0)
            .ok_or_else(|| VerificationError::InvalidProofData("missing raw transaction".into()))?
            .as_bytes()?;
        ensure(ctx.result.as_hash()? == keccak256(&raw), "transactionHash")
    }
}

/// Structure of an `in3_nodeList` answer.
///
/// One answer proves nothing about the registry contract; the client only
/// installs a list that several nodes returned identically.
#[derive(Debug, Default)]
pub struct NodelistVerifier;

impl Verifier for NodelistVerifier {
    fn name(&self) -> &'static str {
        "nodelist"
    }

    fn supports(&self, method: &str) -> bool {
        method == "in3_nodeList"
    }

    fn verify(&self, ctx: &ProofContext<'_>) -> Result<(), VerificationError> {
        let nodes = ctx.result.field("nodes")?.as_array()?;
        ensure(!nodes.is_empty(), "nodes")?;
        ctx.result.field("lastBlockNumber")?.as_u64()?;

        let chain_id = U256::from(ctx.chain.chain_id());
        let mut urls = BTreeSet::new();
        for node in &nodes {
            let url = node.field("url")?.as_str()?;
            ensure(!url.is_empty() && urls.insert(url.to_string()), "node url")?;
            ensure(node.field("address")?.as_address()? != [0u8; 20], "node address")?;
            if let Some(chains) = node.get("chainIds") {
                let mut served = false;
                for id in chains.as_array()? {
                    served |= id.as_u256()? == chain_id;
                }
                ensure(served, "node chainIds")?;
            }
        }
        Ok(())
    }
}
