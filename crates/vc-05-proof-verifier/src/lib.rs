//! # VC-05 Proof Verifier
//!
//! Checks node responses against the proofs they carry, dispatched by
//! chain family and method.
//!
//! **Component ID:** 05
//! **Dependencies:** vc-01-byte-codec, vc-02-token-model, vc-04-merkle-trie
//!
//! ## Verifiers
//!
//! | Family | Methods | Proof anchor |
//! |--------|---------|--------------|
//! | Ethereum | `eth_getBlockBy*` | header hash, tx trie root, signatures |
//! | Ethereum | `eth_getTransactionBy*` | tx trie inclusion |
//! | Ethereum | `eth_getBalance`, `eth_getCode`, `eth_getStorageAt`, `eth_getTransactionCount` | state and storage tries |
//! | Ethereum | `eth_getTransactionReceipt` | receipt trie inclusion |
//! | Ethereum | `eth_getLogs` | receipt trie per block, filter match |
//! | Ethereum | `eth_chainId`, `eth_sendRawTransaction` | checked without proof |
//! | Bitcoin | `getblockheader`, `getblock`, `getrawtransaction`, `btc_proofTarget` | proof of work, finality headers, period targets |
//! | IPFS | `ipfs_get`, `ipfs_put` | content id |
//!
//! Header trust for Ethereum comes from Clique seals (validator history
//! replayed from epoch headers) and from node signatures over
//! `keccak(blockHash ‖ blockNumber)`.
//!
//! ## Module Structure
//!
//! ```text
//! vc-05-proof-verifier/
//! ├── domain/          # headers, txs, receipts, filters, btc, ipfs, ChainSpec
//! ├── ports/           # Verifier, ProofContext, SubRequester
//! ├── verifiers/       # per-method strategies, VerifierRegistry
//! └── config.rs        # ChainConfig, BtcParams
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod domain;
pub mod ports;
pub mod verifiers;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use config::{BootNode, BtcParams, ChainConfig, ChainFamily, ConfigError, EthConsensus};
pub use domain::{
    recover_address, BlockScope, BlockTag, ChainSpec, EthHeader, LegacyTransaction, LogFilter,
    RecoverableSignature, ValidatorHistory, VerificationError,
};
pub use ports::{ProofContext, ProofPolicy, SubRequester, Verifier};
pub use verifiers::common::block_signature_message;
pub use verifiers::VerifierRegistry;

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
