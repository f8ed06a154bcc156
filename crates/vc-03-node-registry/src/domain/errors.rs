//! # Domain Errors

use crate::config::ConfigError;
use thiserror::Error;
use vc_02_token_model::TokenError;

/// Node registry errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RegistryError {
    /// No nodelist registered for the chain.
    #[error("Unknown chain: {0}")]
    UnknownChain(u64),

    /// Url not present in the chain's nodelist.
    #[error("Unknown node {url} on chain {chain_id}")]
    UnknownNode {
        /// Chain id
        chain_id: u64,
        /// Node url
        url: String,
    },

    /// Nodelist contains no nodes.
    #[error("Empty nodelist for chain {0}")]
    EmptyNodelist(u64),

    /// Two entries share a url.
    #[error("Duplicate node url: {0}")]
    DuplicateNode(String),

    /// Node does not serve the nodelist's chain.
    #[error("Node {url} serves chain {found}, expected {expected}")]
    ChainMismatch {
        /// Node url
        url: String,
        /// Chain of the nodelist
        expected: u64,
        /// Chain the node claims
        found: u64,
    },

    /// Refresh is older than the registered nodelist.
    #[error("Stale nodelist: current block {current}, offered {offered}")]
    StaleNodelist {
        /// Block of the registered nodelist
        current: u64,
        /// Block of the offered nodelist
        offered: u64,
    },

    /// Structurally invalid `in3_nodeList` result.
    #[error("Invalid nodelist: {0}")]
    InvalidNodelist(String),

    /// Token access failed while decoding a nodelist.
    #[error(transparent)]
    Token(#[from] TokenError),

    /// Snapshot blob could not be encoded or decoded.
    #[error("Snapshot error: {0}")]
    Snapshot(String),

    /// Invalid registry configuration.
    #[error(transparent)]
    Config(#[from] ConfigError),
}
