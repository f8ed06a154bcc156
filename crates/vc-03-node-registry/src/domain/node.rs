//! # Node Entities
//!
//! A [`Node`] is persistent reputation state, mutated on every request
//! outcome and only ever replaced wholesale by a nodelist refresh. A
//! [`NodeWeight`] is the per-request snapshot used for ranking.

use crate::domain::errors::RegistryError;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use vc_01_byte_codec::{Address, Hash, U256};

/// Unix timestamp in seconds.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct Timestamp(u64);

impl Timestamp {
    /// Create from seconds since the epoch.
    pub fn new(secs: u64) -> Self {
        Self(secs)
    }

    /// Seconds since the epoch.
    pub fn as_secs(&self) -> u64 {
        self.0
    }

    /// `self + secs`, saturating.
    pub fn add_secs(&self, secs: u64) -> Self {
        Self(self.0.saturating_add(secs))
    }

    /// Seconds elapsed since `earlier` (0 if `earlier` is in the future).
    pub fn secs_since(&self, earlier: Timestamp) -> u64 {
        self.0.saturating_sub(earlier.0)
    }
}

/// Capability bits advertised in a node's `props`.
pub mod props {
    /// Delivers proofs.
    pub const PROOF: u64 = 0x01;
    /// Serves more than one chain.
    pub const MULTICHAIN: u64 = 0x02;
    /// Archive node (historical state).
    pub const ARCHIVE: u64 = 0x04;
    /// Plain http (no TLS).
    pub const HTTP: u64 = 0x08;
    /// Accepts the compact binary format.
    pub const BINARY: u64 = 0x10;
    /// Reachable as an onion service.
    pub const ONION: u64 = 0x20;
    /// Signs block hashes.
    pub const SIGNER: u64 = 0x40;
    /// Serves data requests.
    pub const DATA: u64 = 0x80;
}

/// Reputation status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NodeStatus {
    /// Eligible for selection.
    Active,
    /// Excluded from selection until the timestamp.
    Blacklisted {
        /// End of the blacklist window
        until: Timestamp,
    },
}

/// A server node known to the registry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    /// Endpoint url
    pub url: String,
    /// Signer address registered on chain (zero if none)
    pub address: Address,
    /// Chain served
    pub chain_id: u64,
    /// Stated deposit
    pub deposit: U256,
    /// Registration time (unix seconds)
    pub registered_at: u64,
    /// Capability bits, see [`props`]
    pub props: u64,
    /// Base weight, 1.0 for a fresh node
    pub weight: f64,
    /// Reputation status
    pub status: NodeStatus,
    /// Failures since the last success
    pub consecutive_failures: u32,
    /// Verification failures since the last success
    pub consecutive_verification_failures: u32,
    /// Moving average of response time, `None` before the first success
    pub avg_response_ms: Option<f64>,
    /// Time of the most recent failure
    pub last_failure: Option<Timestamp>,
    /// Requests attributed to this node
    pub request_count: u64,
    /// Successful requests
    pub success_count: u64,
}

impl Node {
    /// Fresh active node with default weight.
    pub fn new(url: impl Into<String>, address: Address, chain_id: u64) -> Self {
        Self {
            url: url.into(),
            address,
            chain_id,
            deposit: U256::zero(),
            registered_at: 0,
            props: props::PROOF | props::DATA,
            weight: 1.0,
            status: NodeStatus::Active,
            consecutive_failures: 0,
            consecutive_verification_failures: 0,
            avg_response_ms: None,
            last_failure: None,
            request_count: 0,
            success_count: 0,
        }
    }

    /// A node can sign block hashes only with a registered address.
    pub fn can_sign(&self) -> bool {
        self.address != [0u8; 20]
    }

    /// `true` if the node is not blacklisted.
    pub fn is_active(&self) -> bool {
        matches!(self.status, NodeStatus::Active)
    }

    /// Carry reputation over from a previous entry for the same node.
    pub(crate) fn inherit_reputation(&mut self, previous: &Node) {
        self.weight = previous.weight;
        self.status = previous.status;
        self.consecutive_failures = previous.consecutive_failures;
        self.consecutive_verification_failures = previous.consecutive_verification_failures;
        self.avg_response_ms = previous.avg_response_ms;
        self.last_failure = previous.last_failure;
        self.request_count = previous.request_count;
        self.success_count = previous.success_count;
    }
}

/// Result of one node's participation in a request.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Outcome {
    /// Verified response.
    Success {
        /// Round-trip time in milliseconds
        response_ms: u64,
    },
    /// Timeout or connection error.
    TransportFailure,
    /// Structurally invalid response.
    Malformed,
    /// Proof, signature or hash mismatch.
    VerificationFailed,
}

impl Outcome {
    /// Short label for logs.
    pub fn label(&self) -> &'static str {
        match self {
            Outcome::Success { .. } => "success",
            Outcome::TransportFailure => "transport",
            Outcome::Malformed => "malformed",
            Outcome::VerificationFailed => "verification",
        }
    }

    /// `true` for every outcome except success.
    pub fn is_failure(&self) -> bool {
        !matches!(self, Outcome::Success { .. })
    }
}

/// Nodelist of one chain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Nodelist {
    /// Chain id
    pub chain_id: u64,
    /// Block at which the list was read from the registry contract
    pub last_block: u64,
    /// Registry contract address
    pub contract: Option<Address>,
    /// Registry id
    pub registry_id: Option<Hash>,
    /// Nodes, in registry order
    pub nodes: Vec<Node>,
}

impl Nodelist {
    /// Nodelist without registry metadata (bootstrap from config).
    pub fn new(chain_id: u64, nodes: Vec<Node>) -> Self {
        Self {
            chain_id,
            last_block: 0,
            contract: None,
            registry_id: None,
            nodes,
        }
    }

    /// Non-empty, unique urls, every node serves this chain.
    pub fn validate(&self) -> Result<(), RegistryError> {
        if self.nodes.is_empty() {
            return Err(RegistryError::EmptyNodelist(self.chain_id));
        }
        let mut seen = HashSet::with_capacity(self.nodes.len());
        for node in &self.nodes {
            if !seen.insert(node.url.as_str()) {
                return Err(RegistryError::DuplicateNode(node.url.clone()));
            }
            if node.chain_id != self.chain_id {
                return Err(RegistryError::ChainMismatch {
                    url: node.url.clone(),
                    expected: self.chain_id,
                    found: node.chain_id,
                });
            }
        }
        Ok(())
    }
}

/// Ranking snapshot of a node for one request.
#[derive(Debug, Clone, PartialEq)]
pub struct NodeWeight {
    /// Node url
    pub url: String,
    /// Node signer address
    pub address: Address,
    /// Base weight at snapshot time
    pub base_weight: f64,
    /// Response-time factor in (0, 1]
    pub response_factor: f64,
    /// Recent-failure factor in (0, 1]
    pub recency_factor: f64,
    /// `base_weight * response_factor * recency_factor`
    pub score: f64,
    /// Position in the nodelist (tie breaker)
    pub index: usize,
}
