//! # Request Lifecycle Types

use serde::{Deserialize, Serialize};
use std::fmt;

/// How much proof the nodes are asked for.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProofLevel {
    /// No proof; responses are accepted unverified and never cached.
    None,
    /// Proof of the requested data.
    #[default]
    Standard,
    /// Proof including every optional part (full receipts, code).
    Full,
}

impl ProofLevel {
    /// Value of `in3.verification`.
    pub fn verification(self, signature_count: usize) -> &'static str {
        match self {
            ProofLevel::None => "never",
            _ if signature_count > 0 => "proofWithSignature",
            _ => "proof",
        }
    }
}

/// State of a request context.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestState {
    /// Payload not yet dispatched.
    Building,
    /// Selecting nodes for a round.
    Dispatching {
        /// Round number, starting at 1
        attempt: u32,
    },
    /// Transport call in flight.
    AwaitingResponses,
    /// Checking the responses of the current round.
    Verifying,
    /// A response verified (or came from the cache).
    Succeeded,
    /// The round produced no verified response; another one follows.
    Retrying,
    /// Terminal failure.
    Failed,
}

impl RequestState {
    /// `true` for `Succeeded` and `Failed`.
    pub fn is_terminal(&self) -> bool {
        matches!(self, RequestState::Succeeded | RequestState::Failed)
    }
}

impl fmt::Display for RequestState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RequestState::Building => f.write_str("building"),
            RequestState::Dispatching { attempt } => write!(f, "dispatching#{attempt}"),
            RequestState::AwaitingResponses => f.write_str("awaiting"),
            RequestState::Verifying => f.write_str("verifying"),
            RequestState::Succeeded => f.write_str("succeeded"),
            RequestState::Retrying => f.write_str("retrying"),
            RequestState::Failed => f.write_str("failed"),
        }
    }
}

/// What happened to one node in one round.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttemptStatus {
    /// Request handed to the transport.
    Pending,
    /// Timeout, connection error or missing result.
    TransportFailed,
    /// Unparseable envelope, id mismatch or RPC error.
    Malformed,
    /// Parsed but failed verification.
    Rejected,
    /// Parsed and verified.
    Verified,
    /// Parsed but not examined because an earlier response verified.
    Skipped,
}

/// Per-node request state of a context.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeAttempt {
    /// Node url
    pub url: String,
    /// Round the node took part in
    pub round: u32,
    /// Result for this node
    pub status: AttemptStatus,
    /// Round-trip time of the transport call, ms
    pub elapsed_ms: u64,
}

impl NodeAttempt {
    pub(crate) fn pending(url: impl Into<String>, round: u32) -> Self {
        Self {
            url: url.into(),
            round,
            status: AttemptStatus::Pending,
            elapsed_ms: 0,
        }
    }

    /// `true` when the node failed in any way.
    pub fn failed(&self) -> bool {
        matches!(
            self.status,
            AttemptStatus::TransportFailed | AttemptStatus::Malformed | AttemptStatus::Rejected
        )
    }
}
