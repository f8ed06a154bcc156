//! # Request Errors
//!
//! Callers only ever see one [`RequestError`] per failed request. Per-node
//! failures accumulate inside the context and the most specific one becomes
//! the `cause` of [`RequestError::ExhaustedAttempts`].

use crate::config::ConfigError;
use thiserror::Error;
use vc_03_node_registry::RegistryError;
use vc_05_proof_verifier::VerificationError;

/// Failure of the transport for one url.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TransportError {
    /// Connection refused, reset or unreachable.
    #[error("Connection to {url} failed: {reason}")]
    Connection {
        /// Node url
        url: String,
        /// Transport message
        reason: String,
    },

    /// No response before the transport's deadline.
    #[error("Request to {url} timed out")]
    Timeout {
        /// Node url
        url: String,
    },

    /// Non-success HTTP status.
    #[error("Node {url} answered with HTTP status {status}")]
    Http {
        /// Node url
        url: String,
        /// Status code
        status: u16,
    },

    /// The transport returned fewer results than urls.
    #[error("No response slot for {url}")]
    MissingResponse {
        /// Node url
        url: String,
    },

    /// Every node of the chain is blacklisted.
    #[error("No candidate nodes available for chain {chain_id}")]
    NoCandidates {
        /// Chain id
        chain_id: u64,
    },
}

/// Failure of the signer collaborator.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SignerError {
    /// No signer was configured.
    #[error("No signer configured")]
    Unavailable,

    /// The signer holds no key for the requested account.
    #[error("Unknown account {0}")]
    UnknownAccount(String),

    /// The message is not a 32-byte hash.
    #[error("Invalid message to sign: {0}")]
    InvalidMessage(String),

    /// The key rejected the operation.
    #[error("Signing failed: {0}")]
    Signing(String),
}

/// Final error of a request.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum RequestError {
    /// Connection or timeout.
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    /// Structurally invalid response.
    #[error("Malformed response from {url}: {reason}")]
    Malformed {
        /// Responding node
        url: String,
        /// What was wrong
        reason: String,
    },

    /// The response failed its proof.
    #[error("Verification failed for response from {url}: {source}")]
    Verification {
        /// Responding node
        url: String,
        /// Verifier error
        #[source]
        source: VerificationError,
    },

    /// Invalid chain, parameters or configuration. Never consumes an attempt.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Every attempt failed.
    #[error("{method} failed after {attempts} attempts (last node {}): {cause}", .last_node.as_deref().unwrap_or("none"))]
    ExhaustedAttempts {
        /// JSON-RPC method
        method: String,
        /// Dispatch rounds made
        attempts: u32,
        /// Last node that was asked
        last_node: Option<String>,
        /// Most specific recorded failure
        cause: Box<RequestError>,
    },

    /// The signer could not produce a signature.
    #[error(transparent)]
    Signer(#[from] SignerError),

    /// The node answered with a JSON-RPC error object.
    #[error("Node {url} returned RPC error {code}: {message}")]
    Rpc {
        /// Responding node
        url: String,
        /// JSON-RPC error code
        code: i64,
        /// JSON-RPC error message
        message: String,
    },

    /// A verified result does not have the shape the caller needs.
    #[error("Unexpected {method} result: {reason}")]
    UnexpectedResult {
        /// JSON-RPC method
        method: String,
        /// What was wrong
        reason: String,
    },

    /// A verified nodelist could not be installed.
    #[error(transparent)]
    Registry(#[from] RegistryError),
}

impl RequestError {
    /// Rank used to keep the most diagnostic per-node failure.
    pub fn specificity(&self) -> u8 {
        match self {
            RequestError::Verification { .. } => 4,
            RequestError::Rpc { .. } => 3,
            RequestError::Malformed { .. } => 2,
            RequestError::Transport(_) => 1,
            _ => 0,
        }
    }

    /// The underlying failure of an exhausted request, or `self`.
    pub fn root_cause(&self) -> &RequestError {
        match self {
            RequestError::ExhaustedAttempts { cause, .. } => cause.root_cause(),
            other => other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verification_outranks_transport() {
        let verification = RequestError::Verification {
            url: "https://a".into(),
            source: VerificationError::InsufficientWork,
        };
        let transport = RequestError::Transport(TransportError::Timeout {
            url: "https://b".into(),
        });
        assert!(verification.specificity() > transport.specificity());
    }

    #[test]
    fn test_exhausted_message_names_method_and_node() {
        let err = RequestError::ExhaustedAttempts {
            method: "eth_getBalance".into(),
            attempts: 3,
            last_node: Some("https://c".into()),
            cause: Box::new(RequestError::Transport(TransportError::Timeout {
                url: "https://c".into(),
            })),
        };
        let text = err.to_string();
        assert!(text.contains("eth_getBalance"));
        assert!(text.contains("3 attempts"));
        assert!(text.contains("https://c"));
        assert!(matches!(err.root_cause(), RequestError::Transport(_)));
    }
}
