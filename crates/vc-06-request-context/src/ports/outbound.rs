//! # Outbound Ports

use crate::domain::{SignerError, TransportError};

/// Sends one payload to several nodes.
///
/// Returns one result per url, in the order of `urls`. Timeouts are the
/// transport's business and surface as [`TransportError::Timeout`].
pub trait Transport: Send + Sync {
    /// POST `payload` to every url.
    fn send(&self, urls: &[String], payload: &[u8]) -> Vec<Result<Vec<u8>, TransportError>>;
}

/// Key/value store for verified data.
pub trait Cache: Send + Sync {
    /// Stored value, if any.
    fn get(&self, key: &str) -> Option<Vec<u8>>;

    /// Store a value, replacing any previous one.
    fn set(&self, key: &str, value: Vec<u8>);
}

/// Produces `r ‖ s ‖ v` signatures over 32-byte hashes.
pub trait Signer: Send + Sync {
    /// Sign `message` with the key of `account_hint` (an address, or empty
    /// for the signer's default account).
    fn sign(&self, message: &[u8], account_hint: &[u8]) -> Result<[u8; 65], SignerError>;
}
