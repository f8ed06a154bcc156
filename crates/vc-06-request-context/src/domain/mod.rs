//! Domain layer: request lifecycle types, fingerprints and errors.

pub mod errors;
pub mod fingerprint;
pub mod request;

pub use errors::{RequestError, SignerError, TransportError};
pub use fingerprint::{is_cacheable, Fingerprint};
pub use request::{AttemptStatus, NodeAttempt, ProofLevel, RequestState};
