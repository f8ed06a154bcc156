//! # Ports
//!
//! - [`Verifier`]: one proof strategy for a set of methods
//! - [`SubRequester`]: nested verified requests issued by a verifier

pub mod inbound;
pub mod outbound;

pub use inbound::{ProofContext, ProofPolicy, Verifier};
pub use outbound::SubRequester;
