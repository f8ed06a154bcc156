//! # Ports
//!
//! Collaborators supplied by the embedding application:
//! - [`Transport`]: the only I/O boundary
//! - [`Cache`]: verified results and nodelist snapshots
//! - [`Signer`]: signatures for outgoing transactions

pub mod outbound;

pub use outbound::{Cache, Signer, Transport};
