//! # Application Layer
//!
//! [`LightClient`] is the public facade. Each call drives one
//! [`RequestContext`] against the shared [`Engine`]; filters and outgoing
//! transactions are built from verified requests.

pub mod client;
pub mod context;
pub mod engine;
pub mod envelope;
pub mod filters;
pub mod transaction;

pub use client::{LightClient, LightClientBuilder};
pub use context::{RequestContext, MAX_NESTING_DEPTH};
pub use engine::Engine;
pub use envelope::{build_envelope, PROTOCOL_VERSION};
pub use filters::{FilterKind, FilterManager, FilterState, MAX_BLOCKS_PER_POLL};
pub use transaction::{TransactionRequest, DEFAULT_GAS_LIMIT};
