//! # VC-06 Request Context
//!
//! Verified JSON-RPC requests against a pool of untrusted nodes.
//!
//! **Component ID:** 06
//! **Architecture:** Hexagonal (domain / ports / adapters / application)
//!
//! ## Request Lifecycle
//!
//! | State | Work |
//! |-------|------|
//! | `Building` | validate chain, params and policy; answer from cache |
//! | `Dispatching` | select data and signer nodes, serialize the envelope |
//! | `AwaitingResponses` | one transport call for the whole round |
//! | `Verifying` | first response that parses and verifies wins |
//! | `Retrying` | next round avoids the nodes that just failed |
//! | `Succeeded` / `Failed` | terminal |
//!
//! Every round's outcomes are recorded in the node registry before the next
//! transition. After `max_attempts` rounds the most specific failure is
//! returned inside [`RequestError::ExhaustedAttempts`].
//!
//! ## Module Structure
//!
//! ```text
//! vc-06-request-context/
//! ├── domain/          # RequestState, NodeAttempt, Fingerprint, errors
//! ├── ports/           # Transport, Cache, Signer
//! ├── adapters/        # MemoryCache, LocalKeySigner
//! ├── application/     # LightClient, RequestContext, filters, transactions
//! ├── config.rs        # ClientConfig, RequestPolicy, LoggingConfig
//! └── telemetry.rs     # tracing subscriber setup
//! ```
//!
//! ## Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use vc_06_request_context::{ClientConfig, LightClient, MemoryCache};
//!
//! let config = ClientConfig::from_toml_str(&std::fs::read_to_string("client.toml")?)?;
//! let client = LightClient::builder(config)
//!     .transport(Arc::new(my_http_transport))
//!     .cache(Arc::new(MemoryCache::default()))
//!     .build()?;
//! let balance = client.send(1, "eth_getBalance", r#"["0x...", "0x10"]"#)?;
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod adapters;
pub mod application;
pub mod config;
pub mod domain;
pub mod ports;
pub mod telemetry;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use adapters::{LocalKeySigner, MemoryCache};
pub use application::{
    Engine, FilterKind, FilterManager, FilterState, LightClient, LightClientBuilder,
    RequestContext, TransactionRequest, MAX_NESTING_DEPTH,
};
pub use config::{ClientConfig, ConfigError, LoggingConfig, RequestPolicy, MAX_REQUEST_COUNT};
pub use domain::{
    AttemptStatus, Fingerprint, NodeAttempt, ProofLevel, RequestError, RequestState, SignerError,
    TransportError,
};
pub use ports::{Cache, Signer, Transport};
pub use telemetry::{init_tracing, TelemetryError};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
