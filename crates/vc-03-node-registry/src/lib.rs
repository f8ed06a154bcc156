//! # VC-03 Node Registry
//!
//! Per-chain server nodes with reputation state.
//!
//! **Component ID:** 03
//! **Architecture:** Hexagonal (domain / algorithms / ports / adapters)
//!
//! ## Reputation
//!
//! | Outcome | Effect |
//! |---------|--------|
//! | Success | `weight *= success_reward`, failures reset, latency averaged |
//! | Transport failure | `weight *= transport_penalty` |
//! | Malformed response | `weight *= malformed_penalty` |
//! | Verification failure | `weight *= verification_penalty` (harshest) |
//!
//! `failure_threshold` consecutive failures (or
//! `verification_blacklist_threshold` verification failures) blacklist the
//! node for `blacklist_window_secs`. Expiry returns it to `Active` with
//! `weight *= rehabilitation_discount`.
//!
//! ## Module Structure
//!
//! ```text
//! vc-03-node-registry/
//! ├── domain/          # Node, Nodelist, NodeWeight, Outcome, errors
//! ├── algorithms/      # scoring, deterministic selection
//! ├── ports/           # TimeSource
//! ├── adapters/        # system clock, in3_nodeList decoding, snapshots
//! ├── application/     # NodeRegistry, RegistryHandle
//! └── config.rs        # RegistryConfig
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod adapters;
pub mod algorithms;
pub mod application;
pub mod config;
pub mod domain;
pub mod ports;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use adapters::{parse_nodelist, snapshot_key, SystemTimeSource};
pub use application::{NodeRegistry, RegistryHandle};
pub use config::{ConfigError, RegistryConfig};
pub use domain::{props, Node, NodeStatus, NodeWeight, Nodelist, Outcome, RegistryError, Timestamp};
pub use ports::TimeSource;

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    #[test]
    fn test_version() {
        assert!(!super::VERSION.is_empty());
    }
}
