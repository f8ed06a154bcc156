//! # Ports
//!
//! Outbound dependencies of the registry.

pub mod outbound;

pub use outbound::TimeSource;
