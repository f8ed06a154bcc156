//! # Domain Layer
//!
//! Nodes, weights, outcomes and registry errors.

pub mod errors;
pub mod node;

pub use errors::RegistryError;
pub use node::{props, Node, NodeStatus, NodeWeight, Nodelist, Outcome, Timestamp};
