//! # Application Layer
//!
//! [`NodeRegistry`] owns the per-chain nodelists; [`RegistryHandle`] shares
//! one registry between request contexts.

pub mod registry;

pub use registry::{NodeRegistry, RegistryHandle};
