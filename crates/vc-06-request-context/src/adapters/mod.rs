//! # Adapters
//!
//! - [`MemoryCache`]: bounded in-process [`Cache`](crate::ports::Cache)
//! - [`LocalKeySigner`]: secp256k1 key held in memory

pub mod local_signer;
pub mod memory_cache;

pub use local_signer::LocalKeySigner;
pub use memory_cache::MemoryCache;
