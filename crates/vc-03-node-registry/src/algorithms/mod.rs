//! # Algorithms
//!
//! - `scoring`: weight updates per outcome and ranking factors
//! - `selection`: deterministic candidate ranking

pub mod scoring;
pub mod selection;

pub use scoring::{apply_outcome, expire_blacklist, recency_factor, response_factor, weigh};
pub use selection::rank_nodes;
