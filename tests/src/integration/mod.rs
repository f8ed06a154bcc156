//! # Integration Tests
//!
//! Each module wires real crates together; only the transport is scripted.

pub mod btc_flow;
pub mod filter_flow;
pub mod node_selection;
pub mod request_flow;
pub mod transaction_flow;
