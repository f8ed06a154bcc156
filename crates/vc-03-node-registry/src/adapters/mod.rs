//! # Adapters
//!
//! - `system_time`: wall-clock [`TimeSource`](crate::ports::TimeSource)
//! - `nodelist`: `in3_nodeList` result decoding
//! - `snapshot`: JSON persistence of a chain's nodelist

pub mod nodelist;
pub mod snapshot;
pub mod system_time;

pub use nodelist::parse_nodelist;
pub use snapshot::{decode_snapshot, encode_snapshot, snapshot_key};
pub use system_time::SystemTimeSource;
