//! # Outbound Ports

use crate::domain::Timestamp;

/// Clock used for blacklist windows and recency.
pub trait TimeSource: Send + Sync {
    /// Current time.
    fn now(&self) -> Timestamp;
}
