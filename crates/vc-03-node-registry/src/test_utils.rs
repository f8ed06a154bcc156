//! Test utilities for the node registry.
//!
//! Deterministic time sources. Enable with the `test-utils` feature flag.
//!
//! # Example
//!
//! ```rust,ignore
//! use vc_03_node_registry::test_utils::ManualTimeSource;
//! use vc_03_node_registry::TimeSource;
//!
//! let clock = ManualTimeSource::new(1000);
//! clock.advance(60);
//! assert_eq!(clock.now().as_secs(), 1060);
//! ```

use crate::domain::Timestamp;
use crate::ports::TimeSource;
use std::sync::atomic::{AtomicU64, Ordering};

/// A time source that returns a fixed timestamp.
#[derive(Debug, Clone)]
pub struct FixedTimeSource {
    timestamp: u64,
}

impl FixedTimeSource {
    /// Create a new fixed time source with the given timestamp (in seconds).
    pub fn new(timestamp: u64) -> Self {
        Self { timestamp }
    }
}

impl TimeSource for FixedTimeSource {
    fn now(&self) -> Timestamp {
        Timestamp::new(self.timestamp)
    }
}

/// A time source advanced explicitly by the test.
#[derive(Debug, Default)]
pub struct ManualTimeSource {
    secs: AtomicU64,
}

impl ManualTimeSource {
    /// Start at `secs`.
    pub fn new(secs: u64) -> Self {
        Self {
            secs: AtomicU64::new(secs),
        }
    }

    /// Move the clock forward.
    pub fn advance(&self, secs: u64) {
        self.secs.fetch_add(secs, Ordering::SeqCst);
    }

    /// Jump to an absolute time.
    pub fn set(&self, secs: u64) {
        self.secs.store(secs, Ordering::SeqCst);
    }
}

impl TimeSource for ManualTimeSource {
    fn now(&self) -> Timestamp {
        Timestamp::new(self.secs.load(Ordering::SeqCst))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixed_time_source_returns_configured_value() {
        assert_eq!(FixedTimeSource::new(1000).now().as_secs(), 1000);
    }

    #[test]
    fn test_manual_time_source_advances() {
        let clock = ManualTimeSource::new(10);
        clock.advance(5);
        assert_eq!(clock.now().as_secs(), 15);
        clock.set(3);
        assert_eq!(clock.now().as_secs(), 3);
    }
}
