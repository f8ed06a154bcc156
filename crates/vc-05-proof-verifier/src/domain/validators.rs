//! # Validator History
//!
//! Validator sets of a proof-of-authority chain over time. The history
//! stores the initial set and one diff per transition; every
//! [`SNAPSHOT_INTERVAL`] diffs a full set is materialized so lookups replay
//! a bounded number of diffs.

use crate::domain::errors::VerificationError;
use vc_01_byte_codec::Address;

/// Diffs between materialized snapshots.
pub const SNAPSHOT_INTERVAL: usize = 16;

/// One validator set transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatorDiff {
    /// First block the new set is active at
    pub block: u64,
    /// Validators joining
    pub added: Vec<Address>,
    /// Validators leaving
    pub removed: Vec<Address>,
}

#[derive(Debug, Clone)]
struct Snapshot {
    /// Number of diffs folded into `validators`
    applied: usize,
    validators: Vec<Address>,
}

/// Diff-based validator history.
#[derive(Debug, Clone)]
pub struct ValidatorHistory {
    start_block: u64,
    diffs: Vec<ValidatorDiff>,
    snapshots: Vec<Snapshot>,
    current: Vec<Address>,
}

impl ValidatorHistory {
    /// History whose first set is `initial`, active from `start_block`.
    pub fn new(start_block: u64, initial: Vec<Address>) -> Self {
        let initial = sorted(initial);
        Self {
            start_block,
            diffs: Vec::new(),
            snapshots: vec![Snapshot {
                applied: 0,
                validators: initial.clone(),
            }],
            current: initial,
        }
    }

    /// Block the history starts at.
    pub fn start_block(&self) -> u64 {
        self.start_block
    }

    /// Block of the latest recorded transition (or the start block).
    pub fn last_block(&self) -> u64 {
        self.diffs.last().map_or(self.start_block, |d| d.block)
    }

    /// Recorded transitions.
    pub fn diffs(&self) -> &[ValidatorDiff] {
        &self.diffs
    }

    /// Latest validator set.
    pub fn current(&self) -> &[Address] {
        &self.current
    }

    /// Record that `validators` is the active set from `block` on.
    ///
    /// Re-applying the set already active is a no-op. A block older than
    /// the last transition is rejected.
    pub fn apply(&mut self, block: u64, validators: Vec<Address>) -> Result<(), VerificationError> {
        let validators = sorted(validators);
        let last = self.last_block();
        if block < last {
            if self.validators_at(block) == validators {
                return Ok(());
            }
            return Err(VerificationError::ValidatorHistoryOrder {
                last,
                offered: block,
            });
        }
        if validators == self.current {
            return Ok(());
        }
        if block == last && !self.diffs.is_empty() {
            return Err(VerificationError::ValidatorHistoryOrder {
                last,
                offered: block,
            });
        }

        let added: Vec<Address> = validators
            .iter()
            .filter(|v| !self.current.contains(v))
            .copied()
            .collect();
        let removed: Vec<Address> = self
            .current
            .iter()
            .filter(|v| !validators.contains(v))
            .copied()
            .collect();
        self.diffs.push(ValidatorDiff {
            block,
            added,
            removed,
        });
        self.current = validators;

        if self.diffs.len() % SNAPSHOT_INTERVAL == 0 {
            self.snapshots.push(Snapshot {
                applied: self.diffs.len(),
                validators: self.current.clone(),
            });
        }
        Ok(())
    }

    /// Validator set active at `block`.
    ///
    /// Blocks before the start block resolve to the initial set.
    pub fn validators_at(&self, block: u64) -> Vec<Address> {
        let applied = self.diffs.partition_point(|d| d.block <= block);
        let snapshot_index = self
            .snapshots
            .partition_point(|s| s.applied <= applied)
            .saturating_sub(1);
        let snapshot = &self.snapshots[snapshot_index];

        let mut set = snapshot.validators.clone();
        for diff in &self.diffs[snapshot.applied..applied] {
            set.retain(|v| !diff.removed.contains(v));
            set.extend(diff.added.iter().copied());
        }
        sorted(set)
    }

    /// Whether `address` is a validator at `block`.
    pub fn contains(&self, block: u64, address: &Address) -> bool {
        self.validators_at(block).contains(address)
    }
}

fn sorted(mut set: Vec<Address>) -> Vec<Address> {
    set.sort_unstable();
    set.dedup();
    set
}
