//! # Nodelist Snapshots
//!
//! A snapshot is the chain's [`Nodelist`] (reputation included) as a JSON
//! blob, stored by the caller's cache under [`snapshot_key`].

use crate::domain::{Nodelist, RegistryError};

/// Cache key of a chain's nodelist snapshot.
pub fn snapshot_key(chain_id: u64) -> String {
    format!("nodelist_{chain_id}")
}

/// Encode a nodelist as a snapshot blob.
pub fn encode_snapshot(list: &Nodelist) -> Result<Vec<u8>, RegistryError> {
    serde_json::to_vec(list).map_err(|e| RegistryError::Snapshot(e.to_string()))
}

/// Decode and validate a snapshot blob.
pub fn decode_snapshot(bytes: &[u8]) -> Result<Nodelist, RegistryError> {
    let list: Nodelist =
        serde_json::from_slice(bytes).map_err(|e| RegistryError::Snapshot(e.to_string()))?;
    list.validate()?;
    Ok(list)
}
