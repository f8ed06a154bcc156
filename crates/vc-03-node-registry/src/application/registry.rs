//! # Node Registry
//!
//! Every mutation is a small scalar update done under the handle's lock.
//! Nodelist replacement swaps the whole `Nodelist` value, so readers never
//! observe a partially applied refresh.

use crate::adapters::snapshot::{decode_snapshot, encode_snapshot};
use crate::algorithms::{apply_outcome, expire_blacklist, rank_nodes};
use crate::config::RegistryConfig;
use crate::domain::{Node, NodeWeight, Nodelist, Outcome, RegistryError, Timestamp};
use parking_lot::{Mutex, MutexGuard};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Per-chain nodelists with reputation state.
#[derive(Debug, Clone)]
pub struct NodeRegistry {
    config: RegistryConfig,
    chains: HashMap<u64, Nodelist>,
}

impl NodeRegistry {
    /// Empty registry. Fails on invalid configuration.
    pub fn new(config: RegistryConfig) -> Result<Self, RegistryError> {
        config.validate()?;
        Ok(Self {
            config,
            chains: HashMap::new(),
        })
    }

    /// Reputation configuration.
    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }

    /// Registered chain ids.
    pub fn chains(&self) -> Vec<u64> {
        let mut ids: Vec<u64> = self.chains.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    /// Nodelist of a chain.
    pub fn nodelist(&self, chain_id: u64) -> Option<&Nodelist> {
        self.chains.get(&chain_id)
    }

    /// Node by url.
    pub fn node(&self, chain_id: u64, url: &str) -> Option<&Node> {
        self.chains
            .get(&chain_id)
            .and_then(|list| list.nodes.iter().find(|n| n.url == url))
    }

    /// Register a chain, or refresh it if already known.
    pub fn register_chain(&mut self, list: Nodelist) -> Result<(), RegistryError> {
        self.replace_nodelist(list)
    }

    /// Atomically replace a chain's nodelist.
    ///
    /// Rejects a list read at an older block than the current one. Nodes
    /// whose url and address survive the refresh keep their reputation.
    pub fn replace_nodelist(&mut self, mut list: Nodelist) -> Result<(), RegistryError> {
        list.validate()?;

        if let Some(current) = self.chains.get(&list.chain_id) {
            if list.last_block < current.last_block {
                warn!(
                    "[vc-03] Rejecting stale nodelist for chain {}: {} < {}",
                    list.chain_id, list.last_block, current.last_block
                );
                return Err(RegistryError::StaleNodelist {
                    current: current.last_block,
                    offered: list.last_block,
                });
            }
            let mut carried = 0usize;
            for node in &mut list.nodes {
                if let Some(previous) = current
                    .nodes
                    .iter()
                    .find(|p| p.url == node.url && p.address == node.address)
                {
                    node.inherit_reputation(previous);
                    carried += 1;
                }
            }
            debug!(
                "[vc-03] Carried reputation of {} nodes into chain {} refresh",
                carried, list.chain_id
            );
        }

        for node in &mut list.nodes {
            node.weight = node
                .weight
                .clamp(self.config.min_weight, self.config.max_weight);
        }

        info!(
            chain_id = list.chain_id,
            nodes = list.nodes.len(),
            last_block = list.last_block,
            "[vc-03] Nodelist installed"
        );
        self.chains.insert(list.chain_id, list);
        Ok(())
    }

    fn list(&self, chain_id: u64) -> Result<&Nodelist, RegistryError> {
        self.chains
            .get(&chain_id)
            .ok_or(RegistryError::UnknownChain(chain_id))
    }

    fn list_mut(&mut self, chain_id: u64) -> Result<&mut Nodelist, RegistryError> {
        self.chains
            .get_mut(&chain_id)
            .ok_or(RegistryError::UnknownChain(chain_id))
    }

    fn expire_blacklists(&mut self, chain_id: u64, now: Timestamp) -> Result<(), RegistryError> {
        let config = self.config.clone();
        let list = self.list_mut(chain_id)?;
        for node in &mut list.nodes {
            if expire_blacklist(node, now, &config) {
                info!(
                    url = %node.url,
                    weight = node.weight,
                    "[vc-03] Node rehabilitated after blacklist"
                );
            }
        }
        Ok(())
    }

    /// Rank active nodes and return up to `count` candidates.
    ///
    /// Expired blacklists are lifted first. Urls in `exclude` are avoided
    /// unless nothing else is available.
    pub fn select_candidates(
        &mut self,
        chain_id: u64,
        count: usize,
        exclude: &[String],
        now: Timestamp,
    ) -> Result<Vec<NodeWeight>, RegistryError> {
        self.expire_blacklists(chain_id, now)?;
        let list = self.list(chain_id)?;
        Ok(rank_nodes(&list.nodes, count, exclude, now, &self.config, |_| true))
    }

    /// Like [`select_candidates`](Self::select_candidates), restricted to
    /// nodes with a registered signer address.
    pub fn select_signers(
        &mut self,
        chain_id: u64,
        count: usize,
        exclude: &[String],
        now: Timestamp,
    ) -> Result<Vec<NodeWeight>, RegistryError> {
        self.expire_blacklists(chain_id, now)?;
        let list = self.list(chain_id)?;
        let signers: Vec<NodeWeight> =
            rank_nodes(&list.nodes, usize::MAX, &[], now, &self.config, Node::can_sign)
                .into_iter()
                .filter(|w| !exclude.contains(&w.url))
                .take(count)
                .collect();
        Ok(signers)
    }

    /// Record the outcome of one node's participation in a request.
    pub fn record_outcome(
        &mut self,
        chain_id: u64,
        url: &str,
        outcome: Outcome,
        now: Timestamp,
    ) -> Result<(), RegistryError> {
        let config = self.config.clone();
        let list = self.list_mut(chain_id)?;
        let node = list
            .nodes
            .iter_mut()
            .find(|n| n.url == url)
            .ok_or_else(|| RegistryError::UnknownNode {
                chain_id,
                url: url.to_string(),
            })?;

        if apply_outcome(node, outcome, now, &config) {
            warn!(
                url = %node.url,
                outcome = outcome.label(),
                failures = node.consecutive_failures,
                "[vc-03] Node blacklisted"
            );
        } else {
            debug!(
                url = %node.url,
                outcome = outcome.label(),
                weight = node.weight,
                "[vc-03] Outcome recorded"
            );
        }
        Ok(())
    }

    /// Snapshot blob of a chain's nodelist.
    pub fn snapshot(&self, chain_id: u64) -> Result<Vec<u8>, RegistryError> {
        encode_snapshot(self.list(chain_id)?)
    }

    /// Install a snapshot blob as-is (reputation included).
    ///
    /// Returns the snapshot's chain id.
    pub fn restore(&mut self, bytes: &[u8]) -> Result<u64, RegistryError> {
        let list = decode_snapshot(bytes)?;
        if let Some(current) = self.chains.get(&list.chain_id) {
            if list.last_block < current.last_block {
                return Err(RegistryError::StaleNodelist {
                    current: current.last_block,
                    offered: list.last_block,
                });
            }
        }
        let chain_id = list.chain_id;
        info!(
            chain_id,
            nodes = list.nodes.len(),
            "[vc-03] Nodelist restored from snapshot"
        );
        self.chains.insert(chain_id, list);
        Ok(chain_id)
    }
}

/// Shared, mutex-guarded registry.
#[derive(Debug, Clone)]
pub struct RegistryHandle {
    inner: Arc<Mutex<NodeRegistry>>,
}

impl RegistryHandle {
    /// Wrap a registry.
    pub fn new(registry: NodeRegistry) -> Self {
        Self {
            inner: Arc::new(Mutex::new(registry)),
        }
    }

    /// Lock the registry.
    pub fn lock(&self) -> MutexGuard<'_, NodeRegistry> {
        self.inner.lock()
    }

    /// See [`NodeRegistry::select_candidates`].
    pub fn select_candidates(
        &self,
        chain_id: u64,
        count: usize,
        exclude: &[String],
        now: Timestamp,
    ) -> Result<Vec<NodeWeight>, RegistryError> {
        self.lock().select_candidates(chain_id, count, exclude, now)
    }

    /// See [`NodeRegistry::select_signers`].
    pub fn select_signers(
        &self,
        chain_id: u64,
        count: usize,
        exclude: &[String],
        now: Timestamp,
    ) -> Result<Vec<NodeWeight>, RegistryError> {
        self.lock().select_signers(chain_id, count, exclude, now)
    }

    /// Record a batch of outcomes under one lock.
    ///
    /// Unknown urls (removed by a concurrent refresh) are skipped.
    pub fn record_outcomes(&self, chain_id: u64, outcomes: &[(String, Outcome)], now: Timestamp) {
        let mut registry = self.lock();
        for (url, outcome) in outcomes {
            if let Err(e) = registry.record_outcome(chain_id, url, *outcome, now) {
                debug!("[vc-03] Outcome for {} dropped: {}", url, e);
            }
        }
    }

    /// See [`NodeRegistry::replace_nodelist`].
    pub fn replace_nodelist(&self, list: Nodelist) -> Result<(), RegistryError> {
        self.lock().replace_nodelist(list)
    }
}
