//! Shared state of a client, borrowed by every request context.

use crate::config::{ConfigError, RequestPolicy};
use crate::ports::{Cache, Transport};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use vc_03_node_registry::{RegistryHandle, TimeSource};
use vc_05_proof_verifier::{ChainSpec, VerifierRegistry};

/// Everything a [`RequestContext`](super::RequestContext) needs from its
/// client.
pub struct Engine {
    pub(crate) policy: RequestPolicy,
    pub(crate) chains: HashMap<u64, ChainSpec>,
    pub(crate) registry: RegistryHandle,
    pub(crate) verifiers: VerifierRegistry,
    pub(crate) transport: Arc<dyn Transport>,
    pub(crate) cache: Option<Arc<dyn Cache>>,
    pub(crate) clock: Arc<dyn TimeSource>,
    next_id: AtomicU64,
}

impl Engine {
    pub(crate) fn new(
        policy: RequestPolicy,
        chains: HashMap<u64, ChainSpec>,
        registry: RegistryHandle,
        verifiers: VerifierRegistry,
        transport: Arc<dyn Transport>,
        cache: Option<Arc<dyn Cache>>,
        clock: Arc<dyn TimeSource>,
    ) -> Self {
        Self {
            policy,
            chains,
            registry,
            verifiers,
            transport,
            cache,
            clock,
            next_id: AtomicU64::new(1),
        }
    }

    /// Default request policy.
    pub fn policy(&self) -> &RequestPolicy {
        &self.policy
    }

    /// Runtime state of a configured chain.
    pub fn chain(&self, chain_id: u64) -> Result<&ChainSpec, ConfigError> {
        self.chains
            .get(&chain_id)
            .ok_or(ConfigError::UnknownChain(chain_id))
    }

    /// Shared node registry.
    pub fn registry(&self) -> &RegistryHandle {
        &self.registry
    }

    pub(crate) fn next_request_id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut chains: Vec<u64> = self.chains.keys().copied().collect();
        chains.sort_unstable();
        f.debug_struct("Engine")
            .field("policy", &self.policy)
            .field("chains", &chains)
            .field("cache", &self.cache.is_some())
            .finish_non_exhaustive()
    }
}
