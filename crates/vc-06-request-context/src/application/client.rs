//! # Light Client
//!
//! Facade over the request engine. Built once from a [`ClientConfig`] and
//! shared between threads; every call runs its own [`RequestContext`].

use crate::application::context::RequestContext;
use crate::application::engine::Engine;
use crate::application::filters::{is_filter_method, FilterManager};
use crate::config::{ClientConfig, ConfigError, RequestPolicy};
use crate::domain::{AttemptStatus, RequestError};
use crate::ports::{Cache, Signer, Transport};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, warn};
use vc_02_token_model::{Document, DocumentBuilder};
use vc_03_node_registry::adapters::decode_snapshot;
use vc_03_node_registry::{
    parse_nodelist, snapshot_key, Node, NodeRegistry, Nodelist, RegistryHandle, SystemTimeSource,
    TimeSource,
};
use vc_05_proof_verifier::{ChainConfig, ChainSpec, VerificationError, VerifierRegistry};

/// Verified JSON-RPC client.
pub struct LightClient {
    pub(crate) engine: Engine,
    pub(crate) signer: Option<Arc<dyn Signer>>,
    pub(crate) filters: FilterManager,
}

impl LightClient {
    /// Start building a client from `config`.
    pub fn builder(config: ClientConfig) -> LightClientBuilder {
        LightClientBuilder::new(config)
    }

    /// Request engine shared by every context of this client.
    pub fn engine(&self) -> &Engine {
        &self.engine
    }

    /// Installed filters.
    pub fn filters(&self) -> &FilterManager {
        &self.filters
    }

    /// A fresh request context with the client's default policy.
    pub fn context(&self, chain_id: u64, method: &str, params: Document) -> RequestContext<'_> {
        RequestContext::new(&self.engine, chain_id, method, params)
    }

    /// Send `method(params_json)` on `chain_id` and return the verified
    /// result as JSON.
    ///
    /// Filter methods are answered by the local filter table.
    pub fn send(&self, chain_id: u64, method: &str, params_json: &str) -> Result<String, RequestError> {
        let params = parse_params(params_json)?;
        let result = if is_filter_method(method) {
            self.handle_filter(chain_id, method, &params)?
        } else {
            self.send_document(chain_id, method, params)?
        };
        result
            .to_json_string()
            .map_err(|e| RequestError::UnexpectedResult {
                method: method.to_string(),
                reason: e.to_string(),
            })
    }

    /// Send a request whose params are already parsed.
    pub fn send_document(
        &self,
        chain_id: u64,
        method: &str,
        params: Document,
    ) -> Result<Document, RequestError> {
        self.context(chain_id, method, params).execute()
    }

    /// Fetch the chain's nodelist with `in3_nodeList` and swap it in.
    ///
    /// `nodelist_quorum` distinct nodes must return the same list; any
    /// disagreement rejects the update. Returns the number of nodes
    /// installed. The new list is persisted to the cache as a snapshot for
    /// the next start.
    pub fn update_nodelist(&self, chain_id: u64) -> Result<usize, RequestError> {
        self.engine.chain(chain_id)?;
        let quorum = self.engine.policy().nodelist_quorum;
        let policy = RequestPolicy {
            request_count: 1,
            cache: false,
            ..self.engine.policy().clone()
        };

        let mut answered: Vec<String> = Vec::with_capacity(quorum);
        let mut agreed: Option<Nodelist> = None;
        while answered.len() < quorum {
            let mut ctx = self
                .context(chain_id, "in3_nodeList", empty_params())
                .with_policy(policy.clone())
                .excluding(answered.clone());
            ctx.run();
            let url = ctx
                .attempts()
                .iter()
                .rev()
                .find(|a| a.status == AttemptStatus::Verified)
                .map(|a| a.url.clone());
            let result = ctx.execute()?;
            let url = match url {
                Some(url) if !answered.contains(&url) => url,
                _ => {
                    return Err(ConfigError::invalid(
                        "request.nodelist_quorum",
                        format!("only {} distinct nodes answered", answered.len()),
                    )
                    .into())
                }
            };

            let list = parse_nodelist(chain_id, &result.root())?;
            match &agreed {
                Some(first) if *first != list => {
                    warn!(
                        chain_id,
                        url = %url,
                        agreeing = answered.len(),
                        "[vc-06] Nodes disagree on the nodelist"
                    );
                    return Err(RequestError::Verification {
                        url,
                        source: VerificationError::mismatch("nodelist"),
                    });
                }
                Some(_) => {}
                None => agreed = Some(list),
            }
            answered.push(url);
        }
        let list = agreed
            .ok_or_else(|| ConfigError::invalid("request.nodelist_quorum", "must be > 0"))?;
        let count = list.nodes.len();
        let last_block = list.last_block;
        self.engine.registry().replace_nodelist(list)?;
        info!(
            chain_id,
            nodes = count,
            last_block,
            "[vc-06] Nodelist updated"
        );

        if let Some(cache) = &self.engine.cache {
            match self.engine.registry().lock().snapshot(chain_id) {
                Ok(bytes) => cache.set(&snapshot_key(chain_id), bytes),
                Err(e) => warn!(chain_id, error = %e, "[vc-06] Nodelist snapshot not persisted"),
            }
        }
        Ok(count)
    }
}

impl std::fmt::Debug for LightClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LightClient")
            .field("engine", &self.engine)
            .field("signer", &self.signer.is_some())
            .field("filters", &self.filters.len())
            .finish()
    }
}

pub(crate) fn parse_params(params_json: &str) -> Result<Document, RequestError> {
    Document::parse_json(params_json)
        .map_err(|e| ConfigError::InvalidParams(e.to_string()).into())
}

pub(crate) fn empty_params() -> Document {
    let mut b = DocumentBuilder::new();
    let root = b.array(Vec::new());
    b.finish(root)
}

// =============================================================================
// BUILDER
// =============================================================================

/// Collects the collaborators of a [`LightClient`].
pub struct LightClientBuilder {
    config: ClientConfig,
    transport: Option<Arc<dyn Transport>>,
    cache: Option<Arc<dyn Cache>>,
    signer: Option<Arc<dyn Signer>>,
    clock: Option<Arc<dyn TimeSource>>,
    verifiers: Option<VerifierRegistry>,
}

impl LightClientBuilder {
    fn new(config: ClientConfig) -> Self {
        Self {
            config,
            transport: None,
            cache: None,
            signer: None,
            clock: None,
            verifiers: None,
        }
    }

    /// Transport used for every dispatch round (required).
    pub fn transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Cache for verified results and nodelist snapshots.
    pub fn cache(mut self, cache: Arc<dyn Cache>) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Signer for outgoing transactions.
    pub fn signer(mut self, signer: Arc<dyn Signer>) -> Self {
        self.signer = Some(signer);
        self
    }

    /// Clock for blacklist expiry (wall clock by default).
    pub fn time_source(mut self, clock: Arc<dyn TimeSource>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Verifier dispatch table (built-in verifiers by default).
    pub fn verifiers(mut self, verifiers: VerifierRegistry) -> Self {
        self.verifiers = Some(verifiers);
        self
    }

    /// Validate the configuration, bootstrap the nodelists and build the
    /// client.
    pub fn build(self) -> Result<LightClient, ConfigError> {
        self.config.validate()?;
        let transport = self
            .transport
            .ok_or_else(|| ConfigError::invalid("transport", "no transport configured"))?;

        let mut chains = HashMap::with_capacity(self.config.chains.len());
        let mut registry = NodeRegistry::new(self.config.registry.clone())
            .map_err(|e| ConfigError::invalid("registry", e.to_string()))?;
        for chain in &self.config.chains {
            let list = bootstrap_nodelist(chain, self.cache.as_deref());
            registry
                .register_chain(list)
                .map_err(|e| ConfigError::invalid("chains.boot_nodes", e.to_string()))?;
            chains.insert(chain.chain_id, ChainSpec::new(chain.clone())?);
        }

        let engine = Engine::new(
            self.config.request.clone(),
            chains,
            RegistryHandle::new(registry),
            self.verifiers.unwrap_or_else(VerifierRegistry::with_defaults),
            transport,
            self.cache,
            self.clock.unwrap_or_else(|| Arc::new(SystemTimeSource)),
        );
        info!(
            chains = self.config.chains.len(),
            request_count = self.config.request.request_count,
            proof = ?self.config.request.proof,
            "[vc-06] Light client ready"
        );
        Ok(LightClient {
            engine,
            signer: self.signer,
            filters: FilterManager::new(),
        })
    }
}

impl std::fmt::Debug for LightClientBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LightClientBuilder")
            .field("config", &self.config)
            .field("transport", &self.transport.is_some())
            .field("cache", &self.cache.is_some())
            .field("signer", &self.signer.is_some())
            .finish_non_exhaustive()
    }
}

/// Cached snapshot of the chain if one is readable, else the boot nodes.
fn bootstrap_nodelist(chain: &ChainConfig, cache: Option<&dyn Cache>) -> Nodelist {
    let chain_id = chain.chain_id;
    if let Some(bytes) = cache.and_then(|c| c.get(&snapshot_key(chain_id))) {
        match decode_snapshot(&bytes) {
            Ok(list) if list.chain_id == chain_id => {
                debug!(
                    chain_id,
                    nodes = list.nodes.len(),
                    "[vc-06] Nodelist bootstrapped from snapshot"
                );
                return list;
            }
            Ok(list) => warn!(
                chain_id,
                snapshot_chain = list.chain_id,
                "[vc-06] Ignoring snapshot of another chain"
            ),
            Err(e) => warn!(chain_id, error = %e, "[vc-06] Ignoring unreadable nodelist snapshot"),
        }
    }
    let nodes = chain
        .boot_nodes
        .iter()
        .map(|boot| Node::new(boot.url.clone(), boot.address, chain_id))
        .collect();
    Nodelist::new(chain_id, nodes)
}
