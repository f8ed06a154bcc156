//! # Request Context
//!
//! One logical RPC call, driven through
//! `Building → Dispatching → AwaitingResponses → Verifying →
//! {Succeeded, Retrying, Failed}` by [`RequestContext::step`].
//!
//! - `Building` validates the request and may answer from the cache.
//! - `Dispatching` selects candidates (and signer nodes) and serializes
//!   the envelope.
//! - `AwaitingResponses` makes the single transport call of the round.
//! - `Verifying` examines responses in candidate order; the first one that
//!   parses and verifies wins. Outcomes of the round are flushed into the
//!   registry before the next transition.
//! - `Retrying` leads to a fresh dispatch that avoids the nodes that just
//!   failed, until `max_attempts` rounds have been made.

use crate::application::engine::Engine;
use crate::application::envelope::build_envelope;
use crate::config::{ConfigError, RequestPolicy};
use crate::domain::{
    is_cacheable, AttemptStatus, Fingerprint, NodeAttempt, ProofLevel, RequestError,
    RequestState, TransportError,
};
use std::time::Instant;
use tracing::{debug, error, trace, warn};
use vc_02_token_model::{Document, TokenKind};
use vc_03_node_registry::Outcome;
use vc_05_proof_verifier::{ChainSpec, ProofContext, ProofPolicy, SubRequester, VerificationError};

/// Nested requests a verifier may issue below a top-level request.
pub const MAX_NESTING_DEPTH: u8 = 4;

/// State of one logical request.
pub struct RequestContext<'c> {
    engine: &'c Engine,
    chain_id: u64,
    method: String,
    params: Document,
    policy: RequestPolicy,
    depth: u8,

    state: RequestState,
    attempt: u32,
    request_id: u64,
    chain: Option<&'c ChainSpec>,
    cache_key: Option<String>,
    from_cache: bool,

    payload: Vec<u8>,
    proof_policy: ProofPolicy,
    round: Vec<String>,
    responses: Vec<Result<Vec<u8>, TransportError>>,
    round_ms: u64,

    attempts: Vec<NodeAttempt>,
    excluded: Vec<String>,
    best_error: Option<RequestError>,
    outcome: Option<Result<Document, RequestError>>,
}

impl<'c> RequestContext<'c> {
    /// Request `method(params)` on `chain_id` with the engine's policy.
    pub fn new(engine: &'c Engine, chain_id: u64, method: impl Into<String>, params: Document) -> Self {
        Self {
            engine,
            chain_id,
            method: method.into(),
            params,
            policy: engine.policy().clone(),
            depth: 0,
            state: RequestState::Building,
            attempt: 0,
            request_id: 0,
            chain: None,
            cache_key: None,
            from_cache: false,
            payload: Vec::new(),
            proof_policy: ProofPolicy::default(),
            round: Vec::new(),
            responses: Vec::new(),
            round_ms: 0,
            attempts: Vec::new(),
            excluded: Vec::new(),
            best_error: None,
            outcome: None,
        }
    }

    /// Override the policy for this request.
    pub fn with_policy(mut self, policy: RequestPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Keep `urls` out of candidate selection while other nodes remain.
    pub fn excluding(mut self, urls: Vec<String>) -> Self {
        self.excluded = urls;
        self
    }

    /// Current state.
    pub fn state(&self) -> RequestState {
        self.state
    }

    /// Dispatch rounds made so far.
    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    /// Every node asked so far, in order.
    pub fn attempts(&self) -> &[NodeAttempt] {
        &self.attempts
    }

    /// JSON-RPC method.
    pub fn method(&self) -> &str {
        &self.method
    }

    /// Whether the result came from the cache.
    pub fn from_cache(&self) -> bool {
        self.from_cache
    }

    /// Nesting depth (0 for a top-level request).
    pub fn depth(&self) -> u8 {
        self.depth
    }

    /// Final result, once the context is terminal.
    pub fn outcome(&self) -> Option<&Result<Document, RequestError>> {
        self.outcome.as_ref()
    }

    /// Perform one transition and return the new state.
    pub fn step(&mut self) -> RequestState {
        let next = match self.state {
            RequestState::Building => self.build(),
            RequestState::Dispatching { attempt } => self.dispatch(attempt),
            RequestState::AwaitingResponses => self.await_responses(),
            RequestState::Verifying => self.verify_round(),
            RequestState::Retrying => RequestState::Dispatching {
                attempt: self.attempt + 1,
            },
            terminal => terminal,
        };
        if next != self.state {
            trace!(
                method = %self.method,
                from = %self.state,
                to = %next,
                "[vc-06] Request state transition"
            );
            self.state = next;
        }
        self.state
    }

    /// Step until a terminal state.
    pub fn run(&mut self) -> RequestState {
        while !self.state.is_terminal() {
            self.step();
        }
        self.state
    }

    /// Run to completion and return the verified result.
    pub fn execute(mut self) -> Result<Document, RequestError> {
        self.run();
        match self.outcome.take() {
            Some(result) => result,
            None => Err(ConfigError::invalid("request", "finished without an outcome").into()),
        }
    }

    fn finish(&mut self, result: Result<Document, RequestError>) -> RequestState {
        let state = if result.is_ok() {
            RequestState::Succeeded
        } else {
            RequestState::Failed
        };
        if self.outcome.is_none() {
            self.outcome = Some(result);
        }
        state
    }

    fn note_error(&mut self, error: RequestError) {
        let better = self
            .best_error
            .as_ref()
            .map_or(true, |current| error.specificity() > current.specificity());
        if better {
            self.best_error = Some(error);
        }
    }

    // -------------------------------------------------------------------------
    // Building
    // -------------------------------------------------------------------------

    fn build(&mut self) -> RequestState {
        match self.prepare() {
            Ok(Some(cached)) => {
                self.from_cache = true;
                self.finish(Ok(cached))
            }
            Ok(None) => RequestState::Dispatching { attempt: 1 },
            Err(e) => {
                warn!(method = %self.method, error = %e, "[vc-06] Request rejected");
                self.finish(Err(e))
            }
        }
    }

    fn prepare(&mut self) -> Result<Option<Document>, RequestError> {
        let engine = self.engine;
        self.policy.validate()?;
        if self.depth > MAX_NESTING_DEPTH {
            return Err(ConfigError::invalid(
                "request",
                format!("nesting depth {} exceeds {MAX_NESTING_DEPTH}", self.depth),
            )
            .into());
        }
        let chain = engine.chain(self.chain_id)?;
        if self.params.root().kind() != TokenKind::Array {
            return Err(ConfigError::InvalidParams("params must be a JSON array".into()).into());
        }
        if self.policy.proof != ProofLevel::None
            && engine.verifiers.find(chain.family(), &self.method).is_none()
        {
            return Err(ConfigError::UnsupportedMethod(self.method.clone()).into());
        }
        self.chain = Some(chain);

        if !self.policy.cache || !is_cacheable(&self.method, &self.params.root()) {
            return Ok(None);
        }
        let Some(cache) = &engine.cache else {
            return Ok(None);
        };
        let key = Fingerprint::of(&self.method, &self.params.root())
            .map_err(|e| ConfigError::InvalidParams(e.to_string()))?
            .cache_key();
        if let Some(bytes) = cache.get(&key) {
            match Document::parse_json(&bytes) {
                Ok(cached) => {
                    debug!(method = %self.method, key = %key, "[vc-06] Cache hit");
                    return Ok(Some(cached));
                }
                Err(e) => debug!(key = %key, error = %e, "[vc-06] Ignoring unreadable cache entry"),
            }
        }
        self.cache_key = Some(key);
        Ok(None)
    }

    // -------------------------------------------------------------------------
    // Dispatching / AwaitingResponses
    // -------------------------------------------------------------------------

    /// `self.attempt` only advances once a round goes out or finds no
    /// nodes; configuration failures leave it untouched.
    fn dispatch(&mut self, attempt: u32) -> RequestState {
        let engine = self.engine;
        let now = engine.clock.now();
        let registry = engine.registry();

        let candidates = match registry.select_candidates(
            self.chain_id,
            self.policy.request_count,
            &self.excluded,
            now,
        ) {
            Ok(candidates) => candidates,
            Err(e) => return self.finish(Err(e.into())),
        };
        if candidates.is_empty() {
            self.attempt = attempt;
            warn!(
                chain_id = self.chain_id,
                attempt, "[vc-06] No active nodes to dispatch to"
            );
            self.note_error(
                TransportError::NoCandidates {
                    chain_id: self.chain_id,
                }
                .into(),
            );
            self.round.clear();
            return self.after_failed_round();
        }
        let urls: Vec<String> = candidates.into_iter().map(|c| c.url).collect();

        let mut signers = Vec::new();
        if self.policy.proof != ProofLevel::None && self.policy.signature_count > 0 {
            match registry.select_signers(self.chain_id, self.policy.signature_count, &urls, now) {
                Ok(selected) => signers = selected.into_iter().map(|w| w.address).collect(),
                Err(e) => return self.finish(Err(e.into())),
            }
            if signers.len() < self.policy.signature_count {
                return self.finish(Err(ConfigError::invalid(
                    "request.signature_count",
                    format!("only {} signer nodes available", signers.len()),
                )
                .into()));
            }
        }
        self.proof_policy = ProofPolicy {
            signers,
            signature_count: self.policy.signature_count,
            finality: self.policy.finality,
            include_code: self.policy.include_code,
            full_proof: self.policy.proof == ProofLevel::Full,
        };

        self.request_id = self.engine.next_request_id();
        self.payload = match build_envelope(
            self.request_id,
            &self.method,
            self.params.root(),
            self.chain_id,
            &self.policy,
            &self.proof_policy.signers,
        ) {
            Ok(payload) => payload,
            Err(e) => return self.finish(Err(ConfigError::InvalidParams(e.to_string()).into())),
        };

        self.attempt = attempt;
        debug!(
            method = %self.method,
            attempt,
            nodes = urls.len(),
            signers = self.proof_policy.signers.len(),
            "[vc-06] Dispatching request"
        );
        self.attempts
            .extend(urls.iter().map(|url| NodeAttempt::pending(url.as_str(), attempt)));
        self.round = urls;
        RequestState::AwaitingResponses
    }

    fn await_responses(&mut self) -> RequestState {
        let started = Instant::now();
        self.responses = self.engine.transport.send(&self.round, &self.payload);
        self.round_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
        if self.responses.len() != self.round.len() {
            warn!(
                expected = self.round.len(),
                got = self.responses.len(),
                "[vc-06] Transport returned a mismatched number of results"
            );
        }
        RequestState::Verifying
    }

    // -------------------------------------------------------------------------
    // Verifying
    // -------------------------------------------------------------------------

    fn verify_round(&mut self) -> RequestState {
        let Some(chain) = self.chain else {
            return self.finish(Err(ConfigError::UnknownChain(self.chain_id).into()));
        };
        let urls = std::mem::take(&mut self.round);
        let mut responses = std::mem::take(&mut self.responses).into_iter();
        let first_slot = self.attempts.len() - urls.len();
        let mut outcomes: Vec<(String, Outcome)> = Vec::with_capacity(urls.len());
        let mut winner: Option<Document> = None;

        for (i, url) in urls.iter().enumerate() {
            let response = responses
                .next()
                .unwrap_or_else(|| Err(TransportError::MissingResponse { url: url.clone() }));
            let (status, outcome) = match response {
                Err(e) => {
                    warn!(url = %url, kind = "transport", error = %e, "[vc-06] Node failed");
                    self.note_error(e.into());
                    (AttemptStatus::TransportFailed, Some(Outcome::TransportFailure))
                }
                Ok(_) if winner.is_some() => (AttemptStatus::Skipped, None),
                Ok(bytes) => match self.examine(chain, url, &bytes) {
                    Ok(result) => {
                        winner = Some(result);
                        (
                            AttemptStatus::Verified,
                            Some(Outcome::Success {
                                response_ms: self.round_ms,
                            }),
                        )
                    }
                    Err(e) => {
                        let (status, outcome, kind) = match &e {
                            RequestError::Verification { .. } => (
                                AttemptStatus::Rejected,
                                Outcome::VerificationFailed,
                                "verification",
                            ),
                            _ => (AttemptStatus::Malformed, Outcome::Malformed, "malformed"),
                        };
                        warn!(
                            url = %url,
                            kind,
                            method = %self.method,
                            error = %e,
                            "[vc-06] Response rejected"
                        );
                        self.note_error(e);
                        (status, Some(outcome))
                    }
                },
            };

            let attempt = &mut self.attempts[first_slot + i];
            attempt.status = status;
            attempt.elapsed_ms = self.round_ms;
            if let Some(outcome) = outcome {
                if outcome.is_failure() && !self.excluded.contains(url) {
                    self.excluded.push(url.clone());
                }
                outcomes.push((url.clone(), outcome));
            }
        }

        self.engine
            .registry()
            .record_outcomes(self.chain_id, &outcomes, self.engine.clock.now());

        match winner {
            Some(result) => {
                self.store(&result);
                debug!(
                    method = %self.method,
                    attempt = self.attempt,
                    "[vc-06] Response verified"
                );
                self.finish(Ok(result))
            }
            None => self.after_failed_round(),
        }
    }

    /// Parse, match and verify one response; returns its `result`.
    fn examine(&self, chain: &ChainSpec, url: &str, bytes: &[u8]) -> Result<Document, RequestError> {
        let malformed = |reason: String| RequestError::Malformed {
            url: url.to_string(),
            reason,
        };
        let response = Document::parse_json(bytes).map_err(|e| malformed(e.to_string()))?;
        let root = response.root();
        if root.kind() != TokenKind::Object {
            return Err(malformed("response is not an object".into()));
        }
        let id = root.get("id").and_then(|t| t.as_u64().ok());
        if id != Some(self.request_id) {
            return Err(malformed(format!(
                "response id {id:?} does not match request {}",
                self.request_id
            )));
        }
        if let Some(rpc_error) = root.get("error").filter(|e| !e.is_null()) {
            return Err(RequestError::Rpc {
                url: url.to_string(),
                code: rpc_error
                    .get("code")
                    .and_then(|c| c.as_i64().ok())
                    .unwrap_or_default(),
                message: rpc_error
                    .get("message")
                    .and_then(|m| m.as_str().ok())
                    .unwrap_or_default()
                    .to_string(),
            });
        }
        let result = root
            .get("result")
            .ok_or_else(|| malformed("neither result nor error".into()))?;

        if self.policy.proof != ProofLevel::None {
            let nested = NestedRequests {
                engine: self.engine,
                chain_id: self.chain_id,
                depth: self.depth,
                policy: &self.policy,
            };
            let ctx = ProofContext {
                method: &self.method,
                params: self.params.root(),
                result,
                proof: root.get("in3").and_then(|in3| in3.get("proof")),
                chain,
                policy: &self.proof_policy,
                sub: Some(&nested),
            };
            self.engine
                .verifiers
                .verify(&ctx)
                .map_err(|source| RequestError::Verification {
                    url: url.to_string(),
                    source,
                })?;
        }
        Ok(result.to_document())
    }

    fn store(&self, result: &Document) {
        if self.policy.proof == ProofLevel::None || result.root().is_null() {
            return;
        }
        let (Some(key), Some(cache)) = (&self.cache_key, &self.engine.cache) else {
            return;
        };
        match result.to_json_string() {
            Ok(json) => {
                cache.set(key, json.into_bytes());
                trace!(key = %key, "[vc-06] Verified result cached");
            }
            Err(e) => debug!(key = %key, error = %e, "[vc-06] Result not cached"),
        }
    }

    fn after_failed_round(&mut self) -> RequestState {
        if self.attempt < self.policy.max_attempts {
            debug!(
                method = %self.method,
                attempt = self.attempt,
                max_attempts = self.policy.max_attempts,
                "[vc-06] No verified response, retrying"
            );
            return RequestState::Retrying;
        }
        let cause = self.best_error.take().unwrap_or(RequestError::Transport(
            TransportError::NoCandidates {
                chain_id: self.chain_id,
            },
        ));
        let exhausted = RequestError::ExhaustedAttempts {
            method: self.method.clone(),
            attempts: self.attempt,
            last_node: self.attempts.last().map(|a| a.url.clone()),
            cause: Box::new(cause),
        };
        error!(
            method = %self.method,
            attempts = self.attempt,
            error = %exhausted,
            "[vc-06] Request failed"
        );
        self.finish(Err(exhausted))
    }
}

impl std::fmt::Debug for RequestContext<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestContext")
            .field("method", &self.method)
            .field("chain_id", &self.chain_id)
            .field("state", &self.state)
            .field("attempt", &self.attempt)
            .field("depth", &self.depth)
            .finish_non_exhaustive()
    }
}

/// Verified requests issued by a verifier while checking a response.
struct NestedRequests<'a> {
    engine: &'a Engine,
    chain_id: u64,
    depth: u8,
    policy: &'a RequestPolicy,
}

impl SubRequester for NestedRequests<'_> {
    fn request(&self, method: &str, params_json: &str) -> Result<Document, VerificationError> {
        if self.depth >= MAX_NESTING_DEPTH {
            return Err(VerificationError::SubRequest(format!(
                "{method}: nesting depth {MAX_NESTING_DEPTH} reached"
            )));
        }
        let params = Document::parse_json(params_json)?;
        let mut nested = RequestContext::new(self.engine, self.chain_id, method, params)
            .with_policy(self.policy.clone());
        nested.depth = self.depth + 1;
        debug!(method, depth = nested.depth, "[vc-06] Nested request");
        nested
            .execute()
            .map_err(|e| VerificationError::SubRequest(e.to_string()))
    }
}
