//! Test utilities for the request engine.
//!
//! A scripted [`Transport`] that answers from a closure, plus config
//! helpers. Enable with the `test-utils` feature flag.
//!
//! # Example
//!
//! ```rust,ignore
//! use vc_06_request_context::test_utils::ScriptedTransport;
//!
//! let transport = ScriptedTransport::new(|_url, request| match request.method() {
//!     "eth_blockNumber" => Ok(request.reply("\"0x10\"", None)),
//!     _ => Ok(request.error(-32601, "method not found")),
//! });
//! ```

use crate::domain::TransportError;
use crate::ports::Transport;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use vc_02_token_model::{Document, Token};
use vc_05_proof_verifier::BootNode;

pub use vc_03_node_registry::test_utils::{FixedTimeSource, ManualTimeSource};

type Responder = dyn Fn(&str, &ScriptedRequest) -> Result<Vec<u8>, TransportError> + Send + Sync;

/// One envelope seen by a [`ScriptedTransport`].
#[derive(Debug, Clone)]
pub struct ScriptedRequest {
    envelope: Document,
}

impl ScriptedRequest {
    /// Parsed request envelope.
    pub fn envelope(&self) -> &Document {
        &self.envelope
    }

    /// JSON-RPC method.
    pub fn method(&self) -> &str {
        self.envelope
            .root()
            .get("method")
            .and_then(|m| m.as_str().ok())
            .unwrap_or_default()
    }

    /// JSON-RPC params.
    pub fn params(&self) -> Token<'_> {
        self.envelope
            .root()
            .get("params")
            .unwrap_or_else(|| self.envelope.root())
    }

    /// Request id.
    pub fn id(&self) -> u64 {
        self.envelope
            .root()
            .get("id")
            .and_then(|id| id.as_u64().ok())
            .unwrap_or_default()
    }

    /// Success response; `proof_json` becomes `in3.proof`.
    pub fn reply(&self, result_json: &str, proof_json: Option<&str>) -> Vec<u8> {
        let in3 = proof_json
            .map(|proof| format!(r#","in3":{{"proof":{proof}}}"#))
            .unwrap_or_default();
        format!(
            r#"{{"id":{},"jsonrpc":"2.0","result":{result_json}{in3}}}"#,
            self.id()
        )
        .into_bytes()
    }

    /// JSON-RPC error response.
    pub fn error(&self, code: i64, message: &str) -> Vec<u8> {
        format!(
            r#"{{"id":{},"jsonrpc":"2.0","error":{{"code":{code},"message":"{message}"}}}}"#,
            self.id()
        )
        .into_bytes()
    }
}

/// Transport answering every url through a closure.
pub struct ScriptedTransport {
    responder: Box<Responder>,
    calls: AtomicUsize,
    requests: Mutex<Vec<ScriptedRequest>>,
}

impl ScriptedTransport {
    /// Answer each `(url, request)` with `responder`.
    pub fn new<F>(responder: F) -> Self
    where
        F: Fn(&str, &ScriptedRequest) -> Result<Vec<u8>, TransportError> + Send + Sync + 'static,
    {
        Self {
            responder: Box::new(responder),
            calls: AtomicUsize::new(0),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Every node answers with the same result (and proof).
    pub fn always(result_json: &str, proof_json: Option<&str>) -> Self {
        let result = result_json.to_string();
        let proof = proof_json.map(str::to_string);
        Self::new(move |_, request| Ok(request.reply(&result, proof.as_deref())))
    }

    /// Every node times out.
    pub fn failing() -> Self {
        Self::new(|url, _| Err(TransportError::Timeout { url: url.to_string() }))
    }

    /// Number of `send` calls (dispatch rounds).
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Envelope of every round, in order.
    pub fn requests(&self) -> Vec<ScriptedRequest> {
        self.requests.lock().clone()
    }

    /// Methods of every round, in order.
    pub fn methods(&self) -> Vec<String> {
        self.requests
            .lock()
            .iter()
            .map(|r| r.method().to_string())
            .collect()
    }
}

impl Transport for ScriptedTransport {
    fn send(&self, urls: &[String], payload: &[u8]) -> Vec<Result<Vec<u8>, TransportError>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let envelope = match Document::parse_json(payload) {
            Ok(envelope) => envelope,
            Err(e) => {
                return urls
                    .iter()
                    .map(|url| {
                        Err(TransportError::Connection {
                            url: url.clone(),
                            reason: e.to_string(),
                        })
                    })
                    .collect()
            }
        };
        let request = ScriptedRequest { envelope };
        self.requests.lock().push(request.clone());
        urls.iter().map(|url| (self.responder)(url, &request)).collect()
    }
}

impl std::fmt::Debug for ScriptedTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScriptedTransport")
            .field("calls", &self.calls())
            .finish_non_exhaustive()
    }
}

/// `count` boot nodes `https://node-{i}` with distinct signer addresses.
pub fn boot_nodes(count: usize) -> Vec<BootNode> {
    (0..count)
        .map(|i| BootNode {
            url: format!("https://node-{i}"),
            address: [i as u8 + 1; 20],
        })
        .collect()
}
