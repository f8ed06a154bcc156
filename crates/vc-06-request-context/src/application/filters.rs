//! # Filter Table
//!
//! Polling filters emulated on top of verified requests. Nodes never hold
//! filter state: a poll reads the head with `eth_blockNumber` and fetches
//! the unseen range with verified `eth_getLogs` or `eth_getBlockByNumber`.
//!
//! Filter ids are 1-based slot indices. Uninstalling frees the slot for the
//! next installation.

use crate::application::client::{empty_params, LightClient};
use crate::config::ConfigError;
use crate::domain::RequestError;
use parking_lot::Mutex;
use tracing::debug;
use vc_01_byte_codec::quantity_to_hex;
use vc_02_token_model::{Document, DocumentBuilder, Token, TokenKind};
use vc_05_proof_verifier::{BlockScope, LogFilter};

/// Blocks a block filter reports per poll; the rest follow on the next one.
pub const MAX_BLOCKS_PER_POLL: u64 = 64;

/// JSON-RPC methods served by the filter table.
pub const FILTER_METHODS: &[&str] = &[
    "eth_newFilter",
    "eth_newBlockFilter",
    "eth_newPendingTransactionFilter",
    "eth_getFilterChanges",
    "eth_getFilterLogs",
    "eth_uninstallFilter",
];

/// Whether `method` is handled by the filter table.
pub fn is_filter_method(method: &str) -> bool {
    FILTER_METHODS.contains(&method)
}

/// What a filter reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterKind {
    /// Logs matching the options
    Event,
    /// Hashes of new blocks
    Block,
}

/// One installed filter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterState {
    /// Filter kind
    pub kind: FilterKind,
    /// Chain polled
    pub chain_id: u64,
    /// Options object (JSON) for event filters, `{}` for block filters
    pub options: String,
    /// Last block already reported
    pub last_block: u64,
}

/// Slot table of installed filters.
#[derive(Debug, Default)]
pub struct FilterManager {
    slots: Mutex<Vec<Option<FilterState>>>,
}

impl FilterManager {
    /// Empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Install a filter in the first free slot and return its id.
    pub fn install(&self, state: FilterState) -> u64 {
        let mut slots = self.slots.lock();
        let index = match slots.iter().position(Option::is_none) {
            Some(free) => {
                slots[free] = Some(state);
                free
            }
            None => {
                slots.push(Some(state));
                slots.len() - 1
            }
        };
        index as u64 + 1
    }

    /// Copy of an installed filter.
    pub fn get(&self, id: u64) -> Option<FilterState> {
        let index = Self::index(id)?;
        self.slots.lock().get(index).cloned().flatten()
    }

    /// Record that blocks up to `last_block` were reported.
    ///
    /// Returns `false` if the filter was uninstalled meanwhile.
    pub fn advance(&self, id: u64, last_block: u64) -> bool {
        let Some(index) = Self::index(id) else {
            return false;
        };
        match self.slots.lock().get_mut(index) {
            Some(Some(state)) => {
                state.last_block = state.last_block.max(last_block);
                true
            }
            _ => false,
        }
    }

    /// Remove a filter. Returns `false` for unknown ids.
    pub fn uninstall(&self, id: u64) -> bool {
        let Some(index) = Self::index(id) else {
            return false;
        };
        let mut slots = self.slots.lock();
        let removed = slots.get_mut(index).and_then(Option::take).is_some();
        while matches!(slots.last(), Some(None)) {
            slots.pop();
        }
        removed
    }

    /// Number of installed filters.
    pub fn len(&self) -> usize {
        self.slots.lock().iter().filter(|s| s.is_some()).count()
    }

    /// `true` when no filter is installed.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn index(id: u64) -> Option<usize> {
        usize::try_from(id.checked_sub(1)?).ok()
    }
}

/// `eth_getLogs` params for `options` restricted to `from..=to`.
pub fn ranged_log_params(options: &Token<'_>, from: u64, to: u64) -> Document {
    let mut b = DocumentBuilder::new();
    let mut entries: Vec<(String, _)> = options
        .entries()
        .filter(|(key, _)| *key != "fromBlock" && *key != "toBlock")
        .map(|(key, value)| (key.to_string(), b.import(value)))
        .collect();
    entries.push(("fromBlock".to_string(), b.string(quantity_to_hex(from))));
    entries.push(("toBlock".to_string(), b.string(quantity_to_hex(to))));
    let filter = b.object(entries);
    let root = b.array(vec![filter]);
    b.finish(root)
}

impl LightClient {
    /// Install an event filter on `chain_id`.
    ///
    /// Only blocks after the current head (or from an explicit future
    /// `fromBlock`) are reported by [`LightClient::get_filter_changes`].
    pub fn new_filter(&self, chain_id: u64, options: &Token<'_>) -> Result<u64, RequestError> {
        self.engine.chain(chain_id)?;
        let filter = LogFilter::from_token(options)
            .map_err(|e| ConfigError::InvalidParams(e.to_string()))?;
        let from = match filter.scope {
            BlockScope::Range { from, .. } => from,
            BlockScope::Hash(_) => {
                return Err(ConfigError::InvalidParams(
                    "blockHash filters cannot be polled".into(),
                )
                .into())
            }
        };
        let options = options
            .to_json_string()
            .map_err(|e| ConfigError::InvalidParams(e.to_string()))?;

        let head = self.block_number(chain_id)?;
        let last_block = match from {
            Some(from) if from > head => from - 1,
            _ => head,
        };
        let id = self.filters.install(FilterState {
            kind: FilterKind::Event,
            chain_id,
            options,
            last_block,
        });
        debug!(id, chain_id, last_block, "[vc-06] Event filter installed");
        Ok(id)
    }

    /// Install a filter reporting the hashes of new blocks.
    pub fn new_block_filter(&self, chain_id: u64) -> Result<u64, RequestError> {
        self.engine.chain(chain_id)?;
        let head = self.block_number(chain_id)?;
        let id = self.filters.install(FilterState {
            kind: FilterKind::Block,
            chain_id,
            options: "{}".into(),
            last_block: head,
        });
        debug!(id, chain_id, head, "[vc-06] Block filter installed");
        Ok(id)
    }

    /// Always fails: pending transactions cannot be verified.
    pub fn new_pending_transaction_filter(&self, chain_id: u64) -> Result<u64, RequestError> {
        self.engine.chain(chain_id)?;
        Err(ConfigError::UnsupportedMethod("eth_newPendingTransactionFilter".into()).into())
    }

    /// Verified changes since the last poll.
    ///
    /// Event filters return logs, block filters return block hashes.
    pub fn get_filter_changes(&self, id: u64) -> Result<Document, RequestError> {
        let state = self.filters.get(id).ok_or_else(|| unknown_filter(id))?;
        let head = self.block_number(state.chain_id)?;
        match state.kind {
            FilterKind::Event => {
                let options = Document::parse_json(&state.options)
                    .map_err(|e| ConfigError::InvalidParams(e.to_string()))?;
                let filter = LogFilter::from_token(&options.root())
                    .map_err(|e| ConfigError::InvalidParams(e.to_string()))?;
                let to = match filter.scope {
                    BlockScope::Range { to: Some(to), .. } => head.min(to),
                    _ => head,
                };
                if to <= state.last_block {
                    return Ok(empty_params());
                }
                let params = ranged_log_params(&options.root(), state.last_block + 1, to);
                let logs = self.send_document(state.chain_id, "eth_getLogs", params)?;
                self.filters.advance(id, to);
                Ok(logs)
            }
            FilterKind::Block => {
                let last = head.min(state.last_block.saturating_add(MAX_BLOCKS_PER_POLL));
                let mut b = DocumentBuilder::new();
                let mut hashes = Vec::new();
                let mut reported = state.last_block;
                for number in state.last_block + 1..=last {
                    let block =
                        self.send_document(state.chain_id, "eth_getBlockByNumber", block_params(number))?;
                    let root = block.root();
                    if root.is_null() {
                        break;
                    }
                    let hash = root
                        .get("hash")
                        .and_then(|h| h.as_str().ok())
                        .ok_or_else(|| RequestError::UnexpectedResult {
                            method: "eth_getBlockByNumber".into(),
                            reason: format!("block {number} without hash"),
                        })?;
                    hashes.push(b.string(hash));
                    reported = number;
                }
                self.filters.advance(id, reported);
                let root = b.array(hashes);
                Ok(b.finish(root))
            }
        }
    }

    /// Every verified log matching an event filter's options.
    pub fn get_filter_logs(&self, id: u64) -> Result<Document, RequestError> {
        let state = self.filters.get(id).ok_or_else(|| unknown_filter(id))?;
        if state.kind != FilterKind::Event {
            return Err(ConfigError::InvalidParams(format!("filter {id} is not an event filter")).into());
        }
        let params = Document::parse_json(format!("[{}]", state.options))
            .map_err(|e| ConfigError::InvalidParams(e.to_string()))?;
        self.send_document(state.chain_id, "eth_getLogs", params)
    }

    /// Remove a filter. Returns `false` for unknown ids.
    pub fn uninstall_filter(&self, id: u64) -> bool {
        let removed = self.filters.uninstall(id);
        if removed {
            debug!(id, "[vc-06] Filter uninstalled");
        }
        removed
    }

    /// Answer a filter method received through [`LightClient::send`].
    pub(crate) fn handle_filter(
        &self,
        chain_id: u64,
        method: &str,
        params: &Document,
    ) -> Result<Document, RequestError> {
        let root = params.root();
        if root.kind() != TokenKind::Array {
            return Err(ConfigError::InvalidParams("params must be a JSON array".into()).into());
        }
        let filter_id = || -> Result<u64, RequestError> {
            let id = root
                .at(0)
                .and_then(|t| t.as_u64().ok())
                .ok_or_else(|| ConfigError::InvalidParams(format!("{method} needs a filter id")))?;
            match self.filters.get(id) {
                Some(state) if state.chain_id == chain_id => Ok(id),
                _ => Err(unknown_filter(id)),
            }
        };

        match method {
            "eth_newFilter" => {
                let options = root
                    .at(0)
                    .ok_or_else(|| ConfigError::InvalidParams("eth_newFilter needs options".into()))?;
                Ok(quantity_document(self.new_filter(chain_id, &options)?))
            }
            "eth_newBlockFilter" => Ok(quantity_document(self.new_block_filter(chain_id)?)),
            "eth_newPendingTransactionFilter" => {
                Ok(quantity_document(self.new_pending_transaction_filter(chain_id)?))
            }
            "eth_getFilterChanges" => self.get_filter_changes(filter_id()?),
            "eth_getFilterLogs" => self.get_filter_logs(filter_id()?),
            "eth_uninstallFilter" => {
                let removed = match filter_id() {
                    Ok(id) => self.uninstall_filter(id),
                    Err(_) => false,
                };
                let mut b = DocumentBuilder::new();
                let root = b.bool(removed);
                Ok(b.finish(root))
            }
            other => Err(ConfigError::UnsupportedMethod(other.to_string()).into()),
        }
    }

    fn block_number(&self, chain_id: u64) -> Result<u64, RequestError> {
        let result = self.send_document(chain_id, "eth_blockNumber", empty_params())?;
        result
            .root()
            .as_u64()
            .map_err(|e| RequestError::UnexpectedResult {
                method: "eth_blockNumber".into(),
                reason: e.to_string(),
            })
    }
}

fn unknown_filter(id: u64) -> RequestError {
    ConfigError::InvalidParams(format!("unknown filter {id}")).into()
}

fn quantity_document(value: u64) -> Document {
    let mut b = DocumentBuilder::new();
    let root = b.string(quantity_to_hex(value));
    b.finish(root)
}

fn block_params(number: u64) -> Document {
    let mut b = DocumentBuilder::new();
    let items = vec![b.string(quantity_to_hex(number)), b.bool(false)];
    let root = b.array(items);
    b.finish(root)
}
