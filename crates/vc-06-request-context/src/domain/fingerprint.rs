//! # Request Fingerprints
//!
//! A fingerprint identifies a request by `keccak256(method ‖ params)` where
//! `params` is the compact JSON of the parameter array. Verified results of
//! cache-eligible requests are stored under [`Fingerprint::cache_key`].
//!
//! Eligible requests are read-only and pinned to a fixed block: a moving
//! block tag (`latest`, `pending`, ...) anywhere in the parameters, or a
//! missing block parameter that defaults to the head, disables caching.

use vc_01_byte_codec::{keccak256, Hash};
use vc_02_token_model::{Token, TokenError, TokenKind};

const MOVING_TAGS: &[&str] = &["latest", "pending", "safe", "finalized"];

/// Read-only methods and the index of their block parameter, if any.
const CACHEABLE_METHODS: &[(&str, Option<usize>)] = &[
    ("eth_chainId", None),
    ("eth_getBalance", Some(1)),
    ("eth_getCode", Some(1)),
    ("eth_getTransactionCount", Some(1)),
    ("eth_getStorageAt", Some(2)),
    ("eth_getBlockByNumber", Some(0)),
    ("eth_getBlockByHash", None),
    ("eth_getTransactionByHash", None),
    ("eth_getTransactionByBlockHashAndIndex", None),
    ("eth_getTransactionByBlockNumberAndIndex", Some(0)),
    ("eth_getTransactionReceipt", None),
    ("eth_getLogs", None),
    ("getblockheader", None),
    ("getblock", None),
    ("getrawtransaction", None),
    ("btc_proofTarget", None),
    ("ipfs_get", None),
];

/// Hash of a request's method and parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Fingerprint(Hash);

impl Fingerprint {
    /// Fingerprint of `method` called with `params`.
    pub fn of(method: &str, params: &Token<'_>) -> Result<Self, TokenError> {
        let mut preimage = method.as_bytes().to_vec();
        preimage.extend_from_slice(params.to_json_string()?.as_bytes());
        Ok(Self(keccak256(&preimage)))
    }

    /// Raw hash.
    pub fn as_bytes(&self) -> &Hash {
        &self.0
    }

    /// Cache key: `req_<hex>`.
    pub fn cache_key(&self) -> String {
        format!("req_{}", hex::encode(self.0))
    }
}

/// Whether the verified result of `method(params)` may be cached.
pub fn is_cacheable(method: &str, params: &Token<'_>) -> bool {
    let Some((_, block_index)) = CACHEABLE_METHODS.iter().find(|(m, _)| *m == method) else {
        return false;
    };
    if mentions_moving_tag(params) {
        return false;
    }
    if let Some(index) = block_index {
        if params.at(*index).filter(|t| !t.is_null()).is_none() {
            return false;
        }
    }
    if method == "eth_getLogs" {
        let Some(filter) = params.at(0) else {
            return false;
        };
        let pinned = |key: &str| filter.get(key).is_some_and(|t| !t.is_null());
        return pinned("blockHash") || pinned("toBlock");
    }
    true
}

fn mentions_moving_tag(token: &Token<'_>) -> bool {
    match token.kind() {
        TokenKind::String => token
            .as_str()
            .map(|s| MOVING_TAGS.contains(&s))
            .unwrap_or(false),
        TokenKind::Array => token.iter().any(|t| mentions_moving_tag(&t)),
        TokenKind::Object => token.entries().any(|(_, t)| mentions_moving_tag(&t)),
        _ => false,
    }
}
