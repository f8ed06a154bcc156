//! # Outgoing Transactions
//!
//! `send_transaction` turns an `eth_sendTransaction` style object into a
//! signed EIP-155 legacy transaction and submits it as
//! `eth_sendRawTransaction`. Missing `nonce` and `gasPrice` are fetched
//! through the verified request path first.

use crate::application::client::{empty_params, parse_params, LightClient};
use crate::config::ConfigError;
use crate::domain::{RequestError, SignerError};
use tracing::{debug, info};
use vc_01_byte_codec::{bytes_to_hex, Address, U256};
use vc_02_token_model::{Document, DocumentBuilder, Token, TokenKind};
use vc_05_proof_verifier::{recover_address, LegacyTransaction, RecoverableSignature};

/// Gas limit used when the request names none.
pub const DEFAULT_GAS_LIMIT: u64 = 100_000;

/// Fields of a transaction request before defaults are filled in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionRequest {
    /// Sending account
    pub from: Address,
    /// Recipient, `None` for a contract deployment
    pub to: Option<Address>,
    /// Transferred value
    pub value: U256,
    /// Call data (`data` or `input`)
    pub data: Vec<u8>,
    /// Gas limit (`gas` or `gasLimit`)
    pub gas_limit: u64,
    /// Explicit nonce
    pub nonce: Option<u64>,
    /// Explicit gas price
    pub gas_price: Option<U256>,
}

impl TransactionRequest {
    /// Parse a transaction object.
    pub fn from_token(tx: &Token<'_>) -> Result<Self, ConfigError> {
        if tx.kind() != TokenKind::Object {
            return Err(ConfigError::InvalidParams(
                "transaction must be an object".into(),
            ));
        }
        let invalid = |field: &str, e: &dyn std::fmt::Display| {
            ConfigError::InvalidParams(format!("transaction {field}: {e}"))
        };
        let field = |names: &[&str]| {
            names
                .iter()
                .find_map(|name| tx.get(name).filter(|t| !t.is_null()))
        };

        let from = field(&["from"])
            .ok_or_else(|| ConfigError::InvalidParams("transaction without from".into()))?
            .as_address()
            .map_err(|e| invalid("from", &e))?;
        let to = field(&["to"])
            .map(|t| t.as_address())
            .transpose()
            .map_err(|e| invalid("to", &e))?;
        let value = field(&["value"])
            .map(|t| t.as_u256())
            .transpose()
            .map_err(|e| invalid("value", &e))?
            .unwrap_or_default();
        let data = field(&["data", "input"])
            .map(|t| t.as_bytes())
            .transpose()
            .map_err(|e| invalid("data", &e))?
            .unwrap_or_default();
        let gas_limit = field(&["gas", "gasLimit"])
            .map(|t| t.as_u64())
            .transpose()
            .map_err(|e| invalid("gas", &e))?
            .unwrap_or(DEFAULT_GAS_LIMIT);
        let nonce = field(&["nonce"])
            .map(|t| t.as_u64())
            .transpose()
            .map_err(|e| invalid("nonce", &e))?;
        let gas_price = field(&["gasPrice"])
            .map(|t| t.as_u256())
            .transpose()
            .map_err(|e| invalid("gasPrice", &e))?;

        Ok(Self {
            from,
            to,
            value,
            data,
            gas_limit,
            nonce,
            gas_price,
        })
    }
}

impl LightClient {
    /// Sign and submit a transaction; returns the transaction hash.
    ///
    /// `tx_json` is an object with `from` and optionally `to`, `value`,
    /// `data`/`input`, `gas`/`gasLimit`, `nonce` and `gasPrice`.
    pub fn send_transaction(&self, chain_id: u64, tx_json: &str) -> Result<String, RequestError> {
        self.engine.chain(chain_id)?;
        let doc = parse_params(tx_json)?;
        let request = TransactionRequest::from_token(&doc.root())?;
        let signer = self.signer.as_ref().ok_or(SignerError::Unavailable)?;

        let nonce = match request.nonce {
            Some(nonce) => nonce,
            None => self.fetch_nonce(chain_id, &request.from)?,
        };
        let gas_price = match request.gas_price {
            Some(price) => price,
            None => {
                let result = self.send_document(chain_id, "eth_gasPrice", empty_params())?;
                result
                    .root()
                    .as_u256()
                    .map_err(|e| unexpected("eth_gasPrice", e))?
            }
        };

        let tx = LegacyTransaction {
            nonce,
            gas_price,
            gas_limit: request.gas_limit,
            to: request.to,
            value: request.value,
            data: request.data,
        };
        let hash = tx.signing_hash(chain_id);
        let bytes = signer.sign(&hash, &request.from)?;
        let signature = RecoverableSignature::from_bytes(&bytes)
            .map_err(|e| SignerError::Signing(e.to_string()))?;
        let signed_by = recover_address(&hash, &signature)
            .map_err(|e| SignerError::Signing(e.to_string()))?;
        if signed_by != request.from {
            return Err(SignerError::Signing(format!(
                "signature recovers to {} instead of {}",
                bytes_to_hex(&signed_by),
                bytes_to_hex(&request.from)
            ))
            .into());
        }
        let raw = tx.encode_signed(chain_id, &signature);
        debug!(
            chain_id,
            nonce,
            from = %bytes_to_hex(&request.from),
            "[vc-06] Transaction signed"
        );

        let result = self.send_document(
            chain_id,
            "eth_sendRawTransaction",
            string_params(&[bytes_to_hex(&raw)]),
        )?;
        let tx_hash = result
            .root()
            .as_str()
            .map_err(|e| unexpected("eth_sendRawTransaction", e))?
            .to_string();
        info!(chain_id, tx_hash = %tx_hash, "[vc-06] Transaction submitted");
        Ok(tx_hash)
    }

    fn fetch_nonce(&self, chain_id: u64, from: &Address) -> Result<u64, RequestError> {
        let params = string_params(&[bytes_to_hex(from), "pending".to_string()]);
        let result = self.send_document(chain_id, "eth_getTransactionCount", params)?;
        result
            .root()
            .as_u64()
            .map_err(|e| unexpected("eth_getTransactionCount", e))
    }
}

fn string_params(items: &[String]) -> Document {
    let mut b = DocumentBuilder::new();
    let ids = items.iter().map(|s| b.string(s.as_str())).collect();
    let root = b.array(ids);
    b.finish(root)
}

fn unexpected(method: &str, e: impl std::fmt::Display) -> RequestError {
    RequestError::UnexpectedResult {
        method: method.to_string(),
        reason: e.to_string(),
    }
}
