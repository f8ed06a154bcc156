//! # `in3_nodeList` Decoding
//!
//! ```text
//! {
//!   "nodes": [{ "url", "address", "chainIds": ["0x1"], "deposit",
//!               "registerTime", "props", "weight" }],
//!   "contract": "0x..", "registryId": "0x..", "lastBlockNumber": 8_000_000
//! }
//! ```

use crate::domain::{props, Node, Nodelist, RegistryError};
use vc_01_byte_codec::U256;
use vc_02_token_model::Token;

/// Decode and validate an `in3_nodeList` result for `chain_id`.
pub fn parse_nodelist(chain_id: u64, result: &Token<'_>) -> Result<Nodelist, RegistryError> {
    let entries = result.field("nodes")?.as_array()?;
    let mut nodes = Vec::with_capacity(entries.len());

    for entry in entries {
        let url = entry.field("url")?.as_str()?.to_string();
        if url.is_empty() {
            return Err(RegistryError::InvalidNodelist("node without url".into()));
        }
        let address = match entry.get("address") {
            Some(t) if !t.is_null() => t.as_address()?,
            _ => [0u8; 20],
        };

        let chains = match entry.get("chainIds") {
            Some(t) => t
                .as_array()?
                .iter()
                .map(|c| c.as_u256())
                .collect::<Result<Vec<U256>, _>>()?,
            None => vec![U256::from(chain_id)],
        };
        if !chains.contains(&U256::from(chain_id)) {
            let found = chains.first().map(|c| c.low_u64()).unwrap_or(0);
            return Err(RegistryError::ChainMismatch {
                url,
                expected: chain_id,
                found,
            });
        }

        let mut node = Node::new(url, address, chain_id);
        if let Some(t) = entry.get("deposit") {
            node.deposit = t.as_u256()?;
        }
        if let Some(t) = entry.get("registerTime") {
            node.registered_at = t.as_u64()?;
        }
        node.props = match entry.get("props") {
            Some(t) => t.as_u64()?,
            None => props::PROOF | props::DATA,
        };
        if let Some(t) = entry.get("weight") {
            let weight = t.as_u64()?;
            if weight == 0 {
                return Err(RegistryError::InvalidNodelist(format!(
                    "node {} has zero weight",
                    node.url
                )));
            }
            node.weight = weight as f64;
        }
        nodes.push(node);
    }

    let list = Nodelist {
        chain_id,
        last_block: match result.get("lastBlockNumber") {
            Some(t) => t.as_u64()?,
            None => 0,
        },
        contract: match result.get("contract") {
            Some(t) if !t.is_null() => Some(t.as_address()?),
            _ => None,
        },
        registry_id: match result.get("registryId") {
            Some(t) if !t.is_null() => Some(t.as_hash()?),
            _ => None,
        },
        nodes,
    };
    list.validate()?;
    Ok(list)
}
