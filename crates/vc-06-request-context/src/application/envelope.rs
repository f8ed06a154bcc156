//! # JSON-RPC Envelope
//!
//! ```text
//! {"id":7,"jsonrpc":"2.0","method":"eth_getBalance","params":[..],
//!  "in3":{"chainId":"0x1","verification":"proof","signers":["0x.."],
//!         "finality":10,"includeCode":true,"useFullProof":true,"version":"2.1.0"}}
//! ```
//!
//! Optional `in3` members are only present when they differ from the
//! node's defaults.

use crate::config::RequestPolicy;
use crate::domain::ProofLevel;
use vc_01_byte_codec::{bytes_to_hex, quantity_to_hex, Address};
use vc_02_token_model::{DocumentBuilder, Token, TokenError};

/// Protocol version announced in `in3.version`.
pub const PROTOCOL_VERSION: &str = "2.1.0";

/// Serialize one request.
pub fn build_envelope(
    id: u64,
    method: &str,
    params: Token<'_>,
    chain_id: u64,
    policy: &RequestPolicy,
    signers: &[Address],
) -> Result<Vec<u8>, TokenError> {
    let mut b = DocumentBuilder::new();

    let mut in3 = vec![
        ("chainId", b.string(quantity_to_hex(chain_id))),
        (
            "verification",
            b.string(policy.proof.verification(signers.len())),
        ),
    ];
    if policy.proof != ProofLevel::None {
        if !signers.is_empty() {
            let items = signers.iter().map(|a| b.string(bytes_to_hex(a))).collect();
            in3.push(("signers", b.array(items)));
        }
        if policy.finality > 0 {
            in3.push(("finality", b.integer(i128::from(policy.finality))));
        }
        if policy.include_code {
            in3.push(("includeCode", b.bool(true)));
        }
        if policy.proof == ProofLevel::Full {
            in3.push(("useFullProof", b.bool(true)));
        }
    }
    in3.push(("version", b.string(PROTOCOL_VERSION)));
    let in3 = b.object(in3);

    let id = b.integer(i128::from(id));
    let jsonrpc = b.string("2.0");
    let method = b.string(method);
    let params = b.import(params);
    let root = b.object(vec![
        ("id", id),
        ("jsonrpc", jsonrpc),
        ("method", method),
        ("params", params),
        ("in3", in3),
    ]);
    Ok(b.finish(root).to_json_string()?.into_bytes())
}
