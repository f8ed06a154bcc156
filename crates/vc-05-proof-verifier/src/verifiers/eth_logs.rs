//! Log verification (`eth_getLogs`).
//!
//! `in3.proof.logProof` is keyed by block number; each entry carries the
//! RLP header (`block`), optional per-block `signatures` and the receipts
//! of the transactions that emitted logs:
//!
//! ```text
//! { "0x10": { "number": 16, "block": "0x..", "receipts": {
//!       "0x<txHash>": { "txHash", "txIndex", "proof": [..], "txProof": [..] } } } }
//! ```

use crate::domain::errors::VerificationError;
use crate::domain::filter::{LogFilter, LogView};
use crate::domain::header::EthHeader;
use crate::domain::receipt::DecodedReceipt;
use crate::ports::{ProofContext, Verifier};
use crate::verifiers::common::{ensure, ensure_quantity, hex_list, trust_header, ValidatorUpdate};
use crate::verifiers::eth_receipt::{log_matches, prove_receipt};
use tracing::debug;
use vc_01_byte_codec::{Hash, U256};
use vc_02_token_model::Token;

struct ProvenReceipt {
    tx_hash: Hash,
    index: u64,
    receipt: DecodedReceipt,
}

struct ProvenBlock {
    number: u64,
    hash: Hash,
    update: Option<ValidatorUpdate>,
    receipts: Vec<ProvenReceipt>,
}

fn prove_block<'a>(
    ctx: &ProofContext<'a>,
    entry: Token<'a>,
) -> Result<ProvenBlock, VerificationError> {
    let header = EthHeader::from_rlp(&entry.field("block")?.as_bytes()?)?;
    if let Some(number) = entry.get("number").filter(|t| !t.is_null()) {
        ensure(number.as_u64()? == header.number, "logProof number")?;
    }
    let block_ctx = ProofContext {
        proof: Some(entry),
        ..*ctx
    };
    let trusted = trust_header(&block_ctx, &header)?;

    let mut receipts = Vec::new();
    for (_, item) in entry.field("receipts")?.entries() {
        let index = item.field("txIndex")?.as_u64()?;
        let (receipt, tx_hash) = prove_receipt(
            &header,
            index,
            &hex_list(&item.field("proof")?)?,
            &hex_list(&item.field("txProof")?)?,
        )?;
        if let Some(claimed) = item.get("txHash").filter(|t| !t.is_null()) {
            ensure(claimed.as_hash()? == tx_hash, "logProof txHash")?;
        }
        receipts.push(ProvenReceipt {
            tx_hash,
            index,
            receipt,
        });
    }
    Ok(ProvenBlock {
        number: header.number,
        hash: trusted.hash,
        update: trusted.update,
        receipts,
    })
}

/// Event log verifier.
#[derive(Debug, Default)]
pub struct EthLogVerifier;

impl Verifier for EthLogVerifier {
    fn name(&self) -> &'static str {
        "eth-logs"
    }

    fn supports(&self, method: &str) -> bool {
        method == "eth_getLogs"
    }

    fn verify(&self, ctx: &ProofContext<'_>) -> Result<(), VerificationError> {
        let filter = match ctx.param(0) {
            Some(options) => LogFilter::from_token(&options)?,
            None => LogFilter::default(),
        };
        let logs = ctx.result.as_array()?;
        if logs.is_empty() {
            return Ok(());
        }

        let blocks = ctx
            .proof_field("logProof")?
            .entries()
            .map(|(_, entry)| prove_block(ctx, entry))
            .collect::<Result<Vec<_>, _>>()?;

        for log in &logs {
            let number = log.field("blockNumber")?.as_u64()?;
            let block = blocks
                .iter()
                .find(|b| b.number == number)
                .ok_or(VerificationError::MissingProof("logProof block"))?;
            let block_hash = log.field("blockHash")?.as_hash()?;
            ensure(block_hash == block.hash, "log blockHash")?;

            let tx_hash = log.field("transactionHash")?.as_hash()?;
            let proven = block
                .receipts
                .iter()
                .find(|r| r.tx_hash == tx_hash)
                .ok_or(VerificationError::MissingProof("logProof receipt"))?;
            ensure_quantity(log, "transactionIndex", U256::from(proven.index))?;

            let mut found = false;
            for record in &proven.receipt.logs {
                if log_matches(log, record)? {
                    found = true;
                    break;
                }
            }
            ensure(found, "log")?;

            let view = LogView {
                address: log.field("address")?.as_address()?,
                topics: log
                    .field("topics")?
                    .as_array()?
                    .iter()
                    .map(|t| t.as_hash())
                    .collect::<Result<_, _>>()?,
                block_number: number,
                block_hash,
            };
            filter.check(&view)?;
        }

        let block_count = blocks.len();
        let mut updates: Vec<_> = blocks.into_iter().filter_map(|b| b.update).collect();
        updates.sort_by_key(|u| u.block);
        for update in updates {
            update.record(ctx)?;
        }

        debug!(
            logs = logs.len(),
            blocks = block_count,
            "[vc-05] Logs verified"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{context_for, eth_chain, logs_fixture};
    use vc_01_byte_codec::bytes_to_hex;
    use vc_02_token_model::Document;

    #[test]
    fn test_logs_verified_and_filtered() {
        let chain = eth_chain(1);
        let fixture = logs_fixture();
        let params = Document::parse_json(format!(
            r#"[{{"address":"{}"}}]"#,
            bytes_to_hex(&fixture.address)
        ))
        .unwrap();
        let result = Document::parse_json(&fixture.result_json).unwrap();
        let proof = Document::parse_json(&fixture.proof_json).unwrap();
        let ctx = context_for(&chain, "eth_getLogs", &params, &result, Some(&proof));
        EthLogVerifier.verify(&ctx).unwrap();
    }

    #[test]
    fn test_proven_log_outside_filter() {
        let chain = eth_chain(1);
        let fixture = logs_fixture();
        let params = Document::parse_json(format!(
            r#"[{{"address":"{}"}}]"#,
            bytes_to_hex(&[0x01u8; 20])
        ))
        .unwrap();
        let result = Document::parse_json(&fixture.result_json).unwrap();
        let proof = Document::parse_json(&fixture.proof_json).unwrap();
        let ctx = context_for(&chain, "eth_getLogs", &params, &result, Some(&proof));
        assert!(matches!(
            EthLogVerifier.verify(&ctx),
            Err(VerificationError::FilterMismatch(_))
        ));
    }

    #[test]
    fn test_fabricated_log_rejected() {
        let chain = eth_chain(1);
        let fixture = logs_fixture();
        let params = Document::parse_json("[{}]").unwrap();
        let tampered = fixture.result_json.replace("\"data\":\"0x01\"", "\"data\":\"0xff\"");
        let result = Document::parse_json(tampered).unwrap();
        let proof = Document::parse_json(&fixture.proof_json).unwrap();
        let ctx = context_for(&chain, "eth_getLogs", &params, &result, Some(&proof));
        assert!(matches!(
            EthLogVerifier.verify(&ctx),
            Err(VerificationError::ProofMismatch(_))
        ));
    }

    #[test]
    fn test_empty_result_needs_no_proof() {
        let chain = eth_chain(1);
        let params = Document::parse_json("[{}]").unwrap();
        let result = Document::parse_json("[]").unwrap();
        let ctx = context_for(&chain, "eth_getLogs", &params, &result, None);
        assert!(EthLogVerifier.verify(&ctx).is_ok());
    }
}
