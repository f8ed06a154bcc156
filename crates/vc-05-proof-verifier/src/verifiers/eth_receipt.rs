//! Receipt verification (`eth_getTransactionReceipt`).
//!
//! `in3.proof` carries `block`, `txIndex`, the receipt trie path
//! (`merkleProof`) and the transaction trie path (`txProof`).

use crate::domain::errors::VerificationError;
use crate::domain::header::EthHeader;
use crate::domain::receipt::DecodedReceipt;
use crate::ports::{ProofContext, Verifier};
use crate::verifiers::common::{ensure, ensure_quantity, hex_list, proven_header};
use tracing::trace;
use vc_01_byte_codec::rlp::encode_u64;
use vc_01_byte_codec::{keccak256, Hash, U256};
use vc_02_token_model::Token;
use vc_04_merkle_trie::verify_proof;

/// Prove the receipt and transaction at `index` of the block.
pub(crate) fn prove_receipt(
    header: &EthHeader,
    index: u64,
    receipt_proof: &[Vec<u8>],
    tx_proof: &[Vec<u8>],
) -> Result<(DecodedReceipt, Hash), VerificationError> {
    let key = encode_u64(index);
    let receipt = verify_proof(&header.receipts_root, &key, receipt_proof)?
        .ok_or_else(|| VerificationError::mismatch("receipt"))?;
    let tx = verify_proof(&header.transactions_root, &key, tx_proof)?
        .ok_or_else(|| VerificationError::mismatch("transaction"))?;
    Ok((DecodedReceipt::decode(&receipt)?, keccak256(&tx)))
}

/// Compare a JSON log object to a proven log record.
pub(crate) fn log_matches(
    object: &Token<'_>,
    record: &crate::domain::receipt::LogRecord,
) -> Result<bool, VerificationError> {
    if object.field("address")?.as_address()? != record.address {
        return Ok(false);
    }
    let topics = object
        .field("topics")?
        .as_array()?
        .iter()
        .map(|t| t.as_hash())
        .collect::<Result<Vec<Hash>, _>>()?;
    Ok(topics == record.topics && object.field("data")?.as_bytes()? == record.data)
}

/// Receipt verifier.
#[derive(Debug, Default)]
pub struct EthReceiptVerifier;

impl Verifier for EthReceiptVerifier {
    fn name(&self) -> &'static str {
        "eth-receipt"
    }

    fn supports(&self, method: &str) -> bool {
        method == "eth_getTransactionReceipt"
    }

    fn verify(&self, ctx: &ProofContext<'_>) -> Result<(), VerificationError> {
        // Pending or unknown transactions have no receipt to prove.
        if ctx.result.is_null() {
            return Ok(());
        }

        let (header, trusted) = proven_header(ctx)?;
        let block_hash = trusted.hash;
        let index = ctx.proof_field("txIndex")?.as_u64()?;
        let (receipt, tx_hash) = prove_receipt(
            &header,
            index,
            &hex_list(&ctx.proof_field("merkleProof")?)?,
            &hex_list(&ctx.proof_field("txProof")?)?,
        )?;

        let result = &ctx.result;
        ensure(result.field("transactionHash")?.as_hash()? == tx_hash, "transactionHash")?;
        if let Some(requested) = ctx.param(0) {
            ensure(requested.as_hash()? == tx_hash, "transactionHash")?;
        }
        ensure(result.field("blockHash")?.as_hash()? == block_hash, "blockHash")?;
        ensure_quantity(result, "blockNumber", U256::from(header.number))?;
        ensure_quantity(result, "transactionIndex", U256::from(index))?;
        ensure_quantity(result, "cumulativeGasUsed", U256::from(receipt.cumulative_gas_used))?;
        if let Some(status) = receipt.status {
            ensure_quantity(result, "status", U256::from(status))?;
        }
        ensure(
            result.field("logsBloom")?.as_bytes()? == receipt.logs_bloom,
            "logsBloom",
        )?;

        let logs = result.field("logs")?.as_array()?;
        ensure(logs.len() == receipt.logs.len(), "logs")?;
        for (object, record) in logs.iter().zip(&receipt.logs) {
            ensure(log_matches(object, record)?, "log")?;
        }
        trusted.commit(ctx)?;
        trace!(block = header.number, index, "[vc-05] Receipt verified");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{context_for, eth_chain, receipt_fixture};
    use vc_01_byte_codec::bytes_to_hex;
    use vc_02_token_model::Document;

    #[test]
    fn test_receipt_verified() {
        let chain = eth_chain(1);
        let fixture = receipt_fixture(3, 1);
        let params =
            Document::parse_json(format!(r#"["{}"]"#, bytes_to_hex(&fixture.tx_hash))).unwrap();
        let result = Document::parse_json(&fixture.result_json).unwrap();
        let proof = Document::parse_json(&fixture.proof_json).unwrap();
        let ctx = context_for(&chain, "eth_getTransactionReceipt", &params, &result, Some(&proof));
        EthReceiptVerifier.verify(&ctx).unwrap();
    }

    #[test]
    fn test_receipt_log_tampering_detected() {
        let chain = eth_chain(1);
        let fixture = receipt_fixture(2, 0);
        let params =
            Document::parse_json(format!(r#"["{}"]"#, bytes_to_hex(&fixture.tx_hash))).unwrap();
        let tampered = fixture.result_json.replace("\"data\":\"0x01\"", "\"data\":\"0x02\"");
        assert_ne!(tampered, fixture.result_json);
        let result = Document::parse_json(tampered).unwrap();
        let proof = Document::parse_json(&fixture.proof_json).unwrap();
        let ctx = context_for(&chain, "eth_getTransactionReceipt", &params, &result, Some(&proof));
        assert!(matches!(
            EthReceiptVerifier.verify(&ctx),
            Err(VerificationError::ProofMismatch(_))
        ));
    }

    #[test]
    fn test_receipt_for_other_transaction_rejected() {
        let chain = eth_chain(1);
        let fixture = receipt_fixture(2, 0);
        let params = Document::parse_json(format!(r#"["{}"]"#, bytes_to_hex(&[9u8; 32]))).unwrap();
        let result = Document::parse_json(&fixture.result_json).unwrap();
        let proof = Document::parse_json(&fixture.proof_json).unwrap();
        let ctx = context_for(&chain, "eth_getTransactionReceipt", &params, &result, Some(&proof));
        assert!(EthReceiptVerifier.verify(&ctx).is_err());
    }
}
