//! Transaction verification.
//!
//! `in3.proof` carries the block header (`block`), the transaction's index
//! (`txIndex`) and the transaction trie path (`merkleProof`).

use crate::domain::errors::VerificationError;
use crate::domain::filter::BlockTag;
use crate::domain::transaction::DecodedTransaction;
use crate::ports::{ProofContext, Verifier};
use crate::verifiers::common::{ensure, ensure_bytes, ensure_quantity, hex_list, proven_header};
use tracing::trace;
use vc_01_byte_codec::rlp::encode_u64;
use vc_01_byte_codec::{keccak256, U256};
use vc_02_token_model::Token;
use vc_04_merkle_trie::verify_proof;

/// Transaction inclusion verifier.
#[derive(Debug, Default)]
pub struct EthTransactionVerifier;

impl Verifier for EthTransactionVerifier {
    fn name(&self) -> &'static str {
        "eth-transaction"
    }

    fn supports(&self, method: &str) -> bool {
        matches!(
            method,
            "eth_getTransactionByHash"
                | "eth_getTransactionByBlockHashAndIndex"
                | "eth_getTransactionByBlockNumberAndIndex"
        )
    }

    fn verify(&self, ctx: &ProofContext<'_>) -> Result<(), VerificationError> {
        let by_hash = ctx.method == "eth_getTransactionByHash";
        // Absence of a hash cannot be proven without a position.
        if ctx.result.is_null() && by_hash {
            return Ok(());
        }

        let (header, trusted) = proven_header(ctx)?;
        let block_hash = trusted.hash;
        let index = ctx.proof_field("txIndex")?.as_u64()?;
        let merkle_proof = hex_list(&ctx.proof_field("merkleProof")?)?;
        let proven = verify_proof(&header.transactions_root, &encode_u64(index), &merkle_proof)?;

        if !by_hash {
            let block_param = ctx
                .param(0)
                .ok_or_else(|| VerificationError::InvalidProofData("missing block param".into()))?;
            if ctx.method == "eth_getTransactionByBlockHashAndIndex" {
                ensure(block_param.as_hash()? == block_hash, "blockHash")?;
            } else if let BlockTag::Number(n) = BlockTag::from_token(&block_param)? {
                ensure(n == header.number, "blockNumber")?;
            }
            let requested_index = ctx
                .param(1)
                .ok_or_else(|| VerificationError::InvalidProofData("missing index param".into()))?
                .as_u64()?;
            ensure(requested_index == index, "transactionIndex")?;
        }

        let raw = match (proven, ctx.result.is_null()) {
            (None, true) => {
                trusted.commit(ctx)?;
                return Ok(());
            }
            (None, false) => return Err(VerificationError::mismatch("transaction")),
            (Some(_), true) => return Err(VerificationError::mismatch("transaction")),
            (Some(raw), false) => raw,
        };

        let tx_hash = keccak256(&raw);
        ensure(ctx.result.field("hash")?.as_hash()? == tx_hash, "hash")?;
        if by_hash {
            ensure(ctx.param(0).map(|p| p.as_hash()).transpose()? == Some(tx_hash), "hash")?;
        }
        ensure(ctx.result.field("blockHash")?.as_hash()? == block_hash, "blockHash")?;
        ensure_quantity(&ctx.result, "blockNumber", U256::from(header.number))?;
        ensure_quantity(&ctx.result, "transactionIndex", U256::from(index))?;
        check_transaction_fields(&ctx.result, &DecodedTransaction::decode(&raw)?)?;
        trusted.commit(ctx)?;
        trace!(block = header.number, index, "[vc-05] Transaction verified");
        Ok(())
    }
}

/// Compare a JSON transaction object to the decoded raw transaction.
pub(crate) fn check_transaction_fields(
    object: &Token<'_>,
    tx: &DecodedTransaction,
) -> Result<(), VerificationError> {
    ensure_quantity(object, "nonce", U256::from(tx.nonce))?;
    ensure_quantity(object, "gas", U256::from(tx.gas_limit))?;
    ensure_quantity(object, "value", tx.value)?;
    ensure_bytes(object, "input", &tx.input)?;

    match object.get("to") {
        Some(to) if !to.is_null() => ensure(Some(to.as_address()?) == tx.to, "to")?,
        _ => ensure(tx.to.is_none(), "to")?,
    }
    if let Some(from) = object.get("from").filter(|t| !t.is_null()) {
        ensure(from.as_address()? == tx.sender()?, "from")?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{context_for, eth_chain, tx_json, tx_proof_fixture};
    use vc_01_byte_codec::bytes_to_hex;
    use vc_02_token_model::Document;

    #[test]
    fn test_transaction_by_hash() {
        let chain = eth_chain(1);
        let fixture = tx_proof_fixture(3, 1);
        let raw = &fixture.transactions[1];
        let params =
            Document::parse_json(format!(r#"["{}"]"#, bytes_to_hex(&keccak256(raw)))).unwrap();
        let result = Document::parse_json(tx_json(raw, &fixture.header, 1)).unwrap();
        let proof = Document::parse_json(&fixture.proof_json).unwrap();
        let ctx = context_for(&chain, "eth_getTransactionByHash", &params, &result, Some(&proof));
        EthTransactionVerifier.verify(&ctx).unwrap();
    }

    #[test]
    fn test_transaction_by_block_and_index() {
        let chain = eth_chain(1);
        let fixture = tx_proof_fixture(2, 0);
        let raw = &fixture.transactions[0];
        let params = Document::parse_json(format!(r#"["0x{:x}","0x0"]"#, fixture.header.number))
            .unwrap();
        let result = Document::parse_json(tx_json(raw, &fixture.header, 0)).unwrap();
        let proof = Document::parse_json(&fixture.proof_json).unwrap();
        let ctx = context_for(
            &chain,
            "eth_getTransactionByBlockNumberAndIndex",
            &params,
            &result,
            Some(&proof),
        );
        EthTransactionVerifier.verify(&ctx).unwrap();

        let wrong_index = Document::parse_json(format!(
            r#"["0x{:x}","0x1"]"#,
            fixture.header.number
        ))
        .unwrap();
        let ctx = context_for(
            &chain,
            "eth_getTransactionByBlockNumberAndIndex",
            &wrong_index,
            &result,
            Some(&proof),
        );
        assert!(EthTransactionVerifier.verify(&ctx).is_err());
    }

    #[test]
    fn test_tampered_value_rejected() {
        let chain = eth_chain(1);
        let fixture = tx_proof_fixture(2, 1);
        let raw = &fixture.transactions[1];
        let params =
            Document::parse_json(format!(r#"["{}"]"#, bytes_to_hex(&keccak256(raw)))).unwrap();
        let json = tx_json(raw, &fixture.header, 1).replace("\"value\":\"0x1\"", "\"value\":\"0x2\"");
        let result = Document::parse_json(json).unwrap();
        let proof = Document::parse_json(&fixture.proof_json).unwrap();
        let ctx = context_for(&chain, "eth_getTransactionByHash", &params, &result, Some(&proof));
        assert!(matches!(
            EthTransactionVerifier.verify(&ctx),
            Err(VerificationError::ProofMismatch(_))
        ));
    }

    #[test]
    fn test_null_by_hash_accepted_without_proof() {
        let chain = eth_chain(1);
        let params = Document::parse_json(format!(r#"["{}"]"#, bytes_to_hex(&[1u8; 32]))).unwrap();
        let result = Document::parse_json("null").unwrap();
        let ctx = context_for(&chain, "eth_getTransactionByHash", &params, &result, None);
        assert!(EthTransactionVerifier.verify(&ctx).is_ok());
    }

    #[test]
    fn test_proven_absence_by_index() {
        let chain = eth_chain(1);
        let fixture = tx_proof_fixture(2, 5);
        let params = Document::parse_json(format!(r#"["0x{:x}","0x5"]"#, fixture.header.number))
            .unwrap();
        let result = Document::parse_json("null").unwrap();
        let proof = Document::parse_json(&fixture.proof_json).unwrap();
        let ctx = context_for(
            &chain,
            "eth_getTransactionByBlockNumberAndIndex",
            &params,
            &result,
            Some(&proof),
        );
        EthTransactionVerifier.verify(&ctx).unwrap();
    }
}
