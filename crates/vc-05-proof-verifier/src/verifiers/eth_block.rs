//! Block verification (`eth_getBlockByNumber`, `eth_getBlockByHash`).
//!
//! The header is rebuilt from the result and must hash to `result.hash`.
//! Transactions are checked against the raw transactions in
//! `in3.proof.transactions` and the header's `transactionsRoot`.

use crate::domain::errors::VerificationError;
use crate::domain::filter::BlockTag;
use crate::domain::header::EthHeader;
use crate::domain::transaction::DecodedTransaction;
use crate::ports::{ProofContext, Verifier};
use crate::verifiers::common::{ensure, hex_list, trust_header};
use crate::verifiers::eth_tx::check_transaction_fields;
use tracing::trace;
use vc_01_byte_codec::{bytes_to_hex, keccak256};
use vc_02_token_model::TokenKind;
use vc_04_merkle_trie::ordered_trie_root;

/// Block header and body verifier.
#[derive(Debug, Default)]
pub struct EthBlockVerifier;

impl Verifier for EthBlockVerifier {
    fn name(&self) -> &'static str {
        "eth-block"
    }

    fn supports(&self, method: &str) -> bool {
        matches!(method, "eth_getBlockByNumber" | "eth_getBlockByHash")
    }

    fn verify(&self, ctx: &ProofContext<'_>) -> Result<(), VerificationError> {
        // Absence of a block cannot be proven.
        if ctx.result.is_null() {
            return Ok(());
        }

        let header = EthHeader::from_token(&ctx.result)?;
        let hash = header.hash();
        let claimed = ctx.result.field("hash")?.as_hash()?;
        if claimed != hash {
            return Err(VerificationError::BlockHashMismatch {
                expected: bytes_to_hex(&claimed),
                computed: bytes_to_hex(&hash),
            });
        }

        let requested = ctx
            .param(0)
            .ok_or_else(|| VerificationError::InvalidProofData("missing block parameter".into()))?;
        if ctx.method == "eth_getBlockByHash" {
            ensure(requested.as_hash()? == hash, "blockHash")?;
        } else if let BlockTag::Number(number) = BlockTag::from_token(&requested)? {
            ensure(number == header.number, "number")?;
        }

        verify_transactions(ctx, &header)?;
        trust_header(ctx, &header)?.commit(ctx)?;
        trace!(number = header.number, "[vc-05] Block verified");
        Ok(())
    }
}

fn verify_transactions(ctx: &ProofContext<'_>, header: &EthHeader) -> Result<(), VerificationError> {
    let listed = match ctx.result.get("transactions") {
        Some(list) if !list.is_null() => list.as_array()?,
        _ => Vec::new(),
    };
    if listed.is_empty() {
        return ensure(
            header.transactions_root == vc_04_merkle_trie::EMPTY_TRIE_ROOT,
            "transactions",
        );
    }

    let raw = hex_list(&ctx.proof_field("transactions")?)?;
    ensure(raw.len() == listed.len(), "transactions")?;
    ensure(
        ordered_trie_root(&raw) == header.transactions_root,
        "transactionsRoot",
    )?;

    for (item, raw) in listed.iter().zip(&raw) {
        let tx_hash = keccak256(raw);
        if item.kind() == TokenKind::Object {
            ensure(item.field("hash")?.as_hash()? == tx_hash, "transaction hash")?;
            check_transaction_fields(item, &DecodedTransaction::decode(raw)?)?;
        } else {
            ensure(item.as_hash()? == tx_hash, "transaction hash")?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::header::EthHeader;
    use crate::ports::ProofPolicy;
    use crate::test_utils::{
        block_json, clique_chain, context_for, context_with_policy, eth_chain, sample_header,
        seal_clique_header, sign_block, signed_legacy, signer_key,
    };
    use k256::ecdsa::SigningKey;
    use vc_02_token_model::Document;

    fn header_with_txs(raw: &[Vec<u8>]) -> EthHeader {
        let mut header = sample_header(100);
        header.transactions_root = ordered_trie_root(raw);
        header
    }

    #[test]
    fn test_block_by_number_with_hashes() {
        let chain = eth_chain(1);
        let raw = vec![signed_legacy(1, 0), signed_legacy(1, 1)];
        let header = header_with_txs(&raw);
        let result = Document::parse_json(block_json(&header, &raw, false)).unwrap();
        let params = Document::parse_json(r#"["0x64", false]"#).unwrap();
        let proof = Document::parse_json(format!(
            r#"{{"transactions":["{}","{}"]}}"#,
            bytes_to_hex(&raw[0]),
            bytes_to_hex(&raw[1])
        ))
        .unwrap();
        let ctx = context_for(&chain, "eth_getBlockByNumber", &params, &result, Some(&proof));
        EthBlockVerifier.verify(&ctx).unwrap();
    }

    #[test]
    fn test_full_transactions_checked() {
        let chain = eth_chain(1);
        let raw = vec![signed_legacy(1, 7)];
        let header = header_with_txs(&raw);
        let result = Document::parse_json(block_json(&header, &raw, true)).unwrap();
        let params = Document::parse_json(r#"["0x64", true]"#).unwrap();
        let proof = Document::parse_json(format!(
            r#"{{"transactions":["{}"]}}"#,
            bytes_to_hex(&raw[0])
        ))
        .unwrap();
        let ctx = context_for(&chain, "eth_getBlockByNumber", &params, &result, Some(&proof));
        EthBlockVerifier.verify(&ctx).unwrap();

        let tampered = block_json(&header, &raw, true).replace("\"nonce\":\"0x7\"", "\"nonce\":\"0x8\"");
        let result = Document::parse_json(tampered).unwrap();
        let ctx = context_for(&chain, "eth_getBlockByNumber", &params, &result, Some(&proof));
        assert!(matches!(
            EthBlockVerifier.verify(&ctx),
            Err(VerificationError::ProofMismatch(_))
        ));
    }

    #[test]
    fn test_hash_mismatch_detected() {
        let chain = eth_chain(1);
        let header = sample_header(100);
        let json = block_json(&header, &[], false)
            .replace(&bytes_to_hex(&header.hash()), &bytes_to_hex(&[0xee; 32]));
        let result = Document::parse_json(json).unwrap();
        let params = Document::parse_json(r#"["0x64", false]"#).unwrap();
        let ctx = context_for(&chain, "eth_getBlockByNumber", &params, &result, None);
        assert!(matches!(
            EthBlockVerifier.verify(&ctx),
            Err(VerificationError::BlockHashMismatch { .. })
        ));
    }

    #[test]
    fn test_wrong_number_rejected() {
        let chain = eth_chain(1);
        let header = sample_header(100);
        let result = Document::parse_json(block_json(&header, &[], false)).unwrap();
        let params = Document::parse_json(r#"["0x65", false]"#).unwrap();
        let ctx = context_for(&chain, "eth_getBlockByNumber", &params, &result, None);
        assert!(EthBlockVerifier.verify(&ctx).is_err());

        let latest = Document::parse_json(r#"["latest", false]"#).unwrap();
        let ctx = context_for(&chain, "eth_getBlockByNumber", &latest, &result, None);
        assert!(EthBlockVerifier.verify(&ctx).is_ok());
    }

    #[test]
    fn test_missing_transactions_proof() {
        let chain = eth_chain(1);
        let raw = vec![signed_legacy(1, 0)];
        let header = header_with_txs(&raw);
        let result = Document::parse_json(block_json(&header, &raw, false)).unwrap();
        let params = Document::parse_json(r#"["0x64", false]"#).unwrap();
        let ctx = context_for(&chain, "eth_getBlockByNumber", &params, &result, None);
        assert!(matches!(
            EthBlockVerifier.verify(&ctx),
            Err(VerificationError::MissingProof(_))
        ));
    }

    #[test]
    fn test_node_signatures_required() {
        let chain = eth_chain(1);
        let header = sample_header(100);
        let result = Document::parse_json(block_json(&header, &[], false)).unwrap();
        let params = Document::parse_json(r#"["0x64", false]"#).unwrap();
        let (key, address) = signer_key(1);
        let signature = sign_block(&key, &header.hash(), header.number);
        let proof = Document::parse_json(format!(r#"{{"signatures":[{signature}]}}"#)).unwrap();

        let policy = ProofPolicy {
            signers: vec![address],
            signature_count: 1,
            ..ProofPolicy::default()
        };
        let ctx = context_with_policy(
            &chain,
            "eth_getBlockByNumber",
            &params,
            &result,
            Some(&proof),
            &policy,
        );
        EthBlockVerifier.verify(&ctx).unwrap();

        let (_, stranger) = signer_key(2);
        let strict = ProofPolicy {
            signers: vec![stranger],
            signature_count: 1,
            ..ProofPolicy::default()
        };
        let ctx = context_with_policy(
            &chain,
            "eth_getBlockByNumber",
            &params,
            &result,
            Some(&proof),
            &strict,
        );
        assert!(matches!(
            EthBlockVerifier.verify(&ctx),
            Err(VerificationError::SignatureMismatch(_))
        ));

        let two = ProofPolicy {
            signers: vec![address, stranger],
            signature_count: 2,
            ..ProofPolicy::default()
        };
        let ctx = context_with_policy(
            &chain,
            "eth_getBlockByNumber",
            &params,
            &result,
            Some(&proof),
            &two,
        );
        assert!(matches!(
            EthBlockVerifier.verify(&ctx),
            Err(VerificationError::InsufficientSignatures {
                got: 1,
                required: 2
            })
        ));
    }

    #[test]
    fn test_clique_seal_checked() {
        let (key, validator) = signer_key(3);
        let chain = clique_chain(5, 30000, vec![validator]);
        let mut header = sample_header(100);
        seal_clique_header(&mut header, &key, &[]);
        let result = Document::parse_json(block_json(&header, &[], false)).unwrap();
        let params = Document::parse_json(r#"["0x64", false]"#).unwrap();
        let ctx = context_for(&chain, "eth_getBlockByNumber", &params, &result, None);
        EthBlockVerifier.verify(&ctx).unwrap();

        let outsider = SigningKey::from_slice(&[0x77; 32]).unwrap();
        let mut forged = sample_header(100);
        seal_clique_header(&mut forged, &outsider, &[]);
        let result = Document::parse_json(block_json(&forged, &[], false)).unwrap();
        let ctx = context_for(&chain, "eth_getBlockByNumber", &params, &result, None);
        assert!(matches!(
            EthBlockVerifier.verify(&ctx),
            Err(VerificationError::UnknownValidator { block: 100, .. })
        ));
    }

    #[test]
    fn test_clique_finality() {
        let (key_a, a) = signer_key(4);
        let (key_b, b) = signer_key(5);
        let chain = clique_chain(5, 30000, vec![a, b]);

        let mut header = sample_header(100);
        seal_clique_header(&mut header, &key_a, &[]);
        let mut next = sample_header(101);
        next.parent_hash = header.hash();
        seal_clique_header(&mut next, &key_b, &[]);

        let result = Document::parse_json(block_json(&header, &[], false)).unwrap();
        let params = Document::parse_json(r#"["0x64", false]"#).unwrap();
        let proof = Document::parse_json(format!(
            r#"{{"finalityBlocks":["{}"]}}"#,
            bytes_to_hex(&next.encode())
        ))
        .unwrap();
        let policy = ProofPolicy {
            finality: 100,
            ..ProofPolicy::default()
        };
        let ctx = context_with_policy(
            &chain,
            "eth_getBlockByNumber",
            &params,
            &result,
            Some(&proof),
            &policy,
        );
        EthBlockVerifier.verify(&ctx).unwrap();

        let empty = Document::parse_json(r#"{"finalityBlocks":[]}"#).unwrap();
        let ctx = context_with_policy(
            &chain,
            "eth_getBlockByNumber",
            &params,
            &result,
            Some(&empty),
            &policy,
        );
        assert!(matches!(
            EthBlockVerifier.verify(&ctx),
            Err(VerificationError::InsufficientFinality {
                got: 1,
                required: 2
            })
        ));
    }

    #[test]
    fn test_epoch_header_updates_validators() {
        let (key_a, a) = signer_key(6);
        let (_, b) = signer_key(7);
        let chain = clique_chain(5, 100, vec![a]);
        let mut epoch = sample_header(100);
        seal_clique_header(&mut epoch, &key_a, &[a, b]);
        let result = Document::parse_json(block_json(&epoch, &[], false)).unwrap();
        let params = Document::parse_json(r#"["0x64", false]"#).unwrap();
        let ctx = context_for(&chain, "eth_getBlockByNumber", &params, &result, None);
        EthBlockVerifier.verify(&ctx).unwrap();

        let mut expected = vec![a, b];
        expected.sort();
        assert_eq!(chain.validators_at(150), Some(expected));
    }

    #[test]
    fn test_epoch_header_cannot_vouch_for_itself() {
        let (key_a, a) = signer_key(8);
        let (_, b) = signer_key(9);
        let chain = clique_chain(5, 100, vec![a, b]);
        let mut before = vec![a, b];
        before.sort();

        // Sealed by one of two validators, announcing a set of just itself.
        let mut epoch = sample_header(100);
        seal_clique_header(&mut epoch, &key_a, &[a]);
        let result = Document::parse_json(block_json(&epoch, &[], false)).unwrap();
        let params = Document::parse_json(r#"["0x64", false]"#).unwrap();
        let proof = Document::parse_json(r#"{"finalityBlocks":[]}"#).unwrap();
        let policy = ProofPolicy {
            finality: 100,
            ..ProofPolicy::default()
        };
        let ctx = context_with_policy(
            &chain,
            "eth_getBlockByNumber",
            &params,
            &result,
            Some(&proof),
            &policy,
        );
        assert!(matches!(
            EthBlockVerifier.verify(&ctx),
            Err(VerificationError::InsufficientFinality {
                got: 1,
                required: 2
            })
        ));
        assert_eq!(chain.validators_at(150), Some(before.clone()));
        assert_eq!(chain.validators_at(100), Some(before));
    }

    #[test]
    fn test_epoch_header_sealed_by_announced_outsider_rejected() {
        let (_, a) = signer_key(10);
        let (key_b, b) = signer_key(11);
        let chain = clique_chain(5, 100, vec![a]);

        // b is only in the set it announces, not in the set before it.
        let mut epoch = sample_header(100);
        seal_clique_header(&mut epoch, &key_b, &[a, b]);
        let result = Document::parse_json(block_json(&epoch, &[], false)).unwrap();
        let params = Document::parse_json(r#"["0x64", false]"#).unwrap();
        let ctx = context_for(&chain, "eth_getBlockByNumber", &params, &result, None);
        assert!(matches!(
            EthBlockVerifier.verify(&ctx),
            Err(VerificationError::UnknownValidator { block: 100, .. })
        ));
        assert_eq!(chain.validators_at(150), Some(vec![a]));
    }

    #[test]
    fn test_rejected_epoch_response_leaves_history() {
        let (key_a, a) = signer_key(12);
        let (_, b) = signer_key(13);
        let chain = clique_chain(5, 100, vec![a]);
        let mut epoch = sample_header(100);
        seal_clique_header(&mut epoch, &key_a, &[a, b]);
        let result = Document::parse_json(block_json(&epoch, &[], false)).unwrap();
        let params = Document::parse_json(r#"["0x64", false]"#).unwrap();

        // Seal is valid, but the requested node signature is missing.
        let proof = Document::parse_json(r#"{"signatures":[]}"#).unwrap();
        let policy = ProofPolicy {
            signers: vec![[0x99; 20]],
            signature_count: 1,
            ..ProofPolicy::default()
        };
        let ctx = context_with_policy(
            &chain,
            "eth_getBlockByNumber",
            &params,
            &result,
            Some(&proof),
            &policy,
        );
        assert!(EthBlockVerifier.verify(&ctx).is_err());
        assert_eq!(chain.validators_at(150), Some(vec![a]));
    }
}
