//! Bitcoin verification (`getblockheader`, `getblock`, `getrawtransaction`,
//! `btc_proofTarget`). Only the non-verbose (hex) result forms are covered.
//!
//! Proof fields:
//!
//! | Field | Contents |
//! |-------|----------|
//! | `final` | concatenated finality headers following the block |
//! | `cbtx` | coinbase transaction (BIP34 height) |
//! | `cbtxMerkleProof` | concatenated branch hashes of the coinbase |
//! | `block` | 80-byte header (`getrawtransaction`) |
//! | `txIndex`, `merkleProof` | transaction position and branch |

use crate::config::BtcParams;
use crate::domain::btc::{
    check_linkage, compact_to_target, merkle_root, merkle_root_from_branch, parse_block,
    parse_branch, parse_headers, retarget_bounds, reversed, work, within_deviation, BtcHeader,
    BtcTransaction,
};
use crate::domain::errors::VerificationError;
use crate::ports::{ProofContext, Verifier};
use crate::verifiers::common::ensure;
use tracing::{debug, warn};
use vc_02_token_model::{Token, TokenKind};

/// Periods requested per `btc_proofTarget` call.
const MAX_TARGET_PERIODS: u64 = 20;

fn btc_params<'a>(ctx: &ProofContext<'a>) -> Result<&'a BtcParams, VerificationError> {
    ctx.chain
        .config()
        .btc
        .as_ref()
        .ok_or_else(|| VerificationError::InvalidProofData("chain has no bitcoin parameters".into()))
}

fn hex_result(ctx: &ProofContext<'_>) -> Result<Vec<u8>, VerificationError> {
    if ctx.result.kind() != TokenKind::String {
        return Err(VerificationError::UnsupportedMethod(format!(
            "{} with verbose output",
            ctx.method
        )));
    }
    Ok(ctx.result.as_bytes()?)
}

fn optional_bytes(proof: &Token<'_>, key: &str) -> Result<Option<Vec<u8>>, VerificationError> {
    match proof.get(key).filter(|t| !t.is_null()) {
        Some(t) => Ok(Some(t.as_bytes()?)),
        None => Ok(None),
    }
}

/// Height of a block proven by its coinbase transaction.
fn proven_height(
    header: &BtcHeader,
    proof: &Token<'_>,
    coinbase: Option<&BtcTransaction>,
) -> Result<u64, VerificationError> {
    if let Some(raw) = optional_bytes(proof, "cbtx")? {
        let tx = BtcTransaction::parse(&raw)?;
        let branch = parse_branch(&optional_bytes(proof, "cbtxMerkleProof")?.unwrap_or_default())?;
        ensure(
            merkle_root_from_branch(tx.txid(), 0, &branch) == header.merkle_root,
            "coinbase merkle proof",
        )?;
        return tx.bip34_height();
    }
    match coinbase {
        Some(tx) => tx.bip34_height(),
        None => Err(VerificationError::MissingProof("cbtx")),
    }
}

/// Finality linkage, proof of work and cumulative work of a header.
/// Returns the finality headers.
fn check_chain_work(
    header: &BtcHeader,
    proof: &Token<'_>,
    expected_bits: u32,
    params: &BtcParams,
) -> Result<Vec<BtcHeader>, VerificationError> {
    let finality = parse_headers(&optional_bytes(proof, "final")?.unwrap_or_default())?;
    check_linkage(header, &finality)?;
    header.check_pow()?;
    for next in &finality {
        next.check_pow()?;
    }

    let expected = compact_to_target(expected_bits)?;
    let mut total = work(header.target()?);
    for next in &finality {
        total = total.saturating_add(work(next.target()?));
    }
    let required = work(expected).saturating_mul(params.finality_blocks.into());
    if total < required {
        return Err(VerificationError::InsufficientWork);
    }
    Ok(finality)
}

/// Full header check against the expected target of its period.
fn verify_header(
    ctx: &ProofContext<'_>,
    header: &BtcHeader,
    proof: &Token<'_>,
    coinbase: Option<&BtcTransaction>,
) -> Result<(), VerificationError> {
    let params = btc_params(ctx)?;
    let height = proven_height(header, proof, coinbase)?;
    let period = height / params.retarget_interval;
    let expected_bits = expected_period_target(ctx, period, params)?;

    let expected = compact_to_target(expected_bits)?;
    if !within_deviation(expected, header.target()?, params.max_target_deviation_percent) {
        return Err(VerificationError::TargetMismatch {
            expected: expected_bits,
            actual: header.bits,
        });
    }
    check_chain_work(header, proof, expected_bits, params)?;
    debug!(height, period, "[vc-05] Bitcoin header verified");
    Ok(())
}

fn expected_period_target(
    ctx: &ProofContext<'_>,
    period: u64,
    params: &BtcParams,
) -> Result<u32, VerificationError> {
    if let Some(bits) = ctx.chain.period_target(period) {
        return Ok(bits);
    }
    let sub = ctx.sub_requester("btc_proofTarget")?;
    let verified = ctx.chain.nearest_period(period).map_or(0, |(p, _)| p);
    let request = format!(
        "[{period},{verified},{},{MAX_TARGET_PERIODS},0]",
        params.max_target_deviation_percent
    );
    debug!(period, verified, "[vc-05] Requesting period target proof");
    sub.request("btc_proofTarget", &request)?;
    ctx.chain.period_target(period).ok_or_else(|| {
        VerificationError::SubRequest(format!("target of period {period} was not proven"))
    })
}

/// Bitcoin verifier.
#[derive(Debug, Default)]
pub struct BtcVerifier;

impl BtcVerifier {
    fn verify_block_header(&self, ctx: &ProofContext<'_>) -> Result<(), VerificationError> {
        let header = BtcHeader::parse(&hex_result(ctx)?)?;
        self.check_requested_hash(ctx, &header)?;
        verify_header(ctx, &header, &ctx.require_proof()?, None)
    }

    fn verify_block(&self, ctx: &ProofContext<'_>) -> Result<(), VerificationError> {
        let (header, transactions) = parse_block(&hex_result(ctx)?)?;
        self.check_requested_hash(ctx, &header)?;
        let txids: Vec<_> = transactions.iter().map(BtcTransaction::txid).collect();
        ensure(merkle_root(&txids) == header.merkle_root, "merkle root")?;
        verify_header(ctx, &header, &ctx.require_proof()?, transactions.first())
    }

    fn verify_transaction(&self, ctx: &ProofContext<'_>) -> Result<(), VerificationError> {
        let tx = BtcTransaction::parse(&hex_result(ctx)?)?;
        let requested = ctx
            .param(0)
            .ok_or_else(|| VerificationError::InvalidProofData("missing txid".into()))?
            .as_hash()?;
        ensure(reversed(&tx.txid()) == requested, "txid")?;

        let proof = ctx.require_proof()?;
        let header = BtcHeader::parse(&ctx.proof_field("block")?.as_bytes()?)?;
        if let Some(block_hash) = ctx.param(2) {
            ensure(block_hash.as_hash()? == header.display_hash(), "blockhash")?;
        }
        let index = ctx.proof_field("txIndex")?.as_u64()?;
        let branch = parse_branch(&ctx.proof_field("merkleProof")?.as_bytes()?)?;
        ensure(
            merkle_root_from_branch(tx.txid(), index, &branch) == header.merkle_root,
            "transaction merkle proof",
        )?;
        verify_header(ctx, &header, &proof, None)
    }

    fn verify_targets(&self, ctx: &ProofContext<'_>) -> Result<(), VerificationError> {
        let params = btc_params(ctx)?;
        let limit = compact_to_target(params.pow_limit_bits)?;
        let entries = ctx.result.as_array()?;
        let mut proven = Vec::with_capacity(entries.len());
        for entry in entries {
            let header = BtcHeader::parse(&entry.field("block")?.as_bytes()?)?;
            let height = proven_height(&header, &entry, None)?;
            let period = height / params.retarget_interval;
            if let Some(dap) = entry.get("dap").filter(|t| !t.is_null()) {
                ensure(dap.as_u64()? == period, "dap")?;
            }
            if header.target()? > limit {
                return Err(VerificationError::InvalidProofData(format!(
                    "target of period {period} is above the pow limit"
                )));
            }
            check_chain_work(&header, &entry, header.bits, params)?;
            proven.push((period, header.bits));
        }

        proven.sort_unstable();
        for (period, bits) in proven {
            if let Some((previous_period, previous_bits)) =
                ctx.chain.nearest_period(period.saturating_sub(1))
            {
                if previous_period < period {
                    let start = compact_to_target(previous_bits)?;
                    let mut bounds = (start, start);
                    for _ in previous_period..period {
                        // Saturates after a few hundred periods at most.
                        if bounds.0.is_zero() && bounds.1 >= limit {
                            break;
                        }
                        bounds = (
                            retarget_bounds(bounds.0, params)?.0,
                            retarget_bounds(bounds.1, params)?.1,
                        );
                    }
                    let target = compact_to_target(bits)?;
                    if target < bounds.0 || target > bounds.1 {
                        warn!(period, "[vc-05] Period target outside retarget bounds");
                        return Err(VerificationError::TargetMismatch {
                            expected: previous_bits,
                            actual: bits,
                        });
                    }
                }
            }
            ctx.chain.store_period_target(period, bits);
        }
        Ok(())
    }

    fn check_requested_hash(
        &self,
        ctx: &ProofContext<'_>,
        header: &BtcHeader,
    ) -> Result<(), VerificationError> {
        let requested = ctx
            .param(0)
            .ok_or_else(|| VerificationError::InvalidProofData("missing block hash".into()))?
            .as_hash()?;
        ensure(requested == header.display_hash(), "block hash")
    }
}

impl Verifier for BtcVerifier {
    fn name(&self) -> &'static str {
        "btc"
    }

    fn supports(&self, method: &str) -> bool {
        matches!(
            method,
            "getblockheader" | "getblock" | "getrawtransaction" | "btc_proofTarget"
        )
    }

    fn verify(&self, ctx: &ProofContext<'_>) -> Result<(), VerificationError> {
        match ctx.method {
            "getblockheader" => self.verify_block_header(ctx),
            "getblock" => self.verify_block(ctx),
            "getrawtransaction" => self.verify_transaction(ctx),
            "btc_proofTarget" => self.verify_targets(ctx),
            other => Err(VerificationError::UnsupportedMethod(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ChainConfig;
    use crate::domain::chain::ChainSpec;
    use crate::test_utils::{
        btc_chain, btc_chain_fixture, context_for, ScriptedSubRequester, BTC_CHAIN_ID,
    };
    use vc_01_byte_codec::bytes_to_hex;
    use vc_02_token_model::Document;

    fn header_params(header: &BtcHeader) -> Document {
        Document::parse_json(format!(r#"["{}",false]"#, bytes_to_hex(&header.display_hash())))
            .unwrap()
    }

    #[test]
    fn test_block_header_verified() {
        let fixture = btc_chain_fixture(100, 3);
        let chain = btc_chain(&fixture);
        let result =
            Document::parse_json(format!(r#""{}""#, bytes_to_hex(&fixture.block.to_bytes())))
                .unwrap();
        let proof = Document::parse_json(fixture.proof_json()).unwrap();
        let params = header_params(&fixture.block);
        let ctx = context_for(&chain, "getblockheader", &params, &result, Some(&proof));
        BtcVerifier.verify(&ctx).unwrap();
    }

    #[test]
    fn test_broken_linkage_detected() {
        let mut fixture = btc_chain_fixture(100, 3);
        fixture.finality.swap(0, 1);
        let chain = btc_chain(&fixture);
        let result =
            Document::parse_json(format!(r#""{}""#, bytes_to_hex(&fixture.block.to_bytes())))
                .unwrap();
        let proof = Document::parse_json(fixture.proof_json()).unwrap();
        let params = header_params(&fixture.block);
        let ctx = context_for(&chain, "getblockheader", &params, &result, Some(&proof));
        assert!(matches!(
            BtcVerifier.verify(&ctx),
            Err(VerificationError::ChainLinkage { index: 0 })
        ));
    }

    #[test]
    fn test_insufficient_finality_work() {
        let mut fixture = btc_chain_fixture(100, 3);
        fixture.finality.truncate(0);
        let chain = btc_chain(&fixture);
        let result =
            Document::parse_json(format!(r#""{}""#, bytes_to_hex(&fixture.block.to_bytes())))
                .unwrap();
        let proof = Document::parse_json(fixture.proof_json()).unwrap();
        let params = header_params(&fixture.block);
        let ctx = context_for(&chain, "getblockheader", &params, &result, Some(&proof));
        assert!(matches!(
            BtcVerifier.verify(&ctx),
            Err(VerificationError::InsufficientWork)
        ));
    }

    #[test]
    fn test_wrong_requested_hash() {
        let fixture = btc_chain_fixture(100, 3);
        let chain = btc_chain(&fixture);
        let result =
            Document::parse_json(format!(r#""{}""#, bytes_to_hex(&fixture.block.to_bytes())))
                .unwrap();
        let proof = Document::parse_json(fixture.proof_json()).unwrap();
        let params = header_params(&fixture.finality[0]);
        let ctx = context_for(&chain, "getblockheader", &params, &result, Some(&proof));
        assert!(matches!(
            BtcVerifier.verify(&ctx),
            Err(VerificationError::ProofMismatch(_))
        ));
    }

    #[test]
    fn test_target_mismatch_with_cached_period() {
        let fixture = btc_chain_fixture(100, 3);
        let chain = btc_chain(&fixture);
        chain.store_period_target(0, 0x1d00_ffff);
        let result =
            Document::parse_json(format!(r#""{}""#, bytes_to_hex(&fixture.block.to_bytes())))
                .unwrap();
        let proof = Document::parse_json(fixture.proof_json()).unwrap();
        let params = header_params(&fixture.block);
        let ctx = context_for(&chain, "getblockheader", &params, &result, Some(&proof));
        assert!(matches!(
            BtcVerifier.verify(&ctx),
            Err(VerificationError::TargetMismatch { .. })
        ));
    }

    #[test]
    fn test_raw_transaction_inclusion() {
        let fixture = btc_chain_fixture(100, 3);
        let chain = btc_chain(&fixture);
        let tx = &fixture.transactions[1];
        let txid = reversed(&BtcTransaction::parse(tx).unwrap().txid());
        let params = Document::parse_json(format!(
            r#"["{}",false,"{}"]"#,
            bytes_to_hex(&txid),
            bytes_to_hex(&fixture.block.display_hash())
        ))
        .unwrap();
        let result = Document::parse_json(format!(r#""{}""#, bytes_to_hex(tx))).unwrap();
        let proof = Document::parse_json(fixture.tx_proof_json(1)).unwrap();
        let ctx = context_for(&chain, "getrawtransaction", &params, &result, Some(&proof));
        BtcVerifier.verify(&ctx).unwrap();

        let wrong_index = Document::parse_json(fixture.tx_proof_json(0)).unwrap();
        let ctx = context_for(&chain, "getrawtransaction", &params, &result, Some(&wrong_index));
        assert!(BtcVerifier.verify(&ctx).is_err());
    }

    #[test]
    fn test_full_block_uses_coinbase_height() {
        let fixture = btc_chain_fixture(100, 3);
        let chain = btc_chain(&fixture);
        let result =
            Document::parse_json(format!(r#""{}""#, bytes_to_hex(&fixture.block_bytes())))
                .unwrap();
        let proof = Document::parse_json(fixture.finality_only_proof_json()).unwrap();
        let params = Document::parse_json(format!(
            r#"["{}",0]"#,
            bytes_to_hex(&fixture.block.display_hash())
        ))
        .unwrap();
        let ctx = context_for(&chain, "getblock", &params, &result, Some(&proof));
        BtcVerifier.verify(&ctx).unwrap();
    }

    #[test]
    fn test_unknown_period_fetched_through_sub_request() {
        let fixture = btc_chain_fixture(100, 3);
        let chain = btc_chain(&fixture);
        let empty = crate::test_utils::btc_chain_without_checkpoints();
        let result =
            Document::parse_json(format!(r#""{}""#, bytes_to_hex(&fixture.block.to_bytes())))
                .unwrap();
        let proof = Document::parse_json(fixture.proof_json()).unwrap();
        let params = header_params(&fixture.block);

        let no_channel = context_for(&empty, "getblockheader", &params, &result, Some(&proof));
        assert!(matches!(
            BtcVerifier.verify(&no_channel),
            Err(VerificationError::SubRequest(_))
        ));

        let sub = ScriptedSubRequester::new(&empty, fixture.target_proof_json());
        let mut ctx = context_for(&empty, "getblockheader", &params, &result, Some(&proof));
        ctx.sub = Some(&sub);
        BtcVerifier.verify(&ctx).unwrap();
        assert_eq!(empty.period_target(0), chain.period_target(0));
        assert_eq!(sub.calls(), 1);
    }

    #[test]
    fn test_target_proof_far_from_checkpoint_terminates() {
        // Height of period 10^12, with the only known target at period 0.
        let fixture = btc_chain_fixture(2016 * 1_000_000_000_000, 3);
        let params = BtcParams {
            checkpoints: vec![(0, fixture.block.bits)],
            ..BtcParams::regtest()
        };
        let chain = ChainSpec::new(ChainConfig::bitcoin(BTC_CHAIN_ID, params)).unwrap();
        let result = Document::parse_json(fixture.target_proof_json()).unwrap();
        let request = Document::parse_json("[]").unwrap();
        let ctx = context_for(&chain, "btc_proofTarget", &request, &result, None);

        BtcVerifier.verify(&ctx).unwrap();
        assert_eq!(
            chain.period_target(1_000_000_000_000),
            Some(fixture.block.bits)
        );
    }
}
