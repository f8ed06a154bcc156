//! Helpers shared by the Ethereum verifiers.

use crate::domain::ecdsa::{recover_address, RecoverableSignature};
use crate::domain::errors::VerificationError;
use crate::domain::header::EthHeader;
use crate::ports::ProofContext;
use std::collections::BTreeSet;
use tracing::debug;
use vc_01_byte_codec::{bytes_to_hex, keccak256, pad_left_32, Address, Hash, U256};
use vc_02_token_model::{Token, TokenKind};

/// Hex strings of a proof array as byte vectors.
pub(crate) fn hex_list(token: &Token<'_>) -> Result<Vec<Vec<u8>>, VerificationError> {
    token
        .as_array()?
        .iter()
        .map(|item| item.as_bytes().map_err(VerificationError::from))
        .collect()
}

/// Fail with `ProofMismatch` naming `field` unless `equal`.
pub(crate) fn ensure(equal: bool, field: &str) -> Result<(), VerificationError> {
    if equal {
        Ok(())
    } else {
        Err(VerificationError::mismatch(field))
    }
}

/// Compare an optional result field to a proven quantity.
pub(crate) fn ensure_quantity(
    object: &Token<'_>,
    key: &str,
    proven: U256,
) -> Result<(), VerificationError> {
    match object.get(key).filter(|t| !t.is_null()) {
        Some(claimed) => ensure(claimed.as_u256()? == proven, key),
        None => Ok(()),
    }
}

/// Compare an optional result field to proven bytes.
pub(crate) fn ensure_bytes(
    object: &Token<'_>,
    key: &str,
    proven: &[u8],
) -> Result<(), VerificationError> {
    match object.get(key).filter(|t| !t.is_null()) {
        Some(claimed) => ensure(claimed.as_bytes()? == proven, key),
        None => Ok(()),
    }
}

/// Message a node signs to attest a block: `keccak(hash ‖ be32(number))`.
pub fn block_signature_message(block_hash: &Hash, number: u64) -> Hash {
    let mut preimage = [0u8; 64];
    preimage[..32].copy_from_slice(block_hash);
    preimage[56..].copy_from_slice(&number.to_be_bytes());
    keccak256(&preimage)
}

/// Check node signatures over `(block_hash, number)` against the policy.
pub(crate) fn verify_block_signatures(
    ctx: &ProofContext<'_>,
    block_hash: &Hash,
    number: u64,
) -> Result<(), VerificationError> {
    let required = ctx.policy.signature_count;
    if required == 0 {
        return Ok(());
    }
    let signatures = ctx.proof_field("signatures")?;
    let message = block_signature_message(block_hash, number);

    let mut signers: BTreeSet<Address> = BTreeSet::new();
    for entry in signatures.iter() {
        if entry.kind() != TokenKind::Object {
            continue;
        }
        let signed_hash = entry.field("blockHash")?.as_hash()?;
        let signed_number = entry.field("block")?.as_u64()?;
        if signed_hash != *block_hash || signed_number != number {
            return Err(VerificationError::SignatureMismatch(format!(
                "signature covers block {signed_number} {}",
                bytes_to_hex(&signed_hash)
            )));
        }
        let signature = RecoverableSignature::new(
            pad_left_32(&entry.field("r")?.as_bytes()?)?,
            pad_left_32(&entry.field("s")?.as_bytes()?)?,
            u8::try_from(entry.field("v")?.as_u64()?).map_err(|_| {
                VerificationError::SignatureMismatch("recovery id out of range".into())
            })?,
        )?;
        let signer = recover_address(&message, &signature)?;
        if !ctx.policy.signers.contains(&signer) {
            return Err(VerificationError::SignatureMismatch(format!(
                "signature from unrequested node {}",
                bytes_to_hex(&signer)
            )));
        }
        signers.insert(signer);
    }

    if signers.len() < required {
        return Err(VerificationError::InsufficientSignatures {
            got: signers.len(),
            required,
        });
    }
    Ok(())
}

/// Validator set announced by a Clique epoch header.
///
/// Recorded only after the whole response has verified, see
/// [`TrustedHeader::commit`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ValidatorUpdate {
    pub block: u64,
    pub validators: Vec<Address>,
}

impl ValidatorUpdate {
    pub(crate) fn record(self, ctx: &ProofContext<'_>) -> Result<(), VerificationError> {
        ctx.chain.record_validators(self.block, self.validators)
    }
}

/// A header whose seal, finality and node signatures checked out.
#[derive(Debug, Clone)]
pub(crate) struct TrustedHeader {
    pub hash: Hash,
    pub update: Option<ValidatorUpdate>,
}

impl TrustedHeader {
    /// Record the pending validator transition. Call last, once nothing
    /// else in the response can fail.
    pub(crate) fn commit(self, ctx: &ProofContext<'_>) -> Result<Hash, VerificationError> {
        if let Some(update) = self.update {
            update.record(ctx)?;
        }
        Ok(self.hash)
    }
}

/// Establish trust in a header: Clique seal and finality, then node
/// signatures.
///
/// Seal and finality are judged by the validator set in force before the
/// header, so an epoch header cannot vouch for itself with the set it
/// announces. The announced set is returned as a pending update.
pub(crate) fn trust_header(
    ctx: &ProofContext<'_>,
    header: &EthHeader,
) -> Result<TrustedHeader, VerificationError> {
    let hash = header.hash();
    let mut update = None;

    if let Some(epoch) = ctx.chain.clique_epoch() {
        let is_epoch = header.number % epoch == 0;
        let set_block = if is_epoch {
            header.number.saturating_sub(1)
        } else {
            header.number
        };
        let validators = ctx.chain.validators_at(set_block).unwrap_or_default();
        let signer = check_sealer(&validators, header)?;
        if ctx.policy.finality > 0 {
            verify_clique_finality(ctx, &validators, header, hash, signer)?;
        }
        if is_epoch {
            update = Some(ValidatorUpdate {
                block: header.number,
                validators: header.clique_validators()?,
            });
        }
    }

    verify_block_signatures(ctx, &hash, header.number)?;
    Ok(TrustedHeader { hash, update })
}

fn check_sealer(validators: &[Address], header: &EthHeader) -> Result<Address, VerificationError> {
    let signer = header.clique_signer()?;
    if !validators.contains(&signer) {
        return Err(VerificationError::UnknownValidator {
            block: header.number,
            signer: bytes_to_hex(&signer),
        });
    }
    Ok(signer)
}

fn verify_clique_finality(
    ctx: &ProofContext<'_>,
    validators: &[Address],
    header: &EthHeader,
    hash: Hash,
    signer: Address,
) -> Result<(), VerificationError> {
    let required = (validators.len() * ctx.policy.finality as usize).div_ceil(100);

    let finality_blocks = hex_list(&ctx.proof_field("finalityBlocks")?)?;
    let mut sealers = BTreeSet::from([signer]);
    let mut parent = hash;
    for (index, raw) in finality_blocks.iter().enumerate() {
        if sealers.len() >= required {
            break;
        }
        let next = EthHeader::from_rlp(raw)?;
        if next.parent_hash != parent {
            return Err(VerificationError::ChainLinkage { index });
        }
        sealers.insert(check_sealer(validators, &next)?);
        parent = next.hash();
    }

    debug!(
        block = header.number,
        sealers = sealers.len(),
        required,
        "[vc-05] Clique finality checked"
    );
    if sealers.len() < required {
        return Err(VerificationError::InsufficientFinality {
            got: sealers.len(),
            required,
        });
    }
    Ok(())
}

/// Decode and trust the header carried in `in3.proof.block`.
pub(crate) fn proven_header(
    ctx: &ProofContext<'_>,
) -> Result<(EthHeader, TrustedHeader), VerificationError> {
    let raw = ctx.proof_field("block")?.as_bytes()?;
    let header = EthHeader::from_rlp(&raw)?;
    let trusted = trust_header(ctx, &header)?;
    Ok((header, trusted))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signature_message_layout() {
        let hash = [0x11u8; 32];
        let mut preimage = [0u8; 64];
        preimage[..32].copy_from_slice(&hash);
        preimage[63] = 0x2a;
        assert_eq!(block_signature_message(&hash, 42), keccak256(&preimage));
    }

    #[test]
    fn test_ensure_reports_field() {
        let err = ensure(false, "balance").unwrap_err();
        assert!(err.to_string().contains("balance"));
        assert!(ensure(true, "balance").is_ok());
    }
}
