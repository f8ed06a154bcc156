//! # secp256k1 Recovery
//!
//! Signer recovery for Clique seals and node signatures. Only low-s
//! signatures are accepted (EIP-2).

use crate::domain::errors::VerificationError;
use k256::ecdsa::{RecoveryId, Signature, SigningKey, VerifyingKey};
use vc_01_byte_codec::{keccak256, Address, Hash};

/// `r ‖ s ‖ v` signature with `v` normalized to 0 or 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecoverableSignature {
    /// R component
    pub r: [u8; 32],
    /// S component
    pub s: [u8; 32],
    /// Recovery id (0 or 1)
    pub v: u8,
}

impl RecoverableSignature {
    /// Build from components; `v` may be 0/1 or 27/28.
    pub fn new(r: [u8; 32], s: [u8; 32], v: u8) -> Result<Self, VerificationError> {
        Ok(Self {
            r,
            s,
            v: normalize_v(v)?,
        })
    }

    /// Parse the 65-byte `r ‖ s ‖ v` layout.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, VerificationError> {
        if bytes.len() != 65 {
            return Err(VerificationError::InvalidProofData(format!(
                "signature must be 65 bytes, got {}",
                bytes.len()
            )));
        }
        let mut r = [0u8; 32];
        let mut s = [0u8; 32];
        r.copy_from_slice(&bytes[..32]);
        s.copy_from_slice(&bytes[32..64]);
        Self::new(r, s, bytes[64])
    }

    /// 65-byte `r ‖ s ‖ v` with `v` in {0, 1}.
    pub fn to_bytes(&self) -> [u8; 65] {
        let mut out = [0u8; 65];
        out[..32].copy_from_slice(&self.r);
        out[32..64].copy_from_slice(&self.s);
        out[64] = self.v;
        out
    }
}

fn normalize_v(v: u8) -> Result<u8, VerificationError> {
    match v {
        0 | 1 => Ok(v),
        27 | 28 => Ok(v - 27),
        other => Err(VerificationError::SignatureMismatch(format!(
            "invalid recovery id {other}"
        ))),
    }
}

/// Recover the address that signed `hash`.
pub fn recover_address(
    hash: &Hash,
    signature: &RecoverableSignature,
) -> Result<Address, VerificationError> {
    let mut sig_bytes = [0u8; 64];
    sig_bytes[..32].copy_from_slice(&signature.r);
    sig_bytes[32..].copy_from_slice(&signature.s);

    let sig = Signature::from_slice(&sig_bytes)
        .map_err(|_| VerificationError::SignatureMismatch("malformed r/s".into()))?;
    if sig.normalize_s().is_some() {
        return Err(VerificationError::SignatureMismatch(
            "high-s signature".into(),
        ));
    }
    let recovery_id = RecoveryId::from_byte(signature.v)
        .ok_or_else(|| VerificationError::SignatureMismatch("invalid recovery id".into()))?;

    let key = VerifyingKey::recover_from_prehash(hash, &sig, recovery_id)
        .map_err(|_| VerificationError::SignatureMismatch("recovery failed".into()))?;
    Ok(address_of(&key))
}

/// Ethereum address of a public key.
pub fn address_of(key: &VerifyingKey) -> Address {
    let point = key.to_encoded_point(false);
    let hash = keccak256(&point.as_bytes()[1..]);
    let mut address = [0u8; 20];
    address.copy_from_slice(&hash[12..]);
    address
}

/// Sign `hash` producing a low-s recoverable signature.
pub fn sign_hash(key: &SigningKey, hash: &Hash) -> Result<RecoverableSignature, VerificationError> {
    let (sig, recid) = key
        .sign_prehash_recoverable(hash)
        .map_err(|e| VerificationError::SignatureMismatch(e.to_string()))?;
    let (sig, v) = match sig.normalize_s() {
        Some(low) => (low, recid.to_byte() ^ 1),
        None => (sig, recid.to_byte()),
    };
    let bytes = sig.to_bytes();
    let mut r = [0u8; 32];
    let mut s = [0u8; 32];
    r.copy_from_slice(&bytes[..32]);
    s.copy_from_slice(&bytes[32..]);
    Ok(RecoverableSignature { r, s, v })
}
