//! Signer backed by an in-memory secp256k1 key.

use crate::domain::SignerError;
use crate::ports::Signer;
use k256::ecdsa::SigningKey;
use vc_01_byte_codec::{bytes_to_hex, Address};
use vc_05_proof_verifier::domain::ecdsa::{address_of, sign_hash};

/// One local account.
#[derive(Clone)]
pub struct LocalKeySigner {
    key: SigningKey,
    address: Address,
}

impl LocalKeySigner {
    /// Signer for a 32-byte secret key.
    pub fn from_secret(secret: &[u8]) -> Result<Self, SignerError> {
        let key = SigningKey::from_slice(secret)
            .map_err(|_| SignerError::Signing("invalid secret key".into()))?;
        Ok(Self::new(key))
    }

    /// Signer for an existing key.
    pub fn new(key: SigningKey) -> Self {
        let address = address_of(key.verifying_key());
        Self { key, address }
    }

    /// Address of the account.
    pub fn address(&self) -> Address {
        self.address
    }
}

impl std::fmt::Debug for LocalKeySigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalKeySigner")
            .field("address", &bytes_to_hex(&self.address))
            .finish_non_exhaustive()
    }
}

impl Signer for LocalKeySigner {
    fn sign(&self, message: &[u8], account_hint: &[u8]) -> Result<[u8; 65], SignerError> {
        if !account_hint.is_empty() && account_hint != self.address {
            return Err(SignerError::UnknownAccount(bytes_to_hex(account_hint)));
        }
        let hash: [u8; 32] = message.try_into().map_err(|_| {
            SignerError::InvalidMessage(format!("expected 32 bytes, got {}", message.len()))
        })?;
        let signature = sign_hash(&self.key, &hash).map_err(|e| SignerError::Signing(e.to_string()))?;
        Ok(signature.to_bytes())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vc_01_byte_codec::keccak256;
    use vc_05_proof_verifier::{recover_address, RecoverableSignature};

    fn signer() -> LocalKeySigner {
        LocalKeySigner::from_secret(&[0x46; 32]).unwrap()
    }

    #[test]
    fn test_signature_recovers_to_account() {
        let signer = signer();
        let hash = keccak256(b"payload");
        let raw = signer.sign(&hash, &signer.address()).unwrap();
        let signature = RecoverableSignature::from_bytes(&raw).unwrap();
        assert_eq!(recover_address(&hash, &signature).unwrap(), signer.address());
    }

    #[test]
    fn test_rejects_other_account() {
        let signer = signer();
        assert!(matches!(
            signer.sign(&[0u8; 32], &[0x01; 20]),
            Err(SignerError::UnknownAccount(_))
        ));
    }

    #[test]
    fn test_rejects_non_hash_message() {
        assert!(matches!(
            signer().sign(b"short", &[]),
            Err(SignerError::InvalidMessage(_))
        ));
    }

    #[test]
    fn test_rejects_zero_secret() {
        assert!(LocalKeySigner::from_secret(&[0u8; 32]).is_err());
    }
}
