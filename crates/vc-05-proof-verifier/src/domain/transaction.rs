//! # Transactions
//!
//! Decoding of the raw transactions stored in the transaction trie, and the
//! EIP-155 legacy encoding used when submitting a signed transaction.
//!
//! Typed transactions are stored as `type ‖ rlp(fields)`; legacy ones as a
//! bare RLP list.

use crate::domain::ecdsa::{recover_address, RecoverableSignature};
use crate::domain::errors::VerificationError;
use vc_01_byte_codec::rlp::{self, RlpKind};
use vc_01_byte_codec::{be_to_u256, be_to_u64, keccak256, pad_left_32, Address, Hash, U256};

struct Layout {
    fields: usize,
    nonce: usize,
    gas: usize,
    to: usize,
    value: usize,
    data: usize,
}

const LEGACY: Layout = Layout {
    fields: 9,
    nonce: 0,
    gas: 2,
    to: 3,
    value: 4,
    data: 5,
};

fn typed_layout(tx_type: u8) -> Option<Layout> {
    let fields = match tx_type {
        0x01 => 11,
        0x02 => 12,
        0x03 => 14,
        0x04 => 13,
        _ => return None,
    };
    let offset = if tx_type == 0x01 { 0 } else { 1 };
    Some(Layout {
        fields,
        nonce: 1,
        gas: 3 + offset,
        to: 4 + offset,
        value: 5 + offset,
        data: 6 + offset,
    })
}

/// Transaction decoded from its raw encoding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedTransaction {
    /// EIP-2718 type (0 for legacy)
    pub tx_type: u8,
    /// Chain id (absent for pre-EIP-155 legacy transactions)
    pub chain_id: Option<u64>,
    /// Sender nonce
    pub nonce: u64,
    /// Gas limit
    pub gas_limit: u64,
    /// Recipient (`None` for contract creation)
    pub to: Option<Address>,
    /// Transferred value
    pub value: U256,
    /// Call data
    pub input: Vec<u8>,
    /// Hash the sender signed
    pub signing_hash: Hash,
    /// Sender signature
    pub signature: RecoverableSignature,
}

impl DecodedTransaction {
    /// Decode a raw transaction.
    pub fn decode(raw: &[u8]) -> Result<Self, VerificationError> {
        let first = *raw
            .first()
            .ok_or_else(|| VerificationError::InvalidProofData("empty transaction".into()))?;
        if first >= 0xc0 {
            Self::decode_legacy(raw)
        } else {
            let layout = typed_layout(first).ok_or_else(|| {
                VerificationError::InvalidProofData(format!("unknown transaction type {first}"))
            })?;
            Self::decode_typed(first, &raw[1..], &layout)
        }
    }

    fn decode_legacy(raw: &[u8]) -> Result<Self, VerificationError> {
        let items = rlp::list_items(raw)?;
        let values = field_values(&items, LEGACY.fields)?;
        let v = be_to_u64(values[6].1)?;

        let (chain_id, recovery) = match v {
            27 | 28 => (None, (v - 27) as u8),
            v if v >= 35 => (Some((v - 35) / 2), ((v - 35) % 2) as u8),
            other => {
                return Err(VerificationError::InvalidProofData(format!(
                    "invalid legacy v {other}"
                )))
            }
        };

        let mut unsigned: Vec<Vec<u8>> = items[..6].iter().map(|i| i.to_vec()).collect();
        if let Some(id) = chain_id {
            unsigned.push(rlp::encode_u64(id));
            unsigned.push(rlp::encode_u64(0));
            unsigned.push(rlp::encode_u64(0));
        }
        let signing_hash = keccak256(&rlp::encode_list(&unsigned));

        Self::assemble(0, chain_id, &values, &LEGACY, signing_hash, recovery)
    }

    fn decode_typed(
        tx_type: u8,
        payload: &[u8],
        layout: &Layout,
    ) -> Result<Self, VerificationError> {
        let items = rlp::list_items(payload)?;
        let values = field_values(&items, layout.fields)?;
        let chain_id = be_to_u64(values[0].1)?;
        let y = be_to_u64(values[layout.fields - 3].1)?;
        if y > 1 {
            return Err(VerificationError::InvalidProofData(format!(
                "invalid y parity {y}"
            )));
        }

        let unsigned: Vec<Vec<u8>> = items[..layout.fields - 3]
            .iter()
            .map(|i| i.to_vec())
            .collect();
        let mut preimage = vec![tx_type];
        preimage.extend_from_slice(&rlp::encode_list(&unsigned));
        let signing_hash = keccak256(&preimage);

        Self::assemble(tx_type, Some(chain_id), &values, layout, signing_hash, y as u8)
    }

    fn assemble(
        tx_type: u8,
        chain_id: Option<u64>,
        values: &[(RlpKind, &[u8])],
        layout: &Layout,
        signing_hash: Hash,
        recovery: u8,
    ) -> Result<Self, VerificationError> {
        let value_at = |i: usize| -> Result<&[u8], VerificationError> {
            match values[i] {
                (RlpKind::Value, payload) => Ok(payload),
                (RlpKind::List, _) => Err(VerificationError::InvalidProofData(format!(
                    "transaction field {i} must be a value"
                ))),
            }
        };

        let to = match value_at(layout.to)? {
            [] => None,
            bytes => Some(bytes.try_into().map_err(|_| {
                VerificationError::InvalidProofData("recipient must be 20 bytes".into())
            })?),
        };
        let signature = RecoverableSignature::new(
            pad_left_32(value_at(layout.fields - 2)?)?,
            pad_left_32(value_at(layout.fields - 1)?)?,
            recovery,
        )?;

        Ok(Self {
            tx_type,
            chain_id,
            nonce: be_to_u64(value_at(layout.nonce)?)?,
            gas_limit: be_to_u64(value_at(layout.gas)?)?,
            to,
            value: be_to_u256(value_at(layout.value)?)?,
            input: value_at(layout.data)?.to_vec(),
            signing_hash,
            signature,
        })
    }

    /// Recover the sender address.
    pub fn sender(&self) -> Result<Address, VerificationError> {
        recover_address(&self.signing_hash, &self.signature)
    }
}

fn field_values<'a>(
    items: &[&'a [u8]],
    expected: usize,
) -> Result<Vec<(RlpKind, &'a [u8])>, VerificationError> {
    if items.len() != expected {
        return Err(VerificationError::InvalidProofData(format!(
            "transaction has {} fields, expected {expected}",
            items.len()
        )));
    }
    items
        .iter()
        .map(|item| rlp::decode_single(item).map_err(VerificationError::from))
        .collect()
}

/// Unsigned legacy transaction with EIP-155 replay protection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LegacyTransaction {
    /// Sender nonce
    pub nonce: u64,
    /// Gas price in wei
    pub gas_price: U256,
    /// Gas limit
    pub gas_limit: u64,
    /// Recipient (`None` deploys a contract)
    pub to: Option<Address>,
    /// Transferred value
    pub value: U256,
    /// Call data
    pub data: Vec<u8>,
}

impl LegacyTransaction {
    fn base_items(&self) -> Vec<Vec<u8>> {
        let to: &[u8] = match &self.to {
            Some(address) => address,
            None => &[],
        };
        vec![
            rlp::encode_u64(self.nonce),
            rlp::encode(&vc_01_byte_codec::RlpItem::u256(&self.gas_price)),
            rlp::encode_u64(self.gas_limit),
            rlp::encode_bytes(to),
            rlp::encode(&vc_01_byte_codec::RlpItem::u256(&self.value)),
            rlp::encode_bytes(&self.data),
        ]
    }

    /// Hash to sign for `chain_id`.
    pub fn signing_hash(&self, chain_id: u64) -> Hash {
        let mut items = self.base_items();
        items.push(rlp::encode_u64(chain_id));
        items.push(rlp::encode_u64(0));
        items.push(rlp::encode_u64(0));
        keccak256(&rlp::encode_list(&items))
    }

    /// Signed raw transaction.
    pub fn encode_signed(&self, chain_id: u64, signature: &RecoverableSignature) -> Vec<u8> {
        let mut items = self.base_items();
        items.push(rlp::encode_u64(
            u64::from(signature.v) + chain_id * 2 + 35,
        ));
        items.push(rlp::encode_bytes(strip_zeros(&signature.r)));
        items.push(rlp::encode_bytes(strip_zeros(&signature.s)));
        rlp::encode_list(&items)
    }
}

fn strip_zeros(bytes: &[u8]) -> &[u8] {
    let start = bytes.iter().position(|b| *b != 0).unwrap_or(bytes.len());
    &bytes[start..]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ecdsa::{address_of, sign_hash};
    use crate::test_utils::signed_eip1559;
    use k256::ecdsa::SigningKey;

    fn sample() -> LegacyTransaction {
        LegacyTransaction {
            nonce: 9,
            gas_price: U256::from(20_000_000_000u64),
            gas_limit: 21000,
            to: Some([0x35; 20]),
            value: U256::from(1_000_000_000_000_000_000u64),
            data: vec![],
        }
    }

    #[test]
    fn test_eip155_signing_hash_vector() {
        // EIP-155 example transaction.
        let hash = sample().signing_hash(1);
        assert_eq!(
            vc_01_byte_codec::bytes_to_hex(&hash),
            "0xdaf5a779ae972f972197303d7b574746c7ef83eadac0f2791ad23db92e4c8e53"
        );
    }

    #[test]
    fn test_legacy_sign_decode_recover() {
        let key = SigningKey::from_slice(&[0x46; 32]).unwrap();
        let tx = sample();
        let sig = sign_hash(&key, &tx.signing_hash(1)).unwrap();
        let raw = tx.encode_signed(1, &sig);

        let decoded = DecodedTransaction::decode(&raw).unwrap();
        assert_eq!(decoded.tx_type, 0);
        assert_eq!(decoded.chain_id, Some(1));
        assert_eq!(decoded.nonce, 9);
        assert_eq!(decoded.to, Some([0x35; 20]));
        assert_eq!(decoded.value, tx.value);
        assert_eq!(decoded.sender().unwrap(), address_of(key.verifying_key()));
    }

    #[test]
    fn test_eip1559_decode() {
        let key = SigningKey::from_slice(&[0x11; 32]).unwrap();
        let raw = signed_eip1559(&key, 5, 3, Some([0xaa; 20]), 77, vec![1, 2, 3]);
        let decoded = DecodedTransaction::decode(&raw).unwrap();
        assert_eq!(decoded.tx_type, 2);
        assert_eq!(decoded.chain_id, Some(5));
        assert_eq!(decoded.nonce, 3);
        assert_eq!(decoded.value, U256::from(77u64));
        assert_eq!(decoded.input, vec![1, 2, 3]);
        assert_eq!(decoded.sender().unwrap(), address_of(key.verifying_key()));
    }

    #[test]
    fn test_contract_creation_has_no_recipient() {
        let key = SigningKey::from_slice(&[0x12; 32]).unwrap();
        let mut tx = sample();
        tx.to = None;
        let sig = sign_hash(&key, &tx.signing_hash(3)).unwrap();
        let decoded = DecodedTransaction::decode(&tx.encode_signed(3, &sig)).unwrap();
        assert_eq!(decoded.to, None);
    }

    #[test]
    fn test_unknown_type_and_garbage_rejected() {
        assert!(DecodedTransaction::decode(&[]).is_err());
        assert!(DecodedTransaction::decode(&[0x7f, 0xc0]).is_err());
        assert!(DecodedTransaction::decode(&[0xc1, 0x80]).is_err());
    }
}
