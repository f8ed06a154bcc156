//! # Ethereum Block Header
//!
//! A header is rebuilt from the JSON-RPC block object (or decoded from its
//! RLP) and re-encoded to compute the block hash. Optional trailing fields
//! follow the fork order; a later field implies all earlier ones.
//!
//! | Fork | Added field |
//! |------|-------------|
//! | London | `baseFeePerGas` |
//! | Shanghai | `withdrawalsRoot` |
//! | Cancun | `blobGasUsed`, `excessBlobGas`, `parentBeaconBlockRoot` |
//! | Prague | `requestsHash` |

use crate::domain::ecdsa::{recover_address, RecoverableSignature};
use crate::domain::errors::VerificationError;
use vc_01_byte_codec::rlp::{self, RlpKind};
use vc_01_byte_codec::{
    be_to_u256, be_to_u64, keccak256, u256_to_be_minimal, Address, Hash, U256,
};
use vc_02_token_model::Token;

/// Bytes of Clique vanity prefix in `extraData`.
pub const CLIQUE_VANITY: usize = 32;
/// Bytes of the Clique seal suffix in `extraData`.
pub const CLIQUE_SEAL: usize = 65;

const BASE_FIELDS: usize = 15;

/// Decoded Ethereum header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EthHeader {
    /// Parent block hash
    pub parent_hash: Hash,
    /// Ommers hash
    pub uncles_hash: Hash,
    /// Beneficiary (zero on Clique chains)
    pub miner: Address,
    /// State trie root
    pub state_root: Hash,
    /// Transaction trie root
    pub transactions_root: Hash,
    /// Receipt trie root
    pub receipts_root: Hash,
    /// 256-byte bloom
    pub logs_bloom: Vec<u8>,
    /// Difficulty
    pub difficulty: U256,
    /// Block number
    pub number: u64,
    /// Gas limit
    pub gas_limit: u64,
    /// Gas used
    pub gas_used: u64,
    /// Unix timestamp
    pub timestamp: u64,
    /// Extra data (Clique vanity, signers, seal)
    pub extra_data: Vec<u8>,
    /// Mix hash
    pub mix_hash: Hash,
    /// 8-byte nonce
    pub nonce: [u8; 8],
    /// London base fee
    pub base_fee: Option<U256>,
    /// Shanghai withdrawals root
    pub withdrawals_root: Option<Hash>,
    /// Cancun blob gas used
    pub blob_gas_used: Option<u64>,
    /// Cancun excess blob gas
    pub excess_blob_gas: Option<u64>,
    /// Cancun beacon root
    pub parent_beacon_root: Option<Hash>,
    /// Prague requests hash
    pub requests_hash: Option<Hash>,
}

impl EthHeader {
    /// Read a header from a JSON-RPC block object.
    pub fn from_token(block: &Token<'_>) -> Result<Self, VerificationError> {
        let opt_u256 = |key: &str| -> Result<Option<U256>, VerificationError> {
            match block.get(key) {
                Some(t) if !t.is_null() => Ok(Some(t.as_u256()?)),
                _ => Ok(None),
            }
        };
        let opt_u64 = |key: &str| -> Result<Option<u64>, VerificationError> {
            match block.get(key) {
                Some(t) if !t.is_null() => Ok(Some(t.as_u64()?)),
                _ => Ok(None),
            }
        };
        let opt_hash = |key: &str| -> Result<Option<Hash>, VerificationError> {
            match block.get(key) {
                Some(t) if !t.is_null() => Ok(Some(t.as_hash()?)),
                _ => Ok(None),
            }
        };

        let nonce_bytes = block.field("nonce")?.as_bytes()?;
        let nonce: [u8; 8] = nonce_bytes.as_slice().try_into().map_err(|_| {
            VerificationError::InvalidProofData(format!(
                "nonce must be 8 bytes, got {}",
                nonce_bytes.len()
            ))
        })?;

        let header = Self {
            parent_hash: block.field("parentHash")?.as_hash()?,
            uncles_hash: block.field("sha3Uncles")?.as_hash()?,
            miner: block.field("miner")?.as_address()?,
            state_root: block.field("stateRoot")?.as_hash()?,
            transactions_root: block.field("transactionsRoot")?.as_hash()?,
            receipts_root: block.field("receiptsRoot")?.as_hash()?,
            logs_bloom: block.field("logsBloom")?.as_bytes()?,
            difficulty: block.field("difficulty")?.as_u256()?,
            number: block.field("number")?.as_u64()?,
            gas_limit: block.field("gasLimit")?.as_u64()?,
            gas_used: block.field("gasUsed")?.as_u64()?,
            timestamp: block.field("timestamp")?.as_u64()?,
            extra_data: block.field("extraData")?.as_bytes()?,
            mix_hash: block.field("mixHash")?.as_hash()?,
            nonce,
            base_fee: opt_u256("baseFeePerGas")?,
            withdrawals_root: opt_hash("withdrawalsRoot")?,
            blob_gas_used: opt_u64("blobGasUsed")?,
            excess_blob_gas: opt_u64("excessBlobGas")?,
            parent_beacon_root: opt_hash("parentBeaconBlockRoot")?,
            requests_hash: opt_hash("requestsHash")?,
        };
        header.check_fork_order()?;
        Ok(header)
    }

    /// Decode an RLP-encoded header.
    pub fn from_rlp(bytes: &[u8]) -> Result<Self, VerificationError> {
        let fields = rlp::list_payloads(bytes)?;
        if fields.len() < BASE_FIELDS || fields.len() > BASE_FIELDS + 6 {
            return Err(VerificationError::InvalidProofData(format!(
                "header has {} fields",
                fields.len()
            )));
        }
        let mut values = Vec::with_capacity(fields.len());
        for (kind, payload) in fields {
            if kind != RlpKind::Value {
                return Err(VerificationError::InvalidProofData(
                    "nested list in header".into(),
                ));
            }
            values.push(payload);
        }

        let hash = |i: usize| fixed::<32>(values[i], "hash field");
        let optional = |i: usize| values.get(i).copied();

        Ok(Self {
            parent_hash: hash(0)?,
            uncles_hash: hash(1)?,
            miner: fixed::<20>(values[2], "miner")?,
            state_root: hash(3)?,
            transactions_root: hash(4)?,
            receipts_root: hash(5)?,
            logs_bloom: values[6].to_vec(),
            difficulty: be_to_u256(values[7])?,
            number: be_to_u64(values[8])?,
            gas_limit: be_to_u64(values[9])?,
            gas_used: be_to_u64(values[10])?,
            timestamp: be_to_u64(values[11])?,
            extra_data: values[12].to_vec(),
            mix_hash: hash(13)?,
            nonce: fixed::<8>(values[14], "nonce")?,
            base_fee: optional(15).map(be_to_u256).transpose()?,
            withdrawals_root: optional(16).map(|v| fixed::<32>(v, "withdrawalsRoot")).transpose()?,
            blob_gas_used: optional(17).map(be_to_u64).transpose()?,
            excess_blob_gas: optional(18).map(be_to_u64).transpose()?,
            parent_beacon_root: optional(19)
                .map(|v| fixed::<32>(v, "parentBeaconBlockRoot"))
                .transpose()?,
            requests_hash: optional(20)
                .map(|v| fixed::<32>(v, "requestsHash"))
                .transpose()?,
        })
    }

    fn check_fork_order(&self) -> Result<(), VerificationError> {
        let present = [
            self.base_fee.is_some(),
            self.withdrawals_root.is_some(),
            self.blob_gas_used.is_some(),
            self.excess_blob_gas.is_some(),
            self.parent_beacon_root.is_some(),
            self.requests_hash.is_some(),
        ];
        let count = present.iter().take_while(|p| **p).count();
        if present[count..].iter().any(|p| *p) {
            return Err(VerificationError::InvalidProofData(
                "header fork fields out of order".into(),
            ));
        }
        Ok(())
    }

    fn encode_with_extra(&self, extra: &[u8]) -> Vec<u8> {
        let mut items = vec![
            rlp::encode_bytes(&self.parent_hash),
            rlp::encode_bytes(&self.uncles_hash),
            rlp::encode_bytes(&self.miner),
            rlp::encode_bytes(&self.state_root),
            rlp::encode_bytes(&self.transactions_root),
            rlp::encode_bytes(&self.receipts_root),
            rlp::encode_bytes(&self.logs_bloom),
            rlp::encode_bytes(&u256_to_be_minimal(&self.difficulty)),
            rlp::encode_u64(self.number),
            rlp::encode_u64(self.gas_limit),
            rlp::encode_u64(self.gas_used),
            rlp::encode_u64(self.timestamp),
            rlp::encode_bytes(extra),
            rlp::encode_bytes(&self.mix_hash),
            rlp::encode_bytes(&self.nonce),
        ];
        if let Some(fee) = &self.base_fee {
            items.push(rlp::encode_bytes(&u256_to_be_minimal(fee)));
        }
        if let Some(root) = &self.withdrawals_root {
            items.push(rlp::encode_bytes(root));
        }
        if let Some(gas) = self.blob_gas_used {
            items.push(rlp::encode_u64(gas));
        }
        if let Some(gas) = self.excess_blob_gas {
            items.push(rlp::encode_u64(gas));
        }
        if let Some(root) = &self.parent_beacon_root {
            items.push(rlp::encode_bytes(root));
        }
        if let Some(hash) = &self.requests_hash {
            items.push(rlp::encode_bytes(hash));
        }
        rlp::encode_list(&items)
    }

    /// RLP encoding of the header.
    pub fn encode(&self) -> Vec<u8> {
        self.encode_with_extra(&self.extra_data)
    }

    /// Block hash.
    pub fn hash(&self) -> Hash {
        keccak256(&self.encode())
    }

    /// Hash signed by a Clique sealer: the header with the seal removed
    /// from `extraData`.
    pub fn clique_seal_hash(&self) -> Result<Hash, VerificationError> {
        let (body, _) = self.clique_split()?;
        Ok(keccak256(&self.encode_with_extra(body)))
    }

    /// Address that sealed this Clique header.
    pub fn clique_signer(&self) -> Result<Address, VerificationError> {
        let (_, seal) = self.clique_split()?;
        let signature = RecoverableSignature::from_bytes(seal)?;
        recover_address(&self.clique_seal_hash()?, &signature)
    }

    /// Validator list carried by a Clique epoch header.
    pub fn clique_validators(&self) -> Result<Vec<Address>, VerificationError> {
        let (body, _) = self.clique_split()?;
        let list = &body[CLIQUE_VANITY..];
        if list.len() % 20 != 0 {
            return Err(VerificationError::InvalidProofData(
                "epoch validator list is not a multiple of 20 bytes".into(),
            ));
        }
        Ok(list
            .chunks_exact(20)
            .map(|chunk| {
                let mut address = [0u8; 20];
                address.copy_from_slice(chunk);
                address
            })
            .collect())
    }

    fn clique_split(&self) -> Result<(&[u8], &[u8]), VerificationError> {
        if self.extra_data.len() < CLIQUE_VANITY + CLIQUE_SEAL {
            return Err(VerificationError::InvalidProofData(format!(
                "extraData too short for clique seal: {} bytes",
                self.extra_data.len()
            )));
        }
        Ok(self
            .extra_data
            .split_at(self.extra_data.len() - CLIQUE_SEAL))
    }
}

fn fixed<const N: usize>(value: &[u8], field: &str) -> Result<[u8; N], VerificationError> {
    value.try_into().map_err(|_| {
        VerificationError::InvalidProofData(format!(
            "{field} must be {N} bytes, got {}",
            value.len()
        ))
    })
}
