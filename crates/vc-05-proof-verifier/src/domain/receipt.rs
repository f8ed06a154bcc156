//! # Receipts

use crate::domain::errors::VerificationError;
use vc_01_byte_codec::rlp::{self, RlpKind};
use vc_01_byte_codec::{be_to_u64, Address, Hash};

/// Log entry stored in a receipt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogRecord {
    /// Emitting contract
    pub address: Address,
    /// Indexed topics
    pub topics: Vec<Hash>,
    /// Unindexed data
    pub data: Vec<u8>,
}

/// Receipt decoded from the receipt trie.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedReceipt {
    /// EIP-2718 type (0 for legacy)
    pub tx_type: u8,
    /// Post-Byzantium status (0 or 1)
    pub status: Option<u64>,
    /// Pre-Byzantium intermediate state root
    pub state_root: Option<Hash>,
    /// Cumulative gas used in the block up to this receipt
    pub cumulative_gas_used: u64,
    /// 256-byte bloom
    pub logs_bloom: Vec<u8>,
    /// Logs in emission order
    pub logs: Vec<LogRecord>,
}

impl DecodedReceipt {
    /// Decode a raw receipt.
    pub fn decode(raw: &[u8]) -> Result<Self, VerificationError> {
        let first = *raw
            .first()
            .ok_or_else(|| VerificationError::InvalidProofData("empty receipt".into()))?;
        let (tx_type, body) = if first < 0x7f {
            (first, &raw[1..])
        } else {
            (0, raw)
        };

        let fields = rlp::list_payloads(body)?;
        if fields.len() != 4 {
            return Err(VerificationError::InvalidProofData(format!(
                "receipt has {} fields",
                fields.len()
            )));
        }
        let value = |i: usize| match fields[i] {
            (RlpKind::Value, payload) => Ok(payload),
            (RlpKind::List, _) => Err(VerificationError::InvalidProofData(format!(
                "receipt field {i} must be a value"
            ))),
        };

        let outcome = value(0)?;
        let (status, state_root) = if outcome.len() == 32 {
            let mut root = [0u8; 32];
            root.copy_from_slice(outcome);
            (None, Some(root))
        } else {
            (Some(be_to_u64(outcome)?), None)
        };

        let logs_payload = match fields[3] {
            (RlpKind::List, payload) => payload,
            (RlpKind::Value, _) => {
                return Err(VerificationError::InvalidProofData(
                    "receipt logs must be a list".into(),
                ))
            }
        };
        let logs = rlp::split_payload(logs_payload)?
            .into_iter()
            .map(decode_log)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            tx_type,
            status,
            state_root,
            cumulative_gas_used: be_to_u64(value(1)?)?,
            logs_bloom: value(2)?.to_vec(),
            logs,
        })
    }

    /// Encode as stored in the receipt trie.
    pub fn encode(&self) -> Vec<u8> {
        let outcome = match (&self.state_root, self.status) {
            (Some(root), _) => rlp::encode_bytes(root),
            (None, status) => rlp::encode_u64(status.unwrap_or(0)),
        };
        let logs: Vec<Vec<u8>> = self
            .logs
            .iter()
            .map(|log| {
                let topics: Vec<Vec<u8>> = log.topics.iter().map(|t| rlp::encode_bytes(t)).collect();
                rlp::encode_list(&[
                    rlp::encode_bytes(&log.address),
                    rlp::encode_list(&topics),
                    rlp::encode_bytes(&log.data),
                ])
            })
            .collect();
        let body = rlp::encode_list(&[
            outcome,
            rlp::encode_u64(self.cumulative_gas_used),
            rlp::encode_bytes(&self.logs_bloom),
            rlp::encode_list(&logs),
        ]);
        if self.tx_type == 0 {
            body
        } else {
            let mut out = vec![self.tx_type];
            out.extend_from_slice(&body);
            out
        }
    }
}

fn decode_log(raw: &[u8]) -> Result<LogRecord, VerificationError> {
    let fields = rlp::list_payloads(raw)?;
    match fields.as_slice() {
        [(RlpKind::Value, address), (RlpKind::List, topics), (RlpKind::Value, data)] => {
            let address: Address = (*address).try_into().map_err(|_| {
                VerificationError::InvalidProofData("log address must be 20 bytes".into())
            })?;
            let topics = rlp::split_payload(topics)?
                .into_iter()
                .map(|item| -> Result<Hash, VerificationError> {
                    let topic = rlp::decode_value(item)?;
                    topic.try_into().map_err(|_| {
                        VerificationError::InvalidProofData("log topic must be 32 bytes".into())
                    })
                })
                .collect::<Result<Vec<_>, _>>()?;
            Ok(LogRecord {
                address,
                topics,
                data: data.to_vec(),
            })
        }
        _ => Err(VerificationError::InvalidProofData(
            "log must be [address, topics, data]".into(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn receipt(tx_type: u8) -> DecodedReceipt {
        DecodedReceipt {
            tx_type,
            status: Some(1),
            state_root: None,
            cumulative_gas_used: 52_000,
            logs_bloom: vec![0u8; 256],
            logs: vec![LogRecord {
                address: [0xab; 20],
                topics: vec![[1u8; 32], [2u8; 32]],
                data: vec![9, 9],
            }],
        }
    }

    #[test]
    fn test_legacy_and_typed_receipts_decode() {
        for tx_type in [0u8, 2] {
            let original = receipt(tx_type);
            assert_eq!(DecodedReceipt::decode(&original.encode()).unwrap(), original);
        }
    }

    #[test]
    fn test_pre_byzantium_state_root() {
        let mut original = receipt(0);
        original.status = None;
        original.state_root = Some([7u8; 32]);
        let decoded = DecodedReceipt::decode(&original.encode()).unwrap();
        assert_eq!(decoded.state_root, Some([7u8; 32]));
        assert_eq!(decoded.status, None);
    }

    #[test]
    fn test_bad_topic_length_rejected() {
        let log = rlp::encode_list(&[
            rlp::encode_bytes(&[0u8; 20]),
            rlp::encode_list(&[rlp::encode_bytes(&[1u8; 31])]),
            rlp::encode_bytes(&[]),
        ]);
        assert!(decode_log(&log).is_err());
    }
}
