//! # Chain Configuration
//!
//! Static per-chain parameters. Loaded as part of the client TOML config and
//! validated before any request is built.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;
use vc_01_byte_codec::{bytes_to_hex, hex_to_array, Address};

/// Configuration error.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    /// A field has an unusable value.
    #[error("Invalid config value for {field}: {reason}")]
    InvalidValue {
        /// Field name
        field: &'static str,
        /// Why it was rejected
        reason: String,
    },
}

impl ConfigError {
    pub(crate) fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        ConfigError::InvalidValue {
            field,
            reason: reason.into(),
        }
    }
}

/// Chain family, selecting the verifier set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChainFamily {
    /// Ethereum and EVM-compatible chains
    Ethereum,
    /// Bitcoin
    Bitcoin,
    /// IPFS content network
    Ipfs,
}

/// Consensus of an Ethereum-family chain.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum EthConsensus {
    /// Hash-linked headers only; trust from node signatures.
    #[default]
    ProofOfWork,
    /// Proof-of-authority with sealed headers.
    Clique {
        /// Checkpoint interval; epoch headers list the validator set.
        epoch: u64,
        /// Block at which `validators` is the active set.
        #[serde(default)]
        start_block: u64,
        /// Initial validator set.
        #[serde(with = "address_list")]
        validators: Vec<Address>,
    },
}

/// Bitcoin consensus parameters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BtcParams {
    /// Compact encoding of the maximum target.
    pub pow_limit_bits: u32,
    /// Finality headers required after a block.
    pub finality_blocks: u32,
    /// Accepted deviation of a header target from the period target.
    pub max_target_deviation_percent: u32,
    /// Blocks per difficulty period.
    pub retarget_interval: u64,
    /// Expected duration of one period, seconds.
    pub target_timespan_secs: u64,
    /// Trusted `(period, bits)` pairs seeding the target cache.
    pub checkpoints: Vec<(u64, u32)>,
}

impl Default for BtcParams {
    fn default() -> Self {
        Self {
            pow_limit_bits: 0x1d00_ffff,
            finality_blocks: 6,
            max_target_deviation_percent: 10,
            retarget_interval: 2016,
            target_timespan_secs: 14 * 24 * 60 * 60,
            checkpoints: Vec::new(),
        }
    }
}

impl BtcParams {
    /// Regtest parameters (trivial target, short finality).
    pub fn regtest() -> Self {
        Self {
            pow_limit_bits: 0x207f_ffff,
            finality_blocks: 2,
            ..Self::default()
        }
    }
}

/// Node listed in the configuration, used until a nodelist is fetched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BootNode {
    /// Endpoint url.
    pub url: String,
    /// Signer address.
    #[serde(with = "address_hex", default)]
    pub address: Address,
}

/// Configuration of one chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainConfig {
    /// Numeric chain id.
    pub chain_id: u64,
    /// Verifier family.
    pub family: ChainFamily,
    /// Ethereum consensus (ignored for other families).
    #[serde(default)]
    pub consensus: EthConsensus,
    /// Bitcoin parameters (required for the Bitcoin family).
    #[serde(default)]
    pub btc: Option<BtcParams>,
    /// Initial node pool.
    #[serde(default)]
    pub boot_nodes: Vec<BootNode>,
}

impl ChainConfig {
    /// Ethereum proof-of-work chain with no boot nodes.
    pub fn ethereum(chain_id: u64) -> Self {
        Self {
            chain_id,
            family: ChainFamily::Ethereum,
            consensus: EthConsensus::ProofOfWork,
            btc: None,
            boot_nodes: Vec::new(),
        }
    }

    /// Clique chain with the given initial validator set.
    pub fn clique(chain_id: u64, epoch: u64, validators: Vec<Address>) -> Self {
        Self {
            consensus: EthConsensus::Clique {
                epoch,
                start_block: 0,
                validators,
            },
            ..Self::ethereum(chain_id)
        }
    }

    /// Bitcoin chain.
    pub fn bitcoin(chain_id: u64, params: BtcParams) -> Self {
        Self {
            chain_id,
            family: ChainFamily::Bitcoin,
            consensus: EthConsensus::ProofOfWork,
            btc: Some(params),
            boot_nodes: Vec::new(),
        }
    }

    /// IPFS network.
    pub fn ipfs(chain_id: u64) -> Self {
        Self {
            chain_id,
            family: ChainFamily::Ipfs,
            consensus: EthConsensus::ProofOfWork,
            btc: None,
            boot_nodes: Vec::new(),
        }
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if let EthConsensus::Clique {
            epoch, validators, ..
        } = &self.consensus
        {
            if *epoch == 0 {
                return Err(ConfigError::invalid("consensus.epoch", "must be > 0"));
            }
            if validators.is_empty() {
                return Err(ConfigError::invalid(
                    "consensus.validators",
                    "clique chain needs an initial validator set",
                ));
            }
        }
        if self.family == ChainFamily::Bitcoin {
            let btc = self
                .btc
                .as_ref()
                .ok_or_else(|| ConfigError::invalid("btc", "bitcoin chain needs parameters"))?;
            if btc.retarget_interval == 0 || btc.target_timespan_secs == 0 {
                return Err(ConfigError::invalid(
                    "btc.retarget_interval",
                    "interval and timespan must be > 0",
                ));
            }
            if btc.max_target_deviation_percent > 100 {
                return Err(ConfigError::invalid(
                    "btc.max_target_deviation_percent",
                    "must be <= 100",
                ));
            }
        }
        let mut urls: Vec<&str> = self.boot_nodes.iter().map(|n| n.url.as_str()).collect();
        urls.sort_unstable();
        if urls.windows(2).any(|w| w[0] == w[1]) {
            return Err(ConfigError::invalid("boot_nodes", "duplicate url"));
        }
        Ok(())
    }
}

mod address_hex {
    use super::*;

    pub fn serialize<S: Serializer>(address: &Address, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&bytes_to_hex(address))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Address, D::Error> {
        let text = String::deserialize(d)?;
        hex_to_array::<20>(&text).map_err(serde::de::Error::custom)
    }
}

mod address_list {
    use super::*;

    pub fn serialize<S: Serializer>(list: &[Address], s: S) -> Result<S::Ok, S::Error> {
        let hex: Vec<String> = list.iter().map(|a| bytes_to_hex(a)).collect();
        hex.serialize(s)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<Address>, D::Error> {
        let texts = Vec::<String>::deserialize(d)?;
        texts
            .iter()
            .map(|t| hex_to_array::<20>(t).map_err(serde::de::Error::custom))
            .collect()
    }
}
