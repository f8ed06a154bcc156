//! # Client Configuration
//!
//! One TOML document configures the whole client:
//!
//! ```toml
//! [request]
//! request_count = 2
//! max_attempts = 3
//! proof = "standard"
//!
//! [registry]
//! blacklist_window_secs = 600
//!
//! [logging]
//! level = "info"
//!
//! [[chains]]
//! chain_id = 1
//! family = "ethereum"
//!
//! [[chains.boot_nodes]]
//! url = "https://node-a.example"
//! ```
//!
//! Every section except `chains` may be omitted.

use crate::domain::ProofLevel;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use thiserror::Error;
use vc_03_node_registry::RegistryConfig;
use vc_05_proof_verifier::ChainConfig;

/// Largest `request_count` accepted.
pub const MAX_REQUEST_COUNT: usize = 16;

/// Configuration error. Raised before any attempt is made.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    /// A field holds an unusable value.
    #[error("Invalid config value for {field}: {reason}")]
    InvalidValue {
        /// Offending field
        field: &'static str,
        /// Why it is rejected
        reason: String,
    },

    /// The TOML text could not be parsed.
    #[error("Config parse error: {0}")]
    Parse(String),

    /// Invalid chain section.
    #[error(transparent)]
    Chain(#[from] vc_05_proof_verifier::ConfigError),

    /// Invalid registry section.
    #[error(transparent)]
    Registry(#[from] vc_03_node_registry::ConfigError),

    /// The request targets a chain that is not configured.
    #[error("Unknown chain: {0}")]
    UnknownChain(u64),

    /// Request parameters are not a JSON array, or are otherwise unusable.
    #[error("Invalid request parameters: {0}")]
    InvalidParams(String),

    /// The method cannot be served by a verifying client.
    #[error("Unsupported method: {0}")]
    UnsupportedMethod(String),
}

impl ConfigError {
    /// Build an `InvalidValue` error.
    pub fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        ConfigError::InvalidValue {
            field,
            reason: reason.into(),
        }
    }
}

/// Per-request policy.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RequestPolicy {
    /// Nodes asked per dispatch round.
    pub request_count: usize,

    /// Dispatch rounds before giving up.
    pub max_attempts: u32,

    /// Proof requested from the nodes.
    pub proof: ProofLevel,

    /// Additional nodes asked to sign the block hash.
    pub signature_count: usize,

    /// Percentage of validators that must seal blocks after the proven one.
    pub finality: u32,

    /// Ask for contract code in account proofs.
    pub include_code: bool,

    /// Serve and store verified results through the cache.
    pub cache: bool,

    /// Distinct nodes that must return the same nodelist before it is
    /// installed.
    pub nodelist_quorum: usize,
}

impl Default for RequestPolicy {
    fn default() -> Self {
        Self {
            request_count: 2,
            max_attempts: 3,
            proof: ProofLevel::Standard,
            signature_count: 0,
            finality: 0,
            include_code: false,
            cache: true,
            nodelist_quorum: 2,
        }
    }
}

impl RequestPolicy {
    /// Single node, two rounds.
    pub fn for_testing() -> Self {
        Self {
            request_count: 1,
            max_attempts: 2,
            ..Self::default()
        }
    }

    /// Validate the policy.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.request_count == 0 || self.request_count > MAX_REQUEST_COUNT {
            return Err(ConfigError::invalid(
                "request.request_count",
                format!("must be in 1..={MAX_REQUEST_COUNT}"),
            ));
        }
        if self.max_attempts == 0 {
            return Err(ConfigError::invalid("request.max_attempts", "must be > 0"));
        }
        if self.nodelist_quorum == 0 {
            return Err(ConfigError::invalid("request.nodelist_quorum", "must be > 0"));
        }
        if self.finality > 100 {
            return Err(ConfigError::invalid("request.finality", "must be <= 100"));
        }
        if self.proof == ProofLevel::None && (self.signature_count > 0 || self.finality > 0) {
            return Err(ConfigError::invalid(
                "request.proof",
                "signatures and finality need a proof level",
            ));
        }
        Ok(())
    }
}

/// Log output configuration.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Filter directive used when `RUST_LOG` is unset.
    pub level: String,

    /// JSON lines instead of human-readable output.
    pub json: bool,

    /// Include the event target.
    pub with_target: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
            with_target: true,
        }
    }
}

impl LoggingConfig {
    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.level.trim().is_empty() {
            return Err(ConfigError::invalid("logging.level", "cannot be empty"));
        }
        Ok(())
    }
}

/// Complete client configuration.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Request policy.
    pub request: RequestPolicy,

    /// Node reputation parameters.
    pub registry: RegistryConfig,

    /// Served chains.
    pub chains: Vec<ChainConfig>,

    /// Log output.
    pub logging: LoggingConfig,
}

impl ClientConfig {
    /// Parse and validate TOML text.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: ClientConfig =
            toml::from_str(text).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Testing policy and registry windows for the given chains.
    pub fn for_testing(chains: Vec<ChainConfig>) -> Self {
        Self {
            request: RequestPolicy::for_testing(),
            registry: RegistryConfig::for_testing(),
            chains,
            logging: LoggingConfig {
                level: "debug".to_string(),
                ..LoggingConfig::default()
            },
        }
    }

    /// Configuration of `chain_id`.
    pub fn chain(&self, chain_id: u64) -> Option<&ChainConfig> {
        self.chains.iter().find(|c| c.chain_id == chain_id)
    }

    /// Validate every section.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.request.validate()?;
        self.registry.validate()?;
        self.logging.validate()?;

        if self.chains.is_empty() {
            return Err(ConfigError::invalid("chains", "at least one chain is required"));
        }
        let mut seen = HashSet::new();
        for chain in &self.chains {
            if !seen.insert(chain.chain_id) {
                return Err(ConfigError::invalid(
                    "chains",
                    format!("chain {} configured twice", chain.chain_id),
                ));
            }
            chain.validate()?;
            if chain.boot_nodes.is_empty() {
                return Err(ConfigError::invalid(
                    "chains.boot_nodes",
                    format!("chain {} has no boot nodes", chain.chain_id),
                ));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vc_05_proof_verifier::{BootNode, ChainFamily};

    fn chain(id: u64) -> ChainConfig {
        let mut config = ChainConfig::ethereum(id);
        config.boot_nodes = vec![BootNode {
            url: "https://boot".into(),
            address: [0; 20],
        }];
        config
    }

    #[test]
    fn test_default_policy() {
        let policy = RequestPolicy::default();
        assert_eq!(policy.request_count, 2);
        assert_eq!(policy.max_attempts, 3);
        assert_eq!(policy.proof, ProofLevel::Standard);
        assert!(policy.validate().is_ok());
    }

    #[test]
    fn test_testing_config() {
        let config = ClientConfig::for_testing(vec![chain(1)]);
        assert_eq!(config.request.request_count, 1);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_from_toml() {
        let text = r#"
            [request]
            request_count = 3
            max_attempts = 5
            proof = "full"
            signature_count = 1

            [registry]
            blacklist_window_secs = 120

            [logging]
            level = "vc_06_request_context=trace"
            json = true

            [[chains]]
            chain_id = 1
            family = "ethereum"

            [[chains.boot_nodes]]
            url = "https://node-a.example"
            address = "0x1111111111111111111111111111111111111111"

            [[chains]]
            chain_id = 0x7d0
            family = "ipfs"

            [[chains.boot_nodes]]
            url = "https://ipfs.example"
        "#;
        let config = ClientConfig::from_toml_str(text).unwrap();
        assert_eq!(config.request.request_count, 3);
        assert_eq!(config.request.proof, ProofLevel::Full);
        assert_eq!(config.registry.blacklist_window_secs, 120);
        assert_eq!(config.registry.failure_threshold, 3);
        assert!(config.logging.json);
        assert_eq!(config.chains.len(), 2);
        assert_eq!(config.chain(0x7d0).unwrap().family, ChainFamily::Ipfs);
        assert_eq!(config.chain(1).unwrap().boot_nodes[0].address, [0x11; 20]);
    }

    #[test]
    fn test_toml_syntax_error() {
        assert!(matches!(
            ClientConfig::from_toml_str("[request"),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn test_rejects_zero_request_count() {
        let mut config = ClientConfig::for_testing(vec![chain(1)]);
        config.request.request_count = 0;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidValue {
                field: "request.request_count",
                ..
            })
        ));
    }

    #[test]
    fn test_rejects_signatures_without_proof() {
        let policy = RequestPolicy {
            proof: ProofLevel::None,
            signature_count: 1,
            ..RequestPolicy::default()
        };
        assert!(policy.validate().is_err());
    }

    #[test]
    fn test_rejects_duplicate_chain() {
        let config = ClientConfig::for_testing(vec![chain(1), chain(1)]);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_chain_without_boot_nodes() {
        let config = ClientConfig::for_testing(vec![ChainConfig::ethereum(1)]);
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidValue {
                field: "chains.boot_nodes",
                ..
            })
        ));
    }

    #[test]
    fn test_invalid_registry_section_is_reported() {
        let mut config = ClientConfig::for_testing(vec![chain(1)]);
        config.registry.failure_threshold = 0;
        assert!(matches!(config.validate(), Err(ConfigError::Registry(_))));
    }
}
