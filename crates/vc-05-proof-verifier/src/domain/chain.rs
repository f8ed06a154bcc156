//! # Chain Runtime State
//!
//! [`ChainSpec`] pairs a chain's static configuration with the state that
//! verification accumulates: the validator history of a Clique chain and
//! the Bitcoin period target cache. Both are shared by every request on the
//! chain and guarded by `RwLock`s with short critical sections.

use crate::config::{ChainConfig, ChainFamily, ConfigError, EthConsensus};
use crate::domain::errors::VerificationError;
use crate::domain::validators::ValidatorHistory;
use parking_lot::RwLock;
use std::collections::BTreeMap;
use tracing::debug;
use vc_01_byte_codec::Address;

/// Runtime state of one chain.
#[derive(Debug)]
pub struct ChainSpec {
    config: ChainConfig,
    validators: Option<RwLock<ValidatorHistory>>,
    targets: RwLock<BTreeMap<u64, u32>>,
}

impl ChainSpec {
    /// Build from validated configuration.
    pub fn new(config: ChainConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let validators = match &config.consensus {
            EthConsensus::Clique {
                start_block,
                validators,
                ..
            } if config.family == ChainFamily::Ethereum => Some(RwLock::new(
                ValidatorHistory::new(*start_block, validators.clone()),
            )),
            _ => None,
        };
        let targets = config
            .btc
            .as_ref()
            .map(|btc| btc.checkpoints.iter().copied().collect())
            .unwrap_or_default();
        Ok(Self {
            config,
            validators,
            targets: RwLock::new(targets),
        })
    }

    /// Static configuration.
    pub fn config(&self) -> &ChainConfig {
        &self.config
    }

    /// Chain id.
    pub fn chain_id(&self) -> u64 {
        self.config.chain_id
    }

    /// Verifier family.
    pub fn family(&self) -> ChainFamily {
        self.config.family
    }

    /// Clique epoch length, if the chain is Clique.
    pub fn clique_epoch(&self) -> Option<u64> {
        match self.config.consensus {
            EthConsensus::Clique { epoch, .. } if self.validators.is_some() => Some(epoch),
            _ => None,
        }
    }

    /// Validator set at `block` (Clique chains only).
    pub fn validators_at(&self, block: u64) -> Option<Vec<Address>> {
        self.validators
            .as_ref()
            .map(|history| history.read().validators_at(block))
    }

    /// Record the validator set announced by an epoch header.
    pub fn record_validators(
        &self,
        block: u64,
        validators: Vec<Address>,
    ) -> Result<(), VerificationError> {
        let Some(history) = &self.validators else {
            return Ok(());
        };
        let mut history = history.write();
        let before = history.diffs().len();
        history.apply(block, validators)?;
        if history.diffs().len() != before {
            debug!(
                chain_id = self.config.chain_id,
                block,
                validators = history.current().len(),
                "[vc-05] Validator set transition recorded"
            );
        }
        Ok(())
    }

    /// Cached compact target of a difficulty period.
    pub fn period_target(&self, period: u64) -> Option<u32> {
        self.targets.read().get(&period).copied()
    }

    /// Most recent cached period at or below `period`.
    pub fn nearest_period(&self, period: u64) -> Option<(u64, u32)> {
        self.targets
            .read()
            .range(..=period)
            .next_back()
            .map(|(p, bits)| (*p, *bits))
    }

    /// Store the verified target of a period.
    pub fn store_period_target(&self, period: u64, bits: u32) {
        let previous = self.targets.write().insert(period, bits);
        if previous != Some(bits) {
            debug!(
                chain_id = self.config.chain_id,
                period,
                bits = %format!("{bits:#010x}"),
                "[vc-05] Period target cached"
            );
        }
    }
}
