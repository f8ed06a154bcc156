//! Client builders shared by the integration scenarios.

use std::sync::Arc;
use vc_05_proof_verifier::test_utils::{BtcChainFixture, BTC_CHAIN_ID};
use vc_05_proof_verifier::{BtcParams, ChainConfig};
use vc_06_request_context::test_utils::{boot_nodes, FixedTimeSource, ScriptedTransport};
use vc_06_request_context::{Cache, ClientConfig, LightClient, RequestPolicy, Signer};

/// Unix time the scenarios run at.
pub const NOW: u64 = 1_700_000_000;

/// Optional collaborators of a scenario client.
#[derive(Default)]
pub struct Collaborators {
    /// Result and snapshot cache
    pub cache: Option<Arc<dyn Cache>>,
    /// Transaction signer
    pub signer: Option<Arc<dyn Signer>>,
    /// Policy overriding [`RequestPolicy::for_testing`]
    pub policy: Option<RequestPolicy>,
}

/// Client for `chains`, each served by `nodes` boot nodes.
pub fn client_for(
    mut chains: Vec<ChainConfig>,
    nodes: usize,
    transport: Arc<ScriptedTransport>,
    extra: Collaborators,
) -> LightClient {
    for chain in &mut chains {
        chain.boot_nodes = boot_nodes(nodes);
    }
    let mut config = ClientConfig::for_testing(chains);
    if let Some(policy) = extra.policy {
        config.request = policy;
    }
    let mut builder = LightClient::builder(config)
        .transport(transport)
        .time_source(Arc::new(FixedTimeSource::new(NOW)));
    if let Some(cache) = extra.cache {
        builder = builder.cache(cache);
    }
    if let Some(signer) = extra.signer {
        builder = builder.signer(signer);
    }
    builder.build().expect("scenario config is valid")
}

/// Ethereum mainnet client.
pub fn eth_client(nodes: usize, transport: Arc<ScriptedTransport>, extra: Collaborators) -> LightClient {
    client_for(vec![ChainConfig::ethereum(1)], nodes, transport, extra)
}

/// Regtest Bitcoin client trusting the fixture's period target.
pub fn btc_client(
    fixture: &BtcChainFixture,
    nodes: usize,
    transport: Arc<ScriptedTransport>,
) -> LightClient {
    let params = BtcParams {
        checkpoints: vec![(fixture.period(), fixture.block.bits)],
        ..BtcParams::regtest()
    };
    client_for(
        vec![ChainConfig::bitcoin(BTC_CHAIN_ID, params)],
        nodes,
        transport,
        Collaborators::default(),
    )
}
