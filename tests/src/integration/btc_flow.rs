//! # Bitcoin Scenarios
//!
//! `getblockheader` through the client on a regtest chain whose period
//! target is a configured checkpoint. A finality chain whose headers do not
//! link is rejected with `ChainLinkage`.

#[cfg(test)]
mod tests {
    use crate::fixtures::btc_client;
    use std::sync::Arc;
    use vc_01_byte_codec::bytes_to_hex;
    use vc_05_proof_verifier::test_utils::{btc_chain_fixture, BtcChainFixture, BTC_CHAIN_ID};
    use vc_05_proof_verifier::VerificationError;
    use vc_06_request_context::test_utils::ScriptedTransport;
    use vc_06_request_context::RequestError;

    fn header_params(fixture: &BtcChainFixture) -> String {
        format!(
            r#"["{}",false]"#,
            bytes_to_hex(&fixture.block.display_hash())
        )
    }

    fn header_transport(fixture: &BtcChainFixture) -> Arc<ScriptedTransport> {
        Arc::new(ScriptedTransport::always(
            &format!("\"{}\"", bytes_to_hex(&fixture.block.to_bytes())),
            Some(&fixture.proof_json()),
        ))
    }

    #[test]
    fn test_header_with_finality_verified() {
        let fixture = btc_chain_fixture(100, 3);
        let transport = header_transport(&fixture);
        let client = btc_client(&fixture, 2, transport.clone());

        let header = client
            .send(BTC_CHAIN_ID, "getblockheader", &header_params(&fixture))
            .unwrap();
        assert_eq!(header, format!("\"{}\"", bytes_to_hex(&fixture.block.to_bytes())));
        assert_eq!(transport.calls(), 1);
    }

    #[test]
    fn test_broken_linkage_rejected() {
        let mut fixture = btc_chain_fixture(100, 3);
        fixture.finality.swap(0, 1);
        let transport = header_transport(&fixture);
        let client = btc_client(&fixture, 2, transport.clone());

        let err = client
            .send(BTC_CHAIN_ID, "getblockheader", &header_params(&fixture))
            .unwrap_err();
        match err.root_cause() {
            RequestError::Verification { source, .. } => {
                assert!(matches!(source, VerificationError::ChainLinkage { index: 0 }));
            }
            other => panic!("unexpected error {other:?}"),
        }
        assert_eq!(transport.calls(), 2);
    }

    #[test]
    fn test_missing_finality_is_insufficient_work() {
        let mut fixture = btc_chain_fixture(100, 3);
        fixture.finality.truncate(0);
        let transport = header_transport(&fixture);
        let client = btc_client(&fixture, 2, transport);

        let err = client
            .send(BTC_CHAIN_ID, "getblockheader", &header_params(&fixture))
            .unwrap_err();
        assert!(matches!(
            err.root_cause(),
            RequestError::Verification {
                source: VerificationError::InsufficientWork,
                ..
            }
        ));
    }

    #[test]
    fn test_ethereum_method_unsupported_on_bitcoin() {
        let fixture = btc_chain_fixture(100, 3);
        let transport = header_transport(&fixture);
        let client = btc_client(&fixture, 1, transport.clone());
        assert!(client.send(BTC_CHAIN_ID, "eth_getBalance", "[]").is_err());
        assert_eq!(transport.calls(), 0);
    }
}
