//! # Request Flow Scenarios
//!
//! End-to-end verified requests through `LightClient`:
//!
//! 1. **Account proof**: balance verified against the state trie
//! 2. **Cache idempotence**: the second identical request never reaches a node
//! 3. **Retry ceiling**: an always-failing pool costs exactly `max_attempts` rounds
//! 4. **Reputation**: a lying node is blacklisted and skipped afterwards

#[cfg(test)]
mod tests {
    use crate::fixtures::{eth_client, Collaborators};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use vc_01_byte_codec::{bytes_to_hex, quantity_to_hex};
    use vc_03_node_registry::NodeStatus;
    use vc_05_proof_verifier::test_utils::account_fixture;
    use vc_05_proof_verifier::VerificationError;
    use vc_06_request_context::test_utils::ScriptedTransport;
    use vc_06_request_context::{
        Cache, MemoryCache, ProofLevel, RequestError, RequestPolicy, RequestState, TransportError,
    };

    const ACCOUNT: [u8; 20] = [0x5a; 20];

    fn balance_params() -> String {
        format!(r#"["{}","0x64"]"#, bytes_to_hex(&ACCOUNT))
    }

    // =========================================================================
    // ACCOUNT PROOFS
    // =========================================================================

    #[test]
    fn test_balance_verified_end_to_end() {
        let fixture = account_fixture(ACCOUNT, 42_000, 1, &[], &[]);
        let transport = Arc::new(ScriptedTransport::always(
            &format!("\"{}\"", quantity_to_hex(42_000)),
            Some(&fixture.proof_json),
        ));
        let client = eth_client(3, transport.clone(), Collaborators::default());

        let result = client.send(1, "eth_getBalance", &balance_params()).unwrap();
        assert_eq!(result, format!("\"{}\"", quantity_to_hex(42_000)));

        let envelope = transport.requests()[0].envelope().clone();
        let in3 = envelope.root().get("in3").unwrap();
        assert_eq!(in3.get("verification").unwrap().as_str().unwrap(), "proof");
    }

    #[test]
    fn test_proof_for_other_block_rejected() {
        let fixture = account_fixture(ACCOUNT, 42_000, 1, &[], &[]);
        let transport = Arc::new(ScriptedTransport::always(
            &format!("\"{}\"", quantity_to_hex(42_000)),
            Some(&fixture.proof_json),
        ));
        let client = eth_client(2, transport, Collaborators::default());
        let params = format!(r#"["{}","0x65"]"#, bytes_to_hex(&ACCOUNT));
        let err = client.send(1, "eth_getBalance", &params).unwrap_err();
        assert!(matches!(
            err.root_cause(),
            RequestError::Verification {
                source: VerificationError::ProofMismatch(_),
                ..
            }
        ));
    }

    // =========================================================================
    // CACHE
    // =========================================================================

    #[test]
    fn test_identical_request_answered_from_cache() {
        let fixture = account_fixture(ACCOUNT, 7, 0, &[], &[]);
        let transport = Arc::new(ScriptedTransport::always(
            &format!("\"{}\"", quantity_to_hex(7)),
            Some(&fixture.proof_json),
        ));
        let cache = Arc::new(MemoryCache::new(64));
        let client = eth_client(
            2,
            transport.clone(),
            Collaborators {
                cache: Some(cache.clone()),
                ..Collaborators::default()
            },
        );

        let first = client.send(1, "eth_getBalance", &balance_params()).unwrap();
        let second = client.send(1, "eth_getBalance", &balance_params()).unwrap();
        assert_eq!(first, second);
        assert_eq!(transport.calls(), 1);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_unverified_results_never_cached() {
        let transport = Arc::new(ScriptedTransport::always("\"0x7\"", None));
        let cache = Arc::new(MemoryCache::new(64));
        let client = eth_client(
            2,
            transport.clone(),
            Collaborators {
                cache: Some(cache.clone()),
                policy: Some(RequestPolicy {
                    proof: ProofLevel::None,
                    ..RequestPolicy::for_testing()
                }),
                ..Collaborators::default()
            },
        );
        for _ in 0..2 {
            client.send(1, "eth_getBalance", &balance_params()).unwrap();
        }
        assert_eq!(transport.calls(), 2);
        assert!(cache.get("anything").is_none());
        assert!(cache.is_empty());
    }

    // =========================================================================
    // RETRIES
    // =========================================================================

    #[test]
    fn test_retry_ceiling_bounds_transport_calls() {
        let transport = Arc::new(ScriptedTransport::failing());
        let client = eth_client(
            4,
            transport.clone(),
            Collaborators {
                policy: Some(RequestPolicy {
                    request_count: 1,
                    max_attempts: 3,
                    ..RequestPolicy::default()
                }),
                ..Collaborators::default()
            },
        );
        let err = client.send(1, "eth_blockNumber", "[]").unwrap_err();
        match err {
            RequestError::ExhaustedAttempts {
                attempts, cause, ..
            } => {
                assert_eq!(attempts, 3);
                assert!(matches!(
                    *cause,
                    RequestError::Transport(TransportError::Timeout { .. })
                ));
            }
            other => panic!("unexpected error {other:?}"),
        }
        assert_eq!(transport.calls(), 3);
    }

    #[test]
    fn test_always_failing_verifier_bounds_rounds() {
        let fixture = account_fixture(ACCOUNT, 1, 0, &[], &[]);
        let transport = Arc::new(ScriptedTransport::always(
            "\"0x2\"",
            Some(&fixture.proof_json),
        ));
        let client = eth_client(6, transport.clone(), Collaborators::default());
        let mut ctx = client.context(
            1,
            "eth_getBalance",
            vc_02_token_model::Document::parse_json(balance_params()).unwrap(),
        );
        assert_eq!(ctx.run(), RequestState::Failed);
        assert_eq!(ctx.attempt(), client.engine().policy().max_attempts);
        assert_eq!(transport.calls() as u32, client.engine().policy().max_attempts);
    }

    // =========================================================================
    // REPUTATION
    // =========================================================================

    #[test]
    fn test_lying_node_blacklisted_then_avoided() {
        let fixture = account_fixture(ACCOUNT, 9, 0, &[], &[]);
        let proof = fixture.proof_json.clone();
        let liar_hits = Arc::new(AtomicUsize::new(0));
        let hits = liar_hits.clone();
        let first_round = Arc::new(AtomicUsize::new(0));
        let transport = Arc::new(ScriptedTransport::new(move |url, request| {
            if url == "https://node-0" {
                hits.fetch_add(1, Ordering::SeqCst);
                return Ok(request.reply(&format!("\"{}\"", quantity_to_hex(10)), Some(&proof)));
            }
            // Honest nodes are unreachable during the first round only.
            if first_round.fetch_add(1, Ordering::SeqCst) < 2 {
                return Err(TransportError::Timeout { url: url.to_string() });
            }
            Ok(request.reply(&format!("\"{}\"", quantity_to_hex(9)), Some(&proof)))
        }));
        let client = eth_client(
            3,
            transport,
            Collaborators {
                policy: Some(RequestPolicy {
                    request_count: 3,
                    max_attempts: 1,
                    cache: false,
                    ..RequestPolicy::default()
                }),
                ..Collaborators::default()
            },
        );

        let err = client.send(1, "eth_getBalance", &balance_params()).unwrap_err();
        assert!(matches!(err.root_cause(), RequestError::Verification { .. }));
        {
            let registry = client.engine().registry().lock();
            let liar = registry.node(1, "https://node-0").unwrap();
            assert!(matches!(liar.status, NodeStatus::Blacklisted { .. }));
            assert_eq!(liar.consecutive_verification_failures, 1);
            let honest = registry.node(1, "https://node-1").unwrap();
            assert_eq!(honest.status, NodeStatus::Active);
        }

        for _ in 0..3 {
            assert_eq!(
                client.send(1, "eth_getBalance", &balance_params()).unwrap(),
                format!("\"{}\"", quantity_to_hex(9))
            );
        }
        assert_eq!(liar_hits.load(Ordering::SeqCst), 1);
    }
}
