//! # Node Selection Scenarios
//!
//! Ranking is a pure function of the recorded history: two registries fed
//! the same outcomes at the same times pick the same candidates. Failures
//! push a node down the ranking, the blacklist window takes it out, and its
//! expiry brings it back discounted.

#[cfg(test)]
mod tests {
    use proptest::prelude::*;
    use vc_03_node_registry::{
        Node, NodeRegistry, NodeStatus, Nodelist, Outcome, RegistryConfig, Timestamp,
    };

    const CHAIN: u64 = 1;

    fn registry(nodes: usize) -> NodeRegistry {
        let mut registry = NodeRegistry::new(RegistryConfig::for_testing()).unwrap();
        let nodes = (0..nodes)
            .map(|i| Node::new(format!("https://node-{i}"), [i as u8 + 1; 20], CHAIN))
            .collect();
        registry.register_chain(Nodelist::new(CHAIN, nodes)).unwrap();
        registry
    }

    fn urls(registry: &mut NodeRegistry, count: usize, now: u64) -> Vec<String> {
        registry
            .select_candidates(CHAIN, count, &[], Timestamp::new(now))
            .unwrap()
            .into_iter()
            .map(|w| w.url)
            .collect()
    }

    fn outcome_strategy() -> impl Strategy<Value = Outcome> {
        prop_oneof![
            (1u64..2_000).prop_map(|response_ms| Outcome::Success { response_ms }),
            Just(Outcome::TransportFailure),
            Just(Outcome::Malformed),
            Just(Outcome::VerificationFailed),
        ]
    }

    proptest! {
        #[test]
        fn prop_same_history_same_selection(
            history in prop::collection::vec((0usize..6, outcome_strategy(), 0u64..30), 0..40),
            count in 1usize..6,
        ) {
            let mut a = registry(6);
            let mut b = registry(6);
            let mut now = 1_000u64;
            for (node, outcome, step) in &history {
                now += step;
                let url = format!("https://node-{node}");
                a.record_outcome(CHAIN, &url, *outcome, Timestamp::new(now)).unwrap();
                b.record_outcome(CHAIN, &url, *outcome, Timestamp::new(now)).unwrap();
            }
            let picked = urls(&mut a, count, now);
            prop_assert_eq!(&picked, &urls(&mut b, count, now));
            prop_assert!(picked.len() <= count);

            let mut unique = picked.clone();
            unique.sort();
            unique.dedup();
            prop_assert_eq!(unique.len(), picked.len());
        }

        #[test]
        fn prop_blacklisted_never_selected(
            failing in 0usize..4,
            now in 1_000u64..2_000,
        ) {
            let mut r = registry(4);
            let url = format!("https://node-{failing}");
            r.record_outcome(CHAIN, &url, Outcome::VerificationFailed, Timestamp::new(now)).unwrap();
            prop_assert!(!urls(&mut r, 4, now).contains(&url));
        }
    }

    #[test]
    fn test_failures_lower_ranking() {
        let mut r = registry(3);
        let now = 1_000;
        assert_eq!(urls(&mut r, 3, now)[0], "https://node-0");

        r.record_outcome(CHAIN, "https://node-0", Outcome::TransportFailure, Timestamp::new(now))
            .unwrap();
        let ranked = urls(&mut r, 3, now + 1);
        assert_eq!(ranked.len(), 3);
        assert_eq!(ranked.last().unwrap(), "https://node-0");
    }

    #[test]
    fn test_successes_raise_ranking() {
        let mut r = registry(3);
        for i in 0..5 {
            r.record_outcome(
                CHAIN,
                "https://node-2",
                Outcome::Success { response_ms: 50 },
                Timestamp::new(1_000 + i),
            )
            .unwrap();
        }
        assert_eq!(urls(&mut r, 1, 1_010), ["https://node-2"]);
    }

    #[test]
    fn test_blacklist_expires_after_window() {
        let mut r = registry(2);
        let window = r.config().blacklist_window_secs;
        r.record_outcome(CHAIN, "https://node-0", Outcome::VerificationFailed, Timestamp::new(1_000))
            .unwrap();
        assert!(matches!(
            r.node(CHAIN, "https://node-0").unwrap().status,
            NodeStatus::Blacklisted { .. }
        ));
        assert_eq!(urls(&mut r, 2, 1_000 + window - 1), ["https://node-1"]);

        let after = urls(&mut r, 2, 1_000 + window);
        assert_eq!(after.len(), 2);
        let node = r.node(CHAIN, "https://node-0").unwrap();
        assert_eq!(node.status, NodeStatus::Active);
        assert!(node.weight < 1.0);
    }

    #[test]
    fn test_exclusion_ignored_when_pool_would_empty() {
        let mut r = registry(2);
        let exclude = vec!["https://node-0".to_string(), "https://node-1".to_string()];
        let picked = r
            .select_candidates(CHAIN, 1, &exclude, Timestamp::new(1_000))
            .unwrap();
        assert_eq!(picked.len(), 1);

        let exclude = vec!["https://node-0".to_string()];
        let picked = r
            .select_candidates(CHAIN, 2, &exclude, Timestamp::new(1_000))
            .unwrap();
        assert_eq!(picked.len(), 1);
        assert_eq!(picked[0].url, "https://node-1");
    }
}
