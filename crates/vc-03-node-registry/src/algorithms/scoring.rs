//! # Node Scoring
//!
//! ```text
//! Active ──failure (threshold reached)──> Blacklisted { until = now + window }
//!   ^                                          │
//!   └──── now >= until, weight *= discount ────┘
//! ```

use crate::config::RegistryConfig;
use crate::domain::{Node, NodeStatus, NodeWeight, Outcome, Timestamp};

/// Apply a request outcome to a node.
///
/// Returns `true` if this outcome blacklisted the node.
pub fn apply_outcome(
    node: &mut Node,
    outcome: Outcome,
    now: Timestamp,
    config: &RegistryConfig,
) -> bool {
    node.request_count += 1;

    let penalty = match outcome {
        Outcome::Success { response_ms } => {
            node.success_count += 1;
            node.consecutive_failures = 0;
            node.consecutive_verification_failures = 0;
            node.weight = clamp_weight(node.weight * config.success_reward, config);
            let sample = response_ms as f64;
            node.avg_response_ms = Some(match node.avg_response_ms {
                None => sample,
                Some(avg) => avg + config.response_time_smoothing * (sample - avg),
            });
            return false;
        }
        Outcome::TransportFailure => config.transport_penalty,
        Outcome::Malformed => config.malformed_penalty,
        Outcome::VerificationFailed => {
            node.consecutive_verification_failures += 1;
            config.verification_penalty
        }
    };

    node.consecutive_failures += 1;
    node.last_failure = Some(now);
    node.weight = clamp_weight(node.weight * penalty, config);

    let blacklist = node.is_active()
        && (node.consecutive_failures >= config.failure_threshold
            || node.consecutive_verification_failures >= config.verification_blacklist_threshold);
    if blacklist {
        node.status = NodeStatus::Blacklisted {
            until: now.add_secs(config.blacklist_window_secs),
        };
    }
    blacklist
}

/// Return an expired blacklisted node to `Active` with a discounted weight.
///
/// Returns `true` if the node was rehabilitated.
pub fn expire_blacklist(node: &mut Node, now: Timestamp, config: &RegistryConfig) -> bool {
    match node.status {
        NodeStatus::Blacklisted { until } if now >= until => {
            node.status = NodeStatus::Active;
            node.consecutive_failures = 0;
            node.consecutive_verification_failures = 0;
            node.weight = clamp_weight(node.weight * config.rehabilitation_discount, config);
            true
        }
        _ => false,
    }
}

/// `ref / (ref + avg)`: 1.0 for unknown, 0.5 at the reference time.
pub fn response_factor(node: &Node, config: &RegistryConfig) -> f64 {
    match node.avg_response_ms {
        None => 1.0,
        Some(avg) => {
            let reference = config.response_time_reference_ms;
            reference / (reference + avg.max(0.0))
        }
    }
}

/// Penalty for a failure inside the recency window, 1.0 otherwise.
pub fn recency_factor(node: &Node, now: Timestamp, config: &RegistryConfig) -> f64 {
    match node.last_failure {
        Some(at) if now.secs_since(at) < config.recency_window_secs => config.recency_penalty,
        _ => 1.0,
    }
}

/// Per-request ranking snapshot.
pub fn weigh(node: &Node, index: usize, now: Timestamp, config: &RegistryConfig) -> NodeWeight {
    let response = response_factor(node, config);
    let recency = recency_factor(node, now, config);
    NodeWeight {
        url: node.url.clone(),
        address: node.address,
        base_weight: node.weight,
        response_factor: response,
        recency_factor: recency,
        score: node.weight * response * recency,
        index,
    }
}

fn clamp_weight(weight: f64, config: &RegistryConfig) -> f64 {
    weight.clamp(config.min_weight, config.max_weight)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node() -> Node {
        Node::new("https://node", [1u8; 20], 1)
    }

    #[test]
    fn test_success_raises_weight_and_tracks_latency() {
        let config = RegistryConfig::default();
        let mut n = node();
        apply_outcome(&mut n, Outcome::Success { response_ms: 100 }, Timestamp::new(0), &config);
        assert!(n.weight > 1.0);
        assert_eq!(n.avg_response_ms, Some(100.0));
        apply_outcome(&mut n, Outcome::Success { response_ms: 200 }, Timestamp::new(1), &config);
        let avg = n.avg_response_ms.unwrap();
        assert!((avg - 120.0).abs() < 1e-9);
        assert_eq!(n.success_count, 2);
    }

    #[test]
    fn test_verification_penalized_harder_than_transport() {
        let config = RegistryConfig::default();
        let mut a = node();
        let mut b = node();
        apply_outcome(&mut a, Outcome::TransportFailure, Timestamp::new(0), &config);
        apply_outcome(&mut b, Outcome::VerificationFailed, Timestamp::new(0), &config);
        assert!(b.weight < a.weight);
    }

    #[test]
    fn test_threshold_blacklists() {
        let config = RegistryConfig::default();
        let mut n = node();
        let now = Timestamp::new(1000);
        assert!(!apply_outcome(&mut n, Outcome::TransportFailure, now, &config));
        assert!(!apply_outcome(&mut n, Outcome::Malformed, now, &config));
        assert!(apply_outcome(&mut n, Outcome::TransportFailure, now, &config));
        assert_eq!(
            n.status,
            NodeStatus::Blacklisted {
                until: Timestamp::new(1000 + config.blacklist_window_secs)
            }
        );
    }

    #[test]
    fn test_verification_failure_blacklists_immediately() {
        let config = RegistryConfig::default();
        let mut n = node();
        assert!(apply_outcome(
            &mut n,
            Outcome::VerificationFailed,
            Timestamp::new(5),
            &config
        ));
        assert!(!n.is_active());
    }

    #[test]
    fn test_success_resets_failures() {
        let config = RegistryConfig::default();
        let mut n = node();
        apply_outcome(&mut n, Outcome::TransportFailure, Timestamp::new(0), &config);
        apply_outcome(&mut n, Outcome::TransportFailure, Timestamp::new(0), &config);
        apply_outcome(&mut n, Outcome::Success { response_ms: 10 }, Timestamp::new(0), &config);
        assert_eq!(n.consecutive_failures, 0);
        assert!(!apply_outcome(&mut n, Outcome::TransportFailure, Timestamp::new(0), &config));
    }

    #[test]
    fn test_blacklist_expiry_discounts_weight() {
        let config = RegistryConfig::default();
        let mut n = node();
        apply_outcome(&mut n, Outcome::VerificationFailed, Timestamp::new(0), &config);
        let weight_before = n.weight;

        assert!(!expire_blacklist(&mut n, Timestamp::new(10), &config));
        assert!(!n.is_active());

        let later = Timestamp::new(config.blacklist_window_secs);
        assert!(expire_blacklist(&mut n, later, &config));
        assert!(n.is_active());
        assert!(n.weight < weight_before);
        assert!(n.weight < 1.0);
    }

    #[test]
    fn test_weight_is_bounded() {
        let config = RegistryConfig::default();
        let mut n = node();
        for _ in 0..1000 {
            apply_outcome(&mut n, Outcome::Success { response_ms: 1 }, Timestamp::new(0), &config);
        }
        assert_eq!(n.weight, config.max_weight);
    }

    #[test]
    fn test_factors() {
        let config = RegistryConfig::default();
        let mut n = node();
        assert_eq!(response_factor(&n, &config), 1.0);
        n.avg_response_ms = Some(config.response_time_reference_ms);
        assert_eq!(response_factor(&n, &config), 0.5);

        n.last_failure = Some(Timestamp::new(100));
        assert_eq!(
            recency_factor(&n, Timestamp::new(101), &config),
            config.recency_penalty
        );
        let after = Timestamp::new(100 + config.recency_window_secs);
        assert_eq!(recency_factor(&n, after, &config), 1.0);

        let w = weigh(&n, 3, Timestamp::new(101), &config);
        assert_eq!(w.index, 3);
        assert!((w.score - 0.5 * config.recency_penalty).abs() < 1e-12);
    }
}
