//! # Candidate Selection
//!
//! Deterministic: ranking depends only on node state and `now`. Ties keep
//! nodelist order.

use crate::algorithms::scoring::weigh;
use crate::config::RegistryConfig;
use crate::domain::{Node, NodeWeight, Timestamp};
use std::cmp::Ordering;

/// Rank the active nodes accepted by `filter` and return the best `count`.
///
/// Nodes whose url is in `exclude` are skipped unless that would leave the
/// pool empty, in which case the exclusion is ignored.
pub fn rank_nodes<F>(
    nodes: &[Node],
    count: usize,
    exclude: &[String],
    now: Timestamp,
    config: &RegistryConfig,
    filter: F,
) -> Vec<NodeWeight>
where
    F: Fn(&Node) -> bool,
{
    let eligible: Vec<(usize, &Node)> = nodes
        .iter()
        .enumerate()
        .filter(|(_, n)| n.is_active() && filter(n))
        .collect();

    let preferred: Vec<(usize, &Node)> = eligible
        .iter()
        .copied()
        .filter(|(_, n)| !exclude.iter().any(|url| *url == n.url))
        .collect();

    let pool = if preferred.is_empty() { eligible } else { preferred };

    let mut ranked: Vec<NodeWeight> = pool
        .into_iter()
        .map(|(index, node)| weigh(node, index, now, config))
        .collect();

    ranked.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(Ordering::Equal)
            .then(a.index.cmp(&b.index))
    });
    ranked.truncate(count);
    ranked
}
