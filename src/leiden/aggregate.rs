//! Weight-conserving graph contraction

use std::collections::HashMap;

use dashmap::DashMap;
use itertools::Itertools;
use rayon::prelude::*;

use crate::error::Result;
use crate::graph::CompressedGraph;
use crate::partition::node_ranges;
use crate::termination::TerminationFlag;

/// A coarsened graph whose nodes are the communities of the input.
pub(crate) struct AggregatedGraph {
    pub graph: CompressedGraph,
    /// Aggregated node id -> community id it contracts (a bijection).
    pub community_of_node: Vec<usize>,
}

/// Contract each community into one node. Cross-community edge weights
/// sum into one reciprocal relationship per community pair; internal
/// edge weight sums into a self-loop carrying twice the internal weight,
/// so total volume is conserved.
///
/// Community ids densify in ascending order; distinct partitions write
/// distinct output communities, so the per-community accumulation needs
/// no locking. `max_community_id` bounds the ids in `communities` and
/// sizes the densification table.
pub(crate) fn aggregate(
    graph: &CompressedGraph,
    communities: &[usize],
    max_community_id: usize,
    concurrency: usize,
    flag: &TerminationFlag,
) -> Result<AggregatedGraph> {
    flag.check()?;

    let community_of_node: Vec<usize> = communities.iter().copied().unique().sorted().collect();
    let mut dense = vec![usize::MAX; max_community_id + 1];
    for (dense_id, &community) in community_of_node.iter().enumerate() {
        dense[community] = dense_id;
    }
    let community_count = community_of_node.len();

    // Group member nodes by dense community id, in parallel over ranges
    let members: DashMap<usize, Vec<u32>> = DashMap::with_capacity(community_count);
    node_ranges(graph.node_count, concurrency)
        .par_iter()
        .try_for_each(|range| -> Result<()> {
            flag.check()?;
            for node in range.clone() {
                members
                    .entry(dense[communities[node]])
                    .or_default()
                    .push(node as u32);
            }
            Ok(())
        })?;

    // Per community, scan member edges and sum weights per target
    // community. Members scan in sorted order so float accumulation is
    // deterministic.
    let adjacency: Vec<Vec<(u32, f64)>> = (0..community_count)
        .into_par_iter()
        .map(|dense_id| -> Result<Vec<(u32, f64)>> {
            flag.check()?;

            let mut member_nodes = members
                .get(&dense_id)
                .map(|entry| entry.value().clone())
                .unwrap_or_default();
            member_nodes.sort_unstable();

            let mut weights: HashMap<usize, f64> = HashMap::new();
            for &node in &member_nodes {
                for (target, weight) in graph.neighbors(node as usize) {
                    let target_community = dense[communities[target as usize]];
                    *weights.entry(target_community).or_insert(0.0) += weight;
                }
            }

            let mut list: Vec<(u32, f64)> = weights
                .into_iter()
                .map(|(community, weight)| (community as u32, weight))
                .collect();
            list.sort_unstable_by_key(|&(community, _)| community);
            Ok(list)
        })
        .collect::<Result<_>>()?;

    let edge_count: usize = adjacency.iter().map(|list| list.len()).sum();
    let mut aggregated = CompressedGraph::with_capacity(community_count, edge_count);
    aggregated.offsets.push(0);

    let mut offset = 0u32;
    for list in &adjacency {
        offset += list.len() as u32;
        aggregated.offsets.push(offset);
        for &(target, weight) in list {
            aggregated.targets.push(target);
            aggregated.weights.push(weight);
        }
    }

    log::debug!(
        "aggregated {} nodes into {} communities",
        graph.node_count,
        community_count
    );

    Ok(AggregatedGraph {
        graph: aggregated,
        community_of_node,
    })
}
