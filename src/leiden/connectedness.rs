//! Well-connectedness acceptance test

use crate::graph::CompressedGraph;

/// Whether a subset stays adequately connected to the remainder of its
/// original community.
///
/// Accepts iff the edge weight crossing between the two sides is at
/// least `gamma * volume(subset) * volume(remainder) / totalVolume`.
/// Volumes are normalized by the total graph volume, consistent with
/// the modularity gain function.
pub fn is_well_connected(
    cross_weight: f64,
    subset_volume: f64,
    remainder_volume: f64,
    total_volume: f64,
    gamma: f64,
) -> bool {
    cross_weight >= gamma * subset_volume * remainder_volume / total_volume
}

/// Edge weight between the members of a refined community and the
/// remainder of its parent community. Used to verify refinement output
/// independently of the incremental bookkeeping.
pub fn cross_weight_to_remainder(
    graph: &CompressedGraph,
    parent_communities: &[usize],
    refined_communities: &[usize],
    refined_id: usize,
) -> f64 {
    let mut cross = 0.0;
    for node in 0..graph.node_count {
        if refined_communities[node] != refined_id {
            continue;
        }
        let parent = parent_communities[node];
        for (target, weight) in graph.neighbors(node) {
            let target = target as usize;
            if refined_communities[target] != refined_id && parent_communities[target] == parent {
                cross += weight;
            }
        }
    }
    cross
}
