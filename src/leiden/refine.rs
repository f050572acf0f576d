//! Randomized refinement phase

use std::collections::HashMap;

use rand::prelude::*;
use rand::rngs::StdRng;
use rayon::prelude::*;

use crate::error::Result;
use crate::graph::CompressedGraph;
use crate::leiden::connectedness::is_well_connected;
use crate::leiden::quality::QualityFunction;
use crate::termination::TerminationFlag;

/// Nodes processed between cancellation checks.
const CANCEL_CHECK_INTERVAL: usize = 1024;

/// Result of refining a local-move partition.
pub(crate) struct RefinementOutcome {
    /// Refined community per node; every community nests inside exactly
    /// one local-move community.
    pub communities: Vec<usize>,
    /// Volume per refined community id (node-indexed id space).
    pub community_volumes: Vec<f64>,
    /// Largest refined community id in use, for sizing later structures.
    pub max_community_id: usize,
}

/// Split each local-move community into well-connected sub-communities.
///
/// Every node starts in its own singleton refined community. In a
/// seeded-shuffle order, each node still in a singleton community that
/// is itself well connected to its parent community merges into a
/// neighboring refined community within the same parent, chosen among
/// eligible candidates with probability proportional to
/// `exp(gain / theta)`. Runs single-threaded so a fixed seed reproduces
/// the exact refined partition.
pub(crate) fn refine(
    graph: &CompressedGraph,
    parent_communities: &[usize],
    node_volumes: &[f64],
    parent_volumes: &[f64],
    total_volume: f64,
    quality: &dyn QualityFunction,
    gamma: f64,
    theta: f64,
    rng: &mut StdRng,
    flag: &TerminationFlag,
) -> Result<RefinementOutcome> {
    let node_count = graph.node_count;

    let mut refined: Vec<usize> = (0..node_count).collect();
    let mut refined_volumes: Vec<f64> = node_volumes.to_vec();
    let mut community_sizes: Vec<usize> = vec![1; node_count];

    // Edge weight from each refined community to the remainder of its
    // parent community, maintained incrementally across merges.
    let mut external: Vec<f64> = (0..node_count)
        .into_par_iter()
        .map(|node| {
            let parent = parent_communities[node];
            graph
                .neighbors(node)
                .filter(|&(t, _)| t as usize != node && parent_communities[t as usize] == parent)
                .map(|(_, w)| w)
                .sum()
        })
        .collect();

    let mut order: Vec<usize> = (0..node_count).collect();
    order.shuffle(rng);

    let mut neighbor_weights: HashMap<usize, f64> = HashMap::new();
    let mut candidates: Vec<(usize, f64, f64)> = Vec::new();

    for (processed, &node) in order.iter().enumerate() {
        if processed % CANCEL_CHECK_INTERVAL == 0 {
            flag.check()?;
        }
        if community_sizes[refined[node]] > 1 {
            continue;
        }

        let parent = parent_communities[node];
        let parent_volume = parent_volumes[parent];
        let node_volume = node_volumes[node];

        // Only nodes well connected to the rest of their parent may merge
        if !is_well_connected(
            external[node],
            node_volume,
            parent_volume - node_volume,
            total_volume,
            gamma,
        ) {
            continue;
        }

        neighbor_weights.clear();
        for (target, weight) in graph.neighbors(node) {
            let target = target as usize;
            if target == node || parent_communities[target] != parent {
                continue;
            }
            let community = refined[target];
            if community != refined[node] {
                *neighbor_weights.entry(community).or_insert(0.0) += weight;
            }
        }
        if neighbor_weights.is_empty() {
            continue;
        }

        // Eligible candidates: well connected within the parent, with
        // non-negative merge gain. Sorted for reproducible sampling.
        candidates.clear();
        candidates.extend(neighbor_weights.iter().map(|(&c, &w)| (c, w, 0.0)));
        candidates.sort_unstable_by_key(|&(c, _, _)| c);
        candidates.retain_mut(|entry| {
            let (community, weight_to_community, _) = *entry;
            let community_volume = refined_volumes[community];
            if !is_well_connected(
                external[community],
                community_volume,
                parent_volume - community_volume,
                total_volume,
                gamma,
            ) {
                return false;
            }
            let gain = quality.gain(weight_to_community, node_volume, community_volume, total_volume);
            entry.2 = gain;
            gain >= 0.0
        });
        if candidates.is_empty() {
            continue;
        }

        let target = sample_by_gain(&candidates, theta, rng);
        let (community, weight_to_community, _) = candidates[target];

        // Merge the singleton into the chosen community
        refined[node] = community;
        refined_volumes[community] += node_volume;
        refined_volumes[node] = 0.0;
        community_sizes[community] += 1;
        // Edges between the node and the target turn internal
        external[community] += external[node] - 2.0 * weight_to_community;
        external[node] = 0.0;
    }

    let max_community_id = refined.iter().copied().max().unwrap_or(0);

    Ok(RefinementOutcome {
        communities: refined,
        community_volumes: refined_volumes,
        max_community_id,
    })
}

/// Pick a candidate index with probability proportional to
/// `exp(gain / theta)`, shifted by the maximum gain for numeric
/// stability. Theta near zero degenerates to the greedy choice.
fn sample_by_gain(candidates: &[(usize, f64, f64)], theta: f64, rng: &mut StdRng) -> usize {
    let max_gain = candidates
        .iter()
        .map(|&(_, _, g)| g)
        .fold(f64::NEG_INFINITY, f64::max);

    let weights: Vec<f64> = candidates
        .iter()
        .map(|&(_, _, g)| ((g - max_gain) / theta).exp())
        .collect();
    let total: f64 = weights.iter().sum();

    let mut remaining = rng.gen::<f64>() * total;
    for (index, &w) in weights.iter().enumerate() {
        remaining -= w;
        if remaining <= 0.0 {
            return index;
        }
    }
    candidates.len() - 1
}
