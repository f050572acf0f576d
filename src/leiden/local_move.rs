//! Greedy local-move phase

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

use rayon::prelude::*;

use crate::error::Result;
use crate::graph::CompressedGraph;
use crate::leiden::quality::QualityFunction;
use crate::leiden::volumes::AtomicVolumes;
use crate::partition::node_ranges;
use crate::termination::TerminationFlag;

/// Pass cap bounding runtime on pathological inputs.
const MAX_PASSES: usize = 10;

/// Gains below this are treated as ties.
const GAIN_EPSILON: f64 = 1e-10;

/// Repeatedly scan all nodes and move each to the neighboring community
/// with the strictly largest modularity gain, until a full pass makes no
/// move or the pass cap is hit.
///
/// Ties retain the current community; equal-gain targets resolve to the
/// lowest community id. The assignment and the community-volume table
/// are updated in place so later nodes in the same pass see fresh state;
/// volume updates go through atomic read-modify-write since partitions
/// run concurrently.
///
/// Returns the total number of moves performed.
pub(crate) fn local_move(
    graph: &CompressedGraph,
    communities: &mut [usize],
    node_volumes: &[f64],
    community_volumes: &mut Vec<f64>,
    total_volume: f64,
    quality: &dyn QualityFunction,
    concurrency: usize,
    flag: &TerminationFlag,
) -> Result<usize> {
    let assignment: Vec<AtomicUsize> = communities
        .iter()
        .map(|&c| AtomicUsize::new(c))
        .collect();
    let volumes = AtomicVolumes::from_values(community_volumes);
    let ranges = node_ranges(graph.node_count, concurrency);

    let mut total_moves = 0usize;
    for pass in 0..MAX_PASSES {
        flag.check()?;

        let pass_moves = AtomicUsize::new(0);
        ranges.par_iter().try_for_each(|range| -> Result<()> {
            flag.check()?;

            let mut neighbor_weights: HashMap<usize, f64> = HashMap::new();
            let mut candidates: Vec<(usize, f64)> = Vec::new();

            for node in range.clone() {
                let current = assignment[node].load(Ordering::SeqCst);
                let node_volume = node_volumes[node];

                neighbor_weights.clear();
                for (target, weight) in graph.neighbors(node) {
                    let target = target as usize;
                    if target == node {
                        continue;
                    }
                    let community = assignment[target].load(Ordering::SeqCst);
                    *neighbor_weights.entry(community).or_insert(0.0) += weight;
                }

                // Gain of staying, with the node's own volume removed
                let weight_to_current = neighbor_weights.get(&current).copied().unwrap_or(0.0);
                let current_volume = volumes.load(current) - node_volume;
                let mut best_community = current;
                let mut best_gain =
                    quality.gain(weight_to_current, node_volume, current_volume, total_volume);

                // Candidates in ascending id order so equal gains resolve
                // to the lowest community id
                candidates.clear();
                candidates.extend(neighbor_weights.iter().map(|(&c, &w)| (c, w)));
                candidates.sort_unstable_by_key(|&(c, _)| c);

                for &(community, weight_to_community) in &candidates {
                    if community == current {
                        continue;
                    }
                    let gain = quality.gain(
                        weight_to_community,
                        node_volume,
                        volumes.load(community),
                        total_volume,
                    );
                    if gain > best_gain + GAIN_EPSILON {
                        best_gain = gain;
                        best_community = community;
                    }
                }

                if best_community != current {
                    assignment[node].store(best_community, Ordering::SeqCst);
                    volumes.transfer(current, best_community, node_volume);
                    pass_moves.fetch_add(1, Ordering::Relaxed);
                }
            }
            Ok(())
        })?;

        let pass_moves = pass_moves.into_inner();
        log::debug!("local move pass {pass}: {pass_moves} moves");
        total_moves += pass_moves;
        if pass_moves == 0 {
            break;
        }
    }

    for (slot, atomic) in communities.iter_mut().zip(assignment) {
        *slot = atomic.into_inner();
    }
    *community_volumes = volumes.into_values();

    Ok(total_moves)
}
