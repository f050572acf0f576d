//! Parallel modularity computation

use rayon::prelude::*;

use crate::error::Result;
use crate::graph::CompressedGraph;
use crate::partition::node_ranges;
use crate::termination::TerminationFlag;

/// Global modularity of an assignment:
/// `Q = sum_C [ internal(C)/totalWeight - gamma * (volume(C)/totalVolume)^2 ]`.
///
/// Node ranges accumulate internal edge weight in parallel (read-only),
/// the partial sums reduce in partition order, and the community-volume
/// term is a single cheap pass. Deterministic for a fixed assignment.
pub(crate) fn modularity(
    graph: &CompressedGraph,
    communities: &[usize],
    community_volumes: &[f64],
    gamma: f64,
    total_volume: f64,
    concurrency: usize,
    flag: &TerminationFlag,
) -> Result<f64> {
    if total_volume <= 0.0 {
        return Ok(0.0);
    }

    let partials: Vec<f64> = node_ranges(graph.node_count, concurrency)
        .par_iter()
        .map(|range| -> Result<f64> {
            flag.check()?;
            let mut internal = 0.0;
            for node in range.clone() {
                let community = communities[node];
                for (target, weight) in graph.neighbors(node) {
                    if communities[target as usize] == community {
                        internal += weight;
                    }
                }
            }
            Ok(internal)
        })
        .collect::<Result<_>>()?;

    // Each internal edge was seen from both endpoints; self-loops carry
    // doubled weight already. Dividing by the total volume matches the
    // internal/totalWeight term.
    let internal_total: f64 = partials.iter().sum();

    let volume_term: f64 = community_volumes
        .iter()
        .map(|&v| {
            let fraction = v / total_volume;
            fraction * fraction
        })
        .sum();

    Ok(internal_total / total_volume - gamma * volume_term)
}
