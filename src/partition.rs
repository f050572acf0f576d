//! Node-range partitioning for data-parallel phases

use std::ops::Range;

/// Split `0..node_count` into at most `concurrency` near-equal ranges.
///
/// Every node lands in exactly one range, so a task that owns a range is
/// the only writer for the per-node slots inside it.
pub fn node_ranges(node_count: usize, concurrency: usize) -> Vec<Range<usize>> {
    if node_count == 0 {
        return Vec::new();
    }

    let workers = concurrency.max(1).min(node_count);
    let chunk_size = (node_count + workers - 1) / workers;

    (0..workers)
        .map(|i| {
            let start = i * chunk_size;
            let end = std::cmp::min(start + chunk_size, node_count);
            start..end
        })
        .filter(|r| !r.is_empty())
        .collect()
}
