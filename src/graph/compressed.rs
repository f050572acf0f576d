//! Memory-efficient weighted graph representation

use std::mem;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

/// Compressed sparse representation of an undirected weighted graph.
///
/// Every undirected edge appears in both endpoints' adjacency lists. A
/// self-loop is stored once with its weight already doubled, so the sum
/// of a node's stored weights is its volume (self-loops counted twice)
/// and the sum over all nodes is twice the total edge weight.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompressedGraph {
    /// Number of nodes in the graph
    pub node_count: usize,

    /// Offset array: index where each node's edges begin.
    /// offsets[i] to offsets[i+1] defines the edge range for node i
    pub offsets: Vec<u32>,

    /// Edge array: concatenated lists of target nodes
    pub targets: Vec<u32>,

    /// Edge weights, parallel to `targets`
    pub weights: Vec<f64>,
}

impl CompressedGraph {
    /// Create a graph with pre-allocated capacity.
    pub fn with_capacity(node_count: usize, edge_count: usize) -> Self {
        Self {
            node_count,
            offsets: Vec::with_capacity(node_count + 1),
            targets: Vec::with_capacity(edge_count),
            weights: Vec::with_capacity(edge_count),
        }
    }

    /// Iterate over the neighbors of a node as (target, weight) pairs.
    pub fn neighbors(&self, node: usize) -> impl Iterator<Item = (u32, f64)> + '_ {
        let start = self.offsets[node] as usize;
        let end = self.offsets[node + 1] as usize;
        self.targets[start..end]
            .iter()
            .copied()
            .zip(self.weights[start..end].iter().copied())
    }

    /// Number of adjacency entries for a node.
    pub fn degree(&self, node: usize) -> usize {
        let start = self.offsets[node] as usize;
        let end = self.offsets[node + 1] as usize;
        end - start
    }

    /// Weighted degree of a node, self-loops counted twice.
    pub fn volume(&self, node: usize) -> f64 {
        self.neighbors(node).map(|(_, w)| w).sum()
    }

    /// Per-node volumes. With `weighted` false every edge counts as 1
    /// (self-loops as 2), matching the unit-degree convention.
    pub fn node_volumes(&self, weighted: bool) -> Vec<f64> {
        (0..self.node_count)
            .into_par_iter()
            .map(|node| {
                if weighted {
                    self.volume(node)
                } else {
                    self.neighbors(node)
                        .map(|(t, _)| if t as usize == node { 2.0 } else { 1.0 })
                        .sum()
                }
            })
            .collect()
    }

    /// Sum of all node volumes; equals twice the total edge weight.
    pub fn total_volume(&self) -> f64 {
        self.weights.iter().sum()
    }

    /// Copy of the graph with every edge at weight 1 (self-loops keep
    /// their doubled storage convention), for unit-degree runs.
    pub fn with_unit_weights(&self) -> CompressedGraph {
        let mut weights = Vec::with_capacity(self.weights.len());
        for node in 0..self.node_count {
            for (target, _) in self.neighbors(node) {
                weights.push(if target as usize == node { 2.0 } else { 1.0 });
            }
        }

        CompressedGraph {
            node_count: self.node_count,
            offsets: self.offsets.clone(),
            targets: self.targets.clone(),
            weights,
        }
    }

    /// Estimate memory usage in bytes.
    pub fn memory_usage(&self) -> usize {
        let base = mem::size_of::<Self>();
        let offsets = self.offsets.capacity() * mem::size_of::<u32>();
        let targets = self.targets.capacity() * mem::size_of::<u32>();
        let weights = self.weights.capacity() * mem::size_of::<f64>();

        base + offsets + targets + weights
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::GraphBuilder;

    fn triangle() -> CompressedGraph {
        let mut builder = GraphBuilder::new(3);
        builder.add_edge(0, 1, 1.0);
        builder.add_edge(1, 2, 2.0);
        builder.add_edge(0, 2, 3.0);
        builder.build()
    }

    #[test]
    fn test_neighbors_and_degree() {
        let graph = triangle();
        assert_eq!(graph.node_count, 3);
        assert_eq!(graph.degree(0), 2);

        let mut n0: Vec<(u32, f64)> = graph.neighbors(0).collect();
        n0.sort_by_key(|&(t, _)| t);
        assert_eq!(n0, vec![(1, 1.0), (2, 3.0)]);
    }

    #[test]
    fn test_volume_counts_self_loops_twice() {
        let mut builder = GraphBuilder::new(2);
        builder.add_edge(0, 1, 1.0);
        builder.add_edge(0, 0, 2.0);
        let graph = builder.build();

        assert!((graph.volume(0) - 5.0).abs() < 1e-12);
        assert!((graph.volume(1) - 1.0).abs() < 1e-12);
        assert!((graph.total_volume() - 6.0).abs() < 1e-12);
    }

    #[test]
    fn test_total_volume_is_twice_edge_weight() {
        let graph = triangle();
        assert!((graph.total_volume() - 12.0).abs() < 1e-12);
    }

    #[test]
    fn test_unit_volumes() {
        let graph = triangle();
        let volumes = graph.node_volumes(false);
        assert_eq!(volumes, vec![2.0, 2.0, 2.0]);
    }
}
