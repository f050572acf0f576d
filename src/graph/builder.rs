//! Graph construction module

use petgraph::graph::UnGraph;
use petgraph::visit::EdgeRef;

use crate::graph::CompressedGraph;

/// Builder for incrementally constructing an undirected [`CompressedGraph`].
pub struct GraphBuilder {
    /// Number of nodes
    node_count: usize,

    /// Adjacency lists for each node as (target, weight)
    adjacency_lists: Vec<Vec<(u32, f64)>>,
}

impl GraphBuilder {
    /// Create a builder for a graph with a fixed node count.
    pub fn new(node_count: usize) -> Self {
        Self {
            node_count,
            adjacency_lists: vec![Vec::new(); node_count],
        }
    }

    /// Add an undirected edge. The edge lands in both adjacency lists;
    /// a self-loop is stored once with doubled weight so that volumes
    /// count it twice.
    pub fn add_edge(&mut self, source: u32, target: u32, weight: f64) {
        if source == target {
            self.adjacency_lists[source as usize].push((target, 2.0 * weight));
            return;
        }

        self.adjacency_lists[source as usize].push((target, weight));
        self.adjacency_lists[target as usize].push((source, weight));
    }

    /// Build a graph from a petgraph undirected graph with f64 edge weights.
    pub fn from_ungraph<N>(graph: &UnGraph<N, f64>) -> CompressedGraph {
        let mut builder = GraphBuilder::new(graph.node_count());
        for edge in graph.edge_references() {
            builder.add_edge(
                edge.source().index() as u32,
                edge.target().index() as u32,
                *edge.weight(),
            );
        }
        builder.build()
    }

    /// Flatten the adjacency lists into the compressed representation.
    pub fn build(mut self) -> CompressedGraph {
        let edge_count: usize = self.adjacency_lists.iter().map(|list| list.len()).sum();

        let mut graph = CompressedGraph::with_capacity(self.node_count, edge_count);
        graph.offsets.push(0);

        let mut offset = 0u32;
        for list in &mut self.adjacency_lists {
            // Sort by target for deterministic iteration order
            list.sort_by_key(|&(target, _)| target);
            offset += list.len() as u32;
            graph.offsets.push(offset);

            for &(target, weight) in list.iter() {
                graph.targets.push(target);
                graph.weights.push(weight);
            }
        }

        graph
    }
}
