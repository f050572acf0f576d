//! Multi-level Leiden community detection
//!
//! Drives the level loop over local move, modularity, refinement and
//! aggregation, and projects community ids back onto the original node
//! space once the run converges or the level cap is reached.
//!
//! Reference: Traag, Waltman, van Eck (2019). "From Louvain to Leiden:
//! guaranteeing well-connected communities." Scientific Reports 9, 5233.

mod aggregate;
pub mod connectedness;
mod local_move;
mod modularity;
pub mod quality;
mod refine;
mod volumes;

use std::collections::HashMap;

use itertools::Itertools;
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};

use crate::config::LeidenConfig;
use crate::error::{Error, Result};
use crate::graph::CompressedGraph;
use crate::termination::TerminationFlag;

use aggregate::aggregate;
use local_move::local_move;
use modularity::modularity;
use quality::RbModularity;
use refine::refine;
use volumes::check_volume_invariant;

/// Outcome of a Leiden run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LeidenResult {
    /// Community id per original node, renumbered to consecutive ids.
    pub communities: Vec<usize>,

    /// Modularity of the local-move partition at each executed level.
    pub modularities: Vec<f64>,

    /// Number of levels actually executed.
    pub ran_levels: usize,

    /// Whether the run stopped on convergence rather than the level cap.
    pub did_converge: bool,
}

impl LeidenResult {
    /// Number of distinct communities in the final assignment.
    pub fn community_count(&self) -> usize {
        self.communities.iter().unique().count()
    }
}

/// Working state for one level, rebuilt whenever the graph is coarsened.
struct LevelState {
    /// Community id per node of the current (possibly aggregated) graph.
    communities: Vec<usize>,
    /// Volume per node of the current graph.
    node_volumes: Vec<f64>,
    /// Volume per community id.
    community_volumes: Vec<f64>,
}

/// Multi-level Leiden community detection over a [`CompressedGraph`].
pub struct Leiden {
    config: LeidenConfig,
}

impl Leiden {
    /// Create a runner for the given configuration.
    pub fn new(config: LeidenConfig) -> Self {
        Self { config }
    }

    /// The configuration this runner was built with.
    pub fn config(&self) -> &LeidenConfig {
        &self.config
    }

    /// Run to completion without external cancellation.
    pub fn run(&self, graph: &CompressedGraph) -> Result<LeidenResult> {
        self.run_with_flag(graph, &TerminationFlag::running())
    }

    /// Run with a cooperative cancellation flag. Once the flag is
    /// stopped the run aborts promptly with [`Error::Cancelled`].
    pub fn run_with_flag(
        &self,
        input: &CompressedGraph,
        flag: &TerminationFlag,
    ) -> Result<LeidenResult> {
        self.config.validate()?;
        if input.node_count == 0 {
            return Err(Error::EmptyGraph);
        }

        let config = &self.config;
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(config.concurrency)
            .build()
            .map_err(|e| Error::InvalidConfiguration(format!("worker pool: {e}")))?;

        let quality = RbModularity {
            gamma: config.gamma,
        };
        let mut rng = match config.random_seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        // Unit-weight runs rewrite the snapshot once; aggregated levels
        // then carry the summed unit weights naturally.
        let mut owned_graph: Option<CompressedGraph> = if config.use_weighted_degree {
            None
        } else {
            Some(input.with_unit_weights())
        };

        let original_node_count = input.node_count;
        let initial = initial_communities(original_node_count, config.seed_communities.as_deref())?;

        let graph = owned_graph.as_ref().unwrap_or(input);
        let node_volumes = pool.install(|| graph.node_volumes(true));
        let total_volume: f64 = node_volumes.iter().sum();
        if total_volume <= 0.0 {
            log::debug!("graph has no edge weight; every node keeps its community");
            return Ok(LeidenResult {
                communities: renumber(&initial),
                modularities: Vec::new(),
                ran_levels: 0,
                did_converge: true,
            });
        }

        let community_volumes = community_volumes_of(&initial, &node_volumes);
        let mut state = LevelState {
            communities: initial,
            node_volumes,
            community_volumes,
        };

        // Original node id -> node id in the current level's graph
        let mut projection: Vec<usize> = (0..original_node_count).collect();
        let mut modularities: Vec<f64> = Vec::new();
        let mut ran_levels = 0;
        let mut did_converge = false;

        for level in 0..config.max_levels {
            flag.check()?;
            let graph = owned_graph.as_ref().unwrap_or(input);

            let moves = pool.install(|| {
                local_move(
                    graph,
                    &mut state.communities,
                    &state.node_volumes,
                    &mut state.community_volumes,
                    total_volume,
                    &quality,
                    config.concurrency,
                    flag,
                )
            })?;
            check_volume_invariant(state.community_volumes.iter().sum(), total_volume)?;

            let quality_score = pool.install(|| {
                modularity(
                    graph,
                    &state.communities,
                    &state.community_volumes,
                    config.gamma,
                    total_volume,
                    config.concurrency,
                    flag,
                )
            })?;
            ran_levels = level + 1;
            log::info!(
                "level {ran_levels}: {} nodes, {moves} moves, modularity {quality_score:.6}",
                graph.node_count
            );

            let previous = modularities.last().copied();
            modularities.push(quality_score);

            if moves == 0 {
                did_converge = true;
                break;
            }
            if let Some(previous) = previous {
                if quality_score - previous < config.tolerance {
                    did_converge = true;
                    break;
                }
            }
            if ran_levels == config.max_levels {
                break;
            }

            let refinement = pool.install(|| {
                refine(
                    graph,
                    &state.communities,
                    &state.node_volumes,
                    &state.community_volumes,
                    total_volume,
                    &quality,
                    config.gamma,
                    config.theta,
                    &mut rng,
                    flag,
                )
            })?;

            let aggregated = pool.install(|| {
                aggregate(
                    graph,
                    &refinement.communities,
                    refinement.max_community_id,
                    config.concurrency,
                    flag,
                )
            })?;
            if aggregated.graph.node_count == graph.node_count {
                did_converge = true;
                break;
            }

            // Compose this level's mapping into the cumulative projection
            let refined_to_aggregated: HashMap<usize, usize> = aggregated
                .community_of_node
                .iter()
                .enumerate()
                .map(|(aggregated_node, &refined_id)| (refined_id, aggregated_node))
                .collect();
            for slot in projection.iter_mut() {
                *slot = refined_to_aggregated[&refinement.communities[*slot]];
            }

            // Re-seed the next level from the local-move assignment: a
            // refined community id is its founding node, so its parent
            // community is that node's local-move community. Parent ids
            // densify in first-encounter order.
            let mut parent_dense: HashMap<usize, usize> = HashMap::new();
            let mut next_communities = vec![0usize; aggregated.graph.node_count];
            for (aggregated_node, &refined_id) in
                aggregated.community_of_node.iter().enumerate()
            {
                let parent = state.communities[refined_id];
                let fresh = parent_dense.len();
                next_communities[aggregated_node] = *parent_dense.entry(parent).or_insert(fresh);
            }

            let node_volumes = pool.install(|| aggregated.graph.node_volumes(true));
            let community_volumes = community_volumes_of(&next_communities, &node_volumes);
            owned_graph = Some(aggregated.graph);
            state = LevelState {
                communities: next_communities,
                node_volumes,
                community_volumes,
            };
        }

        let mut final_communities = vec![0usize; original_node_count];
        for (node, &mapped) in projection.iter().enumerate() {
            final_communities[node] = state.communities[mapped];
        }

        Ok(LeidenResult {
            communities: renumber(&final_communities),
            modularities,
            ran_levels,
            did_converge,
        })
    }
}

/// Singleton communities, or densified seed values with singleton
/// fallback for nodes whose seed is negative (missing).
fn initial_communities(node_count: usize, seeds: Option<&[i64]>) -> Result<Vec<usize>> {
    let Some(seeds) = seeds else {
        return Ok((0..node_count).collect());
    };

    if seeds.len() != node_count {
        return Err(Error::InvalidConfiguration(format!(
            "seed communities cover {} nodes but the graph has {node_count}",
            seeds.len()
        )));
    }

    const MISSING: usize = usize::MAX;
    let mut dense: HashMap<i64, usize> = HashMap::new();
    let mut communities = Vec::with_capacity(node_count);
    for &seed in seeds {
        if seed < 0 {
            communities.push(MISSING);
        } else {
            let fresh = dense.len();
            communities.push(*dense.entry(seed).or_insert(fresh));
        }
    }

    let mut next = dense.len();
    for community in communities.iter_mut() {
        if *community == MISSING {
            *community = next;
            next += 1;
        }
    }
    Ok(communities)
}

fn community_volumes_of(communities: &[usize], node_volumes: &[f64]) -> Vec<f64> {
    let size = communities.iter().max().copied().unwrap_or(0) + 1;
    let mut volumes = vec![0.0; size];
    for (node, &community) in communities.iter().enumerate() {
        volumes[community] += node_volumes[node];
    }
    volumes
}

/// Renumber community ids to consecutive integers in first-occurrence order.
fn renumber(communities: &[usize]) -> Vec<usize> {
    let mut mapping: HashMap<usize, usize> = HashMap::new();
    communities
        .iter()
        .map(|&community| {
            let fresh = mapping.len();
            *mapping.entry(community).or_insert(fresh)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::GraphBuilder;

    fn init_logging() {
        let _ = env_logger::builder().is_test(true).try_init();
    }

    fn two_triangles() -> CompressedGraph {
        let mut builder = GraphBuilder::new(6);
        builder.add_edge(0, 1, 1.0);
        builder.add_edge(1, 2, 1.0);
        builder.add_edge(0, 2, 1.0);
        builder.add_edge(3, 4, 1.0);
        builder.add_edge(4, 5, 1.0);
        builder.add_edge(3, 5, 1.0);
        builder.add_edge(2, 3, 1.0);
        builder.build()
    }

    fn clique(n: u32) -> CompressedGraph {
        let mut builder = GraphBuilder::new(n as usize);
        for i in 0..n {
            for j in (i + 1)..n {
                builder.add_edge(i, j, 1.0);
            }
        }
        builder.build()
    }

    fn config_with_seed(seed: u64) -> LeidenConfig {
        LeidenConfig {
            random_seed: Some(seed),
            concurrency: 1,
            ..Default::default()
        }
    }

    #[test]
    fn test_two_triangles_split_at_the_bridge() {
        init_logging();
        let graph = two_triangles();
        let result = Leiden::new(config_with_seed(42)).run(&graph).unwrap();

        assert!(result.did_converge);
        assert_eq!(result.community_count(), 2);
        assert_eq!(result.communities[0], result.communities[1]);
        assert_eq!(result.communities[1], result.communities[2]);
        assert_eq!(result.communities[3], result.communities[4]);
        assert_eq!(result.communities[4], result.communities[5]);
        assert_ne!(result.communities[0], result.communities[3]);
    }

    #[test]
    fn test_clique_collapses_to_one_community() {
        init_logging();
        let graph = clique(5);
        let result = Leiden::new(config_with_seed(1)).run(&graph).unwrap();

        assert!(result.did_converge);
        assert_eq!(result.community_count(), 1);
        assert!(result.ran_levels >= 1);
    }

    #[test]
    fn test_seeded_optimal_partition_converges_in_one_level() {
        init_logging();
        let graph = two_triangles();
        let config = LeidenConfig {
            seed_communities: Some(vec![0, 0, 0, 1, 1, 1]),
            random_seed: Some(5),
            concurrency: 1,
            ..Default::default()
        };
        let result = Leiden::new(config).run(&graph).unwrap();

        assert_eq!(result.ran_levels, 1);
        assert!(result.did_converge);
        assert_eq!(result.community_count(), 2);
        assert_eq!(result.modularities.len(), 1);
    }

    #[test]
    fn test_fixed_seed_is_deterministic() {
        init_logging();
        let graph = two_triangles();

        let first = Leiden::new(config_with_seed(1234)).run(&graph).unwrap();
        let second = Leiden::new(config_with_seed(1234)).run(&graph).unwrap();

        assert_eq!(first.communities, second.communities);
        assert_eq!(first.modularities, second.modularities);
        assert_eq!(first.ran_levels, second.ran_levels);
    }

    #[test]
    fn test_unseeded_runs_diverge() {
        init_logging();
        // A square seeded as one community, anchored to a triangle
        // through nodes 0 and 1. Refinement splits the square into two
        // pairs whose composition depends on the shuffle; only the
        // {0,1}/{2,3} split puts both anchors in one pair, which then
        // defects to the triangle at the next level. With no seed the
        // runs land on different final partitions.
        let mut builder = GraphBuilder::new(10);
        builder.add_edge(0, 1, 1.0);
        builder.add_edge(1, 2, 1.0);
        builder.add_edge(2, 3, 1.0);
        builder.add_edge(3, 0, 1.0);
        builder.add_edge(4, 5, 1.0);
        builder.add_edge(5, 6, 1.0);
        builder.add_edge(4, 6, 1.0);
        builder.add_edge(0, 4, 2.0);
        builder.add_edge(1, 5, 2.0);
        builder.add_edge(7, 8, 1.0);
        builder.add_edge(8, 9, 1.0);
        builder.add_edge(7, 9, 1.0);
        let graph = builder.build();

        let config = LeidenConfig {
            seed_communities: Some(vec![0, 0, 0, 0, 1, 1, 1, -1, -1, -1]),
            random_seed: None,
            concurrency: 1,
            ..Default::default()
        };
        let runner = Leiden::new(config);

        let first = runner.run(&graph).unwrap();
        let diverged = (0..63)
            .any(|_| runner.run(&graph).unwrap().communities != first.communities);
        assert!(diverged, "64 unseeded runs all produced the same partition");
    }

    #[test]
    fn test_modularities_are_recorded_per_level() {
        init_logging();
        let graph = two_triangles();
        let result = Leiden::new(config_with_seed(8)).run(&graph).unwrap();

        assert_eq!(result.modularities.len(), result.ran_levels);
        for q in &result.modularities {
            assert!(q.is_finite());
        }
    }

    #[test]
    fn test_partial_seed_falls_back_to_singletons() {
        init_logging();
        let graph = two_triangles();
        let config = LeidenConfig {
            seed_communities: Some(vec![7, 7, -1, 3, 3, -1]),
            random_seed: Some(2),
            concurrency: 1,
            ..Default::default()
        };
        let result = Leiden::new(config).run(&graph).unwrap();

        assert!(result.did_converge);
        assert_eq!(result.community_count(), 2);
    }

    #[test]
    fn test_seed_length_mismatch_is_rejected() {
        let graph = two_triangles();
        let config = LeidenConfig {
            seed_communities: Some(vec![0, 1]),
            ..Default::default()
        };
        let result = Leiden::new(config).run(&graph);
        assert!(matches!(result, Err(Error::InvalidConfiguration(_))));
    }

    #[test]
    fn test_empty_graph_is_rejected() {
        let graph = GraphBuilder::new(0).build();
        let result = Leiden::new(LeidenConfig::default()).run(&graph);
        assert!(matches!(result, Err(Error::EmptyGraph)));
    }

    #[test]
    fn test_edgeless_graph_keeps_singletons() {
        let graph = GraphBuilder::new(4).build();
        let result = Leiden::new(LeidenConfig::default()).run(&graph).unwrap();

        assert_eq!(result.communities, vec![0, 1, 2, 3]);
        assert_eq!(result.ran_levels, 0);
        assert!(result.did_converge);
        assert!(result.modularities.is_empty());
    }

    #[test]
    fn test_unit_weights_ignore_edge_weights() {
        init_logging();
        // Heavy bridge would glue the triangles if weights counted
        let mut builder = GraphBuilder::new(6);
        builder.add_edge(0, 1, 1.0);
        builder.add_edge(1, 2, 1.0);
        builder.add_edge(0, 2, 1.0);
        builder.add_edge(3, 4, 1.0);
        builder.add_edge(4, 5, 1.0);
        builder.add_edge(3, 5, 1.0);
        builder.add_edge(2, 3, 100.0);
        let graph = builder.build();

        let config = LeidenConfig {
            use_weighted_degree: false,
            random_seed: Some(9),
            concurrency: 1,
            ..Default::default()
        };
        let result = Leiden::new(config).run(&graph).unwrap();
        assert_eq!(result.community_count(), 2);
        assert_ne!(result.communities[0], result.communities[3]);
    }

    #[test]
    fn test_cancellation_before_start() {
        let graph = two_triangles();
        let flag = TerminationFlag::running();
        flag.stop();

        let result = Leiden::new(LeidenConfig::default()).run_with_flag(&graph, &flag);
        assert!(matches!(result, Err(Error::Cancelled)));
    }

    #[test]
    fn test_max_levels_caps_the_run() {
        init_logging();
        let graph = two_triangles();
        let config = LeidenConfig {
            max_levels: 1,
            random_seed: Some(4),
            concurrency: 1,
            ..Default::default()
        };
        let result = Leiden::new(config).run(&graph).unwrap();

        assert_eq!(result.ran_levels, 1);
        assert_eq!(result.modularities.len(), 1);
    }

    #[test]
    fn test_ring_of_triangles_needs_two_levels() {
        init_logging();
        // Four triangles in a ring, joined by single bridge edges
        let mut builder = GraphBuilder::new(12);
        for t in 0..4u32 {
            let base = t * 3;
            builder.add_edge(base, base + 1, 1.0);
            builder.add_edge(base + 1, base + 2, 1.0);
            builder.add_edge(base, base + 2, 1.0);
        }
        builder.add_edge(2, 3, 1.0);
        builder.add_edge(5, 6, 1.0);
        builder.add_edge(8, 9, 1.0);
        builder.add_edge(11, 0, 1.0);
        let graph = builder.build();

        let result = Leiden::new(config_with_seed(17)).run(&graph).unwrap();

        assert!(result.did_converge);
        assert_eq!(result.community_count(), 4);
        assert!(result.ran_levels >= 2);
        for t in 0..4 {
            let base = t * 3;
            assert_eq!(result.communities[base], result.communities[base + 1]);
            assert_eq!(result.communities[base], result.communities[base + 2]);
        }
        assert_ne!(result.communities[0], result.communities[3]);
    }

    #[test]
    fn test_renumber_is_first_occurrence_order() {
        assert_eq!(renumber(&[5, 5, 2, 7, 2]), vec![0, 0, 1, 2, 1]);
    }

    #[test]
    fn test_initial_communities_from_seed_values() {
        let communities = initial_communities(5, Some(&[4, 4, -1, 9, -1])).unwrap();
        assert_eq!(communities[0], communities[1]);
        assert_ne!(communities[0], communities[3]);
        assert_ne!(communities[2], communities[4]);
        // Dense: ids cover 0..4 with no gaps
        let max = communities.iter().max().unwrap();
        assert_eq!(*max, 3);
    }

    #[test]
    fn test_higher_gamma_yields_no_fewer_communities() {
        init_logging();
        let graph = two_triangles();
        let low = Leiden::new(LeidenConfig {
            gamma: 0.5,
            ..config_with_seed(6)
        })
        .run(&graph)
        .unwrap();
        let high = Leiden::new(LeidenConfig {
            gamma: 2.0,
            ..config_with_seed(6)
        })
        .run(&graph)
        .unwrap();

        assert!(high.community_count() >= low.community_count());
    }
}
