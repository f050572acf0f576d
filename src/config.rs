//! Configuration for a Leiden run

use crate::error::{Error, Result};

/// Parameters controlling one Leiden run.
#[derive(Debug, Clone)]
pub struct LeidenConfig {
    /// Maximum number of levels (local move + refine + aggregate).
    pub max_levels: usize,

    /// Resolution parameter gamma. Higher values favor smaller communities.
    pub gamma: f64,

    /// Refinement temperature theta. Near-zero approaches greedy merging,
    /// larger values increase exploration.
    pub theta: f64,

    /// Minimum modularity improvement between consecutive levels before
    /// the run is considered converged.
    pub tolerance: f64,

    /// Whether edge weights factor into node volumes. When false, every
    /// edge counts as weight 1.
    pub use_weighted_degree: bool,

    /// Seed for the refinement RNG. `None` yields a non-deterministic run.
    pub random_seed: Option<u64>,

    /// Optional initial community per node. Negative values mark nodes
    /// without a seed; they fall back to fresh singleton communities.
    pub seed_communities: Option<Vec<i64>>,

    /// Number of worker threads for the data-parallel phases.
    pub concurrency: usize,
}

impl Default for LeidenConfig {
    fn default() -> Self {
        Self {
            max_levels: 10,
            gamma: 1.0,
            theta: 0.01,
            tolerance: 1e-4,
            use_weighted_degree: true,
            random_seed: None,
            seed_communities: None,
            concurrency: num_cpus::get(),
        }
    }
}

impl LeidenConfig {
    /// Reject invalid parameter combinations before anything runs.
    pub fn validate(&self) -> Result<()> {
        if self.max_levels < 1 {
            return Err(Error::InvalidConfiguration(format!(
                "max_levels must be at least 1, got {}",
                self.max_levels
            )));
        }
        if !(self.gamma > 0.0) {
            return Err(Error::InvalidConfiguration(format!(
                "gamma must be positive, got {}",
                self.gamma
            )));
        }
        if !(self.theta > 0.0) {
            return Err(Error::InvalidConfiguration(format!(
                "theta must be positive, got {}",
                self.theta
            )));
        }
        if !(self.tolerance >= 0.0) {
            return Err(Error::InvalidConfiguration(format!(
                "tolerance must be non-negative, got {}",
                self.tolerance
            )));
        }
        if self.concurrency < 1 {
            return Err(Error::InvalidConfiguration(
                "concurrency must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}
