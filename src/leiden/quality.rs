//! Gain-function dispatch for the optimization phases

/// Narrow interface for the quality function driving node moves.
///
/// The phases only ever need the gain of attaching a node (or subset)
/// to a community, so alternative quality functions can be substituted
/// without touching the orchestrator.
pub trait QualityFunction: Send + Sync {
    /// Gain of adding an element with volume `volume` and total edge
    /// weight `edge_weight` into a community whose current volume is
    /// `community_volume` (excluding the element itself).
    fn gain(&self, edge_weight: f64, volume: f64, community_volume: f64, total_volume: f64) -> f64;
}

/// Reichardt-Bornholdt modularity with resolution gamma:
/// `gain = edgeWeight - gamma * volume * communityVolume / totalVolume`.
#[derive(Debug, Clone, Copy)]
pub struct RbModularity {
    /// Resolution parameter. Higher values favor smaller communities.
    pub gamma: f64,
}

impl QualityFunction for RbModularity {
    fn gain(&self, edge_weight: f64, volume: f64, community_volume: f64, total_volume: f64) -> f64 {
        edge_weight - self.gamma * volume * community_volume / total_volume
    }
}
