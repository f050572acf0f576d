//! Atomic community-volume table

use std::sync::atomic::{AtomicU64, Ordering};

use crate::error::{Error, Result};

/// Dense array of `f64` volumes indexed by community id, updatable from
/// concurrent partitions without locks. Values are stored as `u64` bit
/// patterns and modified through compare-exchange loops.
pub struct AtomicVolumes {
    bits: Vec<AtomicU64>,
}

impl AtomicVolumes {
    /// Build the table from a plain volume array.
    pub fn from_values(values: &[f64]) -> Self {
        Self {
            bits: values
                .iter()
                .map(|&v| AtomicU64::new(v.to_bits()))
                .collect(),
        }
    }

    /// Current volume of a community.
    pub fn load(&self, community: usize) -> f64 {
        f64::from_bits(self.bits[community].load(Ordering::SeqCst))
    }

    /// Atomically add `delta` to a community's volume.
    pub fn add(&self, community: usize, delta: f64) {
        let slot = &self.bits[community];
        let mut current = slot.load(Ordering::SeqCst);
        loop {
            let next = (f64::from_bits(current) + delta).to_bits();
            match slot.compare_exchange(current, next, Ordering::SeqCst, Ordering::SeqCst) {
                Ok(_) => return,
                Err(observed) => current = observed,
            }
        }
    }

    /// Transactionally move `amount` of volume between two communities.
    pub fn transfer(&self, from: usize, to: usize, amount: f64) {
        self.add(from, -amount);
        self.add(to, amount);
    }

    /// Tear down into a plain volume array.
    pub fn into_values(self) -> Vec<f64> {
        self.bits
            .into_iter()
            .map(|b| f64::from_bits(b.into_inner()))
            .collect()
    }
}

/// Fatal check that community volumes still sum to the node volumes.
///
/// Drift beyond floating-point tolerance means a phase lost an update.
pub fn check_volume_invariant(community_volume_sum: f64, node_volume_sum: f64) -> Result<()> {
    let tolerance = 1e-6 * node_volume_sum.abs().max(1.0);
    if (community_volume_sum - node_volume_sum).abs() > tolerance {
        return Err(Error::InvariantViolation(format!(
            "community volumes sum to {community_volume_sum} but node volumes sum to {node_volume_sum}"
        )));
    }
    Ok(())
}
