//! Error types for the Leiden core

use thiserror::Error;

/// Errors surfaced by the community detection core.
#[derive(Debug, Error)]
pub enum Error {
    /// Rejected before the level loop starts; nothing has run.
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// Bookkeeping defect inside a phase. Fatal, never retried.
    #[error("internal invariant violation: {0}")]
    InvariantViolation(String),

    /// Caller-triggered cooperative cancellation.
    #[error("operation cancelled")]
    Cancelled,

    /// The input graph has no nodes.
    #[error("graph has no nodes")]
    EmptyGraph,
}

/// Convenience alias used across the crate.
pub type Result<T> = std::result::Result<T, Error>;
