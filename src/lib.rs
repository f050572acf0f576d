//! Multi-level Leiden community detection over compressed weighted graphs.
//!
//! The crate is a library core: it consumes an immutable graph snapshot
//! and a concurrency degree, and produces a community id per node plus
//! per-level modularity values. Graph storage, configuration parsing and
//! result formatting belong to the embedding host.

pub mod config;
pub mod error;
pub mod graph;
pub mod leiden;
pub mod partition;
pub mod termination;

pub use config::LeidenConfig;
pub use error::{Error, Result};
pub use graph::{CompressedGraph, GraphBuilder};
pub use leiden::connectedness::is_well_connected;
pub use leiden::quality::{QualityFunction, RbModularity};
pub use leiden::{Leiden, LeidenResult};
pub use termination::TerminationFlag;
