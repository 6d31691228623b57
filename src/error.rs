//! Error taxonomy for the benchmark engine
//!
//! Configuration problems surface before any network activity. Population
//! failures are fatal for the run. Individual list failures are recorded as
//! failed samples and only become a `List` error once the run-wide failure
//! threshold is crossed.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum BenchError {
    /// Invalid configuration (bad branching spec, counts, depth, ...)
    #[error("configuration error: {0}")]
    Config(String),

    /// Object creation failed; the tree is incomplete
    #[error("population failed after {created} of {expected} objects: {message}")]
    Population {
        created: u64,
        expected: u64,
        message: String,
    },

    /// Listing failures crossed the run-wide threshold
    #[error("listing aborted: {0}")]
    List(String),

    /// Object count does not fit the tree, or an existing tree does not match
    #[error("capacity mismatch: {0}")]
    CapacityMismatch(String),

    /// The run was cancelled before the phase completed
    #[error("cancelled during {0}")]
    Cancelled(&'static str),

    /// Store transport failure outside of a sampled operation
    #[error("store error: {0:#}")]
    Store(#[from] anyhow::Error),
}

impl BenchError {
    pub(crate) fn config(msg: impl Into<String>) -> Self {
        BenchError::Config(msg.into())
    }
}

pub type BenchResult<T> = std::result::Result<T, BenchError>;
