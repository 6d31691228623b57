// src/lib.rs

pub mod bench; // Run orchestration: validate, populate, list
pub mod branching;
pub mod config;
pub mod constants;
pub mod depth;
pub mod error;
pub mod key_space;
pub mod listing;
pub mod metrics;
pub mod prepare;
pub mod samples;
pub mod size_parser;
pub mod store;
pub mod tsv_export;

pub use bench::{ListBenchmark, RunReport, StopReason};
pub use branching::{parse_branching_factors, BranchingFactors};
pub use config::{validate, BenchmarkConfig};
pub use error::{BenchError, BenchResult};
pub use key_space::KeySpace;
