// src/constants.rs
//
// Central location for all defaults and thresholds used throughout list-bench

// =============================================================================
// Namespace shape
// =============================================================================

/// Default number of objects to upload (rounded up to a multiple of concurrency)
pub const DEFAULT_OBJECTS: u64 = 10_000;

/// Default number of versions created per key
pub const DEFAULT_VERSIONS: u32 = 1;

/// Default object size in bytes (1 KiB)
pub const DEFAULT_OBJECT_SIZE: u64 = 1024;

/// Default branching factors (two levels of two)
pub const DEFAULT_BRANCHING_FACTORS: &str = "2/2";

/// Directory segment mask: first %d is the 1-based level, second %d the coordinate
pub const DEFAULT_DIR_MASK: &str = "d%d_w%d";

/// Separator between path segments
pub const PATH_SEPARATOR: char = '/';

/// Delimiter used for hierarchical listing
pub const LIST_DELIMITER: &str = "/";

// =============================================================================
// Listing
// =============================================================================

/// Sentinel for "depth not set": list the whole namespace
pub const DEPTH_UNSET: i64 = -1;

/// Default page size of a LIST request
pub const DEFAULT_MAX_KEYS: u32 = 100;

/// Sentinel for "no cap on keys per listing iteration"
pub const MAX_TOTAL_KEYS_UNBOUNDED: i64 = -1;

/// Maximum consecutive failed pages (across all workers) before the run is stopped
pub const DEFAULT_LISTING_MAX_CONSECUTIVE_ERRORS: u64 = 10;

/// Maximum total failed pages before the run is stopped
pub const DEFAULT_LISTING_MAX_ERRORS: u64 = 100;

/// Number of failure messages retained for the final report
pub const LISTING_ERROR_MESSAGES_KEPT: usize = 20;

// =============================================================================
// Benchmark harness
// =============================================================================

/// Default number of concurrent workers
pub const DEFAULT_CONCURRENCY: usize = 20;

/// Default run duration for the listing phase
pub const DEFAULT_DURATION_SECS: u64 = 60;

/// Population progress is refreshed every N uploaded objects
pub const POPULATE_PROGRESS_INTERVAL: u64 = 100;

// =============================================================================
// Histograms
// =============================================================================

/// Highest trackable latency in microseconds (1 hour)
pub const HISTOGRAM_MAX_MICROS: u64 = 3_600_000_000;

/// Significant figures kept by the latency histograms
pub const HISTOGRAM_SIGFIGS: u8 = 3;
