// src/config.rs
use serde::{Deserialize, Serialize};

use crate::branching::BranchingFactors;
use crate::constants::{
    DEFAULT_BRANCHING_FACTORS, DEFAULT_CONCURRENCY, DEFAULT_DIR_MASK, DEFAULT_DURATION_SECS,
    DEFAULT_LISTING_MAX_CONSECUTIVE_ERRORS, DEFAULT_LISTING_MAX_ERRORS, DEFAULT_MAX_KEYS,
    DEFAULT_OBJECTS, DEFAULT_OBJECT_SIZE, DEFAULT_VERSIONS, DEPTH_UNSET, MAX_TOTAL_KEYS_UNBOUNDED,
    PATH_SEPARATOR,
};
use crate::error::{BenchError, BenchResult};
use crate::key_space::{validate_dir_mask, KeySpace};
use crate::store::S3StoreOptions;

/// Complete description of one list benchmark run.
///
/// Built once (YAML file and/or CLI flags) and never mutated after the
/// benchmark starts; every engine entry point takes it by reference.
#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(deny_unknown_fields)]
pub struct BenchmarkConfig {
    /// Target store URI ("mem://", "s3://bucket")
    #[serde(default = "default_target")]
    pub target: String,

    /// Number of objects to upload. Rounded up to have equal objects per worker.
    #[serde(default = "default_objects")]
    pub objects: u64,

    /// Versions per key. More than one benchmarks versioned listing.
    #[serde(default = "default_versions")]
    pub versions: u32,

    /// Size of each generated object ("1KB", "4MiB", ...; base 2)
    #[serde(
        default = "default_object_size",
        deserialize_with = "crate::size_parser::deserialize_size",
        serialize_with = "crate::size_parser::serialize_size"
    )]
    pub object_size: u64,

    /// Extended listing with per-object metadata
    #[serde(default)]
    pub metadata: bool,

    /// Lay objects out in a nested tree instead of a flat namespace
    #[serde(default)]
    pub nested: bool,

    /// Fan-out per level, e.g. "/12/30/1000" (only used when nested)
    #[serde(default = "default_branching_factors")]
    pub branching_factors: BranchingFactors,

    /// Fixed prefix all keys live under (surrounding '/' are ignored)
    #[serde(default)]
    pub prefix: String,

    /// Level to list: -1 = whole namespace, 0 = root, 1 = top-level directory, ...
    #[serde(default = "default_depth_to_list")]
    pub depth_to_list: i64,

    /// Skip population and list an already populated tree
    #[serde(default)]
    pub list_existing: bool,

    /// Count the existing tree before listing it (only with list_existing)
    #[serde(default)]
    pub verify_existing: bool,

    /// Page size of each LIST request
    #[serde(default = "default_max_keys")]
    pub max_keys: u32,

    /// Keys fetched per listing iteration across pages; -1 = until the store is done
    #[serde(default = "default_max_total_keys")]
    pub max_total_keys: i64,

    /// List the full sub-tree instead of immediate children only
    #[serde(default)]
    pub recursive: bool,

    /// Number of concurrent workers
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    /// Wall time of the listing phase (e.g. "60s", "5m")
    #[serde(default = "default_duration", with = "humantime_serde")]
    pub duration: std::time::Duration,

    /// Optional listing iteration bound per worker; the run stops at whichever comes first
    #[serde(default)]
    pub iterations: Option<u64>,

    /// Seed for depth selection; drawn per run when unset
    #[serde(default)]
    pub seed: Option<u64>,

    /// Directory segment mask: first %d = level (1-based), second %d = coordinate
    #[serde(default = "default_dir_mask")]
    pub dir_mask: String,

    /// Consecutive failed pages (all workers) that stop the run; 0 disables
    #[serde(default = "default_max_consecutive_list_errors")]
    pub max_consecutive_list_errors: u64,

    /// Total failed pages that stop the run; 0 disables
    #[serde(default = "default_max_total_list_errors")]
    pub max_total_list_errors: u64,

    /// Custom S3 endpoint (MinIO and other S3-compatible services)
    #[serde(default)]
    pub s3_endpoint: Option<String>,

    #[serde(default)]
    pub s3_region: Option<String>,
}

fn default_target() -> String {
    "mem://".to_string()
}

fn default_objects() -> u64 {
    DEFAULT_OBJECTS
}

fn default_versions() -> u32 {
    DEFAULT_VERSIONS
}

fn default_object_size() -> u64 {
    DEFAULT_OBJECT_SIZE
}

fn default_branching_factors() -> BranchingFactors {
    DEFAULT_BRANCHING_FACTORS
        .parse()
        .expect("default branching factors are valid")
}

fn default_depth_to_list() -> i64 {
    DEPTH_UNSET
}

fn default_max_keys() -> u32 {
    DEFAULT_MAX_KEYS
}

fn default_max_total_keys() -> i64 {
    MAX_TOTAL_KEYS_UNBOUNDED
}

fn default_concurrency() -> usize {
    DEFAULT_CONCURRENCY
}

fn default_duration() -> std::time::Duration {
    std::time::Duration::from_secs(DEFAULT_DURATION_SECS)
}

fn default_dir_mask() -> String {
    DEFAULT_DIR_MASK.to_string()
}

fn default_max_consecutive_list_errors() -> u64 {
    DEFAULT_LISTING_MAX_CONSECUTIVE_ERRORS
}

fn default_max_total_list_errors() -> u64 {
    DEFAULT_LISTING_MAX_ERRORS
}

impl Default for BenchmarkConfig {
    fn default() -> Self {
        Self {
            target: default_target(),
            objects: default_objects(),
            versions: default_versions(),
            object_size: default_object_size(),
            metadata: false,
            nested: false,
            branching_factors: default_branching_factors(),
            prefix: String::new(),
            depth_to_list: default_depth_to_list(),
            list_existing: false,
            verify_existing: false,
            max_keys: default_max_keys(),
            max_total_keys: default_max_total_keys(),
            recursive: false,
            concurrency: default_concurrency(),
            duration: default_duration(),
            iterations: None,
            seed: None,
            dir_mask: default_dir_mask(),
            max_consecutive_list_errors: default_max_consecutive_list_errors(),
            max_total_list_errors: default_max_total_list_errors(),
            s3_endpoint: None,
            s3_region: None,
        }
    }
}

impl BenchmarkConfig {
    /// Parse a YAML document
    pub fn from_yaml(text: &str) -> anyhow::Result<Self> {
        Ok(serde_yaml::from_str(text)?)
    }

    /// Fixed prefix without surrounding separators
    pub fn fixed_prefix(&self) -> &str {
        self.prefix.trim_matches(PATH_SEPARATOR)
    }

    /// Object count rounded up to a multiple of the concurrency
    pub fn effective_objects(&self) -> u64 {
        let workers = self.concurrency.max(1) as u64;
        self.objects.div_ceil(workers) * workers
    }

    /// Objects each population worker uploads
    pub fn objects_per_worker(&self) -> u64 {
        self.effective_objects() / self.concurrency.max(1) as u64
    }

    /// Key space for this configuration (capacity policy enforced)
    pub fn key_space(&self) -> BenchResult<KeySpace> {
        KeySpace::new(
            self.fixed_prefix(),
            &self.branching_factors,
            self.nested,
            self.effective_objects(),
            &self.dir_mask,
        )
    }

    pub fn s3_options(&self) -> S3StoreOptions {
        S3StoreOptions {
            endpoint: self.s3_endpoint.clone(),
            region: self.s3_region.clone(),
        }
    }
}

/// Check a configuration before any network activity.
pub fn validate(config: &BenchmarkConfig) -> BenchResult<()> {
    if config.objects < 1 {
        return Err(BenchError::config("at least one object must be tested"));
    }
    if config.versions < 1 {
        return Err(BenchError::config("at least one version must be tested"));
    }
    if config.concurrency < 1 {
        return Err(BenchError::config("concurrency must be at least 1"));
    }
    if config.max_keys < 1 {
        return Err(BenchError::config("max keys per page must be at least 1"));
    }
    if config.max_total_keys != MAX_TOTAL_KEYS_UNBOUNDED && config.max_total_keys < 1 {
        return Err(BenchError::config(format!(
            "max total keys must be {} (unbounded) or positive, got {}",
            MAX_TOTAL_KEYS_UNBOUNDED, config.max_total_keys
        )));
    }
    if config.depth_to_list < DEPTH_UNSET {
        return Err(BenchError::config(format!(
            "depth to list must be {} (unset) or non-negative, got {}",
            DEPTH_UNSET, config.depth_to_list
        )));
    }
    if config.iterations == Some(0) {
        return Err(BenchError::config("iterations must be at least 1 when set"));
    }
    if config.verify_existing && !config.list_existing {
        return Err(BenchError::config("verify_existing requires list_existing"));
    }
    validate_dir_mask(&config.dir_mask)?;

    let levels = if config.nested {
        config.branching_factors.depth()
    } else {
        0
    };
    if config.depth_to_list > levels as i64 {
        let hint = if config.nested { "" } else { " (depth > 0 requires nested)" };
        return Err(BenchError::config(format!(
            "depth to list {} exceeds the tree height {}{}",
            config.depth_to_list, levels, hint
        )));
    }

    // Capacity (strict policy) is checked by building the key space
    config.key_space().map(|_| ())
}
