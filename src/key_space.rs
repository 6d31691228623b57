//! Deterministic key space generation for nested listing benchmarks.
//!
//! The branching factors act as the radices of a mixed-radix number system:
//! object index `i` is decomposed into one coordinate per level, level 0
//! being the most significant digit. Each coordinate becomes a directory
//! segment rendered through the directory mask, and the leaf name is derived
//! from `i` itself.
//!
//! ```text
//! factors = 2/3, prefix = "bench"
//!   i=0 -> bench/d1_w0/d2_w0/obj_00000000.dat
//!   i=4 -> bench/d1_w1/d2_w1/obj_00000004.dat
//! ```
//!
//! Nothing is materialized: every key is derived from its index on demand,
//! so a later run with the same shape finds exactly the same keys.

use std::ops::Range;

use crate::branching::BranchingFactors;
use crate::constants::{DEFAULT_DIR_MASK, PATH_SEPARATOR};
use crate::error::{BenchError, BenchResult};

/// Index → key mapping for one benchmark shape
#[derive(Debug, Clone)]
pub struct KeySpace {
    /// Fixed prefix without surrounding separators ("" when unset)
    prefix: String,

    /// Tree shape; `None` for a flat namespace
    factors: Option<BranchingFactors>,

    /// Place value of each level (same length as factors)
    strides: Vec<u64>,

    object_count: u64,

    dir_mask: String,
}

impl KeySpace {
    /// Build a key space, enforcing the strict capacity policy for nested trees.
    pub fn new(
        prefix: &str,
        factors: &BranchingFactors,
        nested: bool,
        object_count: u64,
        dir_mask: &str,
    ) -> BenchResult<Self> {
        if object_count == 0 {
            return Err(BenchError::config("at least one object must be generated"));
        }
        validate_dir_mask(dir_mask)?;

        let (factors, strides) = if nested {
            match factors.capacity() {
                Some(capacity) if object_count > capacity => {
                    return Err(BenchError::CapacityMismatch(format!(
                        "{} objects do not fit branching factors {} (capacity {})",
                        object_count, factors, capacity
                    )));
                }
                _ => {}
            }
            (Some(factors.clone()), factors.strides())
        } else {
            (None, Vec::new())
        };

        Ok(Self {
            prefix: prefix.trim_matches(PATH_SEPARATOR).to_string(),
            factors,
            strides,
            object_count,
            dir_mask: dir_mask.to_string(),
        })
    }

    /// Flat key space with the default directory mask
    pub fn flat(prefix: &str, object_count: u64) -> BenchResult<Self> {
        let unused = BranchingFactors::new(vec![1])?;
        Self::new(prefix, &unused, false, object_count, DEFAULT_DIR_MASK)
    }

    /// Nested key space with the default directory mask
    pub fn nested(prefix: &str, factors: &BranchingFactors, object_count: u64) -> BenchResult<Self> {
        Self::new(prefix, factors, true, object_count, DEFAULT_DIR_MASK)
    }

    pub fn object_count(&self) -> u64 {
        self.object_count
    }

    pub fn is_nested(&self) -> bool {
        self.factors.is_some()
    }

    /// Number of directory levels under the fixed prefix (0 when flat)
    pub fn levels(&self) -> usize {
        self.factors.as_ref().map_or(0, |f| f.depth())
    }

    /// Listing prefix of the namespace root: "" or "prefix/"
    pub fn root_prefix(&self) -> String {
        if self.prefix.is_empty() {
            String::new()
        } else {
            format!("{}{}", self.prefix, PATH_SEPARATOR)
        }
    }

    /// Per-level coordinates of object `index` (empty when flat)
    pub fn coordinates(&self, index: u64) -> Vec<u64> {
        match &self.factors {
            Some(factors) => factors
                .as_slice()
                .iter()
                .zip(&self.strides)
                .map(|(&radix, &stride)| (index / stride) % radix)
                .collect(),
            None => Vec::new(),
        }
    }

    /// Directory segment for a 0-based level and coordinate
    pub fn segment_name(&self, level: usize, coordinate: u64) -> String {
        self.dir_mask
            .replacen("%d", &(level + 1).to_string(), 1)
            .replacen("%d", &coordinate.to_string(), 1)
    }

    /// Leaf object name for an index
    pub fn leaf_name(&self, index: u64) -> String {
        format!("obj_{:08}.dat", index)
    }

    /// Listing prefix (with trailing separator) of the directory at `coordinates`
    pub fn dir_prefix(&self, coordinates: &[u64]) -> String {
        let mut path = self.root_prefix();
        for (level, &coordinate) in coordinates.iter().enumerate() {
            path.push_str(&self.segment_name(level, coordinate));
            path.push(PATH_SEPARATOR);
        }
        path
    }

    /// Full key of object `index`
    pub fn key(&self, index: u64) -> String {
        let mut path = self.dir_prefix(&self.coordinates(index));
        path.push_str(&self.leaf_name(index));
        path
    }

    /// Lazily enumerate the keys of an index range (clamped to the object count)
    pub fn keys(&self, range: Range<u64>) -> impl Iterator<Item = String> + '_ {
        let end = range.end.min(self.object_count);
        (range.start..end).map(move |i| self.key(i))
    }

    /// Number of populated children of the directory at `coordinates`.
    ///
    /// Bounded by the next level's branching factor and by the object count,
    /// since indices at or beyond the object count are never written.
    pub fn populated_children(&self, coordinates: &[u64]) -> u64 {
        let Some(factors) = &self.factors else {
            return 0;
        };
        let level = coordinates.len();
        if level >= factors.depth() {
            return 0;
        }
        let start: u64 = coordinates
            .iter()
            .zip(&self.strides)
            .map(|(&c, &stride)| c.saturating_mul(stride))
            .fold(0u64, |acc, v| acc.saturating_add(v));
        if start >= self.object_count {
            return 0;
        }
        let stride = self.strides[level];
        let remaining = self.object_count - start;
        factors.level(level).min(remaining.div_ceil(stride))
    }
}

pub(crate) fn validate_dir_mask(mask: &str) -> BenchResult<()> {
    if mask.matches("%d").count() != 2 {
        return Err(BenchError::config(format!(
            "directory mask '{}' must contain exactly two %d placeholders",
            mask
        )));
    }
    if mask.contains(PATH_SEPARATOR) {
        return Err(BenchError::config(format!(
            "directory mask '{}' must not contain '{}'",
            mask, PATH_SEPARATOR
        )));
    }
    Ok(())
}
