//! Branching factor specs
//!
//! A branching spec is a `/`-separated list of per-level fan-outs such as
//! `2/2` or `/12/30/1000`. Level 0 sits directly under the fixed prefix.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::constants::PATH_SEPARATOR;
use crate::error::{BenchError, BenchResult};

/// Ordered per-level fan-out counts; never empty, every element > 0
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BranchingFactors(Vec<u64>);

/// Parse a branching spec into its raw integer sequence.
///
/// Leading and trailing separators are ignored. Zero factors are accepted
/// here and rejected by [`BranchingFactors::new`].
pub fn parse_branching_factors(spec: &str) -> BenchResult<Vec<u64>> {
    let trimmed = spec.trim().trim_matches(PATH_SEPARATOR);
    if trimmed.is_empty() {
        return Err(BenchError::config(
            "branching factors string is empty or contains only slashes",
        ));
    }
    trimmed
        .split(PATH_SEPARATOR)
        .map(|token| {
            token.parse::<u64>().map_err(|e| {
                BenchError::config(format!(
                    "invalid number '{}' in branching factors: {}",
                    token, e
                ))
            })
        })
        .collect()
}

impl BranchingFactors {
    pub fn new(factors: Vec<u64>) -> BenchResult<Self> {
        if factors.is_empty() {
            return Err(BenchError::config("branching factors must not be empty"));
        }
        if let Some(level) = factors.iter().position(|&b| b == 0) {
            return Err(BenchError::config(format!(
                "branching factor at level {} must be greater than zero",
                level
            )));
        }
        Ok(Self(factors))
    }

    /// Number of levels below the fixed prefix
    pub fn depth(&self) -> usize {
        self.0.len()
    }

    pub fn as_slice(&self) -> &[u64] {
        &self.0
    }

    pub fn level(&self, level: usize) -> u64 {
        self.0[level]
    }

    /// Number of distinct leaf directories, `None` on overflow
    pub fn capacity(&self) -> Option<u64> {
        self.0.iter().try_fold(1u64, |acc, &b| acc.checked_mul(b))
    }

    /// Place value of each level: product of the factors below it.
    ///
    /// Saturates on overflow; any index the tree can address is far below
    /// a saturated stride.
    pub fn strides(&self) -> Vec<u64> {
        let mut strides = vec![1u64; self.0.len()];
        for level in (0..self.0.len().saturating_sub(1)).rev() {
            strides[level] = strides[level + 1].saturating_mul(self.0[level + 1]);
        }
        strides
    }
}

impl FromStr for BranchingFactors {
    type Err = BenchError;

    fn from_str(s: &str) -> BenchResult<Self> {
        BranchingFactors::new(parse_branching_factors(s)?)
    }
}

impl fmt::Display for BranchingFactors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.0.iter().map(|b| b.to_string()).collect();
        write!(f, "{}", parts.join("/"))
    }
}

impl Serialize for BranchingFactors {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for BranchingFactors {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}
