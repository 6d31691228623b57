//! Depth-targeted prefix selection
//!
//! Picks one directory at a requested depth. Each level's coordinate is a
//! seeded random draw bounded by that level's branching factor (and by the
//! populated children under the prefix drawn so far), so the same seed always
//! lands on the same directory.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::constants::DEPTH_UNSET;
use crate::error::{BenchError, BenchResult};
use crate::key_space::KeySpace;

/// Prefix chosen as the target of a listing workload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListTarget {
    /// Listing prefix, with trailing separator unless it is the bare root ""
    pub prefix: String,
    /// Depth below the fixed prefix (0 = root)
    pub depth: usize,
    /// Coordinates of the selected directory, one per level
    pub coordinates: Vec<u64>,
}

#[derive(Debug, Clone, Copy)]
pub struct DepthSelector {
    seed: u64,
}

impl DepthSelector {
    pub fn new(seed: u64) -> Self {
        Self { seed }
    }

    /// Use `seed` when given, otherwise draw one for this run
    pub fn from_optional_seed(seed: Option<u64>) -> Self {
        Self::new(seed.unwrap_or_else(|| rand::rng().random()))
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Select the directory at `depth`. Pure in (seed, depth, key space).
    pub fn select(&self, key_space: &KeySpace, depth: usize) -> BenchResult<ListTarget> {
        let levels = key_space.levels();
        if depth > levels {
            return Err(BenchError::config(format!(
                "depth to list {} exceeds the {} configured branching level(s)",
                depth, levels
            )));
        }

        let mut rng = StdRng::seed_from_u64(self.seed ^ depth as u64);
        let mut coordinates = Vec::with_capacity(depth);
        for _ in 0..depth {
            let populated = key_space.populated_children(&coordinates);
            if populated == 0 {
                // Only reachable for an empty key space, which KeySpace rejects
                return Err(BenchError::config(format!(
                    "no populated directory at depth {}",
                    coordinates.len() + 1
                )));
            }
            coordinates.push(rng.random_range(0..populated));
        }

        Ok(ListTarget {
            prefix: key_space.dir_prefix(&coordinates),
            depth,
            coordinates,
        })
    }

    /// Resolve the configured depth: the sentinel lists the whole namespace
    pub fn resolve(&self, key_space: &KeySpace, depth_to_list: i64) -> BenchResult<ListTarget> {
        if depth_to_list == DEPTH_UNSET {
            return Ok(ListTarget {
                prefix: key_space.root_prefix(),
                depth: 0,
                coordinates: Vec::new(),
            });
        }
        let depth = usize::try_from(depth_to_list).map_err(|_| {
            BenchError::config(format!(
                "depth to list must be {} or non-negative, got {}",
                DEPTH_UNSET, depth_to_list
            ))
        })?;
        self.select(key_space, depth)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::branching::BranchingFactors;

    fn three_level() -> KeySpace {
        let factors: BranchingFactors = "3/4/5".parse().unwrap();
        KeySpace::nested("root", &factors, 60).unwrap()
    }

    #[test]
    fn test_depth_zero_is_root() {
        let target = DepthSelector::new(7).select(&three_level(), 0).unwrap();
        assert_eq!(target.prefix, "root/");
        assert!(target.coordinates.is_empty());
    }

    #[test]
    fn test_depth_two_has_two_segments() {
        let target = DepthSelector::new(7).select(&three_level(), 2).unwrap();
        let rest = target.prefix.strip_prefix("root/").unwrap();
        let segments: Vec<&str> = rest.trim_end_matches('/').split('/').collect();
        assert_eq!(segments.len(), 2);
        assert!(segments[0].starts_with("d1_w"));
        assert!(segments[1].starts_with("d2_w"));
        assert!(target.coordinates[0] < 3 && target.coordinates[1] < 4);
    }

    #[test]
    fn test_depth_beyond_tree_fails() {
        let err = DepthSelector::new(7).select(&three_level(), 4).unwrap_err();
        assert!(matches!(err, BenchError::Config(_)));
        // The deepest directory level is still selectable
        assert!(DepthSelector::new(7).select(&three_level(), 3).is_ok());
    }

    #[test]
    fn test_same_seed_same_prefix() {
        let ks = three_level();
        let a = DepthSelector::new(42).select(&ks, 3).unwrap();
        let b = DepthSelector::new(42).select(&ks, 3).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_seeds_explore_different_subtrees() {
        let ks = three_level();
        let distinct: std::collections::HashSet<String> = (0..64)
            .map(|seed| DepthSelector::new(seed).select(&ks, 3).unwrap().prefix)
            .collect();
        assert!(distinct.len() > 1);
    }

    #[test]
    fn test_selection_stays_in_populated_range() {
        // Only the first 7 leaves exist: d1_w0 (5 leaves) and d1_w1 (2 leaves)
        let factors: BranchingFactors = "3/5".parse().unwrap();
        let ks = KeySpace::nested("", &factors, 7).unwrap();
        for seed in 0..200 {
            let target = DepthSelector::new(seed).select(&ks, 2).unwrap();
            let index = target.coordinates[0] * 5 + target.coordinates[1];
            assert!(index < 7, "seed {} picked empty leaf {:?}", seed, target.coordinates);
        }
    }

    #[test]
    fn test_resolve_sentinel_and_negative() {
        let ks = three_level();
        let sel = DepthSelector::new(1);
        assert_eq!(sel.resolve(&ks, DEPTH_UNSET).unwrap().prefix, "root/");
        assert!(sel.resolve(&ks, -2).is_err());
        assert_eq!(sel.resolve(&ks, 1).unwrap().depth, 1);
    }
}
