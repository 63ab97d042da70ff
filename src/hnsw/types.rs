//! Core data structures for the HNSW graph.
//!
//! `HnswNode` is laid out to fit one cache line: node id, level, and
//! per-level neighbor counts are all a reader needs before deciding whether
//! to fetch the (much larger) neighbor list.

use serde::{Deserialize, Serialize};

/// HNSW construction parameters.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct HnswParams {
    /// Bidirectional links per node at levels above 0. Level 0 gets 2x.
    pub m: usize,

    /// Candidate list width during insertion. Must be >= m.
    pub ef_construction: usize,

    /// Candidate list width at query time, unless overridden per search.
    pub ef_search: usize,

    /// Level-generation scale, `1 / ln(m)`.
    pub ml: f32,

    /// Seed for the level-assignment RNG.
    pub seed: u64,

    /// Maximum number of levels the graph may grow to.
    pub max_level: u8,
}

impl Default for HnswParams {
    fn default() -> Self {
        let m = 16;
        Self {
            m,
            ef_construction: 64,
            ef_search: 100,
            ml: 1.0 / (m as f32).ln(),
            seed: 42,
            max_level: 8,
        }
    }
}

impl HnswParams {
    pub fn high_recall() -> Self {
        let m = 64;
        Self {
            m,
            ef_construction: 400,
            ef_search: 200,
            ml: 1.0 / (m as f32).ln(),
            seed: 42,
            max_level: 8,
        }
    }

    pub fn low_memory() -> Self {
        let m = 8;
        Self {
            m,
            ef_construction: 48,
            ef_search: 48,
            ml: 1.0 / (m as f32).ln(),
            seed: 42,
            max_level: 6,
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        if !(4..=64).contains(&self.m) {
            return Err("m must be in [4, 64]".to_string());
        }
        if self.ef_construction < self.m || self.ef_construction > 800 {
            return Err("ef_construction must be in [m, 800]".to_string());
        }
        if self.ef_search == 0 || self.ef_search > 1000 {
            return Err("ef_search must be in [1, 1000]".to_string());
        }
        if self.ml <= 0.0 {
            return Err("ml must be greater than 0".to_string());
        }
        if self.max_level == 0 {
            return Err("max_level must be greater than 0".to_string());
        }
        Ok(())
    }
}

/// Node metadata, cache-line aligned: id, level and per-level neighbor
/// counts are checked on every traversal step before the (cold) neighbor
/// list is fetched.
#[repr(C, align(64))]
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct HnswNode {
    pub row: u32,
    pub level: u8,
    pub neighbor_counts: [u8; 8],
    #[serde(skip, default = "default_padding")]
    _padding: [u8; 51],
}

fn default_padding() -> [u8; 51] {
    [0; 51]
}

impl HnswNode {
    pub fn new(row: u32, level: u8) -> Self {
        Self {
            row,
            level,
            neighbor_counts: [0; 8],
            _padding: [0; 51],
        }
    }

    pub fn neighbor_count(&self, level: u8) -> usize {
        if level <= self.level {
            self.neighbor_counts[level as usize] as usize
        } else {
            0
        }
    }

    pub fn set_neighbor_count(&mut self, level: u8, count: usize) {
        if level <= self.level {
            self.neighbor_counts[level as usize] = count.min(255) as u8;
        }
    }
}

const _: () = assert!(std::mem::size_of::<HnswNode>() == 64);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_node_is_one_cache_line() {
        assert_eq!(std::mem::size_of::<HnswNode>(), 64);
        assert_eq!(std::mem::align_of::<HnswNode>(), 64);
    }

    #[test]
    fn test_neighbor_count_above_level_is_zero() {
        let mut node = HnswNode::new(0, 3);
        node.set_neighbor_count(2, 10);
        node.set_neighbor_count(5, 99);
        assert_eq!(node.neighbor_count(2), 10);
        assert_eq!(node.neighbor_count(5), 0);
    }

    #[test]
    fn test_default_params_validate() {
        assert!(HnswParams::default().validate().is_ok());
    }

    #[test]
    fn test_rejects_ef_construction_below_m() {
        let mut params = HnswParams::default();
        params.ef_construction = 1;
        assert!(params.validate().is_err());
    }
}
