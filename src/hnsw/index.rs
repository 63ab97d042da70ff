//! HNSW index: insertion and search (Malkov & Yashunin, 2018).

use super::query_buffers;
use super::storage::NeighborLists;
use super::types::{HnswNode, HnswParams};
use crate::distance::sq_l2;
use crate::error::{AnnError, Result};
use crate::heap::{Candidate, SearchResult};
use crate::store::VectorStore;
use ordered_float::OrderedFloat;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use roaring::RoaringBitmap;
use std::cmp::Reverse;
use std::collections::HashMap;
use tracing::{debug, error, instrument};

#[derive(Debug, Clone)]
pub struct IndexStats {
    pub num_vectors: usize,
    pub dimensions: usize,
    pub entry_point: Option<u32>,
    pub max_level: u8,
    pub level_distribution: Vec<usize>,
    pub avg_neighbors_l0: f32,
    pub memory_bytes: usize,
}

pub struct HnswIndex {
    store: VectorStore,
    nodes: Vec<HnswNode>,
    neighbors: NeighborLists,
    tombstones: RoaringBitmap,
    id_to_rows: HashMap<i32, Vec<u32>>,
    entry_point: Option<u32>,
    params: HnswParams,
    rng: StdRng,
}

impl HnswIndex {
    pub fn new(dims: usize, max_elements: usize, params: HnswParams) -> Result<Self> {
        params
            .validate()
            .map_err(AnnError::InvalidArgument)?;

        Ok(Self {
            store: VectorStore::new(dims, max_elements),
            nodes: Vec::new(),
            neighbors: NeighborLists::new(params.max_level as usize),
            tombstones: RoaringBitmap::new(),
            id_to_rows: HashMap::new(),
            entry_point: None,
            params,
            rng: StdRng::seed_from_u64(params.seed),
        })
    }

    pub fn len(&self) -> usize {
        self.nodes.len() - self.tombstones.len() as usize
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn dimensions(&self) -> usize {
        self.store.dims()
    }

    pub fn ef_search(&self) -> usize {
        self.params.ef_search
    }

    fn random_level(&mut self) -> u8 {
        let u: f32 = self.rng.gen_range(f32::EPSILON..1.0);
        let level = (-u.ln() * self.params.ml) as u8;
        level.min(self.params.max_level - 1)
    }

    fn vector(&self, row: u32) -> &[f32] {
        self.store
            .get(row as usize)
            .map(|(_, v, _)| v)
            .expect("row must have been written before being referenced by the graph")
    }

    fn distance(&self, a: u32, b: u32) -> f32 {
        sq_l2(self.vector(a), self.vector(b))
    }

    fn distance_to_query(&self, query: &[f32], row: u32) -> f32 {
        sq_l2(query, self.vector(row))
    }

    #[instrument(skip(self, vector), fields(dims = vector.len(), size = self.len()))]
    pub fn insert(&mut self, id: i32, vector: &[f32]) -> Result<u32> {
        if vector.len() != self.dimensions() {
            error!(
                expected = self.dimensions(),
                actual = vector.len(),
                "dimension mismatch on insert"
            );
            return Err(AnnError::DimensionMismatch {
                expected: self.dimensions(),
                actual: vector.len(),
            });
        }
        if vector.iter().any(|x| !x.is_finite()) {
            return Err(AnnError::InvalidArgument(
                "vector contains NaN or Inf".to_string(),
            ));
        }

        let row = self.store.add(id, vector)? as u32;
        self.id_to_rows.entry(id).or_default().push(row);

        let level = self.random_level();
        let node = HnswNode::new(row, level);
        self.nodes.push(node);

        if self.entry_point.is_none() {
            self.entry_point = Some(row);
            return Ok(row);
        }

        self.insert_into_graph(row, vector, level)?;

        let entry_row = self.entry_point.expect("checked above");
        let entry_level = self.node_for(entry_row).level;
        if level > entry_level {
            debug!(old_entry = entry_row, new_entry = row, "entry point promoted");
            self.entry_point = Some(row);
        }

        Ok(row)
    }

    pub fn insert_batch(&mut self, ids: &[i32], vecs: &[f32]) -> Result<Vec<u32>> {
        let dims = self.dimensions();
        let mut rows = Vec::with_capacity(ids.len());
        for (i, &id) in ids.iter().enumerate() {
            let v = &vecs[i * dims..(i + 1) * dims];
            rows.push(self.insert(id, v)?);
        }
        Ok(rows)
    }

    // Rows are assigned by `VectorStore` contiguously starting at 0, and
    // `insert` pushes exactly one `HnswNode` per row, so `nodes[row]` is
    // always the node for that row.
    fn node_for(&self, row: u32) -> &HnswNode {
        &self.nodes[row as usize]
    }

    fn insert_into_graph(&mut self, row: u32, vector: &[f32], level: u8) -> Result<()> {
        let entry = self.entry_point.expect("checked by caller");
        let entry_level = self.node_for(entry).level;

        let mut nearest = vec![entry];
        for lc in ((level + 1)..=entry_level).rev() {
            nearest = self.search_layer(vector, &nearest, 1, lc);
        }

        for lc in (0..=level).rev() {
            let candidates = self.search_layer(vector, &nearest, self.params.ef_construction, lc);
            let m = if lc == 0 { self.params.m * 2 } else { self.params.m };

            let selected = self.select_neighbors_heuristic(&candidates, m, vector);
            for &neighbor in &selected {
                self.neighbors.add_bidirectional_link(row, neighbor, lc);
            }
            self.nodes[row as usize].set_neighbor_count(lc, selected.len());

            for &neighbor in &selected {
                let neighbor_list = self.neighbors.get_neighbors(neighbor, lc).to_vec();
                if neighbor_list.len() > m {
                    let neighbor_vec = self.vector(neighbor).to_vec();
                    let pruned = self.select_neighbors_heuristic(&neighbor_list, m, &neighbor_vec);
                    self.neighbors.set_neighbors(neighbor, lc, pruned.clone());
                    self.nodes[neighbor as usize].set_neighbor_count(lc, pruned.len());
                }
            }

            nearest = candidates;
        }

        Ok(())
    }

    /// Greedy diverse-neighbor selection (Malkov 2018, section 4): a
    /// candidate is kept only if it is closer to the query than to every
    /// neighbor already kept, otherwise the slot goes to a later, closer
    /// leftover.
    fn select_neighbors_heuristic(&self, candidates: &[u32], m: usize, query: &[f32]) -> Vec<u32> {
        if candidates.len() <= m {
            return candidates.to_vec();
        }

        let mut sorted: Vec<(u32, f32)> = candidates
            .iter()
            .map(|&row| (row, self.distance_to_query(query, row)))
            .collect();
        sorted.sort_by_key(|&(_, d)| OrderedFloat(d));

        let mut result = Vec::with_capacity(m);
        let mut remaining = Vec::new();

        for &(row, dist) in &sorted {
            if result.len() >= m {
                remaining.push(row);
                continue;
            }
            let dominated = result.iter().any(|&r| self.distance(row, r) < dist);
            if dominated {
                remaining.push(row);
            } else {
                result.push(row);
            }
        }

        for row in remaining {
            if result.len() >= m {
                break;
            }
            result.push(row);
        }

        result
    }

    #[instrument(skip(self, query), fields(k, ef, size = self.len()))]
    pub fn search(&self, query: &[f32], k: usize, ef: usize) -> Result<Vec<SearchResult>> {
        if k == 0 {
            return Err(AnnError::InvalidArgument("k must be > 0".to_string()));
        }
        if query.len() != self.dimensions() {
            return Err(AnnError::DimensionMismatch {
                expected: self.dimensions(),
                actual: query.len(),
            });
        }
        if query.iter().any(|x| !x.is_finite()) {
            return Err(AnnError::InvalidArgument(
                "query contains NaN or Inf".to_string(),
            ));
        }
        if self.is_empty() {
            return Ok(Vec::new());
        }

        let entry = self.entry_point.expect("non-empty index has an entry point");
        let entry_level = self.node_for(entry).level;

        let mut nearest = vec![entry];
        for level in (1..=entry_level).rev() {
            nearest = self.search_layer(query, &nearest, 1, level);
        }

        let candidates = self.search_layer(query, &nearest, ef.max(k), 0);

        let mut results: Vec<SearchResult> = candidates
            .into_iter()
            .filter(|&row| !self.tombstones.contains(row))
            .map(|row| {
                let (id, _, _) = self.store.get(row as usize).expect("row exists");
                SearchResult::new(id, self.distance_to_query(query, row))
            })
            .collect();

        results.sort_by(|a, b| OrderedFloat(a.distance).cmp(&OrderedFloat(b.distance)));
        results.truncate(k);
        Ok(results)
    }

    fn search_layer(&self, query: &[f32], entry_points: &[u32], ef: usize, level: u8) -> Vec<u32> {
        query_buffers::with_buffers(|buffers| {
            let visited = &mut buffers.visited;
            let candidates = &mut buffers.candidates;
            let working = &mut buffers.working;

            for &ep in entry_points {
                let dist = self.distance_to_query(query, ep);
                let c = Candidate::new(ep, dist);
                candidates.push(Reverse(c));
                working.push(c);
                visited.insert(ep);
            }

            while let Some(Reverse(current)) = candidates.pop() {
                if let Some(&farthest) = working.peek() {
                    if current.distance > farthest.distance {
                        break;
                    }
                }

                let row_neighbors = self.neighbors.get_neighbors(current.row, level);
                for &n in row_neighbors {
                    if visited.contains(&n) {
                        continue;
                    }
                    visited.insert(n);

                    let dist = self.distance_to_query(query, n);
                    let candidate = Candidate::new(n, dist);

                    if let Some(&farthest) = working.peek() {
                        if dist < farthest.distance.0 || working.len() < ef {
                            candidates.push(Reverse(candidate));
                            working.push(candidate);
                            if working.len() > ef {
                                working.pop();
                            }
                        }
                    } else {
                        candidates.push(Reverse(candidate));
                        working.push(candidate);
                    }
                }
            }

            let mut results: Vec<_> = working.drain().collect();
            results.sort_by_key(|c| c.distance);
            results.into_iter().map(|c| c.row).collect()
        })
    }

    /// Logically delete every row stored under `id`. The graph is not
    /// repaired; tombstoned rows are filtered out of future search results.
    pub fn remove(&mut self, id: i32) -> usize {
        match self.id_to_rows.remove(&id) {
            Some(rows) => {
                for row in &rows {
                    self.tombstones.insert(*row);
                }
                rows.len()
            }
            None => 0,
        }
    }

    pub fn close(&mut self) {
        self.nodes.clear();
        self.tombstones.clear();
        self.id_to_rows.clear();
        self.entry_point = None;
    }

    pub fn memory_usage(&self) -> usize {
        self.nodes.len() * std::mem::size_of::<HnswNode>() + self.neighbors.memory_usage()
    }

    pub fn stats(&self) -> IndexStats {
        let max_level = self.nodes.iter().map(|n| n.level).max().unwrap_or(0);
        let mut level_distribution = vec![0usize; (max_level + 1) as usize];
        for node in &self.nodes {
            level_distribution[node.level as usize] += 1;
        }

        let total_neighbors: usize = self
            .nodes
            .iter()
            .map(|n| self.neighbors.get_neighbors(n.row, 0).len())
            .sum();
        let avg_neighbors_l0 = if self.nodes.is_empty() {
            0.0
        } else {
            total_neighbors as f32 / self.nodes.len() as f32
        };

        IndexStats {
            num_vectors: self.len(),
            dimensions: self.dimensions(),
            entry_point: self.entry_point,
            max_level,
            level_distribution,
            avg_neighbors_l0,
            memory_bytes: self.memory_usage(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params() -> HnswParams {
        HnswParams {
            m: 16,
            ef_construction: 64,
            ef_search: 64,
            ml: 1.0 / (16f32).ln(),
            seed: 42,
            max_level: 8,
        }
    }

    #[test]
    fn test_insert_and_search_basic_axes() {
        let mut idx = HnswIndex::new(4, 10, params()).unwrap();
        idx.insert(1, &[1.0, 0.0, 0.0, 0.0]).unwrap();
        idx.insert(2, &[0.0, 1.0, 0.0, 0.0]).unwrap();
        idx.insert(3, &[0.0, 0.0, 1.0, 0.0]).unwrap();
        idx.insert(4, &[0.0, 0.0, 0.0, 1.0]).unwrap();

        let results = idx.search(&[1.0, 0.0, 0.0, 0.0], 2, 64).unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].id, 1);
        assert!(results[0].distance < 1e-6);
    }

    #[test]
    fn test_search_on_empty_index_returns_empty() {
        let idx = HnswIndex::new(3, 10, params()).unwrap();
        let results = idx.search(&[0.0, 0.0, 0.0], 5, 10).unwrap();
        assert!(results.is_empty());
    }

    #[test]
    fn test_insert_rejects_dimension_mismatch() {
        let mut idx = HnswIndex::new(3, 10, params()).unwrap();
        assert!(matches!(
            idx.insert(1, &[1.0, 2.0]),
            Err(AnnError::DimensionMismatch { .. })
        ));
    }

    #[test]
    fn test_insert_rejects_nan() {
        let mut idx = HnswIndex::new(2, 10, params()).unwrap();
        assert!(idx.insert(1, &[f32::NAN, 0.0]).is_err());
    }

    #[test]
    fn test_remove_tombstones_and_filters_results() {
        let mut idx = HnswIndex::new(2, 10, params()).unwrap();
        idx.insert(1, &[0.0, 0.0]).unwrap();
        idx.insert(2, &[1.0, 1.0]).unwrap();
        assert_eq!(idx.remove(1), 1);
        assert_eq!(idx.len(), 1);

        let results = idx.search(&[0.0, 0.0], 2, 64).unwrap();
        assert!(results.iter().all(|r| r.id != 1));
    }

    #[test]
    fn test_recall_is_high_on_random_vectors() {
        use rand::Rng;
        let mut rng = StdRng::seed_from_u64(7);
        let dims = 16;
        let n = 300;

        let mut idx = HnswIndex::new(dims, n, HnswParams::high_recall()).unwrap();
        let mut vectors = Vec::with_capacity(n);
        for i in 0..n {
            let v: Vec<f32> = (0..dims).map(|_| rng.gen_range(-1.0..1.0)).collect();
            idx.insert(i as i32, &v).unwrap();
            vectors.push(v);
        }

        let query = &vectors[0];
        let mut brute: Vec<(i32, f32)> = vectors
            .iter()
            .enumerate()
            .map(|(i, v)| (i as i32, sq_l2(query, v)))
            .collect();
        brute.sort_by(|a, b| a.1.partial_cmp(&b.1).unwrap());
        let ground_truth: std::collections::HashSet<i32> =
            brute.iter().take(10).map(|&(id, _)| id).collect();

        let results = idx.search(query, 10, 200).unwrap();
        let hit = results.iter().filter(|r| ground_truth.contains(&r.id)).count();
        assert!(hit as f32 / 10.0 >= 0.8);
    }
}
