//! Locality-sensitive hashing via random hyperplane sign bits: L independent
//! tables, each with K random hyperplanes, bucket by sign pattern and
//! re-rank the union of candidate buckets exactly.

use crate::distance::sq_l2;
use crate::error::{AnnError, Result};
use crate::heap::{SearchResult, TopK};
use crate::store::VectorStore;
use rand::rngs::StdRng;
use rand::SeedableRng;
use rand_distr::{Distribution, StandardNormal};
use roaring::RoaringBitmap;
use std::collections::{HashMap, HashSet};

#[derive(Clone, Copy, Debug)]
pub struct LshParams {
    /// Number of independent hash tables.
    pub num_tables: usize,
    /// Number of hyperplanes per table (bucket key width in bits).
    pub num_hyperplanes: usize,
    pub seed: u64,
}

impl Default for LshParams {
    fn default() -> Self {
        Self {
            num_tables: 4,
            num_hyperplanes: 8,
            seed: 42,
        }
    }
}

impl LshParams {
    pub fn validate(&self) -> std::result::Result<(), String> {
        if self.num_tables == 0 {
            return Err("num_tables must be >= 1".to_string());
        }
        if self.num_hyperplanes == 0 || self.num_hyperplanes > 64 {
            return Err("num_hyperplanes must be in [1, 64]".to_string());
        }
        Ok(())
    }
}

struct HashTable {
    hyperplanes: Vec<Vec<f32>>,
    buckets: HashMap<u64, Vec<u32>>,
}

impl HashTable {
    fn new(dims: usize, num_hyperplanes: usize, rng: &mut StdRng) -> Self {
        let hyperplanes = (0..num_hyperplanes)
            .map(|_| (0..dims).map(|_| StandardNormal.sample(rng)).collect())
            .collect();
        Self {
            hyperplanes,
            buckets: HashMap::new(),
        }
    }

    fn key_for(&self, vector: &[f32]) -> u64 {
        let mut key = 0u64;
        for (i, plane) in self.hyperplanes.iter().enumerate() {
            let dot = crate::distance::dot(vector, plane);
            if dot >= 0.0 {
                key |= 1 << i;
            }
        }
        key
    }

    fn insert(&mut self, vector: &[f32], row: u32) {
        self.buckets.entry(self.key_for(vector)).or_default().push(row);
    }

    fn candidates(&self, vector: &[f32]) -> &[u32] {
        self.buckets
            .get(&self.key_for(vector))
            .map(|v| v.as_slice())
            .unwrap_or(&[])
    }
}

pub struct LshIndex {
    store: VectorStore,
    tables: Vec<HashTable>,
    tombstones: RoaringBitmap,
    id_to_rows: HashMap<i32, Vec<u32>>,
}

impl LshIndex {
    pub fn new(dims: usize, max_elements: usize, params: LshParams) -> Result<Self> {
        params.validate().map_err(AnnError::InvalidArgument)?;
        let mut rng = StdRng::seed_from_u64(params.seed);
        let tables = (0..params.num_tables)
            .map(|_| HashTable::new(dims, params.num_hyperplanes, &mut rng))
            .collect();
        Ok(Self {
            store: VectorStore::new(dims, max_elements),
            tables,
            tombstones: RoaringBitmap::new(),
            id_to_rows: HashMap::new(),
        })
    }

    pub fn dimensions(&self) -> usize {
        self.store.dims()
    }

    pub fn add(&mut self, id: i32, vector: &[f32]) -> Result<u32> {
        let row = self.store.add(id, vector)? as u32;
        for table in self.tables.iter_mut() {
            table.insert(vector, row);
        }
        self.id_to_rows.entry(id).or_default().push(row);
        Ok(row)
    }

    pub fn add_batch(&mut self, ids: &[i32], vectors: &[f32]) -> Result<Vec<u32>> {
        let dims = self.dimensions();
        let mut rows = Vec::with_capacity(ids.len());
        for (i, &id) in ids.iter().enumerate() {
            rows.push(self.add(id, &vectors[i * dims..(i + 1) * dims])?);
        }
        Ok(rows)
    }

    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<SearchResult>> {
        if k == 0 {
            return Err(AnnError::InvalidArgument("k must be > 0".to_string()));
        }
        if query.len() != self.dimensions() {
            return Err(AnnError::DimensionMismatch {
                expected: self.dimensions(),
                actual: query.len(),
            });
        }

        let mut union: HashSet<u32> = HashSet::new();
        for table in &self.tables {
            union.extend(table.candidates(query));
        }

        let mut top = TopK::new(k);
        for row in union {
            if self.tombstones.contains(row) {
                continue;
            }
            let (_, vec, _) = self.store.get(row as usize).expect("row exists");
            top.push(row, sq_l2(query, vec));
        }

        Ok(top
            .into_sorted_vec()
            .into_iter()
            .map(|c| {
                let (id, _, _) = self.store.get(c.row as usize).expect("row exists");
                SearchResult::new(id, c.distance.0)
            })
            .collect())
    }

    pub fn size(&self) -> usize {
        self.store.size() - self.tombstones.len() as usize
    }

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
        self.store.clear();
        self.tombstones.clear();
        self.id_to_rows.clear();
        for table in self.tables.iter_mut() {
            table.buckets.clear();
        }
    }
}
