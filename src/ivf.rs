//! Inverted File index: a coarse k-means quantizer over posting lists.

use crate::distance::sq_l2;
use crate::error::{AnnError, Result};
use crate::heap::{SearchResult, TopK};
use crate::kmeans::KMeans;
use crate::store::VectorStore;
use roaring::RoaringBitmap;
use std::collections::HashMap;
use tracing::{debug, instrument};

#[derive(Clone, Copy, Debug)]
pub struct IvfParams {
    pub n_lists: usize,
    pub n_probes: usize,
    pub max_iters: usize,
    pub seed: u64,
}

impl Default for IvfParams {
    fn default() -> Self {
        Self {
            n_lists: 16,
            n_probes: 4,
            max_iters: 25,
            seed: 42,
        }
    }
}

impl IvfParams {
    pub fn validate(&self) -> std::result::Result<(), String> {
        if self.n_lists == 0 {
            return Err("n_lists must be >= 1".to_string());
        }
        if self.n_probes == 0 || self.n_probes > self.n_lists {
            return Err("n_probes must be in [1, n_lists]".to_string());
        }
        Ok(())
    }
}

pub struct IvfIndex {
    store: VectorStore,
    params: IvfParams,
    quantizer: Option<KMeans>,
    posting_lists: Vec<Vec<u32>>,
    tombstones: RoaringBitmap,
    id_to_rows: HashMap<i32, Vec<u32>>,
}

impl IvfIndex {
    pub fn new(dims: usize, max_elements: usize, params: IvfParams) -> Result<Self> {
        params.validate().map_err(AnnError::InvalidArgument)?;
        Ok(Self {
            store: VectorStore::new(dims, max_elements),
            posting_lists: vec![Vec::new(); params.n_lists],
            params,
            quantizer: None,
            tombstones: RoaringBitmap::new(),
            id_to_rows: HashMap::new(),
        })
    }

    pub fn dimensions(&self) -> usize {
        self.store.dims()
    }

    pub fn is_trained(&self) -> bool {
        self.quantizer.is_some()
    }

    #[instrument(skip(self, samples), fields(n_samples = samples.len() / self.dimensions()))]
    pub fn train(&mut self, samples: &[f32]) -> Result<()> {
        let dims = self.dimensions();
        if samples.len() % dims != 0 {
            return Err(AnnError::InvalidArgument(
                "training buffer length is not a multiple of dims".to_string(),
            ));
        }
        let refs: Vec<&[f32]> = samples.chunks(dims).collect();
        if refs.len() < self.params.n_lists {
            return Err(AnnError::InsufficientSamples {
                required: self.params.n_lists,
                got: refs.len(),
            });
        }

        let km = KMeans::train(&refs, self.params.n_lists, self.params.max_iters, self.params.seed)?;
        debug!(n_lists = self.params.n_lists, "ivf coarse quantizer trained");
        self.quantizer = Some(km);
        Ok(())
    }

    pub fn add(&mut self, id: i32, vec: &[f32]) -> Result<u32> {
        let quantizer = self.quantizer.as_ref().ok_or(AnnError::NotTrained)?;
        let row = self.store.add(id, vec)? as u32;
        let cluster = quantizer.nearest_centroid(vec);
        self.posting_lists[cluster].push(row);
        self.id_to_rows.entry(id).or_default().push(row);
        Ok(row)
    }

    pub fn add_batch(&mut self, ids: &[i32], vecs: &[f32]) -> Result<Vec<u32>> {
        let dims = self.dimensions();
        let mut rows = Vec::with_capacity(ids.len());
        for (i, &id) in ids.iter().enumerate() {
            rows.push(self.add(id, &vecs[i * dims..(i + 1) * dims])?);
        }
        Ok(rows)
    }

    pub fn search(&self, query: &[f32], k: usize, n_probes: Option<usize>) -> Result<Vec<SearchResult>> {
        let quantizer = self.quantizer.as_ref().ok_or(AnnError::NotTrained)?;
        if k == 0 {
            return Err(AnnError::InvalidArgument("k must be > 0".to_string()));
        }
        if query.len() != self.dimensions() {
            return Err(AnnError::DimensionMismatch {
                expected: self.dimensions(),
                actual: query.len(),
            });
        }

        let probes = n_probes.unwrap_or(self.params.n_probes).min(self.params.n_lists);
        let clusters = quantizer.nearest_centroids(query, probes);

        let mut top = TopK::new(k);
        for cluster in clusters {
            for &row in &self.posting_lists[cluster] {
                if self.tombstones.contains(row) {
                    continue;
                }
                let (_, vec, _) = self.store.get(row as usize).expect("row exists");
                top.push(row, sq_l2(query, vec));
            }
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
        self.posting_lists.iter().map(|l| l.len()).sum::<usize>() - self.tombstones.len() as usize
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
        for list in self.posting_lists.iter_mut() {
            list.clear();
        }
        self.tombstones.clear();
        self.id_to_rows.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_cluster_samples() -> Vec<f32> {
        vec![
            0.0, 0.0, 0.1, 0.1, -0.1, 0.0, 0.0, -0.1, // near (0,0)
            10.0, 10.0, 9.9, 10.1, 10.1, 9.9, 10.0, 9.8, // near (10,10)
        ]
    }

    #[test]
    fn test_add_before_train_fails() {
        let mut idx = IvfIndex::new(2, 10, IvfParams::default()).unwrap();
        assert!(matches!(idx.add(1, &[0.0, 0.0]), Err(AnnError::NotTrained)));
    }

    #[test]
    fn test_train_then_search_finds_nearest_cluster() {
        let mut idx = IvfIndex::new(
            2,
            10,
            IvfParams {
                n_lists: 2,
                n_probes: 2,
                max_iters: 25,
                seed: 1,
            },
        )
        .unwrap();
        idx.train(&two_cluster_samples()).unwrap();
        idx.add(1, &[0.1, 0.1]).unwrap();
        idx.add(2, &[10.0, 10.0]).unwrap();

        let results = idx.search(&[0.0, 0.0], 1, None).unwrap();
        assert_eq!(results[0].id, 1);
    }

    #[test]
    fn test_insufficient_samples_rejected() {
        let mut idx = IvfIndex::new(
            2,
            10,
            IvfParams {
                n_lists: 4,
                ..Default::default()
            },
        )
        .unwrap();
        assert!(matches!(
            idx.train(&[0.0, 0.0, 1.0, 1.0]),
            Err(AnnError::InsufficientSamples { .. })
        ));
    }

    #[test]
    fn test_removed_rows_are_excluded_from_search() {
        let mut idx = IvfIndex::new(
            2,
            10,
            IvfParams {
                n_lists: 2,
                n_probes: 2,
                max_iters: 25,
                seed: 1,
            },
        )
        .unwrap();
        idx.train(&two_cluster_samples()).unwrap();
        idx.add(1, &[0.1, 0.1]).unwrap();
        idx.add(2, &[0.0, 0.0]).unwrap();
        idx.remove(1);

        let results = idx.search(&[0.0, 0.0], 5, None).unwrap();
        assert!(results.iter().all(|r| r.id != 1));
    }
}
