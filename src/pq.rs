//! Product quantization: each vector is split into equal subspaces, each
//! subspace is coded against its own small k-means codebook, and search
//! ranks candidates by an asymmetric distance table instead of decoding.

use crate::error::{AnnError, Result};
use crate::heap::{SearchResult, TopK};
use crate::kmeans::KMeans;
use roaring::RoaringBitmap;
use std::collections::HashMap;
use tracing::{debug, instrument};

#[derive(Clone, Copy, Debug)]
pub struct PqParams {
    /// Number of subspaces the vector is split into. Must divide dims evenly.
    pub num_subspaces: usize,
    /// Bits per subspace code; codebook size is 2^n_bits.
    pub n_bits: u8,
    pub max_iters: usize,
    pub seed: u64,
}

impl Default for PqParams {
    fn default() -> Self {
        Self {
            num_subspaces: 8,
            n_bits: 8,
            max_iters: 25,
            seed: 42,
        }
    }
}

impl PqParams {
    pub fn validate(&self, dims: usize) -> std::result::Result<(), String> {
        if self.num_subspaces == 0 {
            return Err("num_subspaces must be >= 1".to_string());
        }
        if dims % self.num_subspaces != 0 {
            return Err("dims must be divisible by num_subspaces".to_string());
        }
        if self.n_bits == 0 || self.n_bits > 16 {
            return Err("n_bits must be in [1, 16]".to_string());
        }
        Ok(())
    }

    fn codebook_size(&self) -> usize {
        1usize << self.n_bits
    }

    fn subspace_dims(&self, dims: usize) -> usize {
        dims / self.num_subspaces
    }
}

/// One subspace's codebook: `codebook_size` centroids of `subspace_dims`.
struct Subspace {
    centroids: Vec<Vec<f32>>,
}

/// Packs `num_subspaces` centroid indices, each `n_bits` wide, little-endian
/// bit order, into the minimum number of bytes.
fn pack_code(indices: &[usize], n_bits: u8) -> Vec<u8> {
    let total_bits = indices.len() * n_bits as usize;
    let mut bytes = vec![0u8; total_bits.div_ceil(8)];
    let mut bit_offset = 0usize;
    for &idx in indices {
        for b in 0..n_bits {
            if (idx >> b) & 1 == 1 {
                let byte = (bit_offset + b as usize) / 8;
                let bit = (bit_offset + b as usize) % 8;
                bytes[byte] |= 1 << bit;
            }
        }
        bit_offset += n_bits as usize;
    }
    bytes
}

fn unpack_code(bytes: &[u8], num_subspaces: usize, n_bits: u8) -> Vec<u16> {
    let mut indices = Vec::with_capacity(num_subspaces);
    let mut bit_offset = 0usize;
    for _ in 0..num_subspaces {
        let mut value: u16 = 0;
        for b in 0..n_bits {
            let byte = (bit_offset + b as usize) / 8;
            let bit = (bit_offset + b as usize) % 8;
            if bytes[byte] & (1 << bit) != 0 {
                value |= 1 << b;
            }
        }
        indices.push(value);
        bit_offset += n_bits as usize;
    }
    indices
}

pub struct PqIndex {
    dims: usize,
    params: PqParams,
    subspaces: Option<Vec<Subspace>>,
    codes: Vec<Vec<u8>>,
    ids: Vec<i32>,
    tombstones: RoaringBitmap,
    id_to_rows: HashMap<i32, Vec<u32>>,
}

impl PqIndex {
    pub fn new(dims: usize, params: PqParams) -> Result<Self> {
        params.validate(dims).map_err(AnnError::InvalidArgument)?;
        Ok(Self {
            dims,
            params,
            subspaces: None,
            codes: Vec::new(),
            ids: Vec::new(),
            tombstones: RoaringBitmap::new(),
            id_to_rows: HashMap::new(),
        })
    }

    pub fn dimensions(&self) -> usize {
        self.dims
    }

    pub fn is_trained(&self) -> bool {
        self.subspaces.is_some()
    }

    #[instrument(skip(self, samples), fields(n_samples = samples.len() / self.dims))]
    pub fn train(&mut self, samples: &[f32]) -> Result<()> {
        if samples.len() % self.dims != 0 {
            return Err(AnnError::InvalidArgument(
                "training buffer length is not a multiple of dims".to_string(),
            ));
        }
        let n_samples = samples.len() / self.dims;
        let codebook_size = self.params.codebook_size();
        if n_samples < codebook_size {
            return Err(AnnError::InsufficientSamples {
                required: codebook_size,
                got: n_samples,
            });
        }

        let sub_dims = self.params.subspace_dims(self.dims);
        let mut subspaces = Vec::with_capacity(self.params.num_subspaces);
        for s in 0..self.params.num_subspaces {
            let offset = s * sub_dims;
            let sub_vectors: Vec<Vec<f32>> = (0..n_samples)
                .map(|i| samples[i * self.dims + offset..i * self.dims + offset + sub_dims].to_vec())
                .collect();
            let refs: Vec<&[f32]> = sub_vectors.iter().map(|v| v.as_slice()).collect();
            let km = KMeans::train(&refs, codebook_size, self.params.max_iters, self.params.seed + s as u64)?;
            subspaces.push(Subspace { centroids: km.centroids });
        }
        debug!(
            num_subspaces = self.params.num_subspaces,
            codebook_size, "pq codebooks trained"
        );
        self.subspaces = Some(subspaces);
        Ok(())
    }

    fn encode(&self, vector: &[f32]) -> Vec<u8> {
        let subspaces = self.subspaces.as_ref().expect("trained");
        let sub_dims = self.params.subspace_dims(self.dims);
        let indices: Vec<usize> = subspaces
            .iter()
            .enumerate()
            .map(|(s, sub)| {
                let offset = s * sub_dims;
                let slice = &vector[offset..offset + sub_dims];
                nearest_centroid_index(&sub.centroids, slice)
            })
            .collect();
        pack_code(&indices, self.params.n_bits)
    }

    pub fn add(&mut self, id: i32, vector: &[f32]) -> Result<u32> {
        if self.subspaces.is_none() {
            return Err(AnnError::NotTrained);
        }
        if vector.len() != self.dims {
            return Err(AnnError::DimensionMismatch {
                expected: self.dims,
                actual: vector.len(),
            });
        }
        let code = self.encode(vector);
        let row = self.codes.len() as u32;
        self.codes.push(code);
        self.ids.push(id);
        self.id_to_rows.entry(id).or_default().push(row);
        Ok(row)
    }

    pub fn add_batch(&mut self, ids: &[i32], vectors: &[f32]) -> Result<Vec<u32>> {
        let mut rows = Vec::with_capacity(ids.len());
        for (i, &id) in ids.iter().enumerate() {
            rows.push(self.add(id, &vectors[i * self.dims..(i + 1) * self.dims])?);
        }
        Ok(rows)
    }

    /// Builds the per-subspace squared-distance table between `query` and
    /// every centroid, so scoring a candidate is `num_subspaces` table reads.
    fn build_distance_table(&self, query: &[f32]) -> Vec<Vec<f32>> {
        let subspaces = self.subspaces.as_ref().expect("trained");
        let sub_dims = self.params.subspace_dims(self.dims);
        subspaces
            .iter()
            .enumerate()
            .map(|(s, sub)| {
                let offset = s * sub_dims;
                let slice = &query[offset..offset + sub_dims];
                sub.centroids
                    .iter()
                    .map(|c| crate::distance::sq_l2(slice, c))
                    .collect()
            })
            .collect()
    }

    fn adt_distance(table: &[Vec<f32>], code: &[u8], num_subspaces: usize, n_bits: u8) -> f32 {
        unpack_code(code, num_subspaces, n_bits)
            .iter()
            .enumerate()
            .map(|(s, &c)| table[s][c as usize])
            .sum()
    }

    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<SearchResult>> {
        if self.subspaces.is_none() {
            return Err(AnnError::NotTrained);
        }
        if k == 0 {
            return Err(AnnError::InvalidArgument("k must be > 0".to_string()));
        }
        if query.len() != self.dims {
            return Err(AnnError::DimensionMismatch {
                expected: self.dims,
                actual: query.len(),
            });
        }

        let table = self.build_distance_table(query);
        let mut top = TopK::new(k);
        for (row, code) in self.codes.iter().enumerate() {
            if self.tombstones.contains(row as u32) {
                continue;
            }
            let dist = Self::adt_distance(&table, code, self.params.num_subspaces, self.params.n_bits);
            top.push(row as u32, dist);
        }

        Ok(top
            .into_sorted_vec()
            .into_iter()
            .map(|c| SearchResult::new(self.ids[c.row as usize], c.distance.0))
            .collect())
    }

    pub fn size(&self) -> usize {
        self.codes.len() - self.tombstones.len() as usize
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
        self.codes.clear();
        self.ids.clear();
        self.tombstones.clear();
        self.id_to_rows.clear();
    }
}

fn nearest_centroid_index(centroids: &[Vec<f32>], v: &[f32]) -> usize {
    centroids
        .iter()
        .enumerate()
        .map(|(i, c)| (i, crate::distance::sq_l2(v, c)))
        .min_by(|a, b| a.1.partial_cmp(&b.1).unwrap())
        .map(|(i, _)| i)
        .unwrap_or(0)
}
