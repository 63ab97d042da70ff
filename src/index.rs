//! A uniform capability surface over the five index families, so host code
//! can add/search/size/close without matching on which algorithm it holds.
//! `train`/`build`/`remove` stay inherent methods on the concrete types:
//! they don't share a signature across families, and the dispatch here is
//! cheap compared to the distance kernels it's guarding.

use crate::annoy::{AnnoyIndex, AnnoyParams};
use crate::error::Result;
use crate::heap::SearchResult;
use crate::hnsw::{HnswIndex, HnswParams};
use crate::ivf::{IvfIndex, IvfParams};
use crate::lsh::{LshIndex, LshParams};
use crate::pq::{PqIndex, PqParams};

pub trait Index {
    fn add(&mut self, id: i32, vector: &[f32]) -> Result<u32>;
    fn add_batch(&mut self, ids: &[i32], vectors: &[f32]) -> Result<Vec<u32>>;
    fn search(&self, query: &[f32], k: usize) -> Result<Vec<SearchResult>>;
    fn size(&self) -> usize;
    fn close(&mut self);
}

impl Index for HnswIndex {
    fn add(&mut self, id: i32, vector: &[f32]) -> Result<u32> {
        self.insert(id, vector)
    }

    fn add_batch(&mut self, ids: &[i32], vectors: &[f32]) -> Result<Vec<u32>> {
        self.insert_batch(ids, vectors)
    }

    fn search(&self, query: &[f32], k: usize) -> Result<Vec<SearchResult>> {
        HnswIndex::search(self, query, k, self.ef_search())
    }

    fn size(&self) -> usize {
        self.len()
    }

    fn close(&mut self) {
        HnswIndex::close(self)
    }
}

impl Index for IvfIndex {
    fn add(&mut self, id: i32, vector: &[f32]) -> Result<u32> {
        IvfIndex::add(self, id, vector)
    }

    fn add_batch(&mut self, ids: &[i32], vectors: &[f32]) -> Result<Vec<u32>> {
        IvfIndex::add_batch(self, ids, vectors)
    }

    fn search(&self, query: &[f32], k: usize) -> Result<Vec<SearchResult>> {
        IvfIndex::search(self, query, k, None)
    }

    fn size(&self) -> usize {
        IvfIndex::size(self)
    }

    fn close(&mut self) {
        IvfIndex::close(self)
    }
}

impl Index for PqIndex {
    fn add(&mut self, id: i32, vector: &[f32]) -> Result<u32> {
        PqIndex::add(self, id, vector)
    }

    fn add_batch(&mut self, ids: &[i32], vectors: &[f32]) -> Result<Vec<u32>> {
        PqIndex::add_batch(self, ids, vectors)
    }

    fn search(&self, query: &[f32], k: usize) -> Result<Vec<SearchResult>> {
        PqIndex::search(self, query, k)
    }

    fn size(&self) -> usize {
        PqIndex::size(self)
    }

    fn close(&mut self) {
        PqIndex::close(self)
    }
}

impl Index for LshIndex {
    fn add(&mut self, id: i32, vector: &[f32]) -> Result<u32> {
        LshIndex::add(self, id, vector)
    }

    fn add_batch(&mut self, ids: &[i32], vectors: &[f32]) -> Result<Vec<u32>> {
        LshIndex::add_batch(self, ids, vectors)
    }

    fn search(&self, query: &[f32], k: usize) -> Result<Vec<SearchResult>> {
        LshIndex::search(self, query, k)
    }

    fn size(&self) -> usize {
        LshIndex::size(self)
    }

    fn close(&mut self) {
        LshIndex::close(self)
    }
}

impl Index for AnnoyIndex {
    fn add(&mut self, id: i32, vector: &[f32]) -> Result<u32> {
        AnnoyIndex::add(self, id, vector)
    }

    fn add_batch(&mut self, ids: &[i32], vectors: &[f32]) -> Result<Vec<u32>> {
        AnnoyIndex::add_batch(self, ids, vectors)
    }

    fn search(&self, query: &[f32], k: usize) -> Result<Vec<SearchResult>> {
        AnnoyIndex::search(self, query, k, None)
    }

    fn size(&self) -> usize {
        AnnoyIndex::size(self)
    }

    fn close(&mut self) {
        AnnoyIndex::close(self)
    }
}

/// A single index, tagged by algorithm family, for callers that need to
/// hold one of several concrete types behind a uniform value (configuration
/// loading, a registry keyed by name) rather than a generic parameter.
pub enum AnnIndex {
    Hnsw(HnswIndex),
    Ivf(IvfIndex),
    Pq(PqIndex),
    Lsh(LshIndex),
    Annoy(AnnoyIndex),
}

impl AnnIndex {
    pub fn hnsw(dims: usize, max_elements: usize, params: HnswParams) -> Result<Self> {
        Ok(Self::Hnsw(HnswIndex::new(dims, max_elements, params)?))
    }

    pub fn ivf(dims: usize, max_elements: usize, params: IvfParams) -> Result<Self> {
        Ok(Self::Ivf(IvfIndex::new(dims, max_elements, params)?))
    }

    pub fn pq(dims: usize, params: PqParams) -> Result<Self> {
        Ok(Self::Pq(PqIndex::new(dims, params)?))
    }

    pub fn lsh(dims: usize, max_elements: usize, params: LshParams) -> Result<Self> {
        Ok(Self::Lsh(LshIndex::new(dims, max_elements, params)?))
    }

    pub fn annoy(dims: usize, max_elements: usize, params: AnnoyParams) -> Result<Self> {
        Ok(Self::Annoy(AnnoyIndex::new(dims, max_elements, params)?))
    }
}

impl Index for AnnIndex {
    fn add(&mut self, id: i32, vector: &[f32]) -> Result<u32> {
        match self {
            Self::Hnsw(i) => i.add(id, vector),
            Self::Ivf(i) => i.add(id, vector),
            Self::Pq(i) => i.add(id, vector),
            Self::Lsh(i) => i.add(id, vector),
            Self::Annoy(i) => i.add(id, vector),
        }
    }

    fn add_batch(&mut self, ids: &[i32], vectors: &[f32]) -> Result<Vec<u32>> {
        match self {
            Self::Hnsw(i) => i.add_batch(ids, vectors),
            Self::Ivf(i) => i.add_batch(ids, vectors),
            Self::Pq(i) => i.add_batch(ids, vectors),
            Self::Lsh(i) => i.add_batch(ids, vectors),
            Self::Annoy(i) => i.add_batch(ids, vectors),
        }
    }

    fn search(&self, query: &[f32], k: usize) -> Result<Vec<SearchResult>> {
        match self {
            Self::Hnsw(i) => Index::search(i, query, k),
            Self::Ivf(i) => Index::search(i, query, k),
            Self::Pq(i) => Index::search(i, query, k),
            Self::Lsh(i) => Index::search(i, query, k),
            Self::Annoy(i) => Index::search(i, query, k),
        }
    }

    fn size(&self) -> usize {
        match self {
            Self::Hnsw(i) => i.size(),
            Self::Ivf(i) => i.size(),
            Self::Pq(i) => i.size(),
            Self::Lsh(i) => i.size(),
            Self::Annoy(i) => i.size(),
        }
    }

    fn close(&mut self) {
        match self {
            Self::Hnsw(i) => i.close(),
            Self::Ivf(i) => i.close(),
            Self::Pq(i) => i.close(),
            Self::Lsh(i) => i.close(),
            Self::Annoy(i) => i.close(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tagged_index_dispatches_through_hnsw() {
        let mut idx = AnnIndex::hnsw(2, 10, HnswParams::default()).unwrap();
        idx.add(1, &[0.0, 0.0]).unwrap();
        idx.add(2, &[10.0, 10.0]).unwrap();
        assert_eq!(idx.size(), 2);

        let results = Index::search(&idx, &[0.0, 0.0], 1).unwrap();
        assert_eq!(results[0].id, 1);
    }

    #[test]
    fn test_tagged_index_close_resets_size() {
        let mut idx = AnnIndex::lsh(2, 10, LshParams::default()).unwrap();
        idx.add(1, &[1.0, 1.0]).unwrap();
        idx.close();
        assert_eq!(idx.size(), 0);
    }
}
