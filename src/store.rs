//! Shared append-only vector storage.
//!
//! Every index family stores its raw vectors here rather than privately, so
//! the storage layout, atomic row reservation, and prefetch behavior are
//! written once instead of once per family. Rows are assigned contiguously
//! and never recycled; once a row is visible to readers it is immutable
//! until [`VectorStore::clear`].

use crate::distance::sq_norm;
use crate::error::{AnnError, Result};
use crate::prefetch::prefetch_vector;
use std::cell::UnsafeCell;
use std::sync::atomic::{AtomicBool, AtomicI32, AtomicUsize, Ordering};

struct Slot(UnsafeCell<f32>);

// SAFETY: each row's slots are written by exactly one `add`/`add_batch` call
// before that row's `ready` flag is published with `Release`; all reads
// happen only after observing `ready` with `Acquire`, which establishes a
// happens-before edge. Disjoint rows never alias during concurrent writes
// because row indices are reserved exclusively via `fetch_add`.
unsafe impl Sync for Slot {}

pub struct VectorStore {
    dims: usize,
    capacity: usize,
    len: AtomicUsize,
    data: Box<[Slot]>,
    ids: Box<[AtomicI32]>,
    norms: Box<[UnsafeCell<f32>]>,
    ready: Box<[AtomicBool]>,
}

// SAFETY: `norms[row]` follows the same publish/subscribe discipline as
// `data`, guarded by `ready[row]`.
unsafe impl Sync for VectorStore {}

impl VectorStore {
    pub fn new(dims: usize, capacity: usize) -> Self {
        let data = (0..capacity * dims)
            .map(|_| Slot(UnsafeCell::new(0.0)))
            .collect::<Vec<_>>()
            .into_boxed_slice();
        let ids = (0..capacity)
            .map(|_| AtomicI32::new(0))
            .collect::<Vec<_>>()
            .into_boxed_slice();
        let norms = (0..capacity)
            .map(|_| UnsafeCell::new(0.0))
            .collect::<Vec<_>>()
            .into_boxed_slice();
        let ready = (0..capacity)
            .map(|_| AtomicBool::new(false))
            .collect::<Vec<_>>()
            .into_boxed_slice();

        Self {
            dims,
            capacity,
            len: AtomicUsize::new(0),
            data,
            ids,
            norms,
            ready,
        }
    }

    pub fn dims(&self) -> usize {
        self.dims
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn size(&self) -> usize {
        self.len.load(Ordering::Acquire).min(self.capacity)
    }

    /// Reserve `count` contiguous rows, returning the first. Rolls back (no
    /// rows are left partially visible) if the store would overflow.
    fn reserve(&self, count: usize) -> Result<usize> {
        loop {
            let cur = self.len.load(Ordering::Relaxed);
            let next = cur + count;
            if next > self.capacity {
                return Err(AnnError::Full {
                    capacity: self.capacity,
                });
            }
            if self
                .len
                .compare_exchange_weak(cur, next, Ordering::AcqRel, Ordering::Relaxed)
                .is_ok()
            {
                return Ok(cur);
            }
        }
    }

    fn write_row(&self, row: usize, id: i32, vec: &[f32]) {
        let base = row * self.dims;
        for (i, &v) in vec.iter().enumerate() {
            unsafe {
                *self.data[base + i].0.get() = v;
            }
        }
        unsafe {
            *self.norms[row].get() = sq_norm(vec);
        }
        self.ids[row].store(id, Ordering::Relaxed);
        self.ready[row].store(true, Ordering::Release);
    }

    /// Append one vector, returning its row index.
    pub fn add(&self, id: i32, vec: &[f32]) -> Result<usize> {
        if vec.len() != self.dims {
            return Err(AnnError::DimensionMismatch {
                expected: self.dims,
                actual: vec.len(),
            });
        }
        let row = self.reserve(1)?;
        self.write_row(row, id, vec);
        Ok(row)
    }

    /// Append a batch of vectors, returning the first row index. Vectors are
    /// laid out row-major in `vecs` (`ids.len() * dims` floats).
    pub fn add_batch(&self, ids: &[i32], vecs: &[f32]) -> Result<usize> {
        let count = ids.len();
        if count == 0 {
            return Err(AnnError::InvalidArgument("empty batch".to_string()));
        }
        if vecs.len() != count * self.dims {
            return Err(AnnError::DimensionMismatch {
                expected: count * self.dims,
                actual: vecs.len(),
            });
        }
        let start = self.reserve(count)?;
        for (i, &id) in ids.iter().enumerate() {
            let row = start + i;
            let vec = &vecs[i * self.dims..(i + 1) * self.dims];
            self.write_row(row, id, vec);
        }
        Ok(start)
    }

    /// Fetch `(id, vector, squared norm)` for a row, if it has been written.
    pub fn get(&self, row: usize) -> Option<(i32, &[f32], f32)> {
        if row >= self.capacity || !self.ready[row].load(Ordering::Acquire) {
            return None;
        }
        let id = self.ids[row].load(Ordering::Relaxed);
        let base = row * self.dims;
        let vec = unsafe {
            std::slice::from_raw_parts(self.data[base].0.get() as *const f32, self.dims)
        };
        let norm = unsafe { *self.norms[row].get() };
        Some((id, vec, norm))
    }

    /// Issue prefetch hints for up to 8 rows ahead of a scan.
    pub fn prefetch_rows(&self, rows: &[usize]) {
        for &row in rows.iter().take(8) {
            if row < self.capacity && self.ready[row].load(Ordering::Relaxed) {
                let base = row * self.dims;
                let vec = unsafe {
                    std::slice::from_raw_parts(self.data[base].0.get() as *const f32, self.dims)
                };
                prefetch_vector(vec);
            }
        }
    }

    /// Reset to empty. Not safe to call concurrently with add/get.
    pub fn clear(&mut self) {
        self.len.store(0, Ordering::Release);
        for flag in self.ready.iter() {
            flag.store(false, Ordering::Relaxed);
        }
    }
}
