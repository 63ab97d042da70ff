//! Boundary conditions at scale: capacity exhaustion, large batches, and
//! dimension limits.

use annidx::store::VectorStore;
use annidx::{AnnError, HnswIndex, HnswParams};

#[test]
fn test_vector_store_returns_full_once_capacity_is_reached() {
    let capacity = 100;
    let store = VectorStore::new(8, capacity);
    for i in 0..capacity {
        store.add(i as i32, &[i as f32; 8]).unwrap();
    }
    assert_eq!(store.size(), capacity);
    assert!(matches!(
        store.add(capacity as i32, &[0.0; 8]),
        Err(AnnError::Full { capacity: c }) if c == capacity
    ));
}

#[test]
fn test_vector_store_large_batch_insert() {
    let dims = 32;
    let batch_size = 10_000;
    let store = VectorStore::new(dims, batch_size);

    let ids: Vec<i32> = (0..batch_size as i32).collect();
    let vecs: Vec<f32> = (0..batch_size * dims).map(|i| i as f32).collect();

    let start = store.add_batch(&ids, &vecs).unwrap();
    assert_eq!(start, 0);
    assert_eq!(store.size(), batch_size);
}

#[test]
fn test_hnsw_many_small_inserts_stay_consistent() {
    let dims = 8;
    let n = 5_000;
    let mut idx = HnswIndex::new(dims, n, HnswParams::low_memory()).unwrap();
    for i in 0..n {
        let v: Vec<f32> = (0..dims).map(|d| ((i + d) as f32) * 0.001).collect();
        idx.insert(i as i32, &v).unwrap();
    }
    assert_eq!(idx.len(), n);
}

#[test]
fn test_hnsw_capacity_exhaustion_surfaces_full_error() {
    let dims = 4;
    let capacity = 10;
    let mut idx = HnswIndex::new(dims, capacity, HnswParams::default()).unwrap();
    for i in 0..capacity {
        idx.insert(i as i32, &[i as f32; 4]).unwrap();
    }
    assert!(matches!(
        idx.insert(capacity as i32, &[0.0; 4]),
        Err(AnnError::Full { .. })
    ));
}

#[test]
fn test_search_on_large_dataset_returns_k_results() {
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    let dims = 32;
    let n = 20_000;
    let mut rng = StdRng::seed_from_u64(3);
    let mut idx = HnswIndex::new(dims, n, HnswParams::low_memory()).unwrap();

    for i in 0..n {
        let v: Vec<f32> = (0..dims).map(|_| rng.gen_range(-1.0..1.0)).collect();
        idx.insert(i as i32, &v).unwrap();
    }

    let query: Vec<f32> = (0..dims).map(|_| rng.gen_range(-1.0..1.0)).collect();
    let results = idx.search(&query, 10, 64).unwrap();
    assert_eq!(results.len(), 10);
}

#[test]
fn test_empty_index_operations_do_not_panic() {
    let idx = HnswIndex::new(4, 10, HnswParams::default()).unwrap();
    assert_eq!(idx.len(), 0);
    assert!(idx.is_empty());
    let results = idx.search(&[0.0; 4], 5, 10).unwrap();
    assert!(results.is_empty());
}
