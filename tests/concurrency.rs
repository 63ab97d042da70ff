//! Thread-safety checks for the shared vector store and the HNSW graph:
//! parallel insertions land on disjoint rows, and searches run safely
//! alongside writers.

use annidx::store::VectorStore;
use annidx::{HnswIndex, HnswParams};
use std::sync::{Arc, Mutex, RwLock};
use std::thread;

#[test]
fn test_parallel_vector_store_insertions_are_disjoint() {
    let dims = 32;
    let num_threads = 8;
    let per_thread = 200;
    let store = Arc::new(VectorStore::new(dims, num_threads * per_thread));

    let handles: Vec<_> = (0..num_threads)
        .map(|t| {
            let store = Arc::clone(&store);
            thread::spawn(move || {
                for i in 0..per_thread {
                    let id = (t * per_thread + i) as i32;
                    let vec = vec![id as f32; dims];
                    store.add(id, &vec).unwrap();
                }
            })
        })
        .collect();

    for h in handles {
        h.join().unwrap();
    }

    assert_eq!(store.size(), num_threads * per_thread);
}

#[test]
fn test_hnsw_writers_are_serialized_readers_are_concurrent() {
    let dims = 16;
    let index = Arc::new(RwLock::new(HnswIndex::new(dims, 2000, HnswParams::default()).unwrap()));

    // Seed the graph before fanning out concurrent readers and writers.
    {
        let mut idx = index.write().unwrap();
        for i in 0..200 {
            let v: Vec<f32> = (0..dims).map(|d| ((i + d) as f32) * 0.01).collect();
            idx.insert(i as i32, &v).unwrap();
        }
    }

    let writer_index = Arc::clone(&index);
    let writer = thread::spawn(move || {
        for i in 200..400 {
            let v: Vec<f32> = (0..dims).map(|d| ((i + d) as f32) * 0.01).collect();
            writer_index.write().unwrap().insert(i as i32, &v).unwrap();
        }
    });

    let mut readers = Vec::new();
    for _ in 0..4 {
        let reader_index = Arc::clone(&index);
        readers.push(thread::spawn(move || {
            for _ in 0..50 {
                let query = vec![0.5f32; dims];
                let idx = reader_index.read().unwrap();
                let _ = idx.search(&query, 5, 32).unwrap();
            }
        }));
    }

    writer.join().unwrap();
    for r in readers {
        r.join().unwrap();
    }

    assert_eq!(index.read().unwrap().len(), 400);
}

#[test]
fn test_mixed_add_and_search_workload_on_lsh() {
    use annidx::{LshIndex, LshParams};

    let dims = 8;
    let index = Arc::new(Mutex::new(LshIndex::new(dims, 250, LshParams::default()).unwrap()));

    let mut handles = Vec::new();
    for t in 0..4 {
        let index = Arc::clone(&index);
        handles.push(thread::spawn(move || {
            for i in 0..50 {
                let id = t * 50 + i;
                let v: Vec<f32> = (0..dims).map(|d| (id + d) as f32).collect();
                index.lock().unwrap().add(id as i32, &v).unwrap();
            }
        }));
    }
    for h in handles {
        h.join().unwrap();
    }

    let index = index.lock().unwrap();
    assert_eq!(index.size(), 200);
}
