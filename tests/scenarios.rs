//! End-to-end scenarios covering one worked example per index family.

use annidx::{
    AnnError, AnnoyIndex, AnnoyParams, HnswIndex, HnswParams, IvfIndex, IvfParams, LshIndex,
    LshParams, PqIndex, PqParams,
};

#[test]
fn test_hnsw_four_axis_points_search() {
    let mut idx = HnswIndex::new(4, 10, HnswParams::default()).unwrap();
    idx.insert(1, &[1.0, 0.0, 0.0, 0.0]).unwrap();
    idx.insert(2, &[0.0, 1.0, 0.0, 0.0]).unwrap();
    idx.insert(3, &[0.0, 0.0, 1.0, 0.0]).unwrap();
    idx.insert(4, &[0.0, 0.0, 0.0, 1.0]).unwrap();

    let results = idx.search(&[1.0, 0.0, 0.0, 0.0], 4, 64).unwrap();
    assert_eq!(results.len(), 4);
    assert_eq!(results[0].id, 1);
    assert!(results[0].distance < 1e-6);
    // the three orthogonal axes are all equidistant at squared distance 2
    for r in &results[1..] {
        assert!((r.distance - 2.0).abs() < 1e-5);
    }
}

#[test]
fn test_ivf_two_cluster_train_and_search() {
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

    let samples = vec![
        0.0, 0.0, 0.1, 0.1, -0.1, -0.1, 10.0, 10.0, 10.1, 9.9, 9.9, 10.1,
    ];
    idx.train(&samples).unwrap();
    idx.add(1, &[0.0, 0.0]).unwrap();
    idx.add(2, &[10.0, 10.0]).unwrap();

    let near_origin = idx.search(&[0.05, 0.05], 1, None).unwrap();
    assert_eq!(near_origin[0].id, 1);

    let near_far = idx.search(&[9.95, 9.95], 1, None).unwrap();
    assert_eq!(near_far[0].id, 2);
}

#[test]
fn test_pq_trivial_encode_and_asymmetric_distance() {
    let params = PqParams {
        num_subspaces: 2,
        n_bits: 1,
        max_iters: 10,
        seed: 3,
    };
    let mut idx = PqIndex::new(4, params).unwrap();

    let samples = vec![
        0.0, 0.0, 0.0, 0.0, 0.1, 0.1, 0.1, 0.1, 5.0, 5.0, 5.0, 5.0, 5.1, 5.1, 5.1, 5.1,
    ];
    idx.train(&samples).unwrap();

    idx.add(1, &[0.0, 0.0, 0.0, 0.0]).unwrap();
    idx.add(2, &[5.0, 5.0, 5.0, 5.0]).unwrap();

    let results = idx.search(&[0.0, 0.0, 0.0, 0.0], 2).unwrap();
    assert_eq!(results[0].id, 1);
    assert_eq!(results[1].id, 2);
    assert!(results[0].distance < results[1].distance);
}

#[test]
fn test_lsh_self_retrieval() {
    let mut idx = LshIndex::new(2, 10, LshParams::default()).unwrap();
    idx.add(1, &[3.0, 4.0]).unwrap();
    idx.add(2, &[-3.0, -4.0]).unwrap();

    let results = idx.search(&[3.0, 4.0], 1).unwrap();
    assert_eq!(results[0].id, 1);
    assert_eq!(results[0].distance, 0.0);
}

#[test]
fn test_annoy_line_of_points_k5_search() {
    let mut idx = AnnoyIndex::new(
        3,
        20,
        AnnoyParams {
            num_trees: 10,
            leaf_size: 8,
            search_k: 200,
            seed: 17,
        },
    )
    .unwrap();

    for i in 0..20 {
        idx.add(i, &[i as f32, 0.0, 0.0]).unwrap();
    }
    idx.build().unwrap();

    let results = idx.search(&[10.0, 0.0, 0.0], 5, None).unwrap();
    assert_eq!(results.len(), 5);
    let ids: Vec<i32> = results.iter().map(|r| r.id).collect();
    assert!(ids.contains(&10));
}

#[test]
fn test_capacity_exhaustion_returns_full_error() {
    let mut idx = HnswIndex::new(2, 2, HnswParams::default()).unwrap();
    idx.insert(1, &[0.0, 0.0]).unwrap();
    idx.insert(2, &[1.0, 1.0]).unwrap();
    assert!(matches!(idx.insert(3, &[2.0, 2.0]), Err(AnnError::Full { .. })));
}
