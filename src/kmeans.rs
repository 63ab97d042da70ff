//! Lloyd's-algorithm k-means trainer shared by the IVF coarse quantizer and
//! PQ's per-subspace codebooks.

use crate::distance::sq_l2;
use crate::error::{AnnError, Result};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

pub struct KMeans {
    pub centroids: Vec<Vec<f32>>,
}

impl KMeans {
    /// Train `k` centroids over `samples` (each of length `dims`), bounded to
    /// `max_iters` Lloyd iterations, seeded for determinism.
    pub fn train(samples: &[&[f32]], k: usize, max_iters: usize, seed: u64) -> Result<Self> {
        if samples.len() < k {
            return Err(AnnError::InsufficientSamples {
                required: k,
                got: samples.len(),
            });
        }

        let mut rng = StdRng::seed_from_u64(seed);
        let mut centroids = init_kmeans_plus_plus(samples, k, &mut rng);

        for _ in 0..max_iters {
            let mut sums = vec![vec![0.0f32; centroids[0].len()]; k];
            let mut counts = vec![0usize; k];

            for &sample in samples {
                let c = nearest(&centroids, sample);
                counts[c] += 1;
                for (s, &v) in sums[c].iter_mut().zip(sample.iter()) {
                    *s += v;
                }
            }

            let mut moved = 0.0f32;
            for c in 0..k {
                if counts[c] == 0 {
                    // Empty cluster: reseed from a random sample so it can
                    // compete for assignments on the next iteration.
                    let replacement = samples[rng.gen_range(0..samples.len())];
                    moved += sq_l2(&centroids[c], replacement);
                    centroids[c] = replacement.to_vec();
                    continue;
                }
                let new_centroid: Vec<f32> = sums[c]
                    .iter()
                    .map(|&s| s / counts[c] as f32)
                    .collect();
                moved += sq_l2(&centroids[c], &new_centroid);
                centroids[c] = new_centroid;
            }

            if moved < 1e-6 {
                break;
            }
        }

        Ok(Self { centroids })
    }

    pub fn nearest_centroid(&self, v: &[f32]) -> usize {
        nearest(&self.centroids, v)
    }

    /// Indices of the `k` nearest centroids to `v`, closest first.
    pub fn nearest_centroids(&self, v: &[f32], k: usize) -> Vec<usize> {
        let mut dists: Vec<(usize, f32)> = self
            .centroids
            .iter()
            .enumerate()
            .map(|(i, c)| (i, sq_l2(v, c)))
            .collect();
        dists.sort_by(|a, b| a.1.partial_cmp(&b.1).unwrap());
        dists.into_iter().take(k).map(|(i, _)| i).collect()
    }
}

fn nearest(centroids: &[Vec<f32>], v: &[f32]) -> usize {
    centroids
        .iter()
        .enumerate()
        .map(|(i, c)| (i, sq_l2(v, c)))
        .min_by(|a, b| a.1.partial_cmp(&b.1).unwrap())
        .map(|(i, _)| i)
        .unwrap_or(0)
}

fn init_kmeans_plus_plus(samples: &[&[f32]], k: usize, rng: &mut StdRng) -> Vec<Vec<f32>> {
    let mut centroids = Vec::with_capacity(k);
    let first = rng.gen_range(0..samples.len());
    centroids.push(samples[first].to_vec());

    while centroids.len() < k {
        let dists: Vec<f32> = samples
            .iter()
            .map(|s| {
                centroids
                    .iter()
                    .map(|c| sq_l2(s, c))
                    .fold(f32::INFINITY, f32::min)
            })
            .collect();

        let total: f32 = dists.iter().sum();
        if total <= 0.0 {
            let idx = rng.gen_range(0..samples.len());
            centroids.push(samples[idx].to_vec());
            continue;
        }

        let threshold = rng.gen::<f32>() * total;
        let mut cumulative = 0.0f32;
        let mut chosen = samples.len() - 1;
        for (i, &d) in dists.iter().enumerate() {
            cumulative += d;
            if cumulative >= threshold {
                chosen = i;
                break;
            }
        }
        centroids.push(samples[chosen].to_vec());
    }

    centroids
}
