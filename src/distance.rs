//! Allocation-free distance kernels.
//!
//! `sq_l2` returns squared Euclidean distance, not sqrt'd — callers that need
//! true L2 take the square root themselves. Keeping the sum squared avoids an
//! extra transcendental call on every comparison, which is the fast path for
//! every index family in this crate.

#[cfg(feature = "simd")]
use std::simd::{LaneCount, Simd, SupportedLaneCount};

/// Squared L2 distance between two equal-length slices.
#[inline]
pub fn sq_l2(a: &[f32], b: &[f32]) -> f32 {
    debug_assert_eq!(a.len(), b.len());

    #[cfg(feature = "simd")]
    {
        if cfg!(target_feature = "avx512f") {
            sq_l2_simd::<16>(a, b)
        } else if cfg!(target_feature = "avx2") {
            sq_l2_simd::<8>(a, b)
        } else {
            sq_l2_simd::<4>(a, b)
        }
    }

    #[cfg(not(feature = "simd"))]
    {
        sq_l2_scalar(a, b)
    }
}

/// Dot product of two equal-length slices.
#[inline]
pub fn dot(a: &[f32], b: &[f32]) -> f32 {
    debug_assert_eq!(a.len(), b.len());

    #[cfg(feature = "simd")]
    {
        if cfg!(target_feature = "avx512f") {
            dot_simd::<16>(a, b)
        } else if cfg!(target_feature = "avx2") {
            dot_simd::<8>(a, b)
        } else {
            dot_simd::<4>(a, b)
        }
    }

    #[cfg(not(feature = "simd"))]
    {
        dot_scalar(a, b)
    }
}

/// Squared L2 norm of a single vector.
#[inline]
pub fn sq_norm(a: &[f32]) -> f32 {
    #[cfg(feature = "simd")]
    {
        if cfg!(target_feature = "avx512f") {
            sq_norm_simd::<16>(a)
        } else if cfg!(target_feature = "avx2") {
            sq_norm_simd::<8>(a)
        } else {
            sq_norm_simd::<4>(a)
        }
    }

    #[cfg(not(feature = "simd"))]
    {
        sq_norm_scalar(a)
    }
}

#[cfg(feature = "simd")]
#[inline]
fn sq_l2_simd<const LANES: usize>(a: &[f32], b: &[f32]) -> f32
where
    LaneCount<LANES>: SupportedLaneCount,
{
    let mut sum = Simd::<f32, LANES>::splat(0.0);
    let chunks = a.len() / LANES;

    for i in 0..chunks {
        let offset = i * LANES;
        let a_chunk = Simd::<f32, LANES>::from_slice(&a[offset..offset + LANES]);
        let b_chunk = Simd::<f32, LANES>::from_slice(&b[offset..offset + LANES]);
        let diff = a_chunk - b_chunk;
        sum += diff * diff;
    }

    let mut result = sum.reduce_sum();
    for i in (chunks * LANES)..a.len() {
        let diff = a[i] - b[i];
        result += diff * diff;
    }
    result
}

#[cfg(feature = "simd")]
#[inline]
fn dot_simd<const LANES: usize>(a: &[f32], b: &[f32]) -> f32
where
    LaneCount<LANES>: SupportedLaneCount,
{
    let mut sum = Simd::<f32, LANES>::splat(0.0);
    let chunks = a.len() / LANES;

    for i in 0..chunks {
        let offset = i * LANES;
        let a_chunk = Simd::<f32, LANES>::from_slice(&a[offset..offset + LANES]);
        let b_chunk = Simd::<f32, LANES>::from_slice(&b[offset..offset + LANES]);
        sum += a_chunk * b_chunk;
    }

    let mut result = sum.reduce_sum();
    for i in (chunks * LANES)..a.len() {
        result += a[i] * b[i];
    }
    result
}

#[cfg(feature = "simd")]
#[inline]
fn sq_norm_simd<const LANES: usize>(a: &[f32]) -> f32
where
    LaneCount<LANES>: SupportedLaneCount,
{
    let mut sum = Simd::<f32, LANES>::splat(0.0);
    let chunks = a.len() / LANES;

    for i in 0..chunks {
        let offset = i * LANES;
        let chunk = Simd::<f32, LANES>::from_slice(&a[offset..offset + LANES]);
        sum += chunk * chunk;
    }

    let mut result = sum.reduce_sum();
    for i in (chunks * LANES)..a.len() {
        result += a[i] * a[i];
    }
    result
}

#[inline]
fn sq_l2_scalar(a: &[f32], b: &[f32]) -> f32 {
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| {
            let diff = x - y;
            diff * diff
        })
        .sum()
}

#[inline]
fn dot_scalar(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b.iter()).map(|(x, y)| x * y).sum()
}

#[inline]
fn sq_norm_scalar(a: &[f32]) -> f32 {
    a.iter().map(|x| x * x).sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sq_l2_known_values() {
        let a = [1.0, 2.0, 3.0, 4.0];
        let b = [5.0, 6.0, 7.0, 8.0];
        assert!((sq_l2(&a, &b) - 64.0).abs() < 1e-6);
    }

    #[test]
    fn test_sq_l2_identical_is_zero() {
        let a = [1.0, 2.0, 3.0];
        assert!(sq_l2(&a, &a) < 1e-9);
    }

    #[test]
    fn test_dot_known_value() {
        let a = [1.0, 2.0, 3.0, 4.0];
        let b = [5.0, 6.0, 7.0, 8.0];
        assert!((dot(&a, &b) - 70.0).abs() < 1e-6);
    }

    #[test]
    fn test_sq_norm_known_value() {
        let a = [3.0, 4.0];
        assert!((sq_norm(&a) - 25.0).abs() < 1e-6);
    }
}
