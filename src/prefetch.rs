//! Software prefetch hints for the random-access traversal patterns in
//! HNSW graph search and IVF/LSH/Annoy candidate scans.

/// Hint that `ptr` will be read soon. Compiles to `prefetcht0` on x86/x86_64
/// with SSE; a no-op elsewhere.
#[inline(always)]
pub fn prefetch_read<T>(ptr: *const T) {
    #[cfg(all(target_arch = "x86_64", target_feature = "sse"))]
    unsafe {
        use std::arch::x86_64::{_mm_prefetch, _MM_HINT_T0};
        _mm_prefetch(ptr as *const i8, _MM_HINT_T0);
    }

    #[cfg(all(target_arch = "x86", target_feature = "sse"))]
    unsafe {
        use std::arch::x86::{_mm_prefetch, _MM_HINT_T0};
        _mm_prefetch(ptr as *const i8, _MM_HINT_T0);
    }

    #[cfg(not(any(
        all(target_arch = "x86_64", target_feature = "sse"),
        all(target_arch = "x86", target_feature = "sse")
    )))]
    {
        let _ = ptr;
    }
}

/// Prefetch up to `max` row vectors ahead of a batch of distance evaluations.
pub fn prefetch_rows(store_ptr_and_stride: impl Iterator<Item = *const f32>, max: usize) {
    for ptr in store_ptr_and_stride.take(max) {
        prefetch_read(ptr);
    }
}

/// Prefetch a whole vector's cache lines: first, middle, and (for large
/// vectors) last, since a single prefetch only warms one 64-byte line.
#[inline(always)]
pub fn prefetch_vector(data: &[f32]) {
    if data.is_empty() {
        return;
    }
    prefetch_read(data.as_ptr());

    if data.len() > 16 {
        prefetch_read(unsafe { data.as_ptr().add(data.len() / 2) });
    }
    if data.len() > 32 {
        prefetch_read(unsafe { data.as_ptr().add(data.len() - 16) });
    }
}
