//! Segmental equal-split of sequences into contiguous chunks.

/// Sizes of `n` contiguous chunks covering `len` items.
///
/// The first `len % n` chunks get one extra item, so sizes differ by at
/// most one and always sum to `len`. Returns an empty list when `n == 0`.
pub fn split_sizes(len: usize, n: usize) -> Vec<usize> {
    if n == 0 {
        return Vec::new();
    }
    let base = len / n;
    let extra = len % n;
    (0..n).map(|i| base + usize::from(i < extra)).collect()
}

/// Splits `items` into `n` contiguous, near-equal chunks.
pub fn split_evenly<T>(items: &[T], n: usize) -> Vec<&[T]> {
    let mut chunks = Vec::with_capacity(n);
    let mut start = 0;
    for size in split_sizes(items.len(), n) {
        chunks.push(&items[start..start + size]);
        start += size;
    }
    chunks
}
