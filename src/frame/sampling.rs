//! Uniform frame sampling for long sequences.

/// `n` indices evenly spaced over `[0, len - 1]`, endpoints included.
///
/// Positions are truncated toward zero. Returns every index when
/// `n >= len` and nothing when `n == 0`.
///
/// ```rust
/// use adaptok::frame::sample_indices;
///
/// assert_eq!(sample_indices(10, 4), vec![0, 3, 6, 9]);
/// assert_eq!(sample_indices(3, 8), vec![0, 1, 2]);
/// ```
pub fn sample_indices(len: usize, n: usize) -> Vec<usize> {
    if n >= len {
        return (0..len).collect();
    }
    match n {
        0 => Vec::new(),
        1 => vec![0],
        _ => {
            let span = len - 1;
            let steps = n - 1;
            (0..n).map(|i| i * span / steps).collect()
        }
    }
}
