//! Index-range partitioning utilities for the fork-join parallel regions

use std::ops::Range;

/// Deterministic contiguous partition of `[start, end)` into `parts` ranges
///
/// The first `(end - start) % parts` ranges are one element longer than the
/// rest, so the union is exactly `[start, end)` and no two ranges overlap.
/// When `parts` exceeds the range length the tail ranges are empty.
pub fn partition_ranges(start: usize, end: usize, parts: usize) -> Vec<Range<usize>> {
    assert!(start <= end, "Invalid range: {}..{}", start, end);
    let parts = parts.max(1);
    let len = end - start;
    let base = len / parts;
    let extra = len % parts;

    let mut ranges = Vec::with_capacity(parts);
    let mut cursor = start;
    for k in 0..parts {
        let size = base + usize::from(k < extra);
        ranges.push(cursor..cursor + size);
        cursor += size;
    }
    ranges
}

/// A chunk of a sorted active-index list paired with the disjoint window of a
/// dense vector that covers the chunk's index values
///
/// `window[j - base]` is the dense element for active index `j`.
pub struct ActiveWindow<'a> {
    /// Active indices assigned to this worker, sorted ascending
    pub indices: &'a [usize],
    /// Dense offset of the first window element
    pub base: usize,
    /// Mutable window of the dense vector
    pub window: &'a mut [f64],
}

/// Zip contiguous chunks of a sorted active-index list with disjoint mutable
/// windows of a dense vector
///
/// Because the active list is sorted and strictly increasing, the index
/// values covered by consecutive chunks occupy disjoint spans of the dense
/// vector; each span is split off as an independent `&mut` window, so the
/// chunks can be written concurrently without aliasing.
pub fn active_windows<'a>(
    active: &'a [usize],
    dense: &'a mut [f64],
    parts: usize,
) -> Vec<ActiveWindow<'a>> {
    debug_assert!(active.windows(2).all(|w| w[0] < w[1]));

    let mut windows = Vec::new();
    let mut rest = dense;
    let mut consumed = 0usize;

    for range in partition_ranges(0, active.len(), parts) {
        if range.is_empty() {
            continue;
        }
        let chunk = &active[range];
        let end = chunk[chunk.len() - 1] + 1;
        let (window, tail) = std::mem::take(&mut rest).split_at_mut(end - consumed);
        windows.push(ActiveWindow {
            indices: chunk,
            base: consumed,
            window,
        });
        rest = tail;
        consumed = end;
    }

    windows
}
