//! Load-balanced partitioning of the key list

use std::ops::Range;

/// Split `num_keys` indices into `num_workers` contiguous ranges.
///
/// Ranges are in order, disjoint and cover `0..num_keys`. Each has length
/// `num_keys / num_workers`, and the first `num_keys % num_workers` ranges
/// take one extra key. Workers beyond the key count get empty ranges.
#[must_use]
pub fn balance_load(num_workers: usize, num_keys: usize) -> Vec<Range<usize>> {
    if num_workers == 0 {
        return Vec::new();
    }
    let base = num_keys / num_workers;
    let extra = num_keys % num_workers;

    let mut ranges = Vec::with_capacity(num_workers);
    let mut start = 0;
    for worker in 0..num_workers {
        let len = base + usize::from(worker < extra);
        ranges.push(start..start + len);
        start += len;
    }
    ranges
}
