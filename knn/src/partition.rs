use std::{num::NonZeroUsize, ops::Range};

/// Splits `total` points among `workers` and returns the share of `worker_id`.
///
/// Properties:
/// - Ranges are contiguous, disjoint and cover `[0..total)`.
/// - The first `total % workers` shares hold one extra point.
///
/// # Panics
/// If `worker_id` is not below `workers`.
pub fn shard_range(total: usize, worker_id: usize, workers: NonZeroUsize) -> Range<usize> {
    let workers = workers.get();
    assert!(worker_id < workers, "worker_id out of range");

    let base = total / workers;
    let rem = total % workers;

    let start = worker_id * base + worker_id.min(rem);
    let extra = usize::from(worker_id < rem);

    start..start + base + extra
}

/// The ranges of every worker, in worker-index order.
pub fn shares(total: usize, workers: NonZeroUsize) -> Vec<Range<usize>> {
    (0..workers.get())
        .map(|worker_id| shard_range(total, worker_id, workers))
        .collect()
}

/// Borrows `items` as one contiguous slice per worker.
pub fn partition<T>(items: &[T], workers: NonZeroUsize) -> Vec<&[T]> {
    shares(items.len(), workers)
        .into_iter()
        .map(|range| &items[range])
        .collect()
}
