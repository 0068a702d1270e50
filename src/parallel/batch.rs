//! Batch distribution for the parallel orchestration fan-out.
//!
//! Splits ship- or crew-level work into ranges for progress reporting, and
//! maps fallible work items in parallel while keeping failures isolated to
//! the item that caused them instead of losing the whole batch.

use rayon::prelude::*;

/// Split `total` items into up to `num_batches` ranges `[start, end)`.
/// Batches are as equal in size as possible; later batches may be smaller.
pub fn batch_ranges(total: usize, num_batches: usize) -> Vec<(usize, usize)> {
    if total == 0 || num_batches == 0 {
        return Vec::new();
    }
    let num_batches = num_batches.min(total);
    let base = total / num_batches;
    let remainder = total % num_batches;
    let mut ranges = Vec::with_capacity(num_batches);
    let mut start = 0;
    for i in 0..num_batches {
        let size = base + if i < remainder { 1 } else { 0 };
        let end = start + size;
        ranges.push((start, end));
        start = end;
    }
    ranges
}

/// Apply `work` to every item in parallel and split successes from failures.
/// One bad ship or crew member costs only its own result; result order
/// follows input order within both halves.
pub fn map_isolated<T, R, E, F>(items: &[T], work: F) -> (Vec<R>, Vec<E>)
where
    T: Sync,
    R: Send,
    E: Send,
    F: Fn(&T) -> Result<R, E> + Sync,
{
    let results: Vec<Result<R, E>> = items.par_iter().map(&work).collect();
    let mut successes = Vec::with_capacity(results.len());
    let mut failures = Vec::new();
    for result in results {
        match result {
            Ok(value) => successes.push(value),
            Err(err) => failures.push(err),
        }
    }
    (successes, failures)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn batch_ranges_even_split() {
        let r = batch_ranges(100, 4);
        assert_eq!(r, vec![(0, 25), (25, 50), (50, 75), (75, 100)]);
    }

    #[test]
    fn batch_ranges_with_remainder() {
        let r = batch_ranges(10, 3);
        assert_eq!(r, vec![(0, 4), (4, 7), (7, 10)]);
    }

    #[test]
    fn batch_ranges_more_batches_than_items() {
        let r = batch_ranges(3, 10);
        assert_eq!(r, vec![(0, 1), (1, 2), (2, 3)]);
    }

    #[test]
    fn batch_ranges_empty() {
        assert!(batch_ranges(0, 5).is_empty());
        assert!(batch_ranges(10, 0).is_empty());
    }

    #[test]
    fn one_failure_does_not_sink_the_batch() {
        let items: Vec<u32> = (0..10).collect();
        let (successes, failures) = map_isolated(&items, |&value| {
            if value == 3 {
                Err(format!("bad item {value}"))
            } else {
                Ok(value * 2)
            }
        });
        assert_eq!(successes.len(), 9);
        assert_eq!(failures, vec!["bad item 3".to_string()]);
    }
}
