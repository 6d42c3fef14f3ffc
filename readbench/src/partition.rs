//! Splitting an object into shuffled, non-overlapping ranges for random reads.

use rand::Rng;
use rand::seq::SliceRandom;
use readbench_storage::ReadRange;

use crate::benchmark::BenchmarkError;

/// Partitions `[0, object_size)` into chunks of `chunk_size` bytes in random order.
///
/// The result contains `ceil(object_size / chunk_size)` ranges which are pairwise disjoint and
/// cover the object exactly once. All ranges are `chunk_size` bytes long, except for the range at
/// the end of the object which holds the remainder.
///
/// The permutation is drawn from `rng`. Pass a seeded generator to obtain a reproducible order.
pub fn partition<R: Rng + ?Sized>(
    object_size: u64,
    chunk_size: u64,
    rng: &mut R,
) -> Result<Vec<ReadRange>, BenchmarkError> {
    if object_size == 0 {
        return Err(BenchmarkError::InvalidArgument(
            "object size must be positive",
        ));
    }
    if chunk_size == 0 {
        return Err(BenchmarkError::InvalidArgument(
            "chunk size must be positive",
        ));
    }

    let mut ranges: Vec<_> = (0..object_size)
        .step_by(chunk_size.try_into().unwrap_or(usize::MAX))
        .map(|offset| ReadRange::new(offset, chunk_size.min(object_size - offset)))
        .collect();

    ranges.shuffle(rng);
    Ok(ranges)
}
