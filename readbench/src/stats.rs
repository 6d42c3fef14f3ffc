//! Aggregation of iteration durations into summary statistics.

use crate::benchmark::{BenchmarkResult, MIB};

/// Summary statistics over the successful iterations of a run.
///
/// All durations are in milliseconds.
#[derive(Clone, Debug, PartialEq)]
pub struct AggregateStats {
    /// Arithmetic mean.
    pub mean: f64,
    /// Median, by the lower nearest-rank rule.
    pub p50: u64,
    /// 90th percentile, by the lower nearest-rank rule.
    pub p90: u64,
    /// Fastest iteration.
    pub min: u64,
    /// Slowest iteration.
    pub max: u64,
    /// Object size divided by the mean duration, in MB/s.
    pub throughput_mbps: f64,
}

/// Iteration counts of a run, plus statistics if any iteration succeeded.
#[derive(Clone, Debug, PartialEq)]
pub struct Summary {
    /// Number of iterations run.
    pub attempted: usize,
    /// Number of iterations that completed.
    pub succeeded: usize,
    /// `None` if no iteration succeeded.
    pub stats: Option<AggregateStats>,
}

impl Summary {
    /// Summarizes a series of iterations over an object of `object_size` bytes.
    ///
    /// Failed iterations only count towards `attempted`; every statistic is derived from the
    /// successful iterations alone.
    pub fn from_results(results: &[BenchmarkResult], object_size: u64) -> Self {
        let durations: Vec<u64> = results
            .iter()
            .filter_map(BenchmarkResult::duration_ms)
            .collect();

        Self {
            attempted: results.len(),
            succeeded: durations.len(),
            stats: AggregateStats::from_durations(durations, object_size),
        }
    }
}

impl AggregateStats {
    /// Computes statistics over durations in milliseconds, or `None` if there are none.
    pub fn from_durations(mut durations: Vec<u64>, object_size: u64) -> Option<Self> {
        durations.sort_unstable();
        let (&min, &max) = (durations.first()?, durations.last()?);

        let total: u128 = durations.iter().map(|&d| u128::from(d)).sum();
        let mean = total as f64 / durations.len() as f64;

        let throughput_mbps = if mean > 0.0 {
            megabytes(object_size) / (mean / 1000.0)
        } else {
            0.0
        };

        Some(Self {
            mean,
            p50: percentile(&durations, 0.5),
            p90: percentile(&durations, 0.9),
            min,
            max,
            throughput_mbps,
        })
    }
}

/// Returns the value at index `floor(p * (n - 1))` of a sorted, non-empty slice.
///
/// This is the nearest-rank method using the lower rank, without interpolation.
pub fn percentile(sorted: &[u64], p: f64) -> u64 {
    let last = sorted.len() - 1;
    let index = (p * last as f64).floor() as usize;
    sorted[index.min(last)]
}

/// Converts bytes to (binary) megabytes.
pub fn megabytes(bytes: u64) -> f64 {
    bytes as f64 / MIB as f64
}
