//! Read benchmarks for objects in remote storage.
//!
//! A benchmark run repeats one access pattern against one object through one [`Backend`]:
//!
//!  - *Sequential* reads stream the full object through a fixed-size buffer.
//!  - *Random* reads split the object into fixed-size ranges with [`partition`], shuffle them,
//!    and read them one by one.
//!
//! Every iteration yields a [`BenchmarkResult`]. The successful ones are aggregated into a
//! [`Summary`] with mean, percentile, and throughput figures, printed as a [`Report`].
//!
//! [`Backend`]: readbench_storage::Backend
#![warn(missing_docs)]
#![warn(missing_debug_implementations)]

pub mod benchmark;
pub mod cli;
pub mod config;
pub mod observability;
pub mod partition;
pub mod run;
pub mod stats;

#[cfg(test)]
mod testutils;

pub use crate::benchmark::{BenchmarkError, BenchmarkResult, random_read, sequential_read};
pub use crate::partition::partition;
pub use crate::run::{BenchmarkConfig, ReadPattern, Report, RunError, run};
pub use crate::stats::{AggregateStats, Summary};
