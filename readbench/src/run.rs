//! Repeated execution of one benchmark configuration and reporting of its results.

use std::error::Error;
use std::fmt;
use std::time::SystemTime;

use rand::Rng;
use readbench_storage::{Backend, BackendError, ObjectLocator};
use thiserror::Error;
use yansi::Paint;

use crate::benchmark::{BenchmarkResult, KIB, MAX_BUFFER_SIZE, random_read, sequential_read};
use crate::stats::{Summary, megabytes};

/// The access pattern of a run.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReadPattern {
    /// Read the object front to back through a buffer of `buffer_size` bytes.
    Sequential {
        /// Size of the reusable read buffer.
        buffer_size: u64,
    },
    /// Read the object as shuffled ranges of `chunk_size` bytes.
    Random {
        /// Size of each range.
        chunk_size: u64,
    },
}

impl ReadPattern {
    /// Human-readable name of the pattern.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Sequential { .. } => "Sequential",
            Self::Random { .. } => "Random",
        }
    }
}

/// One combination of backend, pattern, and object to benchmark.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BenchmarkConfig {
    /// Name of the backend, for reporting.
    pub backend_tag: String,
    /// The access pattern.
    pub pattern: ReadPattern,
    /// How often the pattern is repeated.
    pub iterations: usize,
    /// The object to read.
    pub locator: ObjectLocator,
}

impl BenchmarkConfig {
    /// Builds the full matrix of runs for the given backends.
    ///
    /// This yields a sequential run per backend first, followed by a random run per backend for
    /// every chunk size.
    pub fn matrix<S: AsRef<str>>(
        backend_tags: &[S],
        locator: &ObjectLocator,
        iterations: usize,
        buffer_size: Option<u64>,
        chunk_sizes: &[u64],
    ) -> Vec<Self> {
        let sequential = buffer_size.map(|buffer_size| ReadPattern::Sequential { buffer_size });
        let random = chunk_sizes
            .iter()
            .map(|&chunk_size| ReadPattern::Random { chunk_size });

        sequential
            .into_iter()
            .chain(random)
            .flat_map(|pattern| {
                backend_tags.iter().map(move |tag| Self {
                    backend_tag: tag.as_ref().to_owned(),
                    pattern,
                    iterations,
                    locator: locator.clone(),
                })
            })
            .collect()
    }

    /// Checks the parameters that can be validated without I/O.
    pub fn validate(&self) -> Result<(), RunError> {
        if self.iterations == 0 {
            return Err(RunError::InvalidArgument(
                "iteration count must be positive",
            ));
        }
        match self.pattern {
            ReadPattern::Sequential { buffer_size: 0 } => {
                Err(RunError::InvalidArgument("buffer size must be positive"))
            }
            ReadPattern::Sequential { buffer_size } if buffer_size > MAX_BUFFER_SIZE => {
                Err(RunError::InvalidArgument("buffer size exceeds 1 GiB"))
            }
            ReadPattern::Random { chunk_size: 0 } => {
                Err(RunError::InvalidArgument("chunk size must be positive"))
            }
            _ => Ok(()),
        }
    }
}

/// Errors that abort a run before any iteration is attempted.
#[derive(Debug, Error)]
pub enum RunError {
    /// The configuration cannot describe a valid benchmark.
    #[error("invalid argument: {0}")]
    InvalidArgument(&'static str),

    /// The object size could not be determined.
    #[error("failed to get metadata for {locator}")]
    Metadata {
        /// The object in question.
        locator: ObjectLocator,
        /// The backend error.
        #[source]
        source: BackendError,
    },
}

/// The outcome of a run, printed as an aggregate results block.
#[derive(Clone, Debug, PartialEq)]
pub struct Report {
    /// The configuration that was run.
    pub config: BenchmarkConfig,
    /// Size of the object in bytes.
    pub object_size: u64,
    /// Iteration counts and statistics.
    pub summary: Summary,
}

impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let header = format!(
            "==== {} Read Aggregate Benchmark Results ({}) ====",
            self.config.pattern.name(),
            self.config.backend_tag
        );
        writeln!(f, "{}", header.bold())?;
        writeln!(
            f,
            "File size: {:.2} MB ({} bytes)",
            megabytes(self.object_size),
            self.object_size
        )?;
        match self.config.pattern {
            ReadPattern::Sequential { buffer_size } => {
                writeln!(f, "Buffer size: {} KB", buffer_size / KIB)?
            }
            ReadPattern::Random { chunk_size } => {
                writeln!(f, "Read size: {} KB", chunk_size / KIB)?
            }
        }

        let Summary {
            attempted,
            succeeded,
            ref stats,
        } = self.summary;
        writeln!(f, "Total successful iterations: {succeeded} / {attempted}")?;

        let Some(stats) = stats else {
            return writeln!(
                f,
                "{}",
                "No successful iterations. No statistics available.".red()
            );
        };

        writeln!(f, "Average (mean) time: {:.2} ms", stats.mean)?;
        writeln!(f, "P50 (median) time:   {} ms", stats.p50)?;
        writeln!(f, "P90 time:            {} ms", stats.p90)?;
        writeln!(f, "Min time:            {} ms", stats.min)?;
        writeln!(f, "Max time:            {} ms", stats.max)?;
        writeln!(
            f,
            "Average throughput:  {:.2} MB/s",
            stats.throughput_mbps.bold()
        )
    }
}

/// Runs the configured benchmark `iterations` times and reports the results.
///
/// Iterations run strictly one after another. A failing iteration is logged and recorded, but
/// does not stop the run. Only invalid parameters and an unknown object size abort the run, both
/// before the first iteration.
///
/// `rng` drives the range order of random reads.
pub async fn run<B, R>(
    backend: &B,
    config: &BenchmarkConfig,
    rng: &mut R,
) -> Result<Report, RunError>
where
    B: Backend + ?Sized,
    R: Rng + ?Sized,
{
    config.validate()?;

    let locator = &config.locator;
    let object_size =
        backend
            .object_size(locator)
            .await
            .map_err(|source| RunError::Metadata {
                locator: locator.clone(),
                source,
            })?;

    if matches!(config.pattern, ReadPattern::Random { .. }) && object_size == 0 {
        return Err(RunError::InvalidArgument(
            "object size must be positive for random reads",
        ));
    }

    println!();
    println!("{}", banner(config, object_size).bold().blue());
    tracing::debug!(backend = backend.name(), ?config, object_size, "Starting run");

    let mut results = Vec::with_capacity(config.iterations);
    for iteration in 1..=config.iterations {
        let result = match config.pattern {
            ReadPattern::Sequential { buffer_size } => {
                sequential_read(backend, locator, buffer_size).await
            }
            ReadPattern::Random { chunk_size } => {
                random_read(backend, locator, object_size, chunk_size, rng).await
            }
        };

        println!("{}", iteration_line(iteration, &result, SystemTime::now()));
        if let Some(error) = result.error() {
            tracing::warn!(
                error = error as &dyn Error,
                iteration,
                backend = %config.backend_tag,
                "iteration failed"
            );
        }

        results.push(result);
    }

    let report = Report {
        config: config.clone(),
        object_size,
        summary: Summary::from_results(&results, object_size),
    };

    println!();
    print!("{report}");

    Ok(report)
}

fn banner(config: &BenchmarkConfig, object_size: u64) -> String {
    let (verb, size_label, size) = match config.pattern {
        ReadPattern::Sequential { buffer_size } => ("Sequentially reading", "Buffer", buffer_size),
        ReadPattern::Random { chunk_size } => ("Random reading", "Read", chunk_size),
    };
    format!(
        "==== [{}] {verb} {} ({:.2} MB) {size_label} size: {} KB ====",
        config.backend_tag,
        config.locator,
        megabytes(object_size),
        size / KIB,
    )
}

fn iteration_line(iteration: usize, result: &BenchmarkResult, now: SystemTime) -> String {
    let timestamp = humantime::format_rfc3339_seconds(now);
    match result {
        BenchmarkResult::Success {
            elapsed,
            bytes_read,
        } => format!(
            "[{timestamp}] Iteration {iteration}: {:.2} MB in {} ms",
            megabytes(*bytes_read),
            elapsed.as_millis()
        ),
        BenchmarkResult::Failure { bytes_read, .. } => format!(
            "[{timestamp}] Iteration {iteration}: {} Read {:.2} MB before failure.",
            "Failed.".red(),
            megabytes(*bytes_read)
        ),
    }
}
