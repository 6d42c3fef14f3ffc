//! Single iterations of the sequential and random read patterns.
//!
//! Each function drives a [`Backend`] through one full pass over an object and reports the
//! elapsed wall time together with the number of bytes transferred. Streams are dropped before
//! the function returns, on every exit path.

use std::io;
use std::time::{Duration, Instant};

use rand::Rng;
use readbench_storage::{Backend, BackendError, ObjectLocator, ReadRange};
use thiserror::Error;
use tokio::io::AsyncReadExt;
use tokio_util::io::StreamReader;

use crate::partition::partition;

/// Bytes in a kibibyte.
pub const KIB: u64 = 1024;
/// Bytes in a mebibyte.
pub const MIB: u64 = 1024 * KIB;

/// The buffer size used for sequential reads unless configured otherwise.
pub const DEFAULT_BUFFER_SIZE: u64 = 4 * MIB;

/// The largest buffer size accepted for sequential reads.
pub const MAX_BUFFER_SIZE: u64 = 1024 * MIB;

/// Upper bound for the buffer a random read reuses across ranges.
const MAX_RANGE_BUFFER: u64 = 4 * MIB;

/// Why a single iteration failed.
#[derive(Debug, Error)]
pub enum BenchmarkError {
    /// The benchmark was called with parameters that cannot describe a valid read.
    #[error("invalid argument: {0}")]
    InvalidArgument(&'static str),

    /// Opening a read stream failed.
    #[error("failed to open stream{}", at_offset(.offset))]
    Open {
        /// The start of the range, or `None` for a full read.
        offset: Option<u64>,
        /// The backend error.
        #[source]
        source: BackendError,
    },

    /// The stream signaled an error before reaching end-of-data.
    #[error("read failed{}", at_offset(.offset))]
    Read {
        /// The start of the range, or `None` for a full read.
        offset: Option<u64>,
        /// The transport error.
        #[source]
        source: io::Error,
    },

    /// A range stream ended before delivering the full range.
    #[error("range at offset {offset} ended after {actual} of {expected} bytes")]
    ShortRead {
        /// The start of the range.
        offset: u64,
        /// The length of the range.
        expected: u64,
        /// The bytes received before the stream ended.
        actual: u64,
    },
}

fn at_offset(offset: &Option<u64>) -> String {
    match offset {
        Some(offset) => format!(" at offset {offset}"),
        None => String::new(),
    }
}

/// The outcome of a single iteration.
#[derive(Debug)]
pub enum BenchmarkResult {
    /// The pass over the object completed.
    Success {
        /// Wall time of the pass.
        elapsed: Duration,
        /// Bytes transferred.
        bytes_read: u64,
    },
    /// The pass was aborted.
    Failure {
        /// The first error encountered.
        error: BenchmarkError,
        /// Bytes transferred before the failure, on a best-effort basis.
        bytes_read: u64,
    },
}

impl BenchmarkResult {
    fn failed(error: BenchmarkError, bytes_read: u64) -> Self {
        Self::Failure { error, bytes_read }
    }

    /// Returns `true` if the iteration completed.
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    /// Bytes transferred during the iteration, including partial reads of failed iterations.
    pub fn bytes_read(&self) -> u64 {
        match self {
            Self::Success { bytes_read, .. } | Self::Failure { bytes_read, .. } => *bytes_read,
        }
    }

    /// Wall time of a successful iteration.
    pub fn elapsed(&self) -> Option<Duration> {
        match self {
            Self::Success { elapsed, .. } => Some(*elapsed),
            Self::Failure { .. } => None,
        }
    }

    /// Wall time of a successful iteration in whole milliseconds, rounded down.
    pub fn duration_ms(&self) -> Option<u64> {
        self.elapsed()
            .map(|elapsed| elapsed.as_millis().try_into().unwrap_or(u64::MAX))
    }

    /// The error of a failed iteration.
    pub fn error(&self) -> Option<&BenchmarkError> {
        match self {
            Self::Success { .. } => None,
            Self::Failure { error, .. } => Some(error),
        }
    }
}

/// Reads the full object front to back.
///
/// The stream is drained through a reusable buffer of `buffer_size` bytes. Timing starts right
/// before the stream is opened and ends once end-of-data has been reached.
pub async fn sequential_read<B>(
    backend: &B,
    locator: &ObjectLocator,
    buffer_size: u64,
) -> BenchmarkResult
where
    B: Backend + ?Sized,
{
    if buffer_size == 0 {
        let error = BenchmarkError::InvalidArgument("buffer size must be positive");
        return BenchmarkResult::failed(error, 0);
    }
    if buffer_size > MAX_BUFFER_SIZE {
        let error = BenchmarkError::InvalidArgument("buffer size exceeds 1 GiB");
        return BenchmarkResult::failed(error, 0);
    }
    let mut buffer = vec![0; buffer_size as usize];

    let start = Instant::now();
    let stream = match backend.read_object(locator).await {
        Ok(stream) => stream,
        Err(source) => {
            let error = BenchmarkError::Open {
                offset: None,
                source,
            };
            return BenchmarkResult::failed(error, 0);
        }
    };

    let mut reader = StreamReader::new(stream);
    let mut bytes_read = 0;
    loop {
        match reader.read(&mut buffer).await {
            Ok(0) => break,
            Ok(n) => bytes_read += n as u64,
            Err(source) => {
                let error = BenchmarkError::Read {
                    offset: None,
                    source,
                };
                return BenchmarkResult::failed(error, bytes_read);
            }
        }
    }
    drop(reader);

    BenchmarkResult::Success {
        elapsed: start.elapsed(),
        bytes_read,
    }
}

/// Reads the full object as `chunk_size` ranges in random order.
///
/// The ranges come from [`partition`], drawn with `rng`. They are read one after another, and
/// the first range that fails to open or read aborts the iteration. Timing spans the whole
/// sequence of ranges.
pub async fn random_read<B, R>(
    backend: &B,
    locator: &ObjectLocator,
    object_size: u64,
    chunk_size: u64,
    rng: &mut R,
) -> BenchmarkResult
where
    B: Backend + ?Sized,
    R: Rng + ?Sized,
{
    let ranges = match partition(object_size, chunk_size, rng) {
        Ok(ranges) => ranges,
        Err(error) => return BenchmarkResult::failed(error, 0),
    };
    let mut buffer = vec![0; chunk_size.min(MAX_RANGE_BUFFER) as usize];

    let start = Instant::now();
    let mut bytes_read = 0;
    for range in ranges {
        let result = read_range(backend, locator, range, &mut buffer, &mut bytes_read).await;
        if let Err(error) = result {
            return BenchmarkResult::failed(error, bytes_read);
        }
    }

    BenchmarkResult::Success {
        elapsed: start.elapsed(),
        bytes_read,
    }
}

/// Reads exactly `range.length` bytes, adding every byte received to `bytes_read`.
///
/// Empty ranges are skipped without issuing a request.
async fn read_range<B>(
    backend: &B,
    locator: &ObjectLocator,
    range: ReadRange,
    buffer: &mut [u8],
    bytes_read: &mut u64,
) -> Result<(), BenchmarkError>
where
    B: Backend + ?Sized,
{
    if range.is_empty() {
        return Ok(());
    }

    let stream = backend
        .read_range(locator, range)
        .await
        .map_err(|source| BenchmarkError::Open {
            offset: Some(range.offset),
            source,
        })?;

    // Anything a backend sends past the end of the range is ignored.
    let mut reader = StreamReader::new(stream).take(range.length);
    let mut received = 0;
    loop {
        let n = reader
            .read(buffer)
            .await
            .map_err(|source| BenchmarkError::Read {
                offset: Some(range.offset),
                source,
            })?;
        if n == 0 {
            break;
        }
        received += n as u64;
        *bytes_read += n as u64;
    }

    if received < range.length {
        return Err(BenchmarkError::ShortRead {
            offset: range.offset,
            expected: range.length,
            actual: received,
        });
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use rand::SeedableRng;
    use rand::rngs::SmallRng;
    use readbench_storage::backend::InMemory;

    use super::*;
    use crate::testutils::FaultyBackend;

    const CONTENTS: &[u8] = b"the quick brown fox jumps over the lazy dog";

    fn locator() -> ObjectLocator {
        ObjectLocator::new("bucket", "object")
    }

    #[tokio::test]
    async fn sequential_reads_full_object() {
        let backend = InMemory::new().with_chunk_size(5);
        backend.insert(locator(), CONTENTS);

        let result = sequential_read(&backend, &locator(), 4).await;

        assert!(result.is_success(), "{result:?}");
        assert_eq!(result.bytes_read(), CONTENTS.len() as u64);
        assert!(result.duration_ms().is_some());
    }

    #[tokio::test]
    async fn sequential_open_failure() {
        let backend = FaultyBackend {
            fail_opens: vec![1],
            ..FaultyBackend::with_object(&locator(), CONTENTS)
        };

        let result = sequential_read(&backend, &locator(), 16).await;

        assert!(matches!(
            result,
            BenchmarkResult::Failure {
                error: BenchmarkError::Open { offset: None, .. },
                bytes_read: 0,
            }
        ));
    }

    #[tokio::test]
    async fn sequential_read_error_keeps_partial_bytes() {
        let backend = FaultyBackend {
            break_streams: true,
            inner: InMemory::new().with_chunk_size(10),
            ..FaultyBackend::default()
        };
        backend.inner.insert(locator(), CONTENTS);

        let result = sequential_read(&backend, &locator(), 64).await;

        assert!(matches!(
            result.error(),
            Some(BenchmarkError::Read { offset: None, .. })
        ));
        assert_eq!(result.bytes_read(), 10);
        assert_eq!(result.duration_ms(), None);
    }

    #[tokio::test]
    async fn sequential_rejects_empty_buffer() {
        let backend = FaultyBackend::with_object(&locator(), CONTENTS);

        let result = sequential_read(&backend, &locator(), 0).await;

        assert!(matches!(
            result.error(),
            Some(BenchmarkError::InvalidArgument(_))
        ));
        assert!(backend.requested().is_empty());
    }

    #[tokio::test]
    async fn sequential_rejects_oversized_buffer() {
        let backend = FaultyBackend::with_object(&locator(), CONTENTS);

        for buffer_size in [MAX_BUFFER_SIZE + 1, u64::MAX] {
            let result = sequential_read(&backend, &locator(), buffer_size).await;
            assert!(matches!(
                result.error(),
                Some(BenchmarkError::InvalidArgument(_))
            ));
        }
        assert!(backend.requested().is_empty());
    }

    #[tokio::test]
    async fn empty_range_is_skipped() {
        let backend = FaultyBackend::with_object(&locator(), CONTENTS);
        let mut buffer = [0; 8];
        let mut bytes_read = 0;

        read_range(
            &backend,
            &locator(),
            ReadRange::new(4, 0),
            &mut buffer,
            &mut bytes_read,
        )
        .await
        .unwrap();

        assert_eq!(bytes_read, 0);
        assert!(backend.requested().is_empty());
    }

    #[tokio::test]
    async fn random_reads_every_range_once() {
        let backend = FaultyBackend::with_object(&locator(), CONTENTS);
        let mut rng = SmallRng::seed_from_u64(7);

        let result = random_read(&backend, &locator(), CONTENTS.len() as u64, 10, &mut rng).await;

        assert!(result.is_success(), "{result:?}");
        assert_eq!(result.bytes_read(), CONTENTS.len() as u64);

        let mut requested: Vec<_> = backend.requested().into_iter().flatten().collect();
        assert_eq!(requested.len(), 5);
        requested.sort();
        assert_eq!(requested[4], ReadRange::new(40, 3));
    }

    #[tokio::test]
    async fn random_stops_at_first_failed_open() {
        // 50 bytes in 5 ranges of 10 bytes, the third open fails.
        let backend = FaultyBackend {
            fail_opens: vec![3],
            ..FaultyBackend::with_object(&locator(), &[7; 50])
        };
        let mut rng = SmallRng::seed_from_u64(1);

        let result = random_read(&backend, &locator(), 50, 10, &mut rng).await;

        assert!(matches!(
            result.error(),
            Some(BenchmarkError::Open {
                offset: Some(_),
                ..
            })
        ));
        assert_eq!(result.bytes_read(), 20);
        assert_eq!(backend.requested().len(), 3);
    }

    #[tokio::test]
    async fn random_short_range_is_a_failure() {
        let backend = FaultyBackend {
            short_ranges: true,
            ..FaultyBackend::with_object(&locator(), CONTENTS)
        };
        let mut rng = SmallRng::seed_from_u64(3);

        let result = random_read(&backend, &locator(), CONTENTS.len() as u64, 8, &mut rng).await;

        let Some(&BenchmarkError::ShortRead {
            expected, actual, ..
        }) = result.error()
        else {
            panic!("expected a short read, got {result:?}");
        };
        assert_eq!(actual + 1, expected);
        assert_eq!(result.bytes_read(), actual);
        assert_eq!(backend.requested().len(), 1);
    }

    #[tokio::test]
    async fn random_read_error_keeps_partial_bytes() {
        let backend = FaultyBackend {
            break_streams: true,
            inner: InMemory::new().with_chunk_size(4),
            ..FaultyBackend::default()
        };
        // every range is 8 bytes long, so each one breaks after its first 4 byte chunk
        backend.inner.insert(locator(), &CONTENTS[..40]);
        let mut rng = SmallRng::seed_from_u64(3);

        let result = random_read(&backend, &locator(), 40, 8, &mut rng).await;

        assert!(matches!(
            result.error(),
            Some(BenchmarkError::Read {
                offset: Some(_),
                ..
            })
        ));
        assert_eq!(result.bytes_read(), 4);
    }

    #[tokio::test]
    async fn random_rejects_invalid_sizes_before_io() {
        let backend = FaultyBackend::with_object(&locator(), CONTENTS);
        let mut rng = SmallRng::seed_from_u64(0);

        let result = random_read(&backend, &locator(), 0, 8, &mut rng).await;
        assert!(matches!(
            result.error(),
            Some(BenchmarkError::InvalidArgument(_))
        ));

        let result = random_read(&backend, &locator(), 10, 0, &mut rng).await;
        assert!(matches!(
            result.error(),
            Some(BenchmarkError::InvalidArgument(_))
        ));

        assert!(backend.requested().is_empty());
    }
}
