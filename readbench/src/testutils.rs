//! A scriptable [`Backend`] for exercising failure paths.

use std::io;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use futures_util::StreamExt;
use readbench_storage::backend::InMemory;
use readbench_storage::{
    Backend, BackendError, BackendResult, ObjectLocator, PayloadStream, ReadRange,
};

/// Wraps an [`InMemory`] backend and injects faults into its reads.
#[derive(Debug, Default)]
pub struct FaultyBackend {
    pub inner: InMemory,
    /// 1-based numbers of read calls (full or ranged) that fail to open.
    pub fail_opens: Vec<usize>,
    /// Streams yield an error after their first chunk.
    pub break_streams: bool,
    /// Range streams end one byte early.
    pub short_ranges: bool,
    /// Fail `object_size` calls.
    pub fail_metadata: bool,

    pub calls: AtomicUsize,
    pub requested: Mutex<Vec<Option<ReadRange>>>,
}

impl FaultyBackend {
    pub fn with_object(locator: &ObjectLocator, contents: &'static [u8]) -> Self {
        let backend = Self::default();
        backend.inner.insert(locator.clone(), contents);
        backend
    }

    /// All read calls so far, `None` standing for a full read.
    pub fn requested(&self) -> Vec<Option<ReadRange>> {
        self.requested.lock().unwrap().clone()
    }

    fn open(&self, range: Option<ReadRange>) -> BackendResult<()> {
        self.requested.lock().unwrap().push(range);
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if self.fail_opens.contains(&call) {
            return Err(BackendError::Io(io::Error::other(format!(
                "open #{call} refused"
            ))));
        }
        Ok(())
    }

    fn wrap(&self, stream: PayloadStream) -> PayloadStream {
        if !self.break_streams {
            return stream;
        }

        let error = futures_util::stream::once(async {
            Err(io::Error::new(
                io::ErrorKind::ConnectionReset,
                "connection reset",
            ))
        });
        stream.take(1).chain(error).boxed()
    }
}

#[async_trait::async_trait]
impl Backend for FaultyBackend {
    fn name(&self) -> &'static str {
        "faulty"
    }

    async fn object_size(&self, locator: &ObjectLocator) -> BackendResult<u64> {
        if self.fail_metadata {
            return Err(BackendError::NotFound(locator.clone()));
        }
        self.inner.object_size(locator).await
    }

    async fn read_object(&self, locator: &ObjectLocator) -> BackendResult<PayloadStream> {
        self.open(None)?;
        let stream = self.inner.read_object(locator).await?;
        Ok(self.wrap(stream))
    }

    async fn read_range(
        &self,
        locator: &ObjectLocator,
        range: ReadRange,
    ) -> BackendResult<PayloadStream> {
        self.open(Some(range))?;
        let served = match self.short_ranges {
            true => ReadRange::new(range.offset, range.length - 1),
            false => range,
        };
        let stream = self.inner.read_range(locator, served).await?;
        Ok(self.wrap(stream))
    }
}
