//! In-memory backend for tests.
//!
//! This provides a [`Backend`] backed by a `HashMap`, removing the need for filesystem tempdir
//! management in tests. The backend is [`Clone`] so tests can hold a handle for direct
//! manipulation while the benchmark owns a boxed copy.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use bytes::Bytes;
use futures_util::StreamExt;

use super::common::{Backend, BackendError, BackendResult, empty_stream};
use crate::id::{ObjectLocator, ReadRange};
use crate::stream::PayloadStream;

type Store = HashMap<ObjectLocator, Bytes>;

/// A [`Backend`] holding objects in memory.
///
/// Full reads are delivered in chunks of at most `chunk_size` bytes, to mimic a transport that
/// streams its response.
#[derive(Debug, Clone)]
pub struct InMemory {
    store: Arc<Mutex<Store>>,
    chunk_size: usize,
}

impl InMemory {
    /// Creates an empty backend.
    pub fn new() -> Self {
        Self {
            store: Default::default(),
            chunk_size: 64 * 1024,
        }
    }

    /// Sets the size of the chunks yielded by streams.
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }

    /// Stores `contents` at `locator`, replacing any existing object.
    pub fn insert(&self, locator: ObjectLocator, contents: impl Into<Bytes>) {
        self.lock().insert(locator, contents.into());
    }

    /// Removes an object directly.
    pub fn remove(&self, locator: &ObjectLocator) {
        self.lock().remove(locator);
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Store> {
        // A poisoned lock only means that another test panicked while holding it.
        self.store.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn get(&self, locator: &ObjectLocator) -> BackendResult<Bytes> {
        self.lock()
            .get(locator)
            .cloned()
            .ok_or_else(|| BackendError::NotFound(locator.clone()))
    }

    fn stream(&self, bytes: Bytes) -> PayloadStream {
        let chunk_size = self.chunk_size;
        let chunks: Vec<_> = (0..bytes.len())
            .step_by(chunk_size)
            .map(|start| Ok(bytes.slice(start..(start + chunk_size).min(bytes.len()))))
            .collect();
        futures_util::stream::iter(chunks).boxed()
    }
}

impl Default for InMemory {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl Backend for InMemory {
    fn name(&self) -> &'static str {
        "in-memory"
    }

    async fn object_size(&self, locator: &ObjectLocator) -> BackendResult<u64> {
        Ok(self.get(locator)?.len() as u64)
    }

    async fn read_object(&self, locator: &ObjectLocator) -> BackendResult<PayloadStream> {
        let bytes = self.get(locator)?;
        Ok(self.stream(bytes))
    }

    async fn read_range(
        &self,
        locator: &ObjectLocator,
        range: ReadRange,
    ) -> BackendResult<PayloadStream> {
        let bytes = self.get(locator)?;
        let len = bytes.len() as u64;
        if range.is_empty() || range.offset >= len {
            return Ok(empty_stream());
        }

        let end = range.end().min(len);
        Ok(self.stream(bytes.slice(range.offset as usize..end as usize)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stream::read_to_vec;

    #[tokio::test]
    async fn chunks_and_ranges() {
        let backend = InMemory::new().with_chunk_size(3);
        let locator = ObjectLocator::new("bucket", "key");
        backend.insert(locator.clone(), "0123456789");

        let mut stream = backend.read_object(&locator).await.unwrap();
        let first = stream.next().await.unwrap().unwrap();
        assert_eq!(&first[..], b"012");

        let stream = backend
            .read_range(&locator, ReadRange::new(7, 5))
            .await
            .unwrap();
        assert_eq!(read_to_vec(stream).await.unwrap(), b"789");

        backend.remove(&locator);
        assert!(matches!(
            backend.object_size(&locator).await,
            Err(BackendError::NotFound(_))
        ));
    }
}
