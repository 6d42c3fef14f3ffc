use std::io::{ErrorKind, SeekFrom};
use std::path::{Path, PathBuf};

use futures_util::StreamExt;
use tokio::fs::{File, OpenOptions};
use tokio::io::{AsyncReadExt, AsyncSeekExt};
use tokio_util::io::ReaderStream;

use super::common::{Backend, BackendError, BackendResult, empty_stream};
use crate::id::{ObjectLocator, ReadRange};
use crate::stream::PayloadStream;

/// A backend reading objects from a directory on the local filesystem.
///
/// Objects are stored at `{root}/{bucket}/{key}`. This serves as a baseline for the network
/// transports.
#[derive(Debug)]
pub struct LocalFs {
    root: PathBuf,
}

impl LocalFs {
    /// Creates a backend rooted at `root`.
    pub fn new(root: &Path) -> Self {
        Self { root: root.into() }
    }

    async fn open(&self, locator: &ObjectLocator) -> BackendResult<File> {
        let path = self.root.join(&locator.bucket).join(&locator.key);
        match OpenOptions::new().read(true).open(path).await {
            Ok(file) => Ok(file),
            Err(err) if err.kind() == ErrorKind::NotFound => {
                Err(BackendError::NotFound(locator.clone()))
            }
            Err(err) => Err(err.into()),
        }
    }
}

#[async_trait::async_trait]
impl Backend for LocalFs {
    fn name(&self) -> &'static str {
        "filesystem"
    }

    #[tracing::instrument(level = "trace", fields(%locator), skip_all)]
    async fn object_size(&self, locator: &ObjectLocator) -> BackendResult<u64> {
        let file = self.open(locator).await?;
        Ok(file.metadata().await?.len())
    }

    #[tracing::instrument(level = "trace", fields(%locator), skip_all)]
    async fn read_object(&self, locator: &ObjectLocator) -> BackendResult<PayloadStream> {
        let file = self.open(locator).await?;
        Ok(ReaderStream::new(file).boxed())
    }

    #[tracing::instrument(level = "trace", fields(%locator, %range), skip_all)]
    async fn read_range(
        &self,
        locator: &ObjectLocator,
        range: ReadRange,
    ) -> BackendResult<PayloadStream> {
        if range.is_empty() {
            return Ok(empty_stream());
        }

        let mut file = self.open(locator).await?;
        file.seek(SeekFrom::Start(range.offset)).await?;
        Ok(ReaderStream::new(file.take(range.length)).boxed())
    }
}
