use std::fmt::Debug;
use std::sync::Arc;

use thiserror::Error;

use crate::id::{ObjectLocator, ReadRange};
use crate::stream::PayloadStream;

/// User agent string used for outgoing requests.
pub const USER_AGENT: &str = concat!("readbench/", env!("CARGO_PKG_VERSION"));

/// A type-erased [`Backend`] instance.
pub type BoxedBackend = Box<dyn Backend>;

/// The read capability the benchmark engine depends on.
///
/// Implementations perform real I/O on every call. They must not cache, retry, or otherwise
/// hide the latency of the underlying transport. Streams returned from the read methods are
/// released when dropped.
#[async_trait::async_trait]
pub trait Backend: Debug + Send + Sync + 'static {
    /// The backend name, used for diagnostics.
    fn name(&self) -> &'static str;

    /// Fetches the size of the object in bytes.
    async fn object_size(&self, locator: &ObjectLocator) -> BackendResult<u64>;

    /// Opens a stream over the full contents of the object.
    async fn read_object(&self, locator: &ObjectLocator) -> BackendResult<PayloadStream>;

    /// Opens a stream over the given byte range of the object.
    ///
    /// The stream may yield fewer than `range.length` bytes only if the object ends before the
    /// range does.
    async fn read_range(
        &self,
        locator: &ObjectLocator,
        range: ReadRange,
    ) -> BackendResult<PayloadStream>;
}

#[async_trait::async_trait]
impl<T: Backend + ?Sized> Backend for Box<T> {
    fn name(&self) -> &'static str {
        (**self).name()
    }

    async fn object_size(&self, locator: &ObjectLocator) -> BackendResult<u64> {
        (**self).object_size(locator).await
    }

    async fn read_object(&self, locator: &ObjectLocator) -> BackendResult<PayloadStream> {
        (**self).read_object(locator).await
    }

    async fn read_range(
        &self,
        locator: &ObjectLocator,
        range: ReadRange,
    ) -> BackendResult<PayloadStream> {
        (**self).read_range(locator, range).await
    }
}

#[async_trait::async_trait]
impl<T: Backend + ?Sized> Backend for Arc<T> {
    fn name(&self) -> &'static str {
        (**self).name()
    }

    async fn object_size(&self, locator: &ObjectLocator) -> BackendResult<u64> {
        (**self).object_size(locator).await
    }

    async fn read_object(&self, locator: &ObjectLocator) -> BackendResult<PayloadStream> {
        (**self).read_object(locator).await
    }

    async fn read_range(
        &self,
        locator: &ObjectLocator,
        range: ReadRange,
    ) -> BackendResult<PayloadStream> {
        (**self).read_range(locator, range).await
    }
}

/// Errors returned by [`Backend`] operations.
#[derive(Debug, Error)]
pub enum BackendError {
    /// The object does not exist in the storage service.
    #[error("object not found: {0}")]
    NotFound(ObjectLocator),

    /// IO errors related to payload streaming or file operations.
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    /// Errors related to deserialization of service responses.
    #[error("serde error: {context}")]
    Serde {
        /// The operation that failed.
        context: String,
        /// The underlying error.
        #[source]
        cause: serde_json::Error,
    },

    /// All errors stemming from the reqwest client, used in multiple backends to send requests.
    ///
    /// These can be network errors encountered when sending the requests, but can also indicate
    /// error statuses returned by the API itself.
    #[error("reqwest error: {context}")]
    Reqwest {
        /// The operation that failed.
        context: String,
        /// The underlying error.
        #[source]
        cause: reqwest::Error,
    },

    /// Errors encountered when attempting to authenticate with GCP.
    #[error("GCP authentication error: {0}")]
    GcpAuth(#[from] gcp_auth::Error),

    /// Any other error stemming from one of the storage backends, which might be specific to that
    /// backend or to a certain operation.
    #[error("storage backend error: {context}")]
    Generic {
        /// The operation that failed.
        context: String,
        /// The underlying error.
        #[source]
        cause: Box<dyn std::error::Error + Send + Sync>,
    },
}

impl BackendError {
    pub(crate) fn reqwest(context: impl Into<String>, cause: reqwest::Error) -> Self {
        Self::Reqwest {
            context: context.into(),
            cause,
        }
    }

    pub(crate) fn generic(
        context: impl Into<String>,
        cause: impl Into<Box<dyn std::error::Error + Send + Sync>>,
    ) -> Self {
        Self::Generic {
            context: context.into(),
            cause: cause.into(),
        }
    }
}

/// Result type for backend operations.
pub type BackendResult<T> = Result<T, BackendError>;

/// Creates a reqwest client with required defaults.
pub(crate) fn reqwest_client() -> BackendResult<reqwest::Client> {
    reqwest::Client::builder()
        .user_agent(USER_AGENT)
        .build()
        .map_err(|cause| BackendError::reqwest("failed to build HTTP client", cause))
}

/// Sends a request and maps its status into a [`BackendResult`].
///
/// `404` becomes [`BackendError::NotFound`], all other non-success statuses are returned as
/// [`BackendError::Reqwest`].
pub(crate) async fn send_request(
    builder: reqwest::RequestBuilder,
    locator: &ObjectLocator,
    context: &str,
) -> BackendResult<reqwest::Response> {
    let response = builder
        .send()
        .await
        .map_err(|cause| BackendError::reqwest(context, cause))?;

    if response.status() == reqwest::StatusCode::NOT_FOUND {
        tracing::debug!(%locator, "Object not found");
        return Err(BackendError::NotFound(locator.clone()));
    }

    response
        .error_for_status()
        .map_err(|cause| BackendError::reqwest(context, cause))
}

/// Checks that the server honored a `Range` request.
///
/// A server answering `200` instead of `206` sends the full object, which would silently turn a
/// range read into a full read.
pub(crate) fn ensure_partial(response: &reqwest::Response, range: ReadRange) -> BackendResult<()> {
    if response.status() == reqwest::StatusCode::PARTIAL_CONTENT {
        return Ok(());
    }

    Err(BackendError::generic(
        format!("range {range} not honored"),
        format!("expected 206 Partial Content, got {}", response.status()),
    ))
}

/// Turns the body of a response into a [`PayloadStream`].
pub(crate) fn response_stream(response: reqwest::Response) -> PayloadStream {
    use futures_util::{StreamExt, TryStreamExt};

    response
        .bytes_stream()
        .map_err(std::io::Error::other)
        .boxed()
}

/// Returns an empty [`PayloadStream`], used for zero-length ranges.
pub(crate) fn empty_stream() -> PayloadStream {
    use futures_util::StreamExt;

    futures_util::stream::empty().boxed()
}
