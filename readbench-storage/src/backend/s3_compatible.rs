use std::fmt;

use reqwest::header::{CONTENT_LENGTH, RANGE};
use reqwest::{Method, RequestBuilder, Url};

use super::common::{
    Backend, BackendError, BackendResult, empty_stream, ensure_partial, reqwest_client,
    response_stream, send_request,
};
use crate::id::{ObjectLocator, ReadRange};
use crate::stream::PayloadStream;

/// An access token attached to outgoing requests as a bearer token.
pub trait Token: Send + Sync {
    /// The raw token value.
    fn as_str(&self) -> &str;
}

/// A source of fresh [`Token`]s.
pub trait TokenProvider: Send + Sync + 'static {
    /// Returns a token valid for reading objects.
    fn get_token(&self) -> impl Future<Output = BackendResult<impl Token>> + Send;
}

/// A [`TokenProvider`] for endpoints that do not require authentication.
///
/// This type is uninhabited. It only exists so that [`S3Compatible::without_token`] can name a
/// provider type.
#[derive(Debug)]
pub enum NoToken {}

impl TokenProvider for NoToken {
    #[allow(refining_impl_trait)]
    async fn get_token(&self) -> BackendResult<NoToken> {
        match *self {}
    }
}

impl Token for NoToken {
    fn as_str(&self) -> &str {
        match *self {}
    }
}

/// A backend speaking the S3 XML API, which also covers the GCS XML API.
///
/// Objects are addressed as `{endpoint}/{bucket}/{key}`. The object size is taken from the
/// `Content-Length` of a `HEAD` request, and range reads use the HTTP `Range` header.
pub struct S3Compatible<T> {
    name: &'static str,
    client: reqwest::Client,
    endpoint: Url,
    token_provider: Option<T>,
}

impl<T> S3Compatible<T> {
    /// Creates a backend that authenticates every request with a token from `token_provider`.
    pub fn new(endpoint: &str, token_provider: T) -> BackendResult<Self> {
        Ok(Self {
            name: "s3-compatible",
            client: reqwest_client()?,
            endpoint: parse_endpoint(endpoint)?,
            token_provider: Some(token_provider),
        })
    }

    pub(super) fn with_name(mut self, name: &'static str) -> Self {
        self.name = name;
        self
    }

    fn object_url(&self, locator: &ObjectLocator) -> BackendResult<Url> {
        let mut url = self.endpoint.clone();
        url.path_segments_mut()
            .map_err(|()| BackendError::generic("invalid endpoint", "URL cannot be a base"))?
            .pop_if_empty()
            .push(&locator.bucket)
            .extend(locator.key.split('/'));
        Ok(url)
    }
}

impl S3Compatible<NoToken> {
    /// Creates a backend that sends unauthenticated requests.
    pub fn without_token(endpoint: &str) -> BackendResult<Self> {
        Ok(Self {
            name: "s3-compatible",
            client: reqwest_client()?,
            endpoint: parse_endpoint(endpoint)?,
            token_provider: None,
        })
    }
}

impl<T: TokenProvider> S3Compatible<T> {
    async fn request(
        &self,
        method: Method,
        locator: &ObjectLocator,
    ) -> BackendResult<RequestBuilder> {
        let mut builder = self.client.request(method, self.object_url(locator)?);
        if let Some(provider) = &self.token_provider {
            builder = builder.bearer_auth(provider.get_token().await?.as_str());
        }
        Ok(builder)
    }
}

impl<T> fmt::Debug for S3Compatible<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("S3Compatible")
            .field("name", &self.name)
            .field("endpoint", &self.endpoint.as_str())
            .field("authenticated", &self.token_provider.is_some())
            .finish_non_exhaustive()
    }
}

#[async_trait::async_trait]
impl<T: TokenProvider> Backend for S3Compatible<T> {
    fn name(&self) -> &'static str {
        self.name
    }

    #[tracing::instrument(level = "trace", fields(%locator), skip_all)]
    async fn object_size(&self, locator: &ObjectLocator) -> BackendResult<u64> {
        tracing::debug!("Fetching object size");
        let builder = self.request(Method::HEAD, locator).await?;
        let response = send_request(builder, locator, "failed to fetch object size").await?;

        // `Response::content_length` reports the (empty) body of a HEAD response, so the header
        // has to be read directly.
        let header = response
            .headers()
            .get(CONTENT_LENGTH)
            .ok_or_else(|| BackendError::generic("missing object size", "no Content-Length"))?;
        let size = header
            .to_str()
            .map_err(|cause| BackendError::generic("invalid Content-Length", cause))?
            .parse()
            .map_err(|cause| BackendError::generic("invalid Content-Length", cause))?;

        Ok(size)
    }

    #[tracing::instrument(level = "trace", fields(%locator), skip_all)]
    async fn read_object(&self, locator: &ObjectLocator) -> BackendResult<PayloadStream> {
        tracing::debug!("Reading object");
        let builder = self.request(Method::GET, locator).await?;
        let response = send_request(builder, locator, "failed to read object").await?;
        Ok(response_stream(response))
    }

    #[tracing::instrument(level = "trace", fields(%locator, %range), skip_all)]
    async fn read_range(
        &self,
        locator: &ObjectLocator,
        range: ReadRange,
    ) -> BackendResult<PayloadStream> {
        let Some(header) = range.http_header() else {
            return Ok(empty_stream());
        };

        tracing::debug!("Reading object range");
        let builder = self.request(Method::GET, locator).await?.header(RANGE, header);
        let response = send_request(builder, locator, "failed to read object range").await?;
        ensure_partial(&response, range)?;
        Ok(response_stream(response))
    }
}

pub(super) fn parse_endpoint(endpoint: &str) -> BackendResult<Url> {
    Url::parse(endpoint).map_err(|cause| BackendError::generic("invalid endpoint", cause))
}
