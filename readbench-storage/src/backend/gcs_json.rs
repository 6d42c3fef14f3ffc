use std::fmt;
use std::sync::Arc;

use reqwest::header::RANGE;
use reqwest::{RequestBuilder, Url};
use serde::Deserialize;

use super::common::{
    Backend, BackendError, BackendResult, empty_stream, ensure_partial, reqwest_client,
    response_stream, send_request,
};
use super::s3_compatible::parse_endpoint;
use crate::id::{ObjectLocator, ReadRange};
use crate::stream::PayloadStream;

/// The subset of the GCS object resource needed to benchmark reads.
#[derive(Debug, Deserialize)]
struct ObjectResource {
    /// Object size in bytes, encoded as a decimal string.
    size: String,
}

/// A backend speaking the [GCS JSON API].
///
/// Object metadata is fetched from `{endpoint}/storage/v1/b/{bucket}/o/{key}`, while contents are
/// downloaded from the same resource with `alt=media`.
///
/// [GCS JSON API]: https://cloud.google.com/storage/docs/json_api
pub struct GcsJson {
    client: reqwest::Client,
    endpoint: Url,
    token_provider: Option<Arc<dyn gcp_auth::TokenProvider>>,
}

impl GcsJson {
    /// Creates a backend that authenticates requests with the given GCP token provider.
    pub fn new(
        endpoint: &str,
        token_provider: Option<Arc<dyn gcp_auth::TokenProvider>>,
    ) -> BackendResult<Self> {
        Ok(Self {
            client: reqwest_client()?,
            endpoint: parse_endpoint(endpoint)?,
            token_provider,
        })
    }

    fn object_url(&self, locator: &ObjectLocator) -> BackendResult<Url> {
        let mut url = self.endpoint.clone();
        // The key is pushed as a single segment, so slashes within it are percent-encoded.
        url.path_segments_mut()
            .map_err(|()| BackendError::generic("invalid endpoint", "URL cannot be a base"))?
            .pop_if_empty()
            .extend(["storage", "v1", "b", &locator.bucket, "o", &locator.key]);
        Ok(url)
    }

    async fn get(&self, locator: &ObjectLocator, media: bool) -> BackendResult<RequestBuilder> {
        let mut builder = self.client.get(self.object_url(locator)?);
        if media {
            builder = builder.query(&[("alt", "media")]);
        }
        if let Some(provider) = &self.token_provider {
            let token = provider.token(&[super::gcs::READ_ONLY_SCOPE]).await?;
            builder = builder.bearer_auth(token.as_str());
        }
        Ok(builder)
    }
}

impl fmt::Debug for GcsJson {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GcsJson")
            .field("endpoint", &self.endpoint.as_str())
            .field("authenticated", &self.token_provider.is_some())
            .finish_non_exhaustive()
    }
}

#[async_trait::async_trait]
impl Backend for GcsJson {
    fn name(&self) -> &'static str {
        "gcs-json"
    }

    #[tracing::instrument(level = "trace", fields(%locator), skip_all)]
    async fn object_size(&self, locator: &ObjectLocator) -> BackendResult<u64> {
        tracing::debug!("Fetching object metadata");
        let builder = self.get(locator, false).await?;
        let response = send_request(builder, locator, "failed to fetch object metadata").await?;

        let body = response
            .bytes()
            .await
            .map_err(|cause| BackendError::reqwest("failed to read object metadata", cause))?;
        let resource: ObjectResource =
            serde_json::from_slice(&body).map_err(|cause| BackendError::Serde {
                context: "failed to parse object metadata".into(),
                cause,
            })?;

        resource
            .size
            .parse()
            .map_err(|cause| BackendError::generic("invalid object size", cause))
    }

    #[tracing::instrument(level = "trace", fields(%locator), skip_all)]
    async fn read_object(&self, locator: &ObjectLocator) -> BackendResult<PayloadStream> {
        tracing::debug!("Reading object");
        let builder = self.get(locator, true).await?;
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
        let builder = self.get(locator, true).await?.header(RANGE, header);
        let response = send_request(builder, locator, "failed to read object range").await?;
        ensure_partial(&response, range)?;
        Ok(response_stream(response))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::test_server;
    use crate::stream::read_to_vec;

    #[tokio::test]
    async fn reads_through_json_api() {
        let endpoint = test_server::serve(&[("bucket", "nested/object", b"0123456789")]).await;
        let backend = GcsJson::new(&endpoint, None).unwrap();
        let locator = ObjectLocator::new("bucket", "nested/object");

        assert_eq!(backend.object_size(&locator).await.unwrap(), 10);

        let stream = backend.read_object(&locator).await.unwrap();
        assert_eq!(read_to_vec(stream).await.unwrap(), b"0123456789");

        let stream = backend
            .read_range(&locator, ReadRange::new(7, 3))
            .await
            .unwrap();
        assert_eq!(read_to_vec(stream).await.unwrap(), b"789");
    }

    #[test]
    fn encodes_key_as_single_segment() {
        let backend = GcsJson::new("https://storage.googleapis.com", None).unwrap();
        let url = backend
            .object_url(&ObjectLocator::new("bucket", "a/b c"))
            .unwrap();
        assert_eq!(
            url.as_str(),
            "https://storage.googleapis.com/storage/v1/b/bucket/o/a%2Fb%20c"
        );
    }

    #[tokio::test]
    async fn missing_object() {
        let endpoint = test_server::serve(&[]).await;
        let backend = GcsJson::new(&endpoint, None).unwrap();
        let locator = ObjectLocator::new("bucket", "missing");

        let err = backend.object_size(&locator).await.unwrap_err();
        assert!(matches!(err, BackendError::NotFound(_)));
    }
}
