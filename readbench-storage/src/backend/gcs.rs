use std::path::{Path, PathBuf};
use std::sync::Arc;

use super::common::BackendResult;
use super::gcs_json::GcsJson;
use super::s3_compatible::{S3Compatible, Token, TokenProvider};
use super::BoxedBackend;

/// The default endpoint for both GCS APIs.
pub const DEFAULT_ENDPOINT: &str = "https://storage.googleapis.com";

/// OAuth scope requested for all GCS reads.
pub(super) const READ_ONLY_SCOPE: &str = "https://www.googleapis.com/auth/devstorage.read_only";

impl TokenProvider for Arc<dyn gcp_auth::TokenProvider> {
    async fn get_token(&self) -> BackendResult<impl Token> {
        let token = self.token(&[READ_ONLY_SCOPE]).await?;
        Ok(token)
    }
}

impl Token for Arc<gcp_auth::Token> {
    fn as_str(&self) -> &str {
        gcp_auth::Token::as_str(self)
    }
}

/// Where to obtain GCP credentials from.
#[derive(Clone, Debug, Default)]
pub enum GcpCredentials {
    /// Application Default Credentials.
    ///
    /// This honors `GOOGLE_APPLICATION_CREDENTIALS`, the gcloud CLI configuration, and the GCE
    /// metadata server, in that order.
    #[default]
    Default,
    /// A service account key file.
    ServiceAccountFile(PathBuf),
    /// Send unauthenticated requests, e.g. to an emulator or a public bucket.
    Anonymous,
}

impl GcpCredentials {
    /// Uses the service account key at `path` if given, otherwise default credentials.
    pub fn from_path(path: Option<&Path>) -> Self {
        match path {
            Some(path) => Self::ServiceAccountFile(path.to_owned()),
            None => Self::Default,
        }
    }

    async fn provider(&self) -> BackendResult<Option<Arc<dyn gcp_auth::TokenProvider>>> {
        Ok(match self {
            Self::Default => Some(gcp_auth::provider().await?),
            Self::ServiceAccountFile(path) => {
                tracing::debug!(path = %path.display(), "Loading service account credentials");
                let account = gcp_auth::CustomServiceAccount::from_file(path)?;
                Some(Arc::new(account))
            }
            Self::Anonymous => None,
        })
    }
}

/// Creates a backend for the GCS JSON API.
pub async fn gcs_json(
    endpoint: Option<&str>,
    credentials: &GcpCredentials,
) -> BackendResult<BoxedBackend> {
    let endpoint = endpoint.unwrap_or(DEFAULT_ENDPOINT);
    let token_provider = credentials.provider().await?;
    Ok(Box::new(GcsJson::new(endpoint, token_provider)?))
}

/// Creates a backend for the GCS XML API.
pub async fn gcs_xml(
    endpoint: Option<&str>,
    credentials: &GcpCredentials,
) -> BackendResult<BoxedBackend> {
    let endpoint = endpoint.unwrap_or(DEFAULT_ENDPOINT);
    let backend: BoxedBackend = match credentials.provider().await? {
        Some(provider) => Box::new(S3Compatible::new(endpoint, provider)?.with_name("gcs-xml")),
        None => Box::new(S3Compatible::without_token(endpoint)?.with_name("gcs-xml")),
    };
    Ok(backend)
}
