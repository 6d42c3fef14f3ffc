//! Interchangeable transports implementing the [`Backend`] read capability.

mod common;
mod gcs;
mod gcs_json;
mod in_memory;
mod local_fs;
mod s3_compatible;
#[cfg(test)]
mod test_server;

pub use common::{Backend, BackendError, BackendResult, BoxedBackend, USER_AGENT};
pub use gcs::{DEFAULT_ENDPOINT, GcpCredentials, gcs_json, gcs_xml};
pub use gcs_json::GcsJson;
pub use in_memory::InMemory;
pub use local_fs::LocalFs;
pub use s3_compatible::{NoToken, S3Compatible, Token, TokenProvider};
