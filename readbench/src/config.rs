//! Configuration for the readbench binary.
//!
//! Configuration can be loaded from multiple sources with the following precedence (highest to
//! lowest):
//!
//! 1. Environment variables (prefixed with `RB__`)
//! 2. YAML configuration file (specified via `-c` or `--config` flag)
//! 3. Defaults
//!
//! Environment variables use double underscores (`__`) to denote nested configuration
//! structures. For example, `RB__LOGGING__LEVEL=debug` sets the log level.
//!
//! A YAML file benchmarking the GCS JSON API against an S3-compatible endpoint would look like
//! this:
//!
//! ```yaml
//! backends:
//!   - type: gcsjson
//!   - type: s3compatible
//!     endpoint: http://localhost:9000
//! chunk_sizes: [1 MiB, 100 KiB]
//! seed: 1234
//! ```

use std::path::{Path, PathBuf};

use anyhow::Result;
use bytesize::ByteSize;
use figment::providers::{Env, Format, Serialized, Yaml};
use readbench_storage::BoxedBackend;
use readbench_storage::backend::{self, GcpCredentials, LocalFs, S3Compatible};
use serde::{Deserialize, Serialize};
use tracing::level_filters::LevelFilter;

use crate::benchmark::{DEFAULT_BUFFER_SIZE, KIB, MIB};

/// Environment variable prefix for all configuration options.
const ENV_PREFIX: &str = "RB__";

/// A storage backend to benchmark.
///
/// The `type` field in YAML determines which variant is used.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Storage {
    /// The [GCS JSON API](https://cloud.google.com/storage/docs/json_api) (type `"gcsjson"`).
    GcsJson {
        /// Custom endpoint, e.g. for an emulator. Defaults to `https://storage.googleapis.com`.
        endpoint: Option<String>,
        /// Send requests without credentials.
        #[serde(default)]
        anonymous: bool,
    },
    /// The [GCS XML API](https://cloud.google.com/storage/docs/xml-api/overview) (type `"gcsxml"`).
    GcsXml {
        /// Custom endpoint, e.g. for an emulator. Defaults to `https://storage.googleapis.com`.
        endpoint: Option<String>,
        /// Send requests without credentials.
        #[serde(default)]
        anonymous: bool,
    },
    /// An S3-compatible endpoint allowing anonymous reads (type `"s3compatible"`).
    S3Compatible {
        /// Endpoint URL, for example `http://localhost:9000` for MinIO.
        endpoint: String,
    },
    /// The local filesystem (type `"filesystem"`).
    ///
    /// Buckets are directories below `path`.
    FileSystem {
        /// Root directory.
        path: PathBuf,
    },
}

impl Storage {
    /// The tag identifying this backend in reports.
    pub fn tag(&self) -> &'static str {
        match self {
            Storage::GcsJson { .. } => "gcs-json",
            Storage::GcsXml { .. } => "gcs-xml",
            Storage::S3Compatible { .. } => "s3-compatible",
            Storage::FileSystem { .. } => "filesystem",
        }
    }

    /// Constructs the backend.
    ///
    /// GCS backends authenticate with the service account key at `credentials` if given, and
    /// with Application Default Credentials otherwise.
    pub async fn backend(&self, credentials: Option<&Path>) -> Result<BoxedBackend> {
        let gcp_credentials = |anonymous: bool| match anonymous {
            true => GcpCredentials::Anonymous,
            false => GcpCredentials::from_path(credentials),
        };

        let backend: BoxedBackend = match self {
            Storage::GcsJson {
                endpoint,
                anonymous,
            } => backend::gcs_json(endpoint.as_deref(), &gcp_credentials(*anonymous)).await?,
            Storage::GcsXml {
                endpoint,
                anonymous,
            } => backend::gcs_xml(endpoint.as_deref(), &gcp_credentials(*anonymous)).await?,
            Storage::S3Compatible { endpoint } => Box::new(S3Compatible::without_token(endpoint)?),
            Storage::FileSystem { path } => Box::new(LocalFs::new(path)),
        };
        Ok(backend)
    }
}

/// Log output format.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Auto detect the best format.
    ///
    /// This chooses [`LogFormat::Pretty`] for TTY, otherwise [`LogFormat::Simplified`].
    Auto,

    /// Pretty printing with colors.
    Pretty,

    /// Simplified plain text output.
    Simplified,

    /// Dump out JSON lines.
    Json,
}

mod display_fromstr {
    pub fn serialize<T, S>(value: &T, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
        T: std::fmt::Display,
    {
        serializer.collect_str(&value)
    }

    pub fn deserialize<'de, T, D>(deserializer: D) -> Result<T, D::Error>
    where
        D: serde::Deserializer<'de>,
        T: std::str::FromStr,
        <T as std::str::FromStr>::Err: std::fmt::Display,
    {
        use serde::Deserialize;
        let s = <std::borrow::Cow<'de, str>>::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Logging configuration.
///
/// Logs are always written to stderr, keeping stdout free for the benchmark results.
#[derive(Debug, Deserialize, Serialize)]
pub struct Logging {
    /// Minimum log level to output.
    ///
    /// The `RUST_LOG` environment variable provides more granular control per module if needed.
    ///
    /// # Default
    ///
    /// `INFO`
    ///
    /// # Environment Variable
    ///
    /// `RB__LOGGING__LEVEL`
    #[serde(with = "display_fromstr")]
    pub level: LevelFilter,

    /// Log output format.
    ///
    /// # Default
    ///
    /// `Auto` (pretty for TTY, simplified otherwise)
    ///
    /// # Environment Variable
    ///
    /// `RB__LOGGING__FORMAT`
    pub format: LogFormat,
}

impl Default for Logging {
    fn default() -> Self {
        Self {
            level: LevelFilter::INFO,
            format: LogFormat::Auto,
        }
    }
}

/// Configuration of the async runtime driving the benchmark.
#[derive(Debug, Deserialize, Serialize)]
pub struct Runtime {
    /// Number of worker threads.
    ///
    /// Runs are strictly sequential, so more threads only serve the transports' background work.
    ///
    /// # Default
    ///
    /// `2`
    ///
    /// # Environment Variable
    ///
    /// `RB__RUNTIME__WORKER_THREADS`
    pub worker_threads: usize,
}

impl Default for Runtime {
    fn default() -> Self {
        Self { worker_threads: 2 }
    }
}

/// Main configuration struct for the readbench binary.
#[derive(Debug, Deserialize, Serialize)]
pub struct Config {
    /// The backends to benchmark, in order.
    ///
    /// # Default
    ///
    /// The GCS JSON API, followed by the GCS XML API.
    pub backends: Vec<Storage>,

    /// Path to a GCP service account key file.
    ///
    /// If unset, Application Default Credentials are used, which honor
    /// `GOOGLE_APPLICATION_CREDENTIALS`. The `--credentials` flag takes precedence.
    ///
    /// # Environment Variable
    ///
    /// `RB__CREDENTIALS`
    pub credentials: Option<PathBuf>,

    /// Buffer size for sequential reads.
    ///
    /// # Default
    ///
    /// `4 MiB`
    pub buffer_size: ByteSize,

    /// Range sizes for random reads. Every size is benchmarked with every backend.
    ///
    /// # Default
    ///
    /// `[4 MiB, 2 MiB, 1 MiB, 100 KiB]`
    pub chunk_sizes: Vec<ByteSize>,

    /// Seed for the order of random reads.
    ///
    /// If unset, a random seed is drawn and logged, so a run can be reproduced.
    ///
    /// # Environment Variable
    ///
    /// `RB__SEED`
    pub seed: Option<u64>,

    /// Skip the sequential read runs.
    pub skip_sequential: bool,

    /// Skip the random read runs.
    pub skip_random: bool,

    /// Configuration of the internal task runtime.
    pub runtime: Runtime,

    /// Logging configuration.
    pub logging: Logging,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            backends: vec![
                Storage::GcsJson {
                    endpoint: None,
                    anonymous: false,
                },
                Storage::GcsXml {
                    endpoint: None,
                    anonymous: false,
                },
            ],
            credentials: None,
            buffer_size: ByteSize::b(DEFAULT_BUFFER_SIZE),
            chunk_sizes: [4 * MIB, 2 * MIB, MIB, 100 * KIB]
                .into_iter()
                .map(ByteSize::b)
                .collect(),
            seed: None,
            skip_sequential: false,
            skip_random: false,
            runtime: Runtime::default(),
            logging: Logging::default(),
        }
    }
}

impl Config {
    /// Loads configuration from the given YAML file, the environment, and defaults.
    ///
    /// Configuration is merged in the following order (later sources override earlier ones):
    /// 1. Default values
    /// 2. YAML configuration file (if provided)
    /// 3. Environment variables (prefixed with `RB__`)
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut figment = figment::Figment::from(Serialized::defaults(Config::default()));
        if let Some(path) = path {
            figment = figment.merge(Yaml::file(path));
        }
        let config = figment
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .extract()?;

        Ok(config)
    }

    /// The buffer size for sequential runs, or `None` if they are skipped.
    pub fn sequential_buffer_size(&self) -> Option<u64> {
        (!self.skip_sequential).then_some(self.buffer_size.as_u64())
    }

    /// The chunk sizes for random runs, empty if they are skipped.
    pub fn random_chunk_sizes(&self) -> Vec<u64> {
        match self.skip_random {
            true => Vec::new(),
            false => self.chunk_sizes.iter().map(ByteSize::as_u64).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn defaults() {
        figment::Jail::expect_with(|_jail| {
            let config = Config::load(None).unwrap();

            assert_eq!(config.backends.len(), 2);
            assert_eq!(config.sequential_buffer_size(), Some(4 * MIB));
            assert_eq!(
                config.random_chunk_sizes(),
                [4 * MIB, 2 * MIB, MIB, 100 * KIB]
            );
            assert_eq!(config.seed, None);
            assert_eq!(config.logging.level, LevelFilter::INFO);

            Ok(())
        });
    }

    #[test]
    fn configurable_via_env() {
        figment::Jail::expect_with(|jail| {
            jail.set_env("RB__SEED", "1234");
            jail.set_env("RB__BUFFER_SIZE", "1 MiB");
            jail.set_env("RB__SKIP_RANDOM", "true");
            jail.set_env("RB__LOGGING__LEVEL", "debug");
            jail.set_env("RB__LOGGING__FORMAT", "json");

            let config = Config::load(None).unwrap();

            assert_eq!(config.seed, Some(1234));
            assert_eq!(config.sequential_buffer_size(), Some(MIB));
            assert!(config.random_chunk_sizes().is_empty());
            assert_eq!(config.logging.level, LevelFilter::DEBUG);
            assert_eq!(config.logging.format, LogFormat::Json);

            Ok(())
        });
    }

    #[test]
    fn configured_with_env_and_yaml() {
        let mut tempfile = tempfile::NamedTempFile::new().unwrap();
        tempfile
            .write_all(
                br#"
            backends:
              - type: s3compatible
                endpoint: http://localhost:9000
              - type: filesystem
                path: /data
              - type: gcsjson
                anonymous: true
            chunk_sizes: [1 MiB, 100 KiB]
            seed: 1
            "#,
            )
            .unwrap();

        figment::Jail::expect_with(|jail| {
            jail.set_env("RB__SEED", "2");

            let config = Config::load(Some(tempfile.path())).unwrap();

            assert_eq!(
                config.backends,
                [
                    Storage::S3Compatible {
                        endpoint: "http://localhost:9000".into()
                    },
                    Storage::FileSystem {
                        path: "/data".into()
                    },
                    Storage::GcsJson {
                        endpoint: None,
                        anonymous: true
                    },
                ]
            );
            assert_eq!(config.random_chunk_sizes(), [MIB, 100 * KIB]);
            // Env should overwrite the yaml config
            assert_eq!(config.seed, Some(2));

            Ok(())
        });
    }

    #[test]
    fn rejects_unknown_backend() {
        figment::Jail::expect_with(|jail| {
            jail.create_file("config.yml", "backends: [{type: ftp}]")?;
            assert!(Config::load(Some(Path::new("config.yml"))).is_err());
            Ok(())
        });
    }
}
