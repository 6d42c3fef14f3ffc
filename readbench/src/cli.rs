//! The command-line interface of the `readbench` binary.

use std::collections::HashSet;
use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use argh::FromArgs;
use rand::SeedableRng;
use rand::rngs::SmallRng;
use readbench_storage::{BoxedBackend, ObjectLocator};

use crate::config::Config;
use crate::observability;
use crate::run::{BenchmarkConfig, run};

/// Measure sequential and random read performance of an object in remote storage.
///
/// Every configured backend reads the object sequentially, then in shuffled ranges of every
/// configured chunk size. Each combination is repeated `iterations` times.
#[derive(Debug, FromArgs)]
struct Args {
    /// path to the YAML configuration file
    #[argh(option, short = 'c')]
    config: Option<PathBuf>,

    /// path to a GCP service account key file, overriding Application Default Credentials
    #[argh(option)]
    credentials: Option<PathBuf>,

    /// the bucket containing the object
    #[argh(positional)]
    bucket: String,

    /// the key of the object
    #[argh(positional)]
    object: String,

    /// how often every benchmark is repeated
    #[argh(positional)]
    iterations: String,
}

/// Bootstrap the runtime and run all benchmarks.
pub fn execute() -> Result<()> {
    let args: Args = argh::from_env();

    // Validate all inputs before any I/O is attempted.
    let iterations = parse_iterations(&args.iterations)?;
    let config = Config::load(args.config.as_deref())?;

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .thread_name("main-rt")
        .enable_all()
        .worker_threads(config.runtime.worker_threads.max(1))
        .build()?;
    let _runtime_guard = runtime.enter();

    observability::initialize_tracing(&config.logging);
    tracing::debug!(?config);

    runtime.block_on(benchmark(args, config, iterations))
}

fn parse_iterations(value: &str) -> Result<usize> {
    let iterations: i64 = value
        .trim()
        .parse()
        .with_context(|| format!("invalid number for iterations: {value}"))?;
    if iterations <= 0 {
        bail!("number of iterations must be positive, got {iterations}");
    }
    usize::try_from(iterations).context("number of iterations out of range")
}

async fn benchmark(args: Args, config: Config, iterations: usize) -> Result<()> {
    let locator = ObjectLocator::new(args.bucket, args.object);
    let credentials = args.credentials.or(config.credentials.clone());

    let seed = config.seed.unwrap_or_else(rand::random);
    tracing::info!(seed, "Shuffling random reads");
    let mut rng = SmallRng::seed_from_u64(seed);

    let backends = build_backends(&config, credentials).await?;
    if backends.is_empty() {
        tracing::warn!("No backends configured, nothing to do");
    }

    let tags: Vec<_> = backends.iter().map(|(tag, _)| tag.as_str()).collect();
    let runs = BenchmarkConfig::matrix(
        &tags,
        &locator,
        iterations,
        config.sequential_buffer_size(),
        &config.random_chunk_sizes(),
    );

    for run_config in &runs {
        let Some((_, backend)) = backends
            .iter()
            .find(|(tag, _)| *tag == run_config.backend_tag)
        else {
            continue;
        };

        run(backend, run_config, &mut rng).await.with_context(|| {
            format!(
                "{} read benchmark on {} aborted",
                run_config.pattern.name(),
                run_config.backend_tag
            )
        })?;
    }

    Ok(())
}

/// Constructs every configured backend, tagging each one uniquely.
async fn build_backends(
    config: &Config,
    credentials: Option<PathBuf>,
) -> Result<Vec<(String, BoxedBackend)>> {
    let mut backends = Vec::with_capacity(config.backends.len());
    let mut seen = HashSet::new();

    for storage in &config.backends {
        let backend = storage
            .backend(credentials.as_deref())
            .await
            .with_context(|| format!("failed to initialize {} backend", storage.tag()))?;

        let mut tag = storage.tag().to_owned();
        let mut n = 1;
        while !seen.insert(tag.clone()) {
            n += 1;
            tag = format!("{}-{n}", storage.tag());
        }

        tracing::debug!(%tag, ?backend, "Initialized backend");
        backends.push((tag, backend));
    }

    Ok(backends)
}
