//! Benchmarks reads of a single object through interchangeable storage transports.
//!
//! See [`readbench::cli`] for the command-line interface and [`readbench::config`] for all
//! configuration options.

fn main() -> anyhow::Result<()> {
    readbench::cli::execute()
}
