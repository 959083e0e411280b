//! Paperforge CLI entry point.
//!
//! Binary name: `paperforge`
//!
//! Parses arguments, sets up tracing, then runs the paper pipeline for the
//! given topic.

mod cli;

use anyhow::anyhow;
use clap::Parser;
use paperforge_observe::{TracingOptions, init_tracing, shutdown_tracing};

use cli::Cli;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    init_tracing(&TracingOptions {
        verbosity: cli.verbose,
        quiet: cli.quiet,
        json: cli.log_json,
        otel: cli.otel,
    })
    .map_err(|e| anyhow!("failed to initialize tracing: {e}"))?;

    let result = cli::run::generate_paper(&cli).await;

    shutdown_tracing();
    result
}
