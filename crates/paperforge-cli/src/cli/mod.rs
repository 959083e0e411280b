//! Command-line arguments for the `paperforge` binary.

pub mod report;
pub mod run;

use std::path::PathBuf;

use clap::Parser;

/// Generate a research paper on a topic with an LLM-driven pipeline.
#[derive(Parser, Debug)]
#[command(name = "paperforge", version, about, long_about = None)]
pub struct Cli {
    /// Research topic; also used as the paper title.
    pub topic: String,

    /// Path to the config file (defaults to ~/.paperforge/config.toml).
    #[arg(long, env = "PAPERFORGE_CONFIG")]
    pub config: Option<PathBuf>,

    /// Override the output directory from the config file.
    #[arg(long)]
    pub workspace: Option<String>,

    /// Print the run report as JSON instead of styled text.
    #[arg(long)]
    pub json: bool,

    /// Suppress all log output except errors.
    #[arg(long)]
    pub quiet: bool,

    /// Detailed output (-v for step progress, -vv for debug, -vvv for trace).
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Emit logs as JSON lines.
    #[arg(long)]
    pub log_json: bool,

    /// Export tracing spans through OpenTelemetry (stdout exporter).
    #[arg(long)]
    pub otel: bool,
}
