//! llms-gen main entry point
//!
//! Command-line interface for the llms-gen artifact generator.

use clap::Parser;
use llms_gen::config::{load_config_with_hash, RunOptions};
use llms_gen::{output, pipeline};
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

/// llms-gen: generates structured text artifacts from website sources
///
/// Reads a TOML sources file, resolves each source into an ordered set of
/// pages via its chunking strategy, runs page content through an
/// extraction service, and writes per-source markdown plus an llms.txt
/// index.
#[derive(Parser, Debug)]
#[command(name = "llms-gen")]
#[command(version)]
#[command(about = "Generates llms.txt artifacts from website sources", long_about = None)]
struct Cli {
    /// Path to the TOML sources file
    #[arg(short, long, value_name = "FILE", default_value = "sources.toml")]
    sources: PathBuf,

    /// Output directory for generated artifacts
    #[arg(short, long, value_name = "DIR", default_value = "out")]
    output: PathBuf,

    /// Directory holding prompt template files
    #[arg(long, value_name = "DIR", default_value = "prompts")]
    prompts: PathBuf,

    /// Process only these source ids (comma-separated)
    #[arg(long, value_name = "IDS", value_delimiter = ',')]
    only: Vec<String>,

    /// Bypass cache reads and refetch every page
    #[arg(short, long)]
    force: bool,

    /// Resolve and fetch but skip extraction calls
    #[arg(long)]
    dry_run: bool,

    /// Process units sequentially on a single worker
    #[arg(long)]
    no_parallel: bool,

    /// Number of parallel workers (overrides the sources file)
    #[arg(short, long, value_name = "N")]
    workers: Option<usize>,

    /// Seconds between network fetches (overrides the sources file)
    #[arg(long, value_name = "SECONDS")]
    rate_limit: Option<f64>,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    setup_logging(cli.verbose, cli.quiet);

    tracing::info!("Loading sources from: {}", cli.sources.display());
    let (config, config_hash) = match load_config_with_hash(&cli.sources) {
        Ok((config, hash)) => (config, hash),
        Err(e) => {
            tracing::error!("Failed to load sources file: {}", e);
            return ExitCode::FAILURE;
        }
    };
    tracing::info!(
        "Loaded {} sources (config hash: {})",
        config.sources.len(),
        &config_hash[..12]
    );

    let options = build_options(&cli, &config);
    if options.dry_run {
        tracing::info!("Dry run: extraction calls will be skipped");
    }

    let cancel = CancellationToken::new();
    let interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupted, finishing in-flight units");
            interrupt.cancel();
        }
    });

    let cache_path = cli.output.join("cache.db");
    let report = match pipeline::run(&config, &options, &cli.prompts, &cache_path, cancel).await {
        Ok(report) => report,
        Err(e) => {
            tracing::error!("Run failed: {}", e);
            return ExitCode::FAILURE;
        }
    };

    if let Err(e) = output::write_outputs(&report, &cli.output) {
        tracing::error!("Failed to write outputs: {}", e);
        return ExitCode::FAILURE;
    }

    if !cli.quiet {
        output::print_summary(&report);
    }

    if report.is_success() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}

/// Resolves run options from the sources file defaults plus CLI overrides
fn build_options(cli: &Cli, config: &llms_gen::Config) -> RunOptions {
    let mut options = RunOptions::from_defaults(&config.run);

    if let Some(workers) = cli.workers {
        options.workers = workers.max(1);
    }
    if let Some(rate_limit) = cli.rate_limit {
        options.rate_limit = Duration::from_secs_f64(rate_limit.max(0.0));
    }
    options.parallel = !cli.no_parallel;
    options.force = cli.force;
    options.dry_run = cli.dry_run;
    if !cli.only.is_empty() {
        options.only = Some(cli.only.clone());
    }

    options
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("llms_gen=info,warn"),
            1 => EnvFilter::new("llms_gen=debug,info"),
            2 => EnvFilter::new("llms_gen=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}
