//! noticefeed entry point.
//!
//! Scrapes the configured notice boards once and republishes them as RSS
//! feeds. Meant to be invoked by a scheduler; each invocation is one run.
//! Logging goes to stderr so the summary table on stdout stays clean.

use std::path::PathBuf;
use std::process::ExitCode;
use std::time::SystemTime;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use noticefeed_client::{FetchConfig, HttpFetcher, TokioSleeper};
use noticefeed_core::config::LogFormat;
use noticefeed_core::{AppConfig, SystemClock};
use tracing_subscriber::EnvFilter;

mod check;
mod cycle;
mod lock;
mod run;

use lock::RunLock;
use run::Runner;

/// Republish notice boards as RSS feeds.
#[derive(Parser, Debug)]
#[command(name = "noticefeed", version, about)]
struct Cli {
    /// TOML configuration file
    #[arg(long, global = true, env = "NOTICEFEED_CONFIG_FILE")]
    config: Option<PathBuf>,

    /// Restrict to one source id (repeatable)
    #[arg(long = "source", global = true)]
    sources: Vec<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
enum Commands {
    /// Run one update cycle per source (default)
    Run,
    /// Check that the published feeds are well-formed RSS
    Validate,
    /// Check that the published feeds are fresh and non-empty
    Health,
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    let config = match AppConfig::load(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            init_tracing(LogFormat::Text);
            tracing::error!(error = %e, "configuration rejected");
            return Err(e).context("load configuration");
        }
    };
    init_tracing(config.log_format);

    let sources = config.select_sources(&cli.sources).context("select sources")?;

    match cli.command.unwrap_or(Commands::Run) {
        Commands::Run => {
            let _lock = RunLock::acquire(&config.cache_dir, config.lock_stale_after())?;
            let fetcher = HttpFetcher::new(FetchConfig::from_app(&config))?;

            tracing::info!(sources = sources.len(), cache_dir = %config.cache_dir.display(), "run start");
            let runner = Runner { config: &config, fetcher: &fetcher, sleeper: &TokioSleeper, clock: &SystemClock };
            let report = runner.run(&sources).await;
            report.summarize();

            Ok(report.exit_code())
        }
        Commands::Validate => Ok(check::validate(&config, &sources)),
        Commands::Health => Ok(check::health(&config, &sources, SystemTime::now())),
    }
}

fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr);

    match format {
        LogFormat::Json => builder.json().init(),
        LogFormat::Text => builder.init(),
    }
}
