//! Media Sorter - file photos and movies by the moment they were taken
//!
//! Copies or moves media from a source tree into destination trees named
//! after each file's EXIF capture time or filesystem birth time.

use anyhow::{Context, Result};
use clap::Parser;
use media_sorter::{Cli, organize};
use std::fs::OpenOptions;
use tracing::{Level, info};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

fn main() -> Result<()> {
    let cli = Cli::parse();
    let _guard = setup_logging(&cli)?;

    info!(version = env!("CARGO_PKG_VERSION"), "Media Sorter starting");

    let config = cli.to_config()?;
    config
        .validate()
        .context("You must specify --src as the path to a directory")?;

    if config.threads > 0 {
        rayon::ThreadPoolBuilder::new()
            .num_threads(config.threads)
            .build_global()
            .ok(); // Ignore if already initialized
    }

    if config.pictures.is_none() && config.movies.is_none() && config.others.is_none() {
        info!("No destination configured; nothing will be placed");
    }

    let dry_run = config.dry_run;
    let counters = organize(config)?;

    if dry_run {
        info!("Dry run: no files were changed");
    }
    if let Some(log_file) = &cli.log_file {
        info!(log_file = %log_file.display(), "Log saved");
    }
    info!(failed = counters.failed(), "Done");

    Ok(())
}

/// Log to stderr, and additionally to `--log-file` when given
fn setup_logging(cli: &Cli) -> Result<Option<WorkerGuard>> {
    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };

    let env_filter = EnvFilter::builder()
        .with_default_directive(level.into())
        .from_env_lossy();

    let subscriber = tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt::layer().with_writer(std::io::stderr));

    let Some(log_path) = &cli.log_file else {
        subscriber.init();
        return Ok(None);
    };

    if let Some(parent) = log_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_path)
        .with_context(|| format!("Cannot open log file {}", log_path.display()))?;

    let (non_blocking, guard) = tracing_appender::non_blocking(file);

    if cli.json_log {
        subscriber
            .with(
                fmt::layer()
                    .json()
                    .with_ansi(false)
                    .with_writer(non_blocking),
            )
            .init();
    } else {
        subscriber
            .with(fmt::layer().with_ansi(false).with_writer(non_blocking))
            .init();
    }

    Ok(Some(guard))
}
