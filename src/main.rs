//! winthumb - CLI entry point

mod cli;
mod commands;

use std::io;
use std::process::ExitCode;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use cli::{Cli, Commands};
use winthumb::{Config, ThumbnailCache};

/// Log to stderr; stdout carries command output for scripts.
fn init_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(io::stderr)
                .with_target(false)
                .compact(),
        )
        .init();
}

fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let mut config = Config::load()?;
    if let Some(dir) = cli.cache_dir {
        config.cache.directory = Some(dir.to_string_lossy().to_string());
    }
    let cache = ThumbnailCache::new(&config);

    let code = match cli.command {
        Commands::Probe => commands::probe::handle(&cache),
        Commands::Capture(args) => commands::capture::handle(&cache, args),
        Commands::Path { address, max_age } => commands::lookup::handle_path(
            &cache,
            &address,
            max_age.unwrap_or(config.cache.max_age_seconds),
        ),
        Commands::Meta { address } => commands::lookup::handle_meta(&cache, &address)?,
        Commands::Cleanup {
            max_age,
            max_size_mb,
        } => commands::cleanup::handle(
            &cache,
            max_age.unwrap_or(config.cache.cleanup_max_age_seconds),
            max_size_mb.unwrap_or(config.cache.max_size_mb),
        ),
        Commands::Status => commands::status::handle(&cache),
    };
    Ok(code)
}
