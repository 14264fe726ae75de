//! CLI definitions for winthumb
//!
//! The clap structure lives apart from main.rs so the dispatch stays short
//! and the parser can be exercised by tests.

use clap::builder::styling::{AnsiColor, Effects, Styles};
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// Build clap styles matching the bar's accent color.
pub fn build_cli_styles() -> Styles {
    Styles::styled()
        .header(AnsiColor::Green.on_default() | Effects::BOLD)
        .usage(AnsiColor::Green.on_default() | Effects::BOLD)
        .literal(AnsiColor::Green.on_default())
        .placeholder(AnsiColor::White.on_default())
        .invalid(AnsiColor::Red.on_default())
        .error(AnsiColor::Red.on_default() | Effects::BOLD)
}

#[derive(Parser)]
#[command(name = "winthumb")]
#[command(about = "Window thumbnail cache - capture, look up and prune window previews")]
#[command(
    long_about = "winthumb keeps a disk cache of window thumbnails for bars and window
switchers. Thumbnails are captured with grim, scaled with ImageMagick and
stored as PNG plus a JSON sidecar under ~/.cache/winthumb/thumbnails.

QUICK START:
    winthumb probe                        Check that grim and magick are installed
    winthumb capture 0x55d4 --x 0 --y 0 --width 1280 --height 720
    winthumb path 0x55d4                  Print the cached thumbnail, if fresh
    winthumb cleanup                      Prune old entries"
)]
#[command(version, styles = build_cli_styles())]
pub struct Cli {
    /// Log debug output to stderr
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Use this cache directory instead of the configured one
    #[arg(long, global = true, value_name = "PATH")]
    pub cache_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Check whether the capture tools are installed
    #[command(long_about = "Check whether the capture and resize tools are installed.

Exits with status 1 when either is missing; captures are disabled then.

OUTPUT:
    Capture tools: available
       capture: grim, resize: magick")]
    Probe,

    /// Capture a window region into the cache
    #[command(long_about = "Capture a screen region for a window and store it.

Runs synchronously unless --async is given, in which case the capture is
queued and the command waits for it before exiting.

EXAMPLES:
    winthumb capture 0x55d4 --x 0 --y 0 --width 1280 --height 720
    winthumb capture 0x55d4 --x 0 --y 0 --width 1280 --height 720 --class firefox --workspace 2")]
    Capture(CaptureArgs),

    /// Print the path of a fresh cached thumbnail
    #[command(long_about = "Print the path of a cached thumbnail.

Exits with status 1 when there is no entry or it is older than --max-age
seconds. Stale entries are not deleted.")]
    Path {
        /// Window address
        address: String,
        /// Freshness window in seconds (defaults to cache.max_age_seconds)
        #[arg(long, value_name = "SECS")]
        max_age: Option<u64>,
    },

    /// Print the metadata of a cached thumbnail as JSON
    Meta {
        /// Window address
        address: String,
    },

    /// Remove old entries and enforce the size ceiling
    #[command(long_about = "Remove thumbnails older than --max-age, then the oldest ones until
the cache fits in --max-size-mb. Also removes incomplete entries and
leftover temporary files. Windows being captured are skipped.

EXAMPLES:
    winthumb cleanup
    winthumb cleanup --max-age 600 --max-size-mb 20")]
    Cleanup {
        /// Age ceiling in seconds (defaults to cache.cleanup_max_age_seconds)
        #[arg(long, value_name = "SECS")]
        max_age: Option<u64>,
        /// Size ceiling in MB of 1,000,000 bytes (defaults to cache.max_size_mb)
        #[arg(long, value_name = "MB")]
        max_size_mb: Option<u64>,
    },

    /// Show cache statistics
    Status,
}

#[derive(Args)]
pub struct CaptureArgs {
    /// Window address
    pub address: String,
    /// Left edge in compositor pixels
    #[arg(long, allow_negative_numbers = true)]
    pub x: i32,
    /// Top edge in compositor pixels
    #[arg(long, allow_negative_numbers = true)]
    pub y: i32,
    #[arg(long, allow_negative_numbers = true)]
    pub width: i32,
    #[arg(long, allow_negative_numbers = true)]
    pub height: i32,
    /// Window class
    #[arg(long, default_value = "")]
    pub class: String,
    /// Window title
    #[arg(long, default_value = "")]
    pub title: String,
    /// Workspace name
    #[arg(long, default_value = "")]
    pub workspace: String,
    /// Queue the capture on a worker instead of running it inline
    #[arg(long = "async")]
    pub run_async: bool,
}
