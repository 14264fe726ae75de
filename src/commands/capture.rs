//! Capture command handler

use std::process::ExitCode;

use winthumb::{CaptureRequest, Region, ThumbnailCache};

use super::drain;
use crate::cli::CaptureArgs;

/// Capture one window region and print where it was stored.
#[cfg(not(tarpaulin_include))]
pub fn handle(cache: &ThumbnailCache, args: CaptureArgs) -> ExitCode {
    if !cache.is_available() {
        eprintln!("Capture tools unavailable: {}", cache.probe());
        return ExitCode::FAILURE;
    }

    let address = args.address.clone();
    let request = CaptureRequest::new(
        args.address,
        Region::new(args.x, args.y, args.width, args.height),
    )
    .with_class(args.class)
    .with_title(args.title)
    .with_workspace(args.workspace);

    let stored = if args.run_async {
        let queued = cache.capture_window(request);
        drain(cache);
        queued
    } else {
        cache.capture_window_sync(request)
    };

    match cache.get_metadata(&address) {
        Some(metadata) if stored => {
            println!(
                "Captured {} ({}x{})",
                address, metadata.width, metadata.height
            );
            ExitCode::SUCCESS
        }
        _ => {
            eprintln!("Capture failed for {} (run with -v for details)", address);
            ExitCode::FAILURE
        }
    }
}
