//! The public thumbnail cache.
//!
//! `ThumbnailCache` ties the probe, store, coordinator and eviction policy
//! together behind an API that never fails: misses are `None`, dropped
//! captures are `false`, and every error is logged instead of returned.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use humansize::{format_size, DECIMAL};
use tracing::{debug, warn};

use crate::capture::{
    CaptureCoordinator, CapturePipeline, CaptureRequest, ExternalPipeline, ThumbnailSize,
    DEFAULT_POOL_SIZE,
};
use crate::clock::{Clock, SystemClock};
use crate::config::{default_queue_capacity, Config};
use crate::eviction::{CleanupReport, EvictionPolicy};
use crate::probe::{ProbeReport, ToolProbe};
use crate::store::{CacheKey, CacheStore, ThumbnailMetadata};

/// Freshness window used when the caller has no preference.
pub const DEFAULT_MAX_AGE_SECONDS: u64 = 300;

/// Everything needed to open a cache, independent of the config file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheSettings {
    pub directory: PathBuf,
    pub thumbnail_size: ThumbnailSize,
    pub workers: usize,
    pub queue_capacity: usize,
}

impl CacheSettings {
    /// Defaults for everything but the directory.
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: directory.into(),
            thumbnail_size: ThumbnailSize::default(),
            workers: DEFAULT_POOL_SIZE,
            queue_capacity: default_queue_capacity(),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self {
            directory: config.cache_directory(),
            thumbnail_size: ThumbnailSize {
                width: config.capture.thumbnail_width,
                height: config.capture.thumbnail_height,
            },
            workers: config.capture.workers,
            queue_capacity: config.capture.queue_capacity,
        }
    }
}

/// Point-in-time view of the cache contents.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheStats {
    pub entries: usize,
    pub total_bytes: u64,
    pub directory: PathBuf,
    /// Captures running or queued
    pub in_flight: usize,
}

impl CacheStats {
    /// Format a summary for display
    pub fn summary(&self) -> String {
        let mut summary = format!(
            "Thumbnails: {} ({})\n   Directory: {}",
            self.entries,
            format_size(self.total_bytes, DECIMAL),
            self.directory.display()
        );
        if self.in_flight > 0 {
            summary.push_str(&format!("\n   Capturing: {}", self.in_flight));
        }
        summary
    }
}

/// Disk-backed cache of window thumbnails.
pub struct ThumbnailCache {
    directory: PathBuf,
    /// `None` when the cache directory could not be created
    store: Option<Arc<CacheStore>>,
    /// `None` when the store or the capture tools are unavailable
    coordinator: Option<CaptureCoordinator>,
    probe: ToolProbe,
    clock: Arc<dyn Clock>,
    /// Serializes sweeps; a second concurrent sweep is skipped
    sweep: Mutex<()>,
}

impl ThumbnailCache {
    /// Open the cache described by `config` with the external tools and the
    /// system clock.
    pub fn new(config: &Config) -> Self {
        Self::with_pipeline(
            CacheSettings::from_config(config),
            Arc::new(ExternalPipeline::from_config(&config.capture)),
            Arc::new(SystemClock),
        )
    }

    /// Open a cache with an explicit pipeline and clock.
    ///
    /// The pipeline is probed exactly once, here.
    pub fn with_pipeline(
        settings: CacheSettings,
        pipeline: Arc<dyn CapturePipeline>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let probe = ToolProbe::check_capture_tools(pipeline.as_ref());

        let store = match CacheStore::open(&settings.directory) {
            Ok(store) => Some(Arc::new(store)),
            Err(e) => {
                warn!(
                    dir = %settings.directory.display(),
                    error = %e,
                    "thumbnail cache directory unusable, cache disabled"
                );
                None
            }
        };

        let coordinator = match &store {
            Some(store) if probe.is_available() => Some(CaptureCoordinator::new(
                Arc::clone(store),
                pipeline,
                Arc::clone(&clock),
                settings.thumbnail_size,
                settings.workers,
                settings.queue_capacity,
            )),
            _ => None,
        };

        Self {
            directory: settings.directory,
            store,
            coordinator,
            probe,
            clock,
            sweep: Mutex::new(()),
        }
    }

    /// Whether captures can run at all.
    pub fn is_available(&self) -> bool {
        self.coordinator.is_some()
    }

    /// What the tool probe found.
    pub fn probe(&self) -> &ProbeReport {
        self.probe.report()
    }

    pub fn cache_directory(&self) -> &Path {
        &self.directory
    }

    /// Request a capture in the background. Returns immediately.
    ///
    /// Returns whether the request was queued; `false` covers an unavailable
    /// cache, invalid input, a capture already running for this window and a
    /// full queue.
    pub fn capture_window(&self, request: CaptureRequest) -> bool {
        match &self.coordinator {
            Some(coordinator) => coordinator.capture_window(request),
            None => false,
        }
    }

    /// Capture on the calling thread. Blocks until the entry is stored or the
    /// attempt failed.
    ///
    /// Meant for the last snapshot before a window is hidden or closed.
    pub fn capture_window_sync(&self, request: CaptureRequest) -> bool {
        match &self.coordinator {
            Some(coordinator) => coordinator.capture_window_sync(request),
            None => false,
        }
    }

    /// Path of a thumbnail captured at most `max_age_seconds` ago.
    ///
    /// A stale entry is a miss but stays on disk; only `cleanup` deletes.
    pub fn get_thumbnail_path(&self, address: &str, max_age_seconds: u64) -> Option<PathBuf> {
        let (path, metadata) = self.lookup(address)?;
        if metadata.is_fresh(self.clock.now(), max_age_seconds) {
            Some(path)
        } else {
            debug!(address, max_age_seconds, "thumbnail is stale");
            None
        }
    }

    /// Metadata of a cached thumbnail, however old.
    pub fn get_metadata(&self, address: &str) -> Option<ThumbnailMetadata> {
        self.lookup(address).map(|(_, metadata)| metadata)
    }

    /// Run one eviction sweep.
    ///
    /// Never blocks on running captures; their keys are skipped and counted
    /// in the report. If another sweep is already running this returns an
    /// empty report.
    pub fn cleanup(&self, max_age_seconds: u64, max_size_mb: u64) -> CleanupReport {
        let Some(store) = &self.store else {
            return CleanupReport::default();
        };
        let Ok(_sweep) = self.sweep.try_lock() else {
            debug!("cleanup already running");
            return CleanupReport::default();
        };
        EvictionPolicy::new(max_age_seconds, max_size_mb).cleanup(store, self.clock.now())
    }

    pub fn stats(&self) -> CacheStats {
        let (entries, total_bytes, in_flight) = match &self.store {
            Some(store) => {
                let entries = store.len();
                let total_bytes = store.total_size_bytes();
                (entries, total_bytes, store.lock_index().in_flight_count())
            }
            None => (0, 0, 0),
        };
        CacheStats {
            entries,
            total_bytes,
            directory: self.directory.clone(),
            in_flight,
        }
    }

    /// Whether a capture for `address` is running or queued.
    pub fn is_capturing(&self, address: &str) -> bool {
        match (&self.store, CacheKey::new(address)) {
            (Some(store), Ok(key)) => store.lock_index().is_in_flight(&key),
            _ => false,
        }
    }

    /// Block until no capture is running, or `timeout` elapses.
    pub fn wait_for_idle(&self, timeout: Duration) -> bool {
        match &self.coordinator {
            Some(coordinator) => coordinator.wait_for_idle(timeout),
            None => true,
        }
    }

    fn lookup(&self, address: &str) -> Option<(PathBuf, ThumbnailMetadata)> {
        let store = self.store.as_ref()?;
        let key = match CacheKey::new(address) {
            Ok(key) => key,
            Err(e) => {
                debug!(address, error = %e, "lookup rejected");
                return None;
            }
        };
        store.read(&key)
    }
}
