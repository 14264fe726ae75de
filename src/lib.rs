//! winthumb Library
//!
//! A disk-backed cache of window thumbnails for compositor bars and
//! switchers. Captures run through external tools (grim + ImageMagick),
//! land in a per-user cache directory as PNG plus a JSON sidecar, and are
//! bounded by age and total size.
//!
//! ```ignore
//! use winthumb::{CaptureRequest, Config, Region, ThumbnailCache};
//!
//! let cache = ThumbnailCache::new(&Config::load()?);
//! cache.capture_window(CaptureRequest::new("0x55d4c7a1b2c0", Region::new(0, 0, 1280, 720)));
//! if let Some(path) = cache.get_thumbnail_path("0x55d4c7a1b2c0", 300) {
//!     println!("{}", path.display());
//! }
//! ```

pub mod cache;
pub mod capture;
pub mod clock;
pub mod config;
pub mod error;
pub mod eviction;
pub mod probe;
pub mod store;

pub use cache::{CacheSettings, CacheStats, ThumbnailCache, DEFAULT_MAX_AGE_SECONDS};
pub use capture::{CapturePipeline, CaptureRequest, Region, ThumbnailSize};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::Config;
pub use error::{CacheError, CacheResult};
pub use eviction::{CleanupReport, EvictionPolicy};
pub use probe::{ProbeReport, ToolProbe};
pub use store::{CacheKey, CacheStore, ThumbnailMetadata};
