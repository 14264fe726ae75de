//! Window capture: request types, the external tool pipeline, and the
//! coordinator that turns a successful capture into a cache entry.
//!
//! # Example
//!
//! ```ignore
//! use winthumb::capture::{CaptureRequest, Region};
//!
//! let request = CaptureRequest::new("0x55d4c7a1b2c0", Region::new(0, 0, 1280, 720))
//!     .with_class("firefox")
//!     .with_workspace("2");
//! cache.capture_window(request);
//! ```

mod coordinator;
pub mod external;
mod worker;

pub use coordinator::CaptureCoordinator;
pub use external::ExternalPipeline;
pub use worker::DEFAULT_POOL_SIZE;

use crate::error::{CacheError, CacheResult};
use crate::probe::ProbeReport;

/// Screen rectangle of a window in compositor pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Region {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl Region {
    pub fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Reject empty or negative rectangles before any tool is spawned.
    pub fn validate(&self) -> CacheResult<()> {
        if self.width <= 0 || self.height <= 0 {
            return Err(CacheError::InvalidRegion {
                width: self.width,
                height: self.height,
            });
        }
        Ok(())
    }

    /// Geometry in the `X,Y WxH` form screenshot tools accept.
    pub fn geometry(&self) -> String {
        format!("{},{} {}x{}", self.x, self.y, self.width, self.height)
    }
}

/// Bounding box thumbnails are scaled into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ThumbnailSize {
    pub width: u32,
    pub height: u32,
}

impl Default for ThumbnailSize {
    fn default() -> Self {
        Self {
            width: 320,
            height: 180,
        }
    }
}

/// Everything the caller knows about the window being captured.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureRequest {
    pub address: String,
    pub region: Region,
    pub class: String,
    pub title: String,
    pub workspace: String,
}

impl CaptureRequest {
    pub fn new(address: impl Into<String>, region: Region) -> Self {
        Self {
            address: address.into(),
            region,
            class: String::new(),
            title: String::new(),
            workspace: String::new(),
        }
    }

    pub fn with_class(mut self, class: impl Into<String>) -> Self {
        self.class = class.into();
        self
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    pub fn with_workspace(mut self, workspace: impl Into<String>) -> Self {
        self.workspace = workspace.into();
        self
    }
}

/// Produces thumbnail bytes for a screen region.
///
/// Implementors must be thread-safe; captures run on worker threads and on
/// callers' threads at the same time.
pub trait CapturePipeline: Send + Sync {
    /// Human-readable name for logging.
    fn name(&self) -> &'static str;

    /// Look for the tools this pipeline needs. Called once per cache.
    fn probe(&self) -> ProbeReport;

    /// Capture `region` and return the encoded thumbnail, scaled to fit
    /// `size`.
    fn capture(&self, region: &Region, size: ThumbnailSize) -> CacheResult<Vec<u8>>;
}
