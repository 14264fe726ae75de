//! Thumbnail metadata and its JSON sidecar encoding.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{CacheError, CacheResult};

/// Provenance of one cached thumbnail.
///
/// Immutable once written; `width` and `height` are the pixel dimensions of
/// the stored image and are always non-zero on disk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThumbnailMetadata {
    pub window_address: String,
    pub window_class: String,
    pub window_title: String,
    pub workspace_name: String,
    pub captured_at: DateTime<Utc>,
    pub width: u32,
    pub height: u32,
}

impl ThumbnailMetadata {
    /// Time elapsed since capture. Negative if the clock went backwards.
    pub fn age(&self, now: DateTime<Utc>) -> Duration {
        now - self.captured_at
    }

    /// Whether the capture is at most `max_age_seconds` old.
    pub fn is_fresh(&self, now: DateTime<Utc>, max_age_seconds: u64) -> bool {
        self.age(now) <= seconds(max_age_seconds)
    }

    pub(crate) fn validate(&self) -> CacheResult<()> {
        if self.width == 0 || self.height == 0 {
            return Err(CacheError::EmptyImage);
        }
        Ok(())
    }

    pub(crate) fn to_sidecar(&self) -> CacheResult<Vec<u8>> {
        self.validate()?;
        Ok(serde_json::to_vec_pretty(self)?)
    }

    pub(crate) fn from_sidecar(bytes: &[u8]) -> CacheResult<Self> {
        let metadata: Self = serde_json::from_slice(bytes)?;
        metadata.validate()?;
        Ok(metadata)
    }
}

/// Convert a configured number of seconds, saturating at the largest
/// representable span.
pub(crate) fn seconds(secs: u64) -> Duration {
    i64::try_from(secs)
        .ok()
        .and_then(Duration::try_seconds)
        .unwrap_or(Duration::MAX)
}
