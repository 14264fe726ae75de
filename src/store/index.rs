//! In-memory index of cache entries and in-flight captures.
//!
//! Both live behind the store's single mutex so that marking a key in
//! flight, committing a write and evicting an entry are ordered relative
//! to each other. Besides this bookkeeping the lock covers at most a stat
//! or a single file removal.

use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::Path;
use std::time::SystemTime;

use super::key::CacheKey;
use super::metadata::ThumbnailMetadata;

/// Indexed view of one on-disk entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexEntry {
    pub metadata: ThumbnailMetadata,
    /// Image file size in bytes (sidecars are not counted)
    pub size: u64,
    /// Sidecar file state when `metadata` was read or written
    pub(crate) stamp: Option<SidecarStamp>,
}

/// Identifies one version of a sidecar file, so a rewrite by another
/// process is noticed without parsing the file again.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct SidecarStamp {
    modified: SystemTime,
    len: u64,
}

impl SidecarStamp {
    pub fn of(path: &Path) -> io::Result<Self> {
        let meta = fs::metadata(path)?;
        Ok(Self {
            modified: meta.modified()?,
            len: meta.len(),
        })
    }
}

#[derive(Debug, Default)]
pub(crate) struct CacheIndex {
    entries: HashMap<CacheKey, IndexEntry>,
    /// Number of captures running per key
    in_flight: HashMap<CacheKey, usize>,
    /// Whether a full directory scan has been merged in
    pub(crate) loaded: bool,
}

impl CacheIndex {
    pub fn get(&self, key: &CacheKey) -> Option<&IndexEntry> {
        self.entries.get(key)
    }

    pub fn insert(&mut self, key: CacheKey, entry: IndexEntry) {
        self.entries.insert(key, entry);
    }

    /// Take an entry read from disk unless the index holds a newer capture.
    pub fn refresh(&mut self, key: CacheKey, entry: IndexEntry) {
        match self.entries.get(&key) {
            Some(current) if current.metadata.captured_at > entry.metadata.captured_at => {}
            _ => {
                self.entries.insert(key, entry);
            }
        }
    }

    pub fn remove(&mut self, key: &CacheKey) -> Option<IndexEntry> {
        self.entries.remove(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &CacheKey> {
        self.entries.keys()
    }

    pub fn snapshot(&self) -> Vec<(CacheKey, IndexEntry)> {
        self.entries
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn total_size(&self) -> u64 {
        self.entries.values().map(|e| e.size).sum()
    }

    /// Register one more capture for `key`. Returns `true` if it is the
    /// only one running.
    pub fn begin_capture(&mut self, key: &CacheKey) -> bool {
        let count = self.in_flight.entry(key.clone()).or_insert(0);
        *count += 1;
        *count == 1
    }

    /// Register a capture only if none is running for `key`.
    pub fn try_begin_capture(&mut self, key: &CacheKey) -> bool {
        if self.is_in_flight(key) {
            return false;
        }
        self.begin_capture(key)
    }

    pub fn end_capture(&mut self, key: &CacheKey) {
        if let Some(count) = self.in_flight.get_mut(key) {
            *count -= 1;
            if *count == 0 {
                self.in_flight.remove(key);
            }
        }
    }

    pub fn is_in_flight(&self, key: &CacheKey) -> bool {
        self.in_flight.contains_key(key)
    }

    pub fn in_flight_count(&self) -> usize {
        self.in_flight.len()
    }
}
