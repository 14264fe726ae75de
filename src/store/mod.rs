//! On-disk layout and crash-safe persistence of thumbnails.
//!
//! Each entry is a pair of files named after the encoded window address:
//! `<stem>.png` holds the thumbnail and `<stem>.json` its metadata sidecar.
//! Both are written to a temporary file in the cache directory and renamed
//! into place, image first. Removal deletes the sidecar first. Readers
//! require both files, so a half-written or half-removed entry is a miss.

mod index;
mod key;
mod metadata;

pub use index::IndexEntry;
pub use key::{CacheKey, MAX_KEY_LEN};
pub use metadata::ThumbnailMetadata;

pub(crate) use index::{CacheIndex, SidecarStamp};
pub(crate) use metadata::seconds;

use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use rayon::prelude::*;
use tracing::debug;

use crate::error::{CacheError, CacheResult};

pub const IMAGE_EXTENSION: &str = "png";
pub const METADATA_EXTENSION: &str = "json";

/// Temporary files are named `.winthumb-XXXXXX.tmp`.
pub const TEMP_PREFIX: &str = ".winthumb-";
pub const TEMP_SUFFIX: &str = ".tmp";

/// Result of walking the cache directory.
#[derive(Debug, Default)]
pub(crate) struct DiskScan {
    /// Complete, parseable entries
    pub entries: Vec<(CacheKey, IndexEntry)>,
    /// Files that belong to a key but do not form a valid entry
    pub orphans: Vec<(CacheKey, PathBuf)>,
    /// Leftover temporary files with their modification time
    pub temp_files: Vec<(PathBuf, DateTime<Utc>)>,
}

/// What became of a file a scan reported as orphaned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum OrphanRemoval {
    Removed,
    /// Already deleted by someone else
    Gone,
    /// A capture for the key is running
    InFlight,
    /// The pair was completed after the scan
    Completed,
}

#[derive(Default)]
struct FilePair {
    image: Option<PathBuf>,
    sidecar: Option<PathBuf>,
}

/// Owner of the cache directory and the in-memory index.
#[derive(Debug)]
pub struct CacheStore {
    dir: PathBuf,
    index: Mutex<CacheIndex>,
}

impl CacheStore {
    /// Open (and create if needed) the cache directory.
    pub fn open(dir: impl Into<PathBuf>) -> CacheResult<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self {
            dir,
            index: Mutex::new(CacheIndex::default()),
        })
    }

    pub fn cache_directory(&self) -> &Path {
        &self.dir
    }

    pub fn image_path_for(&self, key: &CacheKey) -> PathBuf {
        self.dir.join(format!("{}.{}", key.file_stem(), IMAGE_EXTENSION))
    }

    pub fn metadata_path_for(&self, key: &CacheKey) -> PathBuf {
        self.dir.join(format!("{}.{}", key.file_stem(), METADATA_EXTENSION))
    }

    /// Persist an image and its metadata as one entry.
    ///
    /// The sidecar is only renamed into place once the image is; if that
    /// second step fails the image is removed again. The index is updated
    /// after both files are in place.
    pub fn write(
        &self,
        key: &CacheKey,
        image: &[u8],
        metadata: &ThumbnailMetadata,
    ) -> CacheResult<()> {
        if image.is_empty() {
            return Err(CacheError::EmptyImage);
        }
        if metadata.window_address != key.as_str() {
            return Err(CacheError::InvalidKey {
                reason: "metadata belongs to another window",
            });
        }
        let sidecar = metadata.to_sidecar()?;

        // The directory may have been removed underneath us
        fs::create_dir_all(&self.dir)?;

        let image_path = self.image_path_for(key);
        self.write_atomic(&image_path, image)?;

        let metadata_path = self.metadata_path_for(key);
        if let Err(e) = self.write_atomic(&metadata_path, &sidecar) {
            let _ = fs::remove_file(&image_path);
            return Err(e);
        }

        let entry = IndexEntry {
            metadata: metadata.clone(),
            size: image.len() as u64,
            stamp: SidecarStamp::of(&metadata_path).ok(),
        };
        self.lock_index().insert(key.clone(), entry);
        debug!(key = %key, bytes = image.len(), "thumbnail stored");
        Ok(())
    }

    /// Look up an entry. Absence and corruption are both a miss.
    ///
    /// Indexed metadata is served only while the sidecar on disk is the one
    /// it was read from; a sidecar rewritten by another process is parsed
    /// again.
    pub fn read(&self, key: &CacheKey) -> Option<(PathBuf, ThumbnailMetadata)> {
        let image_path = self.image_path_for(key);
        if !image_path.is_file() {
            return None;
        }
        let stamp = SidecarStamp::of(&self.metadata_path_for(key)).ok()?;

        let cached = self
            .lock_index()
            .get(key)
            .filter(|entry| entry.stamp == Some(stamp))
            .map(|entry| entry.metadata.clone());
        if let Some(metadata) = cached {
            return Some((image_path, metadata));
        }

        match self.load_entry(key) {
            Ok(entry) => {
                let metadata = entry.metadata.clone();
                self.lock_index().refresh(key.clone(), entry);
                Some((image_path, metadata))
            }
            Err(e) => {
                debug!(key = %key, error = %e, "ignoring unreadable entry");
                None
            }
        }
    }

    /// Delete both files of an entry, whichever exist.
    ///
    /// Returns the number of image bytes freed.
    pub fn remove(&self, key: &CacheKey) -> CacheResult<u64> {
        self.lock_index().remove(key);
        self.delete_files(key)
    }

    /// Remove an entry unless a capture for it is running.
    ///
    /// Returns `None` when the key was skipped.
    pub(crate) fn evict(&self, key: &CacheKey) -> CacheResult<Option<u64>> {
        {
            let mut index = self.lock_index();
            if index.is_in_flight(key) {
                return Ok(None);
            }
            index.remove(key);
        }
        self.delete_files(key).map(Some)
    }

    /// Delete one file a scan reported as orphaned, if it still is one.
    ///
    /// The scan ran without the lock, so the pair is checked again here
    /// and the check and the removal happen under one acquisition. A
    /// capture commits its index entry under the same lock, which keeps a
    /// finished write from being mistaken for its half-written state.
    pub(crate) fn remove_orphan(
        &self,
        key: &CacheKey,
        path: &Path,
    ) -> CacheResult<OrphanRemoval> {
        let mut index = self.lock_index();
        if index.is_in_flight(key) {
            return Ok(OrphanRemoval::InFlight);
        }
        if let Ok(entry) = self.load_entry(key) {
            index.refresh(key.clone(), entry);
            return Ok(OrphanRemoval::Completed);
        }
        index.remove(key);
        if remove_if_exists(path)? {
            Ok(OrphanRemoval::Removed)
        } else {
            Ok(OrphanRemoval::Gone)
        }
    }

    /// Sum of image sizes across the index.
    pub fn total_size_bytes(&self) -> u64 {
        self.ensure_loaded();
        self.lock_index().total_size()
    }

    /// Number of indexed entries.
    pub fn len(&self) -> usize {
        self.ensure_loaded();
        self.lock_index().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub(crate) fn lock_index(&self) -> MutexGuard<'_, CacheIndex> {
        self.index.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Merge the directory contents into the index once per store.
    pub(crate) fn ensure_loaded(&self) {
        if self.lock_index().loaded {
            return;
        }
        match self.scan() {
            Ok(scan) => self.merge_scan(&scan),
            Err(e) => debug!(error = %e, "cache directory scan failed"),
        }
    }

    /// Bring the index in line with a scan.
    ///
    /// Newer captures found on disk replace indexed ones. Indexed entries
    /// the scan did not see are dropped once their files are confirmed
    /// gone, which happens when another process evicts them.
    pub(crate) fn merge_scan(&self, scan: &DiskScan) {
        let mut index = self.lock_index();
        let on_disk: HashSet<&CacheKey> = scan.entries.iter().map(|(key, _)| key).collect();
        for (key, entry) in &scan.entries {
            index.refresh(key.clone(), entry.clone());
        }

        let vanished: Vec<CacheKey> = index
            .keys()
            .filter(|key| !on_disk.contains(key) && !index.is_in_flight(key))
            .filter(|key| {
                !self.image_path_for(key).is_file() || !self.metadata_path_for(key).is_file()
            })
            .cloned()
            .collect();
        for key in &vanished {
            debug!(key = %key, "dropping entry removed from disk");
            index.remove(key);
        }
        index.loaded = true;
    }

    /// Walk the cache directory and classify every file we own.
    ///
    /// Files whose names do not decode to a cache key are left alone.
    pub(crate) fn scan(&self) -> CacheResult<DiskScan> {
        let mut scan = DiskScan::default();
        let mut pairs: BTreeMap<CacheKey, FilePair> = BTreeMap::new();

        let read_dir = match fs::read_dir(&self.dir) {
            Ok(read_dir) => read_dir,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(scan),
            Err(e) => return Err(e.into()),
        };

        for entry in read_dir.flatten() {
            let path = entry.path();
            let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };

            if name.starts_with(TEMP_PREFIX) && name.ends_with(TEMP_SUFFIX) {
                if let Ok(modified) = entry.metadata().and_then(|m| m.modified()) {
                    scan.temp_files.push((path, modified.into()));
                }
                continue;
            }

            let Some((stem, extension)) = name.rsplit_once('.') else {
                continue;
            };
            let Some(key) = CacheKey::from_file_stem(stem) else {
                continue;
            };
            let pair = pairs.entry(key).or_default();
            match extension {
                IMAGE_EXTENSION => pair.image = Some(path),
                METADATA_EXTENSION => pair.sidecar = Some(path),
                _ => {}
            }
        }

        let loaded: Vec<(CacheKey, FilePair, Option<CacheResult<IndexEntry>>)> = pairs
            .into_par_iter()
            .map(|(key, pair)| {
                let entry = match (&pair.image, &pair.sidecar) {
                    (Some(_), Some(_)) => Some(self.load_entry(&key)),
                    _ => None,
                };
                (key, pair, entry)
            })
            .collect();

        for (key, pair, entry) in loaded {
            match entry {
                Some(Ok(entry)) => scan.entries.push((key, entry)),
                _ => {
                    for path in [pair.image, pair.sidecar].into_iter().flatten() {
                        scan.orphans.push((key.clone(), path));
                    }
                }
            }
        }

        Ok(scan)
    }

    fn load_entry(&self, key: &CacheKey) -> CacheResult<IndexEntry> {
        let metadata_path = self.metadata_path_for(key);
        // Stamp before reading so a concurrent rewrite shows up as a mismatch
        let stamp = SidecarStamp::of(&metadata_path)?;
        let bytes = fs::read(&metadata_path)?;
        let metadata = ThumbnailMetadata::from_sidecar(&bytes)?;
        if metadata.window_address != key.as_str() {
            return Err(CacheError::InvalidKey {
                reason: "sidecar belongs to another window",
            });
        }
        let size = fs::metadata(self.image_path_for(key))?.len();
        if size == 0 {
            return Err(CacheError::EmptyImage);
        }
        Ok(IndexEntry {
            metadata,
            size,
            stamp: Some(stamp),
        })
    }

    fn write_atomic(&self, target: &Path, bytes: &[u8]) -> CacheResult<()> {
        let mut temp = tempfile::Builder::new()
            .prefix(TEMP_PREFIX)
            .suffix(TEMP_SUFFIX)
            .tempfile_in(&self.dir)?;
        temp.write_all(bytes)?;
        temp.as_file().sync_all()?;
        // On failure the temp file is dropped, which deletes it
        temp.persist(target).map_err(|e| e.error)?;
        Ok(())
    }

    fn delete_files(&self, key: &CacheKey) -> CacheResult<u64> {
        let image_path = self.image_path_for(key);
        let size = fs::metadata(&image_path).map(|m| m.len()).unwrap_or(0);

        remove_if_exists(&self.metadata_path_for(key))?;
        let removed_image = remove_if_exists(&image_path)?;
        if removed_image {
            debug!(key = %key, bytes = size, "thumbnail removed");
        }
        Ok(if removed_image { size } else { 0 })
    }
}

/// Delete a file, treating "already gone" as success.
///
/// Returns whether a file was actually removed.
fn remove_if_exists(path: &Path) -> CacheResult<bool> {
    match fs::remove_file(path) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e.into()),
    }
}
