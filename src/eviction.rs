//! Age and size bounded eviction.
//!
//! A sweep runs in passes:
//!
//! 1. Orphans: files of a key that do not form a valid entry (a crash
//!    between the two renames, a corrupt sidecar) and stale temp files.
//! 2. Age: entries captured more than `max_age_seconds` ago.
//! 3. Size: if the remaining images exceed the ceiling, the oldest
//!    captures go first until the cache fits.
//!
//! Keys with a capture in flight are skipped in every pass and picked up by
//! a later sweep. Sweeps are triggered by the caller; nothing here runs on
//! its own schedule.

use std::collections::BTreeSet;
use std::fs;

use chrono::{DateTime, Utc};
use humansize::{format_size, DECIMAL};
use tracing::{debug, info};

use crate::store::{seconds, CacheKey, CacheStore, IndexEntry, OrphanRemoval};

/// Bytes per configured megabyte.
pub const BYTES_PER_MB: u64 = 1_000_000;

/// What a sweep did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CleanupReport {
    pub removed_by_age: usize,
    pub removed_by_size: usize,
    /// Incomplete or unreadable entries removed
    pub orphans_removed: usize,
    /// Leftover temp files from interrupted writes
    pub temp_files_removed: usize,
    /// Distinct keys left alone because a capture was running
    pub skipped_in_flight: usize,
    pub freed_bytes: u64,
    pub remaining_entries: usize,
    pub remaining_bytes: u64,
}

impl CleanupReport {
    /// Entries removed by the age and size passes.
    pub fn removed(&self) -> usize {
        self.removed_by_age + self.removed_by_size
    }

    /// Format a summary for display
    pub fn summary(&self) -> String {
        let mut summary = format!(
            "Removed {} thumbnail(s) ({} by age, {} by size), freed {}",
            self.removed(),
            self.removed_by_age,
            self.removed_by_size,
            format_size(self.freed_bytes, DECIMAL)
        );
        if self.orphans_removed > 0 || self.temp_files_removed > 0 {
            summary.push_str(&format!(
                "\n   Cleaned {} orphaned file(s), {} temp file(s)",
                self.orphans_removed, self.temp_files_removed
            ));
        }
        if self.skipped_in_flight > 0 {
            summary.push_str(&format!(
                "\n   Skipped {} window(s) being captured",
                self.skipped_in_flight
            ));
        }
        summary.push_str(&format!(
            "\n   Remaining: {} thumbnail(s), {}",
            self.remaining_entries,
            format_size(self.remaining_bytes, DECIMAL)
        ));
        summary
    }
}

/// Age and size ceilings for one sweep.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EvictionPolicy {
    pub max_age_seconds: u64,
    pub max_size_mb: u64,
}

impl EvictionPolicy {
    pub fn new(max_age_seconds: u64, max_size_mb: u64) -> Self {
        Self {
            max_age_seconds,
            max_size_mb,
        }
    }

    pub fn max_size_bytes(&self) -> u64 {
        self.max_size_mb.saturating_mul(BYTES_PER_MB)
    }

    /// Order entries for removal: oldest capture first, ties by key.
    pub fn eviction_order(entries: &mut [(CacheKey, IndexEntry)]) {
        entries.sort_by(|(a_key, a), (b_key, b)| {
            a.metadata
                .captured_at
                .cmp(&b.metadata.captured_at)
                .then_with(|| a_key.cmp(b_key))
        });
    }

    /// Run one sweep over `store` as of `now`.
    pub fn cleanup(&self, store: &CacheStore, now: DateTime<Utc>) -> CleanupReport {
        let mut report = CleanupReport::default();
        let mut skipped: BTreeSet<CacheKey> = BTreeSet::new();

        match store.scan() {
            Ok(scan) => {
                store.merge_scan(&scan);
                self.remove_orphans(store, &scan.orphans, &mut report, &mut skipped);
                self.remove_stale_temp_files(store, &scan.temp_files, &mut report);
            }
            Err(e) => debug!(error = %e, "cache directory scan failed"),
        }

        let mut entries = store.lock_index().snapshot();
        Self::eviction_order(&mut entries);

        let mut kept = Vec::with_capacity(entries.len());
        for (key, entry) in entries {
            if entry.metadata.is_fresh(now, self.max_age_seconds) {
                kept.push((key, entry));
                continue;
            }
            match store.evict(&key) {
                Ok(Some(freed)) => {
                    report.removed_by_age += 1;
                    report.freed_bytes += freed;
                }
                Ok(None) => {
                    skipped.insert(key.clone());
                    kept.push((key, entry));
                }
                Err(e) => debug!(key = %key, error = %e, "failed to evict thumbnail"),
            }
        }

        let limit = self.max_size_bytes();
        let mut total = store.lock_index().total_size();
        for (key, entry) in kept {
            if total <= limit {
                break;
            }
            match store.evict(&key) {
                Ok(Some(freed)) => {
                    report.removed_by_size += 1;
                    report.freed_bytes += freed;
                    total = total.saturating_sub(entry.size);
                }
                Ok(None) => {
                    skipped.insert(key);
                }
                Err(e) => debug!(key = %key, error = %e, "failed to evict thumbnail"),
            }
        }

        report.skipped_in_flight = skipped.len();
        {
            let index = store.lock_index();
            report.remaining_entries = index.len();
            report.remaining_bytes = index.total_size();
        }

        if report.removed() > 0 || report.orphans_removed > 0 {
            info!(
                by_age = report.removed_by_age,
                by_size = report.removed_by_size,
                orphans = report.orphans_removed,
                freed = report.freed_bytes,
                "thumbnail cache swept"
            );
        }
        report
    }

    fn remove_orphans(
        &self,
        store: &CacheStore,
        orphans: &[(CacheKey, std::path::PathBuf)],
        report: &mut CleanupReport,
        skipped: &mut BTreeSet<CacheKey>,
    ) {
        for (key, path) in orphans {
            match store.remove_orphan(key, path) {
                Ok(OrphanRemoval::Removed) => report.orphans_removed += 1,
                // A capture between its two renames looks like an orphan
                Ok(OrphanRemoval::InFlight) => {
                    skipped.insert(key.clone());
                }
                Ok(OrphanRemoval::Gone | OrphanRemoval::Completed) => {}
                Err(e) => debug!(path = %path.display(), error = %e, "failed to remove orphan"),
            }
        }
    }

    fn remove_stale_temp_files(
        &self,
        store: &CacheStore,
        temp_files: &[(std::path::PathBuf, DateTime<Utc>)],
        report: &mut CleanupReport,
    ) {
        // Modification times are wall clock, so age them against the wall clock
        let now = Utc::now();
        // Temp files carry no key; leave them alone while anything is being written
        if store.lock_index().in_flight_count() > 0 {
            return;
        }
        let max_age = seconds(self.max_age_seconds);
        for (path, modified) in temp_files {
            if now - *modified <= max_age {
                continue;
            }
            if fs::remove_file(path).is_ok() {
                report.temp_files_removed += 1;
            }
        }
    }
}
