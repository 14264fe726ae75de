//! Integration tests for age and size eviction

use super::helpers::{epoch, request, TestCache};

use std::fs;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::SystemTime;

use chrono::{Duration, Utc};
use tempfile::TempDir;

use winthumb::{
    CacheKey, CacheSettings, CacheStore, Clock, EvictionPolicy, ManualClock, ThumbnailCache,
    ThumbnailMetadata,
};

use super::helpers::FakePipeline;

const MB: usize = 1_000_000;

/// Seed `dir` with entries of `size` bytes captured `offset` seconds after
/// the epoch.
fn seed(dir: &Path, entries: &[(&str, i64, usize)]) {
    let store = CacheStore::open(dir).unwrap();
    for (address, offset, size) in entries {
        let metadata = ThumbnailMetadata {
            window_address: address.to_string(),
            window_class: String::new(),
            window_title: String::new(),
            workspace_name: String::new(),
            captured_at: epoch() + Duration::seconds(*offset),
            width: 320,
            height: 180,
        };
        store
            .write(&CacheKey::new(*address).unwrap(), &vec![7u8; *size], &metadata)
            .unwrap();
    }
}

fn open_cache(dir: &Path, clock: Arc<ManualClock>) -> (Arc<FakePipeline>, ThumbnailCache) {
    let pipeline = Arc::new(FakePipeline::new());
    let cache = ThumbnailCache::with_pipeline(CacheSettings::new(dir), pipeline.clone(), clock);
    (pipeline, cache)
}

/// Push a file's modification time into the past.
fn backdate(path: &Path, secs: u64) {
    let when = SystemTime::now() - std::time::Duration::from_secs(secs);
    fs::File::options()
        .write(true)
        .open(path)
        .unwrap()
        .set_modified(when)
        .unwrap();
}

fn present(cache: &ThumbnailCache, address: &str) -> bool {
    cache.get_metadata(address).is_some()
}

#[test]
fn age_pass_removes_only_entries_past_the_ceiling() {
    let t = TestCache::new();
    assert!(t.capture("0x1"));
    t.clock.advance_secs(100);
    assert!(t.capture("0x2"));
    t.clock.advance_secs(100);
    assert!(t.capture("0x3"));

    let report = t.cache.cleanup(150, u64::MAX);

    assert_eq!(report.removed_by_age, 1);
    assert_eq!(report.removed_by_size, 0);
    assert!(!present(&t.cache, "0x1"));
    assert!(present(&t.cache, "0x2"));
    assert!(present(&t.cache, "0x3"));
    assert_eq!(report.remaining_entries, 2);
}

#[test]
fn entry_exactly_at_the_ceiling_is_kept() {
    let t = TestCache::new();
    assert!(t.capture("0x1"));
    t.clock.advance_secs(150);

    assert_eq!(t.cache.cleanup(150, u64::MAX).removed(), 0);
    assert!(present(&t.cache, "0x1"));
}

#[test]
fn size_pass_removes_oldest_first_until_under_budget() {
    let temp_dir = TempDir::new().unwrap();
    seed(
        temp_dir.path(),
        &[("0xa", 30, 400_000), ("0xb", 10, 400_000), ("0xc", 20, 400_000)],
    );
    let clock = Arc::new(ManualClock::new(epoch() + Duration::seconds(60)));
    let (_pipeline, cache) = open_cache(temp_dir.path(), clock);

    let report = cache.cleanup(u64::MAX, 1);

    assert_eq!(report.removed_by_size, 1);
    assert_eq!(report.freed_bytes, 400_000);
    assert!(!present(&cache, "0xb"));
    assert!(present(&cache, "0xc"));
    assert!(present(&cache, "0xa"));
    assert!(report.remaining_bytes <= MB as u64);
}

#[test]
fn size_pass_keeps_removing_until_it_fits() {
    let temp_dir = TempDir::new().unwrap();
    seed(
        temp_dir.path(),
        &[("0x1", 1, 600_000), ("0x2", 2, 600_000), ("0x3", 3, 600_000)],
    );
    let clock = Arc::new(ManualClock::new(epoch() + Duration::seconds(60)));
    let (_pipeline, cache) = open_cache(temp_dir.path(), clock);

    let report = cache.cleanup(u64::MAX, 1);

    assert_eq!(report.removed_by_size, 2);
    assert!(present(&cache, "0x3"));
    assert_eq!(cache.stats().total_bytes, 600_000);
}

#[test]
fn equal_timestamps_are_evicted_in_key_order() {
    let temp_dir = TempDir::new().unwrap();
    seed(
        temp_dir.path(),
        &[("0xb", 5, 600_000), ("0xa", 5, 600_000)],
    );
    let clock = Arc::new(ManualClock::new(epoch() + Duration::seconds(60)));
    let (_pipeline, cache) = open_cache(temp_dir.path(), clock);

    cache.cleanup(u64::MAX, 1);

    assert!(!present(&cache, "0xa"));
    assert!(present(&cache, "0xb"));
}

#[test]
fn policy_runs_directly_against_a_store() {
    let temp_dir = TempDir::new().unwrap();
    seed(
        temp_dir.path(),
        &[("0x1", 0, 10), ("0x2", 100, 10), ("0x3", 200, 10)],
    );
    let store = CacheStore::open(temp_dir.path()).unwrap();

    let report = EvictionPolicy::new(150, u64::MAX).cleanup(&store, epoch() + Duration::seconds(200));

    assert_eq!(report.removed_by_age, 1);
    assert_eq!(store.len(), 2);
}

#[test]
fn in_flight_entry_survives_age_pass() {
    let t = TestCache::new();
    assert!(t.capture("0x1"));
    assert!(t.capture("0x2"));
    t.clock.advance_secs(1000);

    t.pipeline.close_gate();
    assert!(t.cache.capture_window(request("0x1")));

    let report = t.cache.cleanup(10, u64::MAX);
    assert_eq!(report.removed_by_age, 1);
    assert_eq!(report.skipped_in_flight, 1);
    assert!(present(&t.cache, "0x1"));
    assert!(!present(&t.cache, "0x2"));

    t.pipeline.open_gate();
    t.wait_idle();

    // The recapture is fresh, so the next sweep keeps it too
    assert_eq!(t.cache.cleanup(10, u64::MAX).removed(), 0);
    assert!(t.cache.get_thumbnail_path("0x1", 10).is_some());
}

#[test]
fn in_flight_entry_survives_size_pass() {
    let temp_dir = TempDir::new().unwrap();
    seed(
        temp_dir.path(),
        &[("0x1", 1, 600_000), ("0x2", 2, 600_000), ("0x3", 3, 600_000)],
    );
    let clock = Arc::new(ManualClock::new(epoch() + Duration::seconds(60)));
    let (pipeline, cache) = open_cache(temp_dir.path(), clock);

    pipeline.close_gate();
    assert!(cache.capture_window(request("0x1")));

    let report = cache.cleanup(u64::MAX, 1);
    assert_eq!(report.removed_by_size, 2);
    assert_eq!(report.skipped_in_flight, 1);
    assert!(present(&cache, "0x1"));
    assert!(!present(&cache, "0x2"));
    assert!(!present(&cache, "0x3"));

    pipeline.open_gate();
    assert!(cache.wait_for_idle(std::time::Duration::from_secs(5)));
}

#[test]
fn sweep_removes_orphaned_files() {
    let t = TestCache::new();
    assert!(t.capture("0x1"));
    assert!(t.capture("0x2"));
    assert!(t.capture("0x3"));

    let store = CacheStore::open(t.cache.cache_directory()).unwrap();
    let k2 = CacheKey::new("0x2").unwrap();
    let k3 = CacheKey::new("0x3").unwrap();
    fs::remove_file(store.metadata_path_for(&k2)).unwrap();
    fs::write(store.metadata_path_for(&k3), b"garbage").unwrap();
    let extra_sidecar = store.metadata_path_for(&CacheKey::new("0x4").unwrap());
    fs::write(&extra_sidecar, b"{}").unwrap();

    let cache = t.reopen();
    let report = cache.cleanup(u64::MAX, u64::MAX);

    assert_eq!(report.orphans_removed, 4);
    assert_eq!(report.removed(), 0);
    assert!(present(&cache, "0x1"));
    assert!(!store.image_path_for(&k2).exists());
    assert!(!store.image_path_for(&k3).exists());
    assert!(!store.metadata_path_for(&k3).exists());
    assert!(!extra_sidecar.exists());
    assert_eq!(report.remaining_entries, 1);
}

#[test]
fn sweep_removes_stale_temp_files_only() {
    let temp_dir = TempDir::new().unwrap();
    let dir = temp_dir.path();
    fs::create_dir_all(dir).unwrap();
    let temp = dir.join(".winthumb-abc123.tmp");
    fs::write(&temp, b"partial").unwrap();

    // Just written: younger than the ceiling
    let clock = Arc::new(ManualClock::new(Utc::now()));
    let (_pipeline, cache) = open_cache(dir, clock.clone());
    assert_eq!(cache.cleanup(3600, u64::MAX).temp_files_removed, 0);
    assert!(temp.exists());

    // Advancing the injected clock does not age files on disk
    clock.set(Utc::now() + Duration::hours(2));
    assert_eq!(cache.cleanup(3600, u64::MAX).temp_files_removed, 0);
    assert!(temp.exists());

    backdate(&temp, 2 * 3600);
    assert_eq!(cache.cleanup(3600, u64::MAX).temp_files_removed, 1);
    assert!(!temp.exists());
}

#[test]
fn temp_files_are_left_alone_while_capturing() {
    let temp_dir = TempDir::new().unwrap();
    let dir = temp_dir.path();
    let temp = dir.join(".winthumb-abc123.tmp");
    let clock = Arc::new(ManualClock::new(Utc::now() + Duration::hours(2)));
    let (pipeline, cache) = open_cache(dir, clock);
    fs::write(&temp, b"partial").unwrap();
    backdate(&temp, 2 * 3600);

    pipeline.close_gate();
    assert!(cache.capture_window(request("0x1")));
    assert_eq!(cache.cleanup(3600, u64::MAX).temp_files_removed, 0);
    assert!(temp.exists());

    pipeline.open_gate();
    assert!(cache.wait_for_idle(std::time::Duration::from_secs(5)));
}

#[test]
fn entries_from_a_previous_process_are_evicted() {
    let t = TestCache::new();
    assert!(t.capture("0x1"));
    t.clock.advance_secs(500);

    let cache = t.reopen();
    let report = cache.cleanup(300, u64::MAX);
    assert_eq!(report.removed_by_age, 1);
    assert!(!present(&cache, "0x1"));
    assert!(!present(&t.cache, "0x1"));
}

#[test]
fn cleanup_never_touches_clock_and_is_repeatable() {
    let t = TestCache::new();
    assert!(t.capture("0x1"));
    let now = t.clock.now();

    let first = t.cache.cleanup(300, 100);
    let second = t.cache.cleanup(300, 100);
    assert_eq!(first, second);
    assert_eq!(t.clock.now(), now);
}

#[test]
fn concurrent_sweeps_keep_completed_captures() {
    let t = TestCache::new();
    let addresses: Vec<String> = (0..300).map(|i| format!("0x{i:x}")).collect();
    let done = AtomicBool::new(false);

    let captured = thread::scope(|s| {
        s.spawn(|| {
            while !done.load(Ordering::SeqCst) {
                t.cache.cleanup(u64::MAX, u64::MAX);
            }
        });
        let captured = addresses.iter().filter(|a| t.capture(a)).count();
        done.store(true, Ordering::SeqCst);
        captured
    });
    assert_eq!(captured, addresses.len());

    let report = t.cache.cleanup(u64::MAX, u64::MAX);
    assert_eq!(report.remaining_entries, addresses.len());
    for address in &addresses {
        assert!(t.cache.get_metadata(address).is_some(), "{address} was lost");
    }
}

#[test]
fn entries_evicted_by_another_instance_leave_the_index() {
    let t = TestCache::new();
    assert!(t.capture("0x1"));
    assert!(t.capture("0x2"));
    t.clock.advance_secs(500);

    let other = t.reopen();
    assert_eq!(other.cleanup(300, u64::MAX).removed_by_age, 2);

    let report = t.cache.cleanup(300, u64::MAX);
    assert_eq!(report.removed(), 0);
    assert_eq!(report.remaining_entries, 0);
    assert_eq!(t.cache.stats().entries, 0);
}
