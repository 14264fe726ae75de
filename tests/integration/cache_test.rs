//! Integration tests for the ThumbnailCache facade

use super::helpers::{epoch, request, FakeMode, FakePipeline, TestCache};

use std::fs;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use winthumb::{CacheSettings, CaptureRequest, Clock, ManualClock, Region, ThumbnailCache};

#[test]
fn sync_capture_is_readable_immediately() {
    let t = TestCache::new();
    assert!(t.capture("0x55d4"));

    let path = t.cache.get_thumbnail_path("0x55d4", 0).unwrap();
    assert!(path.is_file());
    assert!(path.starts_with(t.cache.cache_directory()));

    let metadata = t.cache.get_metadata("0x55d4").unwrap();
    assert_eq!(metadata.window_address, "0x55d4");
    assert_eq!(metadata.window_class, "kitty");
    assert_eq!(metadata.window_title, "~/src");
    assert_eq!(metadata.workspace_name, "1");
    assert_eq!(metadata.captured_at, epoch());
    assert_eq!((metadata.width, metadata.height), (320, 180));
}

#[test]
fn fresh_within_max_age_inclusive() {
    let t = TestCache::new();
    assert!(t.capture("0x1"));

    t.clock.advance_secs(300);
    assert!(t.cache.get_thumbnail_path("0x1", 300).is_some());
}

#[test]
fn stale_entry_is_a_miss_but_stays_on_disk() {
    let t = TestCache::new();
    assert!(t.capture("0x1"));
    let path = t.cache.get_thumbnail_path("0x1", 300).unwrap();

    t.clock.advance_secs(301);
    assert!(t.cache.get_thumbnail_path("0x1", 300).is_none());
    assert!(path.is_file());
    assert!(t.cache.get_metadata("0x1").is_some());
}

#[test]
fn unknown_address_is_a_miss() {
    let t = TestCache::new();
    assert!(t.cache.get_thumbnail_path("0xdead", 300).is_none());
    assert!(t.cache.get_metadata("0xdead").is_none());
}

#[test]
fn invalid_addresses_are_misses_not_errors() {
    let t = TestCache::new();
    assert!(t.cache.get_thumbnail_path("", 300).is_none());
    assert!(!t.cache.capture_window_sync(request("")));
    assert!(!t.cache.capture_window_sync(request(&"x".repeat(200))));
    assert_eq!(t.pipeline.calls(), 0);
}

#[test]
fn unavailable_tools_make_captures_no_ops() {
    let t = TestCache::with_pipeline(FakePipeline::unavailable());
    assert!(!t.cache.is_available());
    assert!(!t.cache.probe().is_complete());

    assert!(!t.cache.capture_window(request("0x1")));
    assert!(!t.cache.capture_window_sync(request("0x1")));
    assert!(t.cache.wait_for_idle(Duration::from_millis(10)));

    assert_eq!(t.pipeline.calls(), 0);
    assert!(t.cache.get_thumbnail_path("0x1", u64::MAX).is_none());
}

#[test]
fn unavailable_tools_still_serve_existing_entries() {
    let t = TestCache::new();
    assert!(t.capture("0x1"));

    let offline = ThumbnailCache::with_pipeline(
        CacheSettings::new(t.cache.cache_directory()),
        Arc::new(FakePipeline::unavailable()),
        t.clock.clone(),
    );
    assert!(!offline.is_available());
    assert!(offline.get_thumbnail_path("0x1", 300).is_some());
}

#[test]
fn unusable_directory_disables_the_cache() {
    let t = TestCache::new();
    let blocker = t.temp_dir.path().join("not-a-dir");
    fs::write(&blocker, b"file").unwrap();

    let cache = ThumbnailCache::with_pipeline(
        CacheSettings::new(blocker.join("thumbnails")),
        Arc::new(FakePipeline::new()),
        Arc::new(ManualClock::new(epoch())),
    );
    assert!(!cache.is_available());
    assert!(!cache.capture_window_sync(request("0x1")));
    assert!(cache.get_metadata("0x1").is_none());
    assert_eq!(cache.cleanup(0, 0).removed(), 0);
    assert_eq!(cache.stats().entries, 0);
}

#[test]
fn non_positive_region_never_reaches_the_pipeline() {
    let t = TestCache::new();
    for region in [
        Region::new(0, 0, 0, 100),
        Region::new(0, 0, 100, 0),
        Region::new(0, 0, -5, 100),
        Region::new(0, 0, 100, -5),
    ] {
        let req = CaptureRequest::new("0x1", region);
        assert!(!t.cache.capture_window(req.clone()));
        assert!(!t.cache.capture_window_sync(req));
    }
    t.wait_idle();

    assert_eq!(t.pipeline.calls(), 0);
    assert!(t.cache.get_metadata("0x1").is_none());
    assert_eq!(t.cache.stats().entries, 0);
}

#[test]
fn failed_captures_leave_no_entry() {
    let t = TestCache::new();
    for mode in [FakeMode::Fail, FakeMode::Empty, FakeMode::Garbage] {
        t.pipeline.set_mode(mode);
        assert!(!t.capture("0x1"), "{mode:?} should not be stored");
    }

    assert_eq!(t.pipeline.calls(), 3);
    assert!(t.cache.get_metadata("0x1").is_none());
    let leftovers = fs::read_dir(t.cache.cache_directory()).unwrap().count();
    assert_eq!(leftovers, 0);
}

#[test]
fn failed_recapture_keeps_previous_entry() {
    let t = TestCache::new();
    assert!(t.capture("0x1"));
    let before = t.cache.get_metadata("0x1").unwrap();

    t.clock.advance_secs(10);
    t.pipeline.set_mode(FakeMode::Fail);
    assert!(!t.capture("0x1"));

    assert_eq!(t.cache.get_metadata("0x1").unwrap(), before);
}

#[test]
fn recapture_overwrites_entry() {
    let t = TestCache::new();
    assert!(t.capture("0x1"));
    t.clock.advance_secs(60);
    assert!(t.cache.capture_window_sync(request("0x1").with_title("vim")));

    let metadata = t.cache.get_metadata("0x1").unwrap();
    assert_eq!(metadata.window_title, "vim");
    assert_eq!(metadata.captured_at, t.clock.now());
    assert_eq!(t.cache.stats().entries, 1);
}

#[test]
fn async_capture_lands_after_idle() {
    let t = TestCache::new();
    assert!(t.cache.capture_window(request("0x1")));
    t.wait_idle();

    assert!(t.cache.get_thumbnail_path("0x1", 300).is_some());
    assert!(!t.cache.is_capturing("0x1"));
}

#[test]
fn async_capture_does_not_block_the_caller() {
    let t = TestCache::new();
    t.pipeline.close_gate();

    assert!(t.cache.capture_window(request("0x1")));
    assert!(t.cache.is_capturing("0x1"));
    assert!(t.cache.get_metadata("0x1").is_none());

    t.pipeline.open_gate();
    t.wait_idle();
    assert!(t.cache.get_metadata("0x1").is_some());
}

#[test]
fn duplicate_async_request_is_skipped_while_in_flight() {
    let t = TestCache::new();
    t.pipeline.close_gate();

    assert!(t.cache.capture_window(request("0x1")));
    assert!(!t.cache.capture_window(request("0x1")));
    assert!(t.cache.capture_window(request("0x2")));

    t.pipeline.open_gate();
    t.wait_idle();
    assert_eq!(t.pipeline.calls(), 2);
}

#[test]
fn sync_capture_runs_even_when_async_is_in_flight() {
    let t = Arc::new(TestCache::new());
    t.pipeline.close_gate();
    assert!(t.cache.capture_window(request("0x1")));

    let worker = {
        let t = Arc::clone(&t);
        thread::spawn(move || t.cache.capture_window_sync(request("0x1")))
    };

    // Both captures reach the pipeline before the gate opens
    let deadline = Instant::now() + Duration::from_secs(5);
    while t.pipeline.calls() < 2 && Instant::now() < deadline {
        thread::sleep(Duration::from_millis(5));
    }
    assert_eq!(t.pipeline.calls(), 2);

    t.pipeline.open_gate();
    assert!(worker.join().unwrap());
    t.wait_idle();
    assert!(t.cache.get_metadata("0x1").is_some());
}

#[test]
fn full_queue_drops_requests_and_releases_them() {
    let temp_dir = tempfile::TempDir::new().unwrap();
    let pipeline = Arc::new(FakePipeline::new());
    let mut settings = CacheSettings::new(temp_dir.path());
    settings.workers = 1;
    settings.queue_capacity = 1;
    let cache = ThumbnailCache::with_pipeline(
        settings,
        pipeline.clone(),
        Arc::new(ManualClock::new(epoch())),
    );

    pipeline.close_gate();
    assert!(cache.capture_window(request("0x1")));
    // Wait for the worker to pick up the first job so the queue is empty
    let deadline = Instant::now() + Duration::from_secs(5);
    while pipeline.calls() < 1 && Instant::now() < deadline {
        thread::sleep(Duration::from_millis(5));
    }
    assert!(cache.capture_window(request("0x2")));
    assert!(!cache.capture_window(request("0x3")));
    assert!(!cache.is_capturing("0x3"));

    pipeline.open_gate();
    assert!(cache.wait_for_idle(Duration::from_secs(5)));
    assert!(cache.get_metadata("0x1").is_some());
    assert!(cache.get_metadata("0x2").is_some());
    assert!(cache.get_metadata("0x3").is_none());
}

#[test]
fn wait_for_idle_times_out_while_capture_blocks() {
    let t = TestCache::new();
    t.pipeline.close_gate();
    assert!(t.cache.capture_window(request("0x1")));

    assert!(!t.cache.wait_for_idle(Duration::from_millis(50)));

    t.pipeline.open_gate();
    t.wait_idle();
}

#[test]
fn addresses_with_path_characters_stay_inside_the_cache() {
    let t = TestCache::new();
    for address in ["../escape", "a/b", "A", "a", ".hidden", "0x55 d4"] {
        assert!(t.capture(address), "{address}");
    }

    assert_eq!(t.cache.stats().entries, 6);
    for address in ["../escape", "a/b", "A", "a", ".hidden", "0x55 d4"] {
        let path = t.cache.get_thumbnail_path(address, 300).unwrap();
        assert_eq!(path.parent().unwrap(), t.cache.cache_directory());
        assert_eq!(t.cache.get_metadata(address).unwrap().window_address, address);
    }
}

#[test]
fn stats_summary_mentions_directory() {
    let t = TestCache::new();
    assert!(t.capture("0x1"));

    let stats = t.cache.stats();
    assert_eq!(stats.entries, 1);
    assert!(stats.total_bytes > 0);
    assert_eq!(stats.in_flight, 0);
    assert!(stats
        .summary()
        .contains(&t.cache.cache_directory().display().to_string()));
}

#[test]
fn recapture_by_another_instance_is_seen() {
    let t = TestCache::new();
    let cli = t.reopen();
    assert!(t.cache.capture_window_sync(request("0x1").with_title("vim")));
    assert_eq!(t.cache.get_metadata("0x1").unwrap().window_title, "vim");

    t.clock.advance_secs(400);
    assert!(cli.capture_window_sync(request("0x1").with_title("cargo test")));

    assert!(t.cache.get_thumbnail_path("0x1", 300).is_some());
    let metadata = t.cache.get_metadata("0x1").unwrap();
    assert_eq!(metadata.window_title, "cargo test");
    assert_eq!(metadata.captured_at, epoch() + chrono::Duration::seconds(400));

    // The first instance's sweep keeps the newer capture
    let report = t.cache.cleanup(300, u64::MAX);
    assert_eq!(report.removed(), 0);
    assert!(t.cache.get_thumbnail_path("0x1", 300).is_some());
}
