//! Capture orchestration.
//!
//! Turns a capture request into a stored cache entry, either on a worker
//! thread (`capture_window`) or on the caller's thread
//! (`capture_window_sync`). Failures drop the request; nothing is written
//! unless the pipeline produced a decodable, non-empty image.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{sync_channel, SyncSender, TrySendError};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use tracing::{debug, warn};

use super::worker::spawn_worker_pool;
use super::{CapturePipeline, CaptureRequest, ThumbnailSize};
use crate::clock::Clock;
use crate::error::{CacheError, CacheResult};
use crate::store::{CacheKey, CacheStore, ThumbnailMetadata};

/// How often `wait_for_idle` re-checks the in-flight set.
const IDLE_POLL: Duration = Duration::from_millis(10);

struct CaptureJob {
    key: CacheKey,
    request: CaptureRequest,
}

/// Marks a key in flight for as long as it lives.
struct InFlight<'a> {
    store: &'a CacheStore,
    key: &'a CacheKey,
}

impl<'a> InFlight<'a> {
    /// Take over a mark placed when the job was queued.
    fn adopt(store: &'a CacheStore, key: &'a CacheKey) -> Self {
        Self { store, key }
    }

    fn begin(store: &'a CacheStore, key: &'a CacheKey) -> Self {
        store.lock_index().begin_capture(key);
        Self { store, key }
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.store.lock_index().end_capture(self.key);
    }
}

/// State shared between the coordinator and its workers.
struct Shared {
    store: Arc<CacheStore>,
    pipeline: Arc<dyn CapturePipeline>,
    clock: Arc<dyn Clock>,
    size: ThumbnailSize,
    /// Set after the first storage failure has been reported
    storage_warned: AtomicBool,
}

impl Shared {
    fn run(&self, key: &CacheKey, request: &CaptureRequest) -> CacheResult<()> {
        request.region.validate()?;

        let captured_at = self.clock.now();
        let bytes = self.pipeline.capture(&request.region, self.size)?;
        if bytes.is_empty() {
            return Err(CacheError::EmptyImage);
        }
        let image = image::load_from_memory(&bytes)?;

        let metadata = ThumbnailMetadata {
            window_address: key.as_str().to_string(),
            window_class: request.class.clone(),
            window_title: request.title.clone(),
            workspace_name: request.workspace.clone(),
            captured_at,
            width: image.width(),
            height: image.height(),
        };
        self.store.write(key, &bytes, &metadata)
    }

    fn report(&self, key: &CacheKey, err: &CacheError) {
        if err.is_storage() && !self.storage_warned.swap(true, Ordering::Relaxed) {
            warn!(
                key = %key,
                dir = %self.store.cache_directory().display(),
                error = %err,
                "cannot write thumbnail cache"
            );
        } else {
            debug!(key = %key, error = %err, "capture dropped");
        }
    }
}

/// Runs captures and commits their results to the store.
pub struct CaptureCoordinator {
    shared: Arc<Shared>,
    queue: SyncSender<CaptureJob>,
}

impl CaptureCoordinator {
    /// Start `workers` capture threads behind a queue of `queue_capacity`.
    pub fn new(
        store: Arc<CacheStore>,
        pipeline: Arc<dyn CapturePipeline>,
        clock: Arc<dyn Clock>,
        size: ThumbnailSize,
        workers: usize,
        queue_capacity: usize,
    ) -> Self {
        let shared = Arc::new(Shared {
            store,
            pipeline,
            clock,
            size,
            storage_warned: AtomicBool::new(false),
        });

        let (queue, job_rx) = sync_channel::<CaptureJob>(queue_capacity.max(1));
        let worker_shared = Arc::clone(&shared);
        spawn_worker_pool(
            workers.max(1),
            job_rx,
            Arc::new(move |job: CaptureJob| {
                let _in_flight = InFlight::adopt(&worker_shared.store, &job.key);
                if let Err(e) = worker_shared.run(&job.key, &job.request) {
                    worker_shared.report(&job.key, &e);
                }
            }),
        );

        Self { shared, queue }
    }

    /// Queue a capture without blocking.
    ///
    /// Returns `false` when the request was dropped: invalid key or region,
    /// a capture for the same window already running, or a full queue.
    pub fn capture_window(&self, request: CaptureRequest) -> bool {
        let key = match self.admit(&request) {
            Ok(key) => key,
            Err(e) => {
                debug!(address = %request.address, error = %e, "capture rejected");
                return false;
            }
        };

        if !self.shared.store.lock_index().try_begin_capture(&key) {
            debug!(key = %key, "capture already running");
            return false;
        }

        match self.queue.try_send(CaptureJob { key, request }) {
            Ok(()) => true,
            Err(TrySendError::Full(job)) | Err(TrySendError::Disconnected(job)) => {
                self.shared.store.lock_index().end_capture(&job.key);
                self.shared.report(&job.key, &CacheError::QueueFull);
                false
            }
        }
    }

    /// Capture on the calling thread and return once the entry is stored.
    ///
    /// Always runs, even if an async capture for the same window is in
    /// flight. Returns whether a fresh entry was written.
    pub fn capture_window_sync(&self, request: CaptureRequest) -> bool {
        let key = match self.admit(&request) {
            Ok(key) => key,
            Err(e) => {
                debug!(address = %request.address, error = %e, "capture rejected");
                return false;
            }
        };

        let _in_flight = InFlight::begin(&self.shared.store, &key);
        match self.shared.run(&key, &request) {
            Ok(()) => true,
            Err(e) => {
                self.shared.report(&key, &e);
                false
            }
        }
    }

    /// Block until no capture is running, or `timeout` elapses.
    pub fn wait_for_idle(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        loop {
            if self.shared.store.lock_index().in_flight_count() == 0 {
                return true;
            }
            if Instant::now() >= deadline {
                return false;
            }
            thread::sleep(IDLE_POLL);
        }
    }

    fn admit(&self, request: &CaptureRequest) -> CacheResult<CacheKey> {
        let key = CacheKey::new(request.address.clone())?;
        request.region.validate()?;
        Ok(key)
    }
}
