//! Background worker pool for asynchronous captures
//!
//! Workers pull jobs from a shared bounded channel and run the capture
//! handler for each one. They exit when the channel is closed, i.e. when
//! the coordinator owning the sender is dropped.

use std::sync::mpsc::Receiver;
use std::sync::{Arc, Mutex};
use std::thread;

use tracing::warn;

/// Default number of capture threads in the pool
pub const DEFAULT_POOL_SIZE: usize = 2;

/// A thread-safe, shared job handler.
pub type SharedHandler<J> = Arc<dyn Fn(J) + Send + Sync>;

/// Spawn a pool of worker threads that process jobs in parallel.
///
/// Returns the number of threads actually started.
pub fn spawn_worker_pool<J>(
    num_threads: usize,
    job_rx: Receiver<J>,
    handler: SharedHandler<J>,
) -> usize
where
    J: Send + 'static,
{
    let job_rx = Arc::new(Mutex::new(job_rx));
    let mut started = 0;

    for id in 0..num_threads {
        let rx = Arc::clone(&job_rx);
        let handler = Arc::clone(&handler);

        let spawned = thread::Builder::new()
            .name(format!("winthumb-capture-{id}"))
            .spawn(move || loop {
                let job = {
                    let rx = rx.lock().unwrap_or_else(|e| e.into_inner());
                    match rx.recv() {
                        Ok(job) => job,
                        Err(_) => return, // channel closed
                    }
                };
                handler(job);
            });

        match spawned {
            Ok(_) => started += 1,
            Err(e) => warn!(error = %e, "failed to start capture worker"),
        }
    }

    started
}
