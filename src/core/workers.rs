//! Background thread pool for image fetches.
//!
//! Uses crossbeam work-stealing deques:
//! - Jobs are pushed to a global injector
//! - Each worker drains its own deque, then the injector, then steals from peers
//!
//! Fetch jobs never touch cache state directly. They send their outcome back
//! to the owning loop over a channel (see `ImageCache::pump`).

use crossbeam::deque::{Injector, Stealer, Worker};
use log::trace;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use crate::entities::FetchExecutor;

type Job = Box<dyn FnOnce() + Send + 'static>;

/// Idle poll interval when no work is available
const IDLE_SLEEP: Duration = Duration::from_millis(1);

/// Upper bound on how long `Drop` waits for workers to finish
const SHUTDOWN_TIMEOUT: Duration = Duration::from_millis(500);

/// Fetch worker pool with work-stealing.
pub struct Workers {
    injector: Arc<Injector<Job>>,
    handles: Vec<thread::JoinHandle<()>>,
    shutdown: Arc<AtomicBool>,
}

impl std::fmt::Debug for Workers {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Workers")
            .field("threads", &self.handles.len())
            .finish()
    }
}

impl Workers {
    /// Thread count used when none is configured: 3/4 of the cores, at least 1.
    pub fn default_threads() -> usize {
        (num_cpus::get() * 3 / 4).max(1)
    }

    /// Spawn `num_threads` workers (at least one).
    pub fn new(num_threads: usize) -> Self {
        let num_threads = num_threads.max(1);
        let injector: Arc<Injector<Job>> = Arc::new(Injector::new());
        let shutdown = Arc::new(AtomicBool::new(false));

        let locals: Vec<Worker<Job>> = (0..num_threads).map(|_| Worker::new_fifo()).collect();
        let stealers: Vec<Stealer<Job>> = locals.iter().map(|w| w.stealer()).collect();

        let mut handles = Vec::with_capacity(num_threads);
        for (worker_id, local) in locals.into_iter().enumerate() {
            let injector = Arc::clone(&injector);
            let shutdown = Arc::clone(&shutdown);
            let stealers = stealers.clone();

            let spawned = thread::Builder::new()
                .name(format!("bannerloop-fetch-{}", worker_id))
                .spawn(move || run_worker(worker_id, local, &injector, &stealers, &shutdown));

            match spawned {
                Ok(handle) => handles.push(handle),
                Err(e) => log::error!("Failed to spawn fetch worker {}: {}", worker_id, e),
            }
        }

        trace!("Workers initialized: {} threads (work-stealing)", handles.len());

        Self {
            injector,
            handles,
            shutdown,
        }
    }

    /// Number of live worker threads
    pub fn threads(&self) -> usize {
        self.handles.len()
    }

    /// Queue a job. Runs asynchronously, no return value.
    pub fn execute<F>(&self, f: F)
    where
        F: FnOnce() + Send + 'static,
    {
        self.injector.push(Box::new(f));
    }
}

fn run_worker(
    worker_id: usize,
    local: Worker<Job>,
    injector: &Injector<Job>,
    stealers: &[Stealer<Job>],
    shutdown: &AtomicBool,
) {
    trace!("Fetch worker {} started", worker_id);
    loop {
        let job = local.pop().or_else(|| {
            injector
                .steal_batch_and_pop(&local)
                .success()
                .or_else(|| stealers.iter().find_map(|s| s.steal().success()))
        });

        match job {
            Some(job) => job(),
            None if shutdown.load(Ordering::Relaxed) => break,
            None => thread::sleep(IDLE_SLEEP),
        }
    }
    trace!("Fetch worker {} stopped", worker_id);
}

impl Drop for Workers {
    fn drop(&mut self) {
        let num_threads = self.handles.len();
        trace!("Workers shutting down ({} threads)...", num_threads);

        self.shutdown.store(true, Ordering::SeqCst);

        // Fetches may block on I/O; don't hang the host on exit.
        let deadline = Instant::now() + SHUTDOWN_TIMEOUT;
        for handle in std::mem::take(&mut self.handles) {
            while !handle.is_finished() {
                if Instant::now() >= deadline {
                    trace!("Shutdown timeout reached, detaching remaining workers");
                    return;
                }
                thread::sleep(IDLE_SLEEP);
            }
            let _ = handle.join();
        }

        trace!("All {} workers stopped", num_threads);
    }
}

impl FetchExecutor for Workers {
    fn execute(&self, job: Box<dyn FnOnce() + Send + 'static>) {
        Workers::execute(self, job)
    }
}

/// Runs every job immediately on the calling thread.
///
/// For hosts whose fetches are already cheap and synchronous (in-memory
/// assets). Results still reach waiters only through `ImageCache::pump`.
#[derive(Debug, Default, Clone, Copy)]
pub struct InlineExecutor;

impl FetchExecutor for InlineExecutor {
    fn execute(&self, job: Box<dyn FnOnce() + Send + 'static>) {
        job()
    }
}

/// Queues jobs until the test runs them explicitly.
#[cfg(test)]
#[derive(Default, Clone)]
pub(crate) struct ManualExecutor {
    jobs: Arc<std::sync::Mutex<std::collections::VecDeque<Job>>>,
}

#[cfg(test)]
impl ManualExecutor {
    pub(crate) fn pending(&self) -> usize {
        self.jobs.lock().unwrap().len()
    }

    /// Run queued jobs in FIFO order, returns how many ran.
    pub(crate) fn run_all(&self) -> usize {
        let mut ran = 0;
        loop {
            let job = self.jobs.lock().unwrap().pop_front();
            match job {
                Some(job) => {
                    job();
                    ran += 1;
                }
                None => return ran,
            }
        }
    }
}

#[cfg(test)]
impl FetchExecutor for ManualExecutor {
    fn execute(&self, job: Box<dyn FnOnce() + Send + 'static>) {
        self.jobs.lock().unwrap().push_back(job);
    }
}
