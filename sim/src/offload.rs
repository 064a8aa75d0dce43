//! Worker pool for CPU-heavy kernels.
//!
//! Jobs are message-passing only: a payload goes in by value, a result comes
//! back through the job's own channel. Nothing is shared with the main step
//! besides the dispatch table.
//!
//! ## Dispatch
//! - An idle worker is handed the job immediately.
//! - Otherwise the job waits in a FIFO queue.
//! - A worker that finishes either takes the next queued job or returns
//!   itself to the idle stack.
//!
//! Completion order is unspecified. A panicking job resolves its own handle
//! with `OffloadError::WorkerFault`; the worker keeps serving.

use crate::config::OffloadConfig;
use crate::error::OffloadError;
use crossbeam_channel::{unbounded, Receiver, Sender, TryRecvError};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::thread::JoinHandle;
use tracing::{debug, warn};

type Kernel<P, R> = Arc<dyn Fn(P) -> R + Send + Sync>;

struct Job<P, R> {
    payload: P,
    reply: Sender<Result<R, OffloadError>>,
}

struct Dispatch<P, R> {
    idle: Vec<usize>,
    queue: VecDeque<Job<P, R>>,
}

/// Fixed-size pool running one kernel over submitted payloads.
pub struct OffloadPool<P, R> {
    dispatch: Arc<Mutex<Dispatch<P, R>>>,
    senders: Vec<Sender<Job<P, R>>>,
    workers: Vec<JoinHandle<()>>,
}

impl<P, R> OffloadPool<P, R>
where
    P: Send + 'static,
    R: Send + 'static,
{
    /// Start `workers` threads (at least one) running `kernel`.
    pub fn new<F>(workers: usize, kernel: F) -> Result<Self, OffloadError>
    where
        F: Fn(P) -> R + Send + Sync + 'static,
    {
        let count = workers.max(1);
        let kernel: Kernel<P, R> = Arc::new(kernel);
        let dispatch = Arc::new(Mutex::new(Dispatch {
            idle: (0..count).rev().collect(),
            queue: VecDeque::new(),
        }));

        let mut senders = Vec::with_capacity(count);
        let mut handles = Vec::with_capacity(count);
        for id in 0..count {
            let (tx, rx) = unbounded::<Job<P, R>>();
            let kernel = Arc::clone(&kernel);
            let dispatch = Arc::clone(&dispatch);
            let handle = std::thread::Builder::new()
                .name(format!("offload-{id}"))
                .spawn(move || worker_loop(id, rx, kernel, dispatch))
                .map_err(|e| OffloadError::Spawn(e.to_string()))?;
            senders.push(tx);
            handles.push(handle);
        }
        debug!(workers = count, "offload pool started");

        Ok(Self {
            dispatch,
            senders,
            workers: handles,
        })
    }

    /// Size the pool from configuration.
    pub fn from_config<F>(config: &OffloadConfig, kernel: F) -> Result<Self, OffloadError>
    where
        F: Fn(P) -> R + Send + Sync + 'static,
    {
        Self::new(config.worker_count(), kernel)
    }

    /// Queue a payload. Never blocks.
    pub fn submit(&self, payload: P) -> JobHandle<R> {
        let (reply, rx) = unbounded();
        let job = Job { payload, reply };

        let mut dispatch = self.dispatch.lock();
        match dispatch.idle.pop() {
            Some(worker) => {
                // A dead worker drops the job, which disconnects its handle.
                if self.senders[worker].send(job).is_err() {
                    warn!(worker, "offload worker unavailable");
                }
            }
            None => dispatch.queue.push_back(job),
        }
        JobHandle { rx, taken: false }
    }

    pub fn worker_count(&self) -> usize {
        self.senders.len()
    }

    pub fn idle_workers(&self) -> usize {
        self.dispatch.lock().idle.len()
    }

    pub fn queued(&self) -> usize {
        self.dispatch.lock().queue.len()
    }
}

fn worker_loop<P, R>(
    id: usize,
    rx: Receiver<Job<P, R>>,
    kernel: Kernel<P, R>,
    dispatch: Arc<Mutex<Dispatch<P, R>>>,
) {
    for first in rx.iter() {
        let mut job = first;
        loop {
            run_job(id, job, &kernel);
            let mut table = dispatch.lock();
            match table.queue.pop_front() {
                Some(next) => job = next,
                None => {
                    table.idle.push(id);
                    break;
                }
            }
        }
    }
    debug!(worker = id, "offload worker stopped");
}

fn run_job<P, R>(id: usize, job: Job<P, R>, kernel: &Kernel<P, R>) {
    let Job { payload, reply } = job;
    let result = catch_unwind(AssertUnwindSafe(|| kernel(payload))).map_err(|panic| {
        let message = panic
            .downcast_ref::<&str>()
            .map(|s| s.to_string())
            .or_else(|| panic.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "unknown panic".to_string());
        warn!(worker = id, %message, "offload job faulted");
        OffloadError::WorkerFault(message)
    });
    // The submitter may have dropped its handle.
    let _ = reply.send(result);
}

impl<P, R> Drop for OffloadPool<P, R> {
    fn drop(&mut self) {
        self.dispatch.lock().queue.clear();
        self.senders.clear();
        for handle in self.workers.drain(..) {
            let _ = handle.join();
        }
    }
}

/// Pending result of one submitted job.
pub struct JobHandle<R> {
    rx: Receiver<Result<R, OffloadError>>,
    taken: bool,
}

impl<R> JobHandle<R> {
    /// Non-blocking poll. Returns `Some` exactly once.
    pub fn try_take(&mut self) -> Option<Result<R, OffloadError>> {
        if self.taken {
            return None;
        }
        let result = match self.rx.try_recv() {
            Ok(result) => result,
            Err(TryRecvError::Empty) => return None,
            Err(TryRecvError::Disconnected) => Err(OffloadError::Disconnected),
        };
        self.taken = true;
        Some(result)
    }

    /// Block until the job resolves.
    pub fn wait(self) -> Result<R, OffloadError> {
        if self.taken {
            return Err(OffloadError::Disconnected);
        }
        self.rx.recv().map_err(|_| OffloadError::Disconnected)?
    }
}
