//! # Worker Pool
//!
//! Fixed-size pool of named OS threads executing blocking jobs (vision
//! encoding, generation calls) off the caller's thread.
//!
//! ## Overview
//!
//! - **Bounded**: exactly `size` threads share one crossbeam queue; extra
//!   jobs wait in FIFO order
//! - **Awaitable**: [`WorkerPool::submit`] returns a [`PendingResult`] backed
//!   by a `tokio::sync::oneshot` channel. It is a `Future` for async callers
//!   and offers a blocking [`PendingResult::wait`] for sync ones
//! - **Panic-isolated**: a panicking job drops its sender, which resolves the
//!   result to a `WorkerPool` error; the worker thread keeps serving the queue
//! - **Graceful shutdown**: dropping the pool lets queued jobs finish, then
//!   joins every thread
//!
//! ```text
//! submit ─▶ crossbeam queue ─▶ worker-0 ─┐
//!                           ├▶ worker-1 ─┼─▶ oneshot::Sender ─▶ PendingResult (.await / wait())
//!                           └▶ worker-N ─┘
//! ```
//!
//! ## Example
//!
//! ```rust
//! use adaptok::core::worker_pool::WorkerPool;
//!
//! let pool = WorkerPool::new(2).unwrap();
//! let pending = pool.submit(|| 6 * 7);
//! assert_eq!(pending.wait().unwrap(), 42);
//! ```

use std::future::Future;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::pin::Pin;
use std::task::{Context, Poll};
use std::thread::{self, JoinHandle};

use crossbeam_channel::{Receiver, Sender, unbounded};
use tokio::sync::oneshot;
use tracing::{debug, warn};

use crate::error::{PipelineError, PipelineResult};

type Job = Box<dyn FnOnce() + Send + 'static>;

/// Result of a job submitted to a [`WorkerPool`].
///
/// Await it from async code or call [`wait`](Self::wait) from sync code.
/// Dropping it does not cancel the job.
pub struct PendingResult<T> {
    receiver: oneshot::Receiver<T>,
}

fn abandoned() -> PipelineError {
    PipelineError::worker_pool("job panicked or was dropped before completing")
}

impl<T> PendingResult<T> {
    /// Block the current thread until the job finishes.
    ///
    /// Safe to call from inside an async runtime; it parks only the calling
    /// thread.
    pub fn wait(self) -> PipelineResult<T> {
        futures::executor::block_on(self)
    }

    /// Already-resolved result, for work finished without touching a pool.
    pub fn ready(value: T) -> Self {
        let (tx, receiver) = oneshot::channel();
        let _ = tx.send(value);
        Self { receiver }
    }
}

impl<T> Future for PendingResult<T> {
    type Output = PipelineResult<T>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.get_mut().receiver)
            .poll(cx)
            .map(|result| result.map_err(|_| abandoned()))
    }
}

/// Fixed-size thread pool.
pub struct WorkerPool {
    sender: Option<Sender<Job>>,
    workers: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    /// Spawn `size` worker threads named `adaptok-worker-{i}`.
    ///
    /// `size == 0` is a `Configuration` error.
    pub fn new(size: usize) -> PipelineResult<Self> {
        if size == 0 {
            return Err(PipelineError::config(
                "num_workers",
                "0",
                "worker pool needs at least 1 thread",
            ));
        }

        let (sender, receiver) = unbounded::<Job>();
        let mut workers = Vec::with_capacity(size);
        for id in 0..size {
            let receiver = receiver.clone();
            let handle = thread::Builder::new()
                .name(format!("adaptok-worker-{}", id))
                .spawn(move || worker_loop(id, receiver))
                .map_err(|e| PipelineError::io("spawn worker thread", None, e))?;
            workers.push(handle);
        }
        debug!(size, "worker pool started");

        Ok(Self {
            sender: Some(sender),
            workers,
        })
    }

    /// Number of worker threads.
    pub fn size(&self) -> usize {
        self.workers.len()
    }

    /// Queue `job` and return a handle to its result.
    pub fn submit<T, F>(&self, job: F) -> PendingResult<T>
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        let (tx, receiver) = oneshot::channel();
        let boxed: Job = Box::new(move || {
            // The receiver may be gone (caller timed out); the result is discarded.
            let _ = tx.send(job());
        });
        if let Some(sender) = &self.sender {
            // A send error hands the job back and drops it, abandoning the result.
            let _ = sender.send(boxed);
        }
        PendingResult { receiver }
    }
}

fn worker_loop(id: usize, receiver: Receiver<Job>) {
    for job in receiver.iter() {
        if catch_unwind(AssertUnwindSafe(job)).is_err() {
            warn!(worker = id, "job panicked");
        }
    }
    debug!(worker = id, "worker exiting");
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        drop(self.sender.take());
        for handle in self.workers.drain(..) {
            if handle.join().is_err() {
                warn!("worker thread panicked during shutdown");
            }
        }
    }
}
