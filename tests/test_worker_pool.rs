//! Worker pool: bounded concurrency, panics, blocking and async waits.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;
use std::time::Duration;

use adaptok::core::worker_pool::WorkerPool;
use adaptok::error::PipelineError;

#[test]
fn concurrency_never_exceeds_pool_size() {
    let pool = WorkerPool::new(2).unwrap();
    let running = Arc::new(AtomicUsize::new(0));
    let peak = Arc::new(AtomicUsize::new(0));

    let pending: Vec<_> = (0..8)
        .map(|i| {
            let running = Arc::clone(&running);
            let peak = Arc::clone(&peak);
            pool.submit(move || {
                let now = running.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now, Ordering::SeqCst);
                thread::sleep(Duration::from_millis(20));
                running.fetch_sub(1, Ordering::SeqCst);
                i * 10
            })
        })
        .collect();

    let results: Vec<_> = pending.into_iter().map(|p| p.wait().unwrap()).collect();
    assert_eq!(results, (0..8).map(|i| i * 10).collect::<Vec<_>>());
    assert!(peak.load(Ordering::SeqCst) <= 2);
}

#[test]
fn panicking_job_reports_worker_error_and_pool_survives() {
    let pool = WorkerPool::new(1).unwrap();

    let crashed = pool.submit(|| -> u32 { panic!("job blew up") });
    assert!(matches!(
        crashed.wait(),
        Err(PipelineError::WorkerPool { .. })
    ));

    assert_eq!(pool.submit(|| 5).wait().unwrap(), 5);
}

#[test]
fn zero_workers_is_a_configuration_error() {
    assert!(matches!(
        WorkerPool::new(0),
        Err(PipelineError::Configuration { .. })
    ));
}

#[tokio::test]
async fn results_can_be_awaited() {
    let pool = WorkerPool::new(3).unwrap();
    let a = pool.submit(|| {
        thread::sleep(Duration::from_millis(30));
        "slow"
    });
    let b = pool.submit(|| "fast");

    assert_eq!(b.await.unwrap(), "fast");
    assert_eq!(a.await.unwrap(), "slow");
}

#[tokio::test]
async fn blocking_wait_inside_runtime() {
    let pool = WorkerPool::new(1).unwrap();
    let pending = pool.submit(|| 21 * 2);
    assert_eq!(pending.wait().unwrap(), 42);
}

#[test]
fn drop_finishes_queued_jobs() {
    let done = Arc::new(AtomicUsize::new(0));
    {
        let pool = WorkerPool::new(2).unwrap();
        for _ in 0..6 {
            let done = Arc::clone(&done);
            pool.submit(move || {
                thread::sleep(Duration::from_millis(5));
                done.fetch_add(1, Ordering::SeqCst);
            });
        }
    }
    assert_eq!(done.load(Ordering::SeqCst), 6);
}
