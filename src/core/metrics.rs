//! # Pipeline Metrics
//!
//! Lock-free counters updated by the orchestrator from any worker thread.
//! [`PipelineMetrics::snapshot`] gives a consistent-enough serializable copy;
//! [`PipelineMetrics::report`] renders it as text.
//!
//! ## Key Metrics
//!
//! - **Requests**: received, succeeded, served from cache
//! - **Failures**: by error kind (bad input, backend, configuration, internal)
//! - **Reduction**: frames seen vs kept, visual tokens before vs after
//! - **Latency**: cumulative end-to-end microseconds of computed responses

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use serde::Serialize;

use crate::error::ErrorKind;

/// Counters shared across worker threads.
#[derive(Debug, Default)]
pub struct PipelineMetrics {
    requests: AtomicU64,
    succeeded: AtomicU64,
    cache_hits: AtomicU64,
    bad_input: AtomicU64,
    backend_failures: AtomicU64,
    configuration_failures: AtomicU64,
    internal_failures: AtomicU64,
    frames_seen: AtomicU64,
    frames_kept: AtomicU64,
    tokens_before: AtomicU64,
    tokens_after: AtomicU64,
    inference_micros: AtomicU64,
}

/// Point-in-time copy of [`PipelineMetrics`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct MetricsSnapshot {
    pub requests: u64,
    pub succeeded: u64,
    pub cache_hits: u64,
    pub bad_input: u64,
    pub backend_failures: u64,
    pub configuration_failures: u64,
    pub internal_failures: u64,
    pub frames_seen: u64,
    pub frames_kept: u64,
    pub tokens_before: u64,
    pub tokens_after: u64,
    pub inference_micros: u64,
}

impl MetricsSnapshot {
    pub fn failures(&self) -> u64 {
        self.bad_input + self.backend_failures + self.configuration_failures + self.internal_failures
    }

    /// Fraction of visual tokens removed by reduction, 0 when nothing was encoded.
    pub fn token_reduction(&self) -> f64 {
        if self.tokens_before == 0 {
            0.0
        } else {
            1.0 - self.tokens_after as f64 / self.tokens_before as f64
        }
    }

    /// Mean latency of computed (non-cached) responses.
    pub fn mean_inference_time(&self) -> Duration {
        let computed = self.succeeded.saturating_sub(self.cache_hits);
        if computed == 0 {
            Duration::ZERO
        } else {
            Duration::from_micros(self.inference_micros / computed)
        }
    }
}

impl PipelineMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_request(&self) {
        self.requests.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_cache_hit(&self) {
        self.cache_hits.fetch_add(1, Ordering::Relaxed);
        self.succeeded.fetch_add(1, Ordering::Relaxed);
    }

    /// A response computed end to end.
    pub fn record_success(&self, elapsed: Duration) {
        self.succeeded.fetch_add(1, Ordering::Relaxed);
        self.inference_micros
            .fetch_add(elapsed.as_micros() as u64, Ordering::Relaxed);
    }

    pub fn record_failure(&self, kind: ErrorKind) {
        let counter = match kind {
            ErrorKind::BadInput => &self.bad_input,
            ErrorKind::BackendFailure => &self.backend_failures,
            ErrorKind::Configuration => &self.configuration_failures,
            ErrorKind::Internal => &self.internal_failures,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    /// Frame and token counts of one tokenized request.
    pub fn record_reduction(&self, frames_seen: usize, frames_kept: usize, before: usize, after: usize) {
        self.frames_seen.fetch_add(frames_seen as u64, Ordering::Relaxed);
        self.frames_kept.fetch_add(frames_kept as u64, Ordering::Relaxed);
        self.tokens_before.fetch_add(before as u64, Ordering::Relaxed);
        self.tokens_after.fetch_add(after as u64, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        let load = |c: &AtomicU64| c.load(Ordering::Relaxed);
        MetricsSnapshot {
            requests: load(&self.requests),
            succeeded: load(&self.succeeded),
            cache_hits: load(&self.cache_hits),
            bad_input: load(&self.bad_input),
            backend_failures: load(&self.backend_failures),
            configuration_failures: load(&self.configuration_failures),
            internal_failures: load(&self.internal_failures),
            frames_seen: load(&self.frames_seen),
            frames_kept: load(&self.frames_kept),
            tokens_before: load(&self.tokens_before),
            tokens_after: load(&self.tokens_after),
            inference_micros: load(&self.inference_micros),
        }
    }

    /// Multi-line text summary of the current counters.
    pub fn report(&self) -> String {
        let s = self.snapshot();
        format!(
            r#"Pipeline Metrics
════════════════════════════════

Requests: {} ({} succeeded, {} from cache)
Failures: {} (bad input {}, backend {}, configuration {}, internal {})

Reduction:
────────────────
  Frames: {} seen, {} kept
  Visual tokens: {} before, {} after ({:.1}% removed)

Mean inference time: {:.3} ms"#,
            s.requests,
            s.succeeded,
            s.cache_hits,
            s.failures(),
            s.bad_input,
            s.backend_failures,
            s.configuration_failures,
            s.internal_failures,
            s.frames_seen,
            s.frames_kept,
            s.tokens_before,
            s.tokens_after,
            s.token_reduction() * 100.0,
            s.mean_inference_time().as_secs_f64() * 1000.0,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters_accumulate() {
        let metrics = PipelineMetrics::new();
        metrics.record_request();
        metrics.record_request();
        metrics.record_success(Duration::from_millis(4));
        metrics.record_cache_hit();
        metrics.record_failure(ErrorKind::BadInput);
        metrics.record_reduction(3, 2, 48, 32);

        let s = metrics.snapshot();
        assert_eq!(s.requests, 2);
        assert_eq!(s.succeeded, 2);
        assert_eq!(s.cache_hits, 1);
        assert_eq!(s.failures(), 1);
        assert_eq!(s.mean_inference_time(), Duration::from_millis(4));
        assert!((s.token_reduction() - 1.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_report() {
        let metrics = PipelineMetrics::new();
        metrics.record_reduction(4, 1, 64, 16);
        let report = metrics.report();
        assert!(report.contains("4 seen, 1 kept"));
        assert!(report.contains("75.0% removed"));
    }

    #[test]
    fn test_empty_snapshot() {
        let s = PipelineMetrics::new().snapshot();
        assert_eq!(s, MetricsSnapshot::default());
        assert_eq!(s.token_reduction(), 0.0);
        assert_eq!(s.mean_inference_time(), Duration::ZERO);
    }
}
