//! # Core Infrastructure Module
//!
//! Shared services behind the orchestrator: the response cache, the worker
//! pool and the metrics counters.

pub mod cache;
pub mod metrics;
pub mod worker_pool;

pub use cache::{CacheSource, CacheStats, Cached, ResponseCache};
pub use metrics::{MetricsSnapshot, PipelineMetrics};
pub use worker_pool::{PendingResult, WorkerPool};
