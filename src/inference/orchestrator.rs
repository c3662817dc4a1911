//! # Inference Orchestrator
//!
//! Drives one request end to end:
//!
//! ```text
//! caller thread                         worker thread
//! ─────────────                         ─────────────
//! resolve mode/params                   cache.get_or_compute(key) ──joined──▶ Response
//! validate params, text, frames                │ miss
//! normalize text, stamp metadata               ▼
//! compute cache key                     sample ▶ tokenize (estimate ▶ allocate ▶ downscale ▶ encode ▶ reduce)
//! cache.lookup(key) ──hit──▶ Response          ▼
//!        │ miss ──── submit ────▶       backend.generate ▶ postprocess ▶ insert ▶ Response
//! ```
//!
//! Validation and the cache lookup happen on the caller's thread, so a bad
//! request fails before the worker pool or the cache is touched and a cached
//! response never waits behind queued work. Every failure is logged with its
//! stage and an input summary, counted in the metrics, and returned unchanged;
//! nothing is cached on a failure path and nothing is retried.
//!
//! ## Example
//!
//! ```rust
//! use adaptok::prelude::*;
//!
//! let orchestrator = Orchestrator::builder(PipelineConfig::default()).build().unwrap();
//! let frames = vec![Frame::filled(32, 32, &[128, 128, 128]).unwrap()];
//! let response = orchestrator
//!     .process(InferenceRequest::multimodal("describe the frame", frames))
//!     .unwrap();
//! assert_eq!(response.metadata.input_metadata.visual_tokens, 16);
//! ```

use std::future::Future;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::task::{Context, Poll};
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use futures::future::join_all;
use serde::Serialize;
use tracing::{error, info, info_span, warn};

use crate::config::PipelineConfig;
use crate::core::cache::{CacheSource, CacheStats, ResponseCache};
use crate::core::metrics::PipelineMetrics;
use crate::core::worker_pool::{PendingResult, WorkerPool};
use crate::encoder::{PatchPoolEncoder, VisionEncoder};
use crate::error::{ErrorKind, PipelineError, PipelineResult};
use crate::frame::{Frame, FrameScaler, sample_indices, validate_frames};
use crate::inference::backend::{EchoBackend, GenerationBackend, GenerationRequest};
use crate::inference::params::{GenerationParams, ModelMode};
use crate::inference::request::InferenceRequest;
use crate::inference::response::{InputMetadata, Response};
use crate::tokenize::reducer::SimilarityReducer;
use crate::tokenize::FrameTokenizer;

/// Static description of a built pipeline.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModelInfo {
    pub encoder: String,
    pub backend: String,
    pub num_workers: usize,
    pub mode: ModelMode,
    pub budget_floor: usize,
    pub max_frame_tokens: usize,
    pub similarity_threshold: f32,
    pub caching_enabled: bool,
    pub cache_size: usize,
}

/// Builder for [`Orchestrator`].
///
/// Defaults to [`PatchPoolEncoder`] and [`EchoBackend`].
pub struct OrchestratorBuilder {
    config: PipelineConfig,
    encoder: Option<Arc<dyn VisionEncoder>>,
    backend: Option<Arc<dyn GenerationBackend>>,
}

impl OrchestratorBuilder {
    pub fn encoder(mut self, encoder: Arc<dyn VisionEncoder>) -> Self {
        self.encoder = Some(encoder);
        self
    }

    pub fn backend(mut self, backend: Arc<dyn GenerationBackend>) -> Self {
        self.backend = Some(backend);
        self
    }

    /// Validate the configuration and start the worker pool.
    ///
    /// Invalid settings (including a budget ceiling below the floor) fail
    /// here with a `Configuration` error.
    pub fn build(self) -> PipelineResult<Orchestrator> {
        let config = self.config;
        config.validate()?;

        let tokenizer = FrameTokenizer::new(
            config.budget_allocator()?,
            SimilarityReducer::new(config.similarity_threshold)?,
            self.encoder
                .unwrap_or_else(|| Arc::new(PatchPoolEncoder::new()) as Arc<dyn VisionEncoder>),
        )
        .with_scaler(config.preprocessing.max_long_side.map(FrameScaler::new));
        let backend = self
            .backend
            .unwrap_or_else(|| Arc::new(EchoBackend::new()) as Arc<dyn GenerationBackend>);
        let cache = config
            .caching
            .enabled
            .then(|| ResponseCache::new(config.caching.cache_size));
        let pool = WorkerPool::new(config.num_workers)?;

        info!(
            workers = config.num_workers,
            encoder = tokenizer.encoder().name(),
            backend = backend.name(),
            caching = config.caching.enabled,
            "orchestrator ready"
        );

        Ok(Orchestrator {
            inner: Arc::new(Inner {
                config,
                tokenizer,
                backend,
                cache,
                metrics: PipelineMetrics::new(),
            }),
            pool: Arc::new(pool),
        })
    }
}

/// Cached, concurrency-bounded inference pipeline.
///
/// Cloning is cheap and shares the cache, metrics and worker pool.
#[derive(Clone)]
pub struct Orchestrator {
    inner: Arc<Inner>,
    pool: Arc<WorkerPool>,
}

struct Inner {
    config: PipelineConfig,
    tokenizer: FrameTokenizer,
    backend: Arc<dyn GenerationBackend>,
    cache: Option<ResponseCache<Response>>,
    metrics: PipelineMetrics,
}

/// Set once a request's outcome has been counted in the metrics.
type Settled = Arc<AtomicBool>;

/// A validated request ready for a worker.
struct Prepared {
    key: String,
    frames: Vec<Frame>,
    processed_text: String,
    mode: ModelMode,
    params: GenerationParams,
    metadata: InputMetadata,
    summary: String,
    started: Instant,
    settled: Settled,
}

/// Response of a submitted request; await it or [`wait`](Self::wait) for it.
pub struct PendingResponse {
    inner: PendingResult<PipelineResult<Response>>,
    settled: Settled,
}

impl PendingResponse {
    /// Block the current thread until the response is ready.
    pub fn wait(self) -> PipelineResult<Response> {
        self.inner.wait()?
    }
}

impl Future for PendingResponse {
    type Output = PipelineResult<Response>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match Pin::new(&mut self.get_mut().inner).poll(cx) {
            Poll::Ready(result) => Poll::Ready(result.and_then(|r| r)),
            Poll::Pending => Poll::Pending,
        }
    }
}

impl Orchestrator {
    pub fn builder(config: PipelineConfig) -> OrchestratorBuilder {
        OrchestratorBuilder {
            config,
            encoder: None,
            backend: None,
        }
    }

    /// Build with explicit capabilities.
    pub fn new(
        config: PipelineConfig,
        encoder: Arc<dyn VisionEncoder>,
        backend: Arc<dyn GenerationBackend>,
    ) -> PipelineResult<Self> {
        Self::builder(config).encoder(encoder).backend(backend).build()
    }

    /// Run `request` on the pool and block until its response is ready.
    pub fn process(&self, request: impl Into<InferenceRequest>) -> PipelineResult<Response> {
        self.submit(request)?.wait()
    }

    /// Validate `request` on this thread, then hand it to the worker pool.
    ///
    /// Validation failures return immediately without touching the pool or
    /// the cache. A cached response comes back already resolved.
    pub fn submit(&self, request: impl Into<InferenceRequest>) -> PipelineResult<PendingResponse> {
        let request = request.into();
        let span = info_span!(
            "process",
            request_kind = request.kind().as_str(),
            frames = request.frames.len()
        );
        let prepared = span.in_scope(|| self.inner.prepare(request))?;
        let settled = Arc::clone(&prepared.settled);

        if let Some(response) = span.in_scope(|| self.inner.cached(&prepared.key)) {
            return Ok(PendingResponse {
                inner: PendingResult::ready(Ok(response)),
                settled,
            });
        }

        let inner = Arc::clone(&self.inner);
        let pending = self.pool.submit(move || {
            span.in_scope(|| {
                let summary = prepared.summary.clone();
                let settled = Arc::clone(&prepared.settled);
                catch_unwind(AssertUnwindSafe(|| inner.run(prepared))).unwrap_or_else(|panic| {
                    let reason = panic
                        .downcast_ref::<&str>()
                        .map(|s| s.to_string())
                        .or_else(|| panic.downcast_ref::<String>().cloned())
                        .unwrap_or_else(|| "unknown panic".to_string());
                    Err(inner.fail(
                        PipelineError::worker_pool(format!("job panicked: {}", reason)),
                        "compute",
                        &summary,
                        &settled,
                    ))
                })
            })
        });
        Ok(PendingResponse {
            inner: pending,
            settled,
        })
    }

    /// Async wrapper around [`submit`](Self::submit).
    pub async fn process_async(&self, request: impl Into<InferenceRequest>) -> PipelineResult<Response> {
        self.submit(request)?.await
    }

    /// Like [`process_async`](Self::process_async), failing with `Timeout`
    /// after `timeout`.
    ///
    /// The in-flight work is discarded, not cancelled: it runs to completion
    /// on its worker and may still populate the cache. A timed-out request is
    /// counted once, as a failure; the late outcome is not counted again.
    pub async fn process_with_timeout(
        &self,
        request: impl Into<InferenceRequest>,
        timeout: Duration,
    ) -> PipelineResult<Response> {
        let mut pending = self.submit(request)?;
        let outcome = tokio::time::timeout(timeout, &mut pending).await;
        match outcome {
            Ok(result) => result,
            // The worker settled first; its result is about to be delivered.
            Err(_) if !claim(&pending.settled) => pending.await,
            Err(_) => {
                let err = PipelineError::timeout("process", timeout.as_millis() as u64)
                    .with_stage("await");
                warn!(timeout_ms = timeout.as_millis() as u64, "request timed out");
                self.inner.metrics.record_failure(err.kind());
                Err(err)
            }
        }
    }

    /// Run `requests` concurrently; results come back in input order.
    pub async fn process_batch(&self, requests: Vec<InferenceRequest>) -> Vec<PipelineResult<Response>> {
        let submitted: Vec<_> = requests.into_iter().map(|r| self.submit(r)).collect();
        join_all(submitted.into_iter().map(|pending| async move { pending?.await })).await
    }

    /// Drop every cached response.
    pub fn clear_cache(&self) {
        if let Some(cache) = &self.inner.cache {
            cache.clear();
            info!("response cache cleared");
        }
    }

    /// Cache counters, `None` when caching is disabled.
    pub fn cache_stats(&self) -> Option<CacheStats> {
        self.inner.cache.as_ref().map(ResponseCache::stats)
    }

    pub fn metrics(&self) -> &PipelineMetrics {
        &self.inner.metrics
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.inner.config
    }

    pub fn model_info(&self) -> ModelInfo {
        let config = &self.inner.config;
        ModelInfo {
            encoder: self.inner.tokenizer.encoder().name().to_string(),
            backend: self.inner.backend.name().to_string(),
            num_workers: self.pool.size(),
            mode: config.mode,
            budget_floor: self.inner.tokenizer.allocator().floor(),
            max_frame_tokens: self.inner.tokenizer.allocator().ceiling(),
            similarity_threshold: self.inner.tokenizer.reducer().threshold(),
            caching_enabled: self.inner.cache.is_some(),
            cache_size: config.caching.cache_size,
        }
    }
}

/// True for the first caller only; that caller counts the outcome.
fn claim(settled: &AtomicBool) -> bool {
    !settled.swap(true, Ordering::AcqRel)
}

fn unix_seconds(time: SystemTime) -> f64 {
    time.duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or_default()
}

impl Inner {
    /// Log, tag and count a failure.
    fn fail(
        &self,
        err: PipelineError,
        stage: &str,
        summary: &str,
        settled: &AtomicBool,
    ) -> PipelineError {
        let err = if err.context().stage.is_none() {
            err.with_stage(stage)
        } else {
            err
        };
        let err = err.with_input_summary(summary);
        let stage = err.context().stage.as_deref().unwrap_or(stage);
        if err.kind() == ErrorKind::BadInput {
            warn!(stage, input = summary, error = %err, "request rejected");
        } else {
            error!(stage, input = summary, error = %err, "request failed");
        }
        if claim(settled) {
            self.metrics.record_failure(err.kind());
        }
        err
    }

    /// Caller-thread cache hit.
    fn cached(&self, key: &str) -> Option<Response> {
        let response = self.cache.as_ref()?.lookup(key)?;
        self.metrics.record_cache_hit();
        info!(cache_hit = true, joined = false, "served from cache");
        Some(response)
    }

    /// Caller-thread half: resolve, validate, normalize, key.
    fn prepare(&self, request: InferenceRequest) -> PipelineResult<Prepared> {
        self.metrics.record_request();
        let started = Instant::now();
        let start_timestamp = unix_seconds(SystemTime::now());
        let summary = request.summary();
        let kind = request.kind();
        let settled = Settled::default();

        let mode = request.mode.unwrap_or(self.config.mode);
        let params = request
            .params
            .clone()
            .unwrap_or_else(|| self.config.generation.clone());
        params
            .validate()
            .map_err(|e| self.fail(e, "validate", &summary, &settled))?;

        let trimmed = request.text.trim();
        if trimmed.is_empty() {
            return Err(self.fail(
                PipelineError::validation("text", "must not be empty after trimming", request.text.as_str()),
                "preprocess",
                &summary,
                &settled,
            ));
        }
        let lowercase = self.config.preprocessing.lowercase;
        let processed_text = if lowercase {
            trimmed.to_lowercase()
        } else {
            trimmed.to_string()
        };

        validate_frames(&request.frames)
            .map_err(|e| self.fail(e, "preprocess", &summary, &settled))?;

        let key = request.cache_key(mode, &params);
        let metadata = InputMetadata {
            request_kind: kind.as_str().to_string(),
            original_length: request.text.chars().count(),
            processed_length: processed_text.chars().count(),
            start_timestamp,
            mode,
            lowercase,
            frames_received: request.frames.len(),
            ..Default::default()
        };

        Ok(Prepared {
            key,
            frames: request.frames,
            processed_text,
            mode,
            params,
            metadata,
            summary,
            started,
            settled,
        })
    }

    /// Worker half: compute, or join an identical in-flight computation.
    fn run(&self, job: Prepared) -> PipelineResult<Response> {
        let Some(cache) = &self.cache else {
            return self.compute(&job);
        };
        let cached = cache.get_or_compute(&job.key, || self.compute(&job))?;
        if cached.source != CacheSource::Computed {
            if claim(&job.settled) {
                self.metrics.record_cache_hit();
            }
            info!(
                cache_hit = true,
                joined = cached.source == CacheSource::Joined,
                "served from cache"
            );
        }
        Ok(cached.value)
    }

    fn compute(&self, job: &Prepared) -> PipelineResult<Response> {
        let summary = job.summary.as_str();
        let settled = job.settled.as_ref();
        let mut metadata = job.metadata.clone();

        let sampled: Vec<usize> = match self.config.preprocessing.max_frames {
            Some(n) => sample_indices(job.frames.len(), n),
            None => (0..job.frames.len()).collect(),
        };
        let frames: Vec<Frame> = sampled.iter().map(|&i| job.frames[i].clone()).collect();
        metadata.frames_sampled = frames.len();

        let visual = if frames.is_empty() {
            None
        } else {
            let tokenized = self
                .tokenizer
                .tokenize(&frames)
                .map_err(|e| self.fail(e, "encode", summary, settled))?;
            metadata.frames_kept = tokenized
                .sequence
                .kept_frames()
                .iter()
                .map(|&k| sampled[k])
                .collect();
            metadata.visual_tokens_before = tokenized.tokens_before();
            metadata.visual_tokens = tokenized.sequence.len();
            metadata.token_budgets = tokenized.budgets;
            self.metrics.record_reduction(
                frames.len(),
                metadata.frames_kept.len(),
                metadata.visual_tokens_before,
                metadata.visual_tokens,
            );
            Some(tokenized.sequence)
        };

        let prompt = job.mode.format_prompt(&job.processed_text);
        let raw = self
            .backend
            .generate(&GenerationRequest {
                prompt: &prompt,
                visual_tokens: visual.as_ref(),
                params: &job.params,
            })
            .map_err(|e| self.fail(e, "generate", summary, settled))?;

        let response = Response::assemble(
            raw,
            self.config.output.format,
            self.config.output.confidence,
            metadata,
            self.backend.name(),
            job.started,
        )
        .map_err(|e| self.fail(e, "postprocess", summary, settled))?;

        if claim(settled) {
            self.metrics.record_success(job.started.elapsed());
        }
        info!(
            cache_hit = false,
            duration_ms = response.inference_time * 1000.0,
            visual_tokens_before = response.metadata.input_metadata.visual_tokens_before,
            visual_tokens = response.metadata.input_metadata.visual_tokens,
            "request complete"
        );
        Ok(response)
    }
}

impl std::fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Orchestrator")
            .field("model_info", &self.model_info())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn orchestrator(config: PipelineConfig) -> Orchestrator {
        Orchestrator::builder(config).build().unwrap()
    }

    #[test]
    fn text_request_round_trip() {
        let orch = orchestrator(PipelineConfig::default().with_workers(1));
        let response = orch.process("  Hello World  ").unwrap();
        assert_eq!(response.text(), "[visual_tokens=0] Hello World");
        let meta = &response.metadata.input_metadata;
        assert_eq!(meta.original_length, 15);
        assert_eq!(meta.processed_length, 11);
        assert_eq!(meta.request_kind, "text");
        assert!(meta.start_timestamp > 0.0);
    }

    #[test]
    fn lowercase_and_mode_prefix() {
        let mut config = PipelineConfig::default().with_mode(ModelMode::Technical);
        config.preprocessing.lowercase = true;
        let orch = orchestrator(config);
        let response = orch.process("TCP Handshake").unwrap();
        assert_eq!(
            response.text(),
            "[visual_tokens=0] Provide a technical explanation for: tcp handshake"
        );
    }

    #[test]
    fn invalid_params_rejected_before_pool() {
        let orch = orchestrator(PipelineConfig::default());
        let bad = GenerationParams {
            temperature: 0.0,
            ..Default::default()
        };
        let err = orch
            .submit(InferenceRequest::text("hi").with_params(bad))
            .err()
            .unwrap();
        assert_eq!(err.kind(), ErrorKind::BadInput);
        assert_eq!(err.context().stage.as_deref(), Some("validate"));
        assert_eq!(orch.cache_stats().unwrap().misses, 0);
        assert_eq!(orch.metrics().snapshot().bad_input, 1);
    }

    #[test]
    fn caching_disabled_recomputes() {
        let mut config = PipelineConfig::default();
        config.caching.enabled = false;
        let backend = Arc::new(EchoBackend::new());
        let orch = Orchestrator::builder(config)
            .backend(backend.clone())
            .build()
            .unwrap();
        orch.process("same").unwrap();
        orch.process("same").unwrap();
        assert_eq!(backend.calls(), 2);
        assert!(orch.cache_stats().is_none());
    }

    #[test]
    fn model_info_reflects_config() {
        let orch = orchestrator(PipelineConfig::default().with_workers(2));
        let info = orch.model_info();
        assert_eq!(info.encoder, "patch-pool");
        assert_eq!(info.backend, "echo");
        assert_eq!(info.num_workers, 2);
        assert_eq!(info.budget_floor, 16);
        assert_eq!(info.max_frame_tokens, 1024);
    }
}
