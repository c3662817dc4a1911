//! End-to-end orchestrator behavior: validation, caching, failures, batching.

mod common;

use std::sync::Arc;
use std::time::{Duration, Instant};

use adaptok::config::PipelineConfig;
use adaptok::error::{ErrorKind, PipelineError};
use adaptok::inference::{
    EchoBackend, FailingBackend, InferenceRequest, ModelMode, Orchestrator, OutputFormat,
    ResultPayload,
};
use common::frames::{checkerboard, solid};
use common::{CountingEncoder, FailingEncoder, FlakyBackend, PanickingEncoder, SlowBackend};

fn echo_orchestrator(config: PipelineConfig) -> (Orchestrator, Arc<EchoBackend>) {
    let backend = Arc::new(EchoBackend::new());
    let orchestrator = Orchestrator::builder(config)
        .backend(backend.clone())
        .build()
        .unwrap();
    (orchestrator, backend)
}

#[test]
fn empty_text_is_rejected_without_touching_the_pool() {
    let (orch, backend) = echo_orchestrator(PipelineConfig::default());

    let err = orch.process("   \n\t ").unwrap_err();
    assert!(matches!(err, PipelineError::Validation { ref field, .. } if field == "text"));
    assert_eq!(err.context().stage.as_deref(), Some("preprocess"));
    assert!(err.context().input_summary.is_some());

    assert_eq!(backend.calls(), 0);
    let stats = orch.cache_stats().unwrap();
    assert_eq!(stats.misses, 0);
    assert_eq!(stats.len, 0);
    assert_eq!(orch.metrics().snapshot().bad_input, 1);
}

#[test]
fn ceiling_below_floor_fails_at_build() {
    let mut config = PipelineConfig::default();
    config.budget.floor = 16;
    config.max_frame_tokens = 10;
    let err = Orchestrator::builder(config).build().unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Configuration);
}

#[test]
fn repeated_request_is_served_from_cache() {
    let (orch, backend) = echo_orchestrator(PipelineConfig::default());

    let first = orch.process("Describe the weather").unwrap();
    let second = orch.process("Describe the weather").unwrap();

    assert_eq!(backend.calls(), 1);
    assert_eq!(first, second);
    assert_eq!(orch.cache_stats().unwrap().hits, 1);

    let snapshot = orch.metrics().snapshot();
    assert_eq!(snapshot.requests, 2);
    assert_eq!(snapshot.succeeded, 1);
    assert_eq!(snapshot.cache_hits, 1);
}

#[test]
fn mode_and_params_are_part_of_the_key() {
    let (orch, backend) = echo_orchestrator(PipelineConfig::default());

    orch.process("sort a list").unwrap();
    let coding = orch
        .process(InferenceRequest::text("sort a list").with_mode(ModelMode::Coding))
        .unwrap();
    assert_eq!(backend.calls(), 2);
    assert!(coding.text().contains("sort a list"));
    assert_eq!(coding.metadata.input_metadata.mode, ModelMode::Coding);

    let mut params = orch.config().generation.clone();
    params.max_length = 3;
    let short = orch
        .process(InferenceRequest::text("sort a list").with_params(params))
        .unwrap();
    assert_eq!(backend.calls(), 3);
    assert_eq!(short.text().split_whitespace().count(), 3);
}

#[test]
fn redundant_frames_are_reduced_end_to_end() {
    let encoder = CountingEncoder::new();
    let backend = Arc::new(EchoBackend::new());
    let orch = Orchestrator::new(PipelineConfig::default(), encoder.clone(), backend).unwrap();

    let frames = vec![solid(64, 128), solid(64, 128), checkerboard(64)];
    let response = orch
        .process(InferenceRequest::multimodal("what changed?", frames))
        .unwrap();

    let meta = &response.metadata.input_metadata;
    assert_eq!(meta.request_kind, "multimodal");
    assert_eq!(meta.frames_received, 3);
    assert_eq!(meta.frames_sampled, 3);
    assert_eq!(meta.frames_kept, vec![0, 2]);
    assert_eq!(meta.token_budgets, vec![16, 16, 1024]);
    assert_eq!(meta.visual_tokens_before, 1056);
    assert_eq!(meta.visual_tokens, 1040);
    assert!(response.text().starts_with("[visual_tokens=1040]"));
    assert_eq!(encoder.calls(), 3);

    let snapshot = orch.metrics().snapshot();
    assert_eq!(snapshot.frames_seen, 3);
    assert_eq!(snapshot.frames_kept, 2);
}

#[test]
fn large_frames_are_scored_at_received_resolution() {
    let (orch, _) = echo_orchestrator(PipelineConfig::default());

    let frames = vec![solid(2048, 128), solid(2048, 128), checkerboard(2048)];
    let response = orch
        .process(InferenceRequest::multimodal("what changed?", frames))
        .unwrap();

    let meta = &response.metadata.input_metadata;
    assert_eq!(meta.token_budgets, vec![16, 16, 1024]);
    assert_eq!(meta.frames_kept, vec![0, 2]);
    assert_eq!(meta.visual_tokens, 1040);
}

#[test]
fn kept_indices_refer_to_received_frames() {
    let mut config = PipelineConfig::default();
    config.preprocessing.max_frames = Some(2);
    let (orch, _) = echo_orchestrator(config);

    let frames = vec![
        solid(32, 50),
        solid(32, 50),
        solid(32, 50),
        solid(32, 50),
        checkerboard(32),
    ];
    let response = orch
        .process(InferenceRequest::multimodal("last frame?", frames))
        .unwrap();
    let meta = &response.metadata.input_metadata;
    assert_eq!(meta.frames_received, 5);
    assert_eq!(meta.frames_sampled, 2);
    assert_eq!(meta.frames_kept, vec![0, 4]);
}

#[test]
fn mismatched_frame_shapes_are_rejected() {
    let (orch, backend) = echo_orchestrator(PipelineConfig::default());
    let err = orch
        .process(InferenceRequest::multimodal(
            "compare",
            vec![solid(32, 1), solid(16, 1)],
        ))
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::BadInput);
    assert_eq!(err.context().stage.as_deref(), Some("preprocess"));
    assert_eq!(backend.calls(), 0);
}

#[test]
fn backend_failure_is_not_cached() {
    let backend = FlakyBackend::new(1);
    let orch = Orchestrator::builder(PipelineConfig::default())
        .backend(backend.clone())
        .build()
        .unwrap();

    let err = orch.process("retry me").unwrap_err();
    assert!(matches!(err, PipelineError::Generation { .. }));
    assert_eq!(err.context().stage.as_deref(), Some("generate"));
    assert_eq!(orch.cache_stats().unwrap().len, 0);

    let response = orch.process("retry me").unwrap();
    assert!(response.text().ends_with("retry me"));
    assert_eq!(backend.attempts(), 2);
    assert_eq!(orch.cache_stats().unwrap().len, 1);

    let snapshot = orch.metrics().snapshot();
    assert_eq!(snapshot.backend_failures, 1);
    assert_eq!(snapshot.succeeded, 1);
}

#[test]
fn encoder_failure_surfaces_with_stage() {
    let orch = Orchestrator::new(
        PipelineConfig::default(),
        Arc::new(FailingEncoder),
        Arc::new(EchoBackend::new()),
    )
    .unwrap();

    let err = orch
        .process(InferenceRequest::multimodal("look", vec![solid(16, 9)]))
        .unwrap_err();
    assert!(matches!(err, PipelineError::Encoding { .. }));
    assert_eq!(err.context().stage.as_deref(), Some("encode"));
    assert_eq!(err.context().metadata.get("frame").map(String::as_str), Some("0"));
    assert_eq!(orch.cache_stats().unwrap().len, 0);
}

#[test]
fn panicking_encoder_is_counted_and_pool_survives() {
    let orch = Orchestrator::new(
        PipelineConfig::default().with_workers(1),
        Arc::new(PanickingEncoder),
        Arc::new(EchoBackend::new()),
    )
    .unwrap();

    let err = orch
        .process(InferenceRequest::multimodal("look", vec![solid(16, 9)]))
        .unwrap_err();
    assert!(matches!(err, PipelineError::WorkerPool { .. }));
    assert_eq!(err.context().stage.as_deref(), Some("compute"));
    assert!(err.to_string().contains("encoder state corrupted"));

    let snapshot = orch.metrics().snapshot();
    assert_eq!(snapshot.internal_failures, 1);
    assert_eq!(snapshot.succeeded, 0);
    assert_eq!(orch.cache_stats().unwrap().len, 0);

    assert!(orch.process("text only").is_ok());
}

#[test]
fn oversized_sequence_count_is_rejected() {
    let (orch, backend) = echo_orchestrator(PipelineConfig::default());
    let mut params = orch.config().generation.clone();
    params.num_return_sequences = u32::MAX;

    let err = orch
        .process(InferenceRequest::text("many answers").with_params(params))
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::BadInput);
    assert!(err.to_string().contains("params.num_return_sequences"));
    assert_eq!(backend.calls(), 0);
}

#[test]
fn cache_hit_does_not_wait_for_busy_workers() {
    let backend = SlowBackend::new(Duration::from_millis(300));
    let orch = Orchestrator::builder(PipelineConfig::default().with_workers(1))
        .backend(backend.clone())
        .build()
        .unwrap();

    let first = orch.process("cached prompt").unwrap();
    let busy = orch.submit("occupy the only worker").unwrap();

    let started = Instant::now();
    let again = orch.process("cached prompt").unwrap();
    assert!(started.elapsed() < Duration::from_millis(100));
    assert_eq!(first, again);

    busy.wait().unwrap();
    assert_eq!(backend.calls(), 2);
    assert_eq!(orch.cache_stats().unwrap().hits, 1);
    assert_eq!(orch.metrics().snapshot().cache_hits, 1);
}

#[test]
fn failing_backend_error_kind() {
    let orch = Orchestrator::builder(PipelineConfig::default())
        .backend(Arc::new(FailingBackend::new("model not loaded")))
        .build()
        .unwrap();
    let err = orch.process("anything").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::BackendFailure);
}

#[test]
fn oldest_cached_request_is_evicted_first() {
    let (orch, backend) = echo_orchestrator(PipelineConfig::default().with_cache_size(2));

    orch.process("a").unwrap();
    orch.process("b").unwrap();
    orch.process("c").unwrap();
    assert_eq!(backend.calls(), 3);
    assert_eq!(orch.cache_stats().unwrap().evictions, 1);

    orch.process("c").unwrap();
    assert_eq!(backend.calls(), 3);

    orch.process("a").unwrap();
    assert_eq!(backend.calls(), 4);
}

#[test]
fn clear_cache_forces_recompute() {
    let (orch, backend) = echo_orchestrator(PipelineConfig::default());
    orch.process("same").unwrap();
    orch.clear_cache();
    orch.process("same").unwrap();
    assert_eq!(backend.calls(), 2);
}

#[test]
fn raw_output_format() {
    let mut config = PipelineConfig::default();
    config.output.format = OutputFormat::Raw;
    let (orch, _) = echo_orchestrator(config);
    let response = orch.process("plain").unwrap();
    assert_eq!(response.result, ResultPayload::Raw("[visual_tokens=0] plain".to_string()));
    assert_eq!(response.metadata.output_format, OutputFormat::Raw);
}

#[tokio::test]
async fn batch_results_keep_input_order() {
    let (orch, _) = echo_orchestrator(PipelineConfig::default().with_workers(3));

    let requests = vec![
        InferenceRequest::text("one"),
        InferenceRequest::text(""),
        InferenceRequest::text("three"),
        InferenceRequest::text("four"),
    ];
    let results = orch.process_batch(requests).await;

    assert_eq!(results.len(), 4);
    assert!(results[0].as_ref().unwrap().text().ends_with("one"));
    assert!(results[1].is_err());
    assert!(results[2].as_ref().unwrap().text().ends_with("three"));
    assert!(results[3].as_ref().unwrap().text().ends_with("four"));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn concurrent_identical_requests_compute_once() {
    let backend = SlowBackend::new(Duration::from_millis(100));
    let orch = Orchestrator::builder(PipelineConfig::default().with_workers(4))
        .backend(backend.clone())
        .build()
        .unwrap();

    let requests = (0..4).map(|_| InferenceRequest::text("shared")).collect();
    let results = orch.process_batch(requests).await;

    assert!(results.iter().all(Result::is_ok));
    assert_eq!(backend.calls(), 1);
    assert_eq!(orch.metrics().snapshot().cache_hits, 3);
}

#[tokio::test]
async fn slow_request_times_out() {
    let backend = SlowBackend::new(Duration::from_millis(300));
    let orch = Orchestrator::builder(PipelineConfig::default())
        .backend(backend)
        .build()
        .unwrap();

    let err = orch
        .process_with_timeout("take your time", Duration::from_millis(20))
        .await
        .unwrap_err();
    assert!(matches!(err, PipelineError::Timeout { .. }));
    assert_eq!(orch.metrics().snapshot().backend_failures, 1);

    // The discarded work still finishes and fills the cache.
    tokio::time::sleep(Duration::from_millis(500)).await;
    assert_eq!(orch.cache_stats().unwrap().len, 1);
    let snapshot = orch.metrics().snapshot();
    assert_eq!(snapshot.backend_failures, 1);
    assert_eq!(snapshot.succeeded, 0);
    assert_eq!(snapshot.failures(), 1);
}

#[tokio::test]
async fn async_and_blocking_paths_agree() {
    let (orch, backend) = echo_orchestrator(PipelineConfig::default());
    let a = orch.process_async("same answer").await.unwrap();
    let b = orch.process("same answer").unwrap();
    assert_eq!(a, b);
    assert_eq!(backend.calls(), 1);
}
