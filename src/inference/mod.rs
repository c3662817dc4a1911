//! # Inference
//!
//! Generation parameters, backends, request/response envelopes and the
//! orchestrator that runs them.

pub mod backend;
pub mod orchestrator;
pub mod params;
pub mod request;
pub mod response;

#[cfg(feature = "http-backend")]
pub use backend::HttpBackend;
pub use backend::{
    EchoBackend, FailingBackend, GeneratedSequence, GenerationBackend, GenerationRequest, RawOutput,
};
pub use orchestrator::{ModelInfo, Orchestrator, OrchestratorBuilder, PendingResponse};
pub use params::{GenerationParams, MAX_RETURN_SEQUENCES, ModelMode};
pub use request::{InferenceRequest, RequestKind};
pub use response::{
    ConfidenceMode, GeneratedResult, InputMetadata, OutputFormat, Response, ResponseMetadata,
    ResultPayload,
};
