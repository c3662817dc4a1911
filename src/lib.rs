//! # adaptok
//!
//! Adaptive visual tokenization and cached, concurrency-bounded inference.
//!
//! Given a sequence of frames and a prompt, the pipeline sizes each frame's
//! token budget to its visual complexity, drops frames redundant with the
//! last kept one, and feeds the reduced token sequence plus the prompt to a
//! text-generation backend. Responses are cached per request and requests run
//! on a bounded worker pool.
//!
//! ## Architecture
//!
//! The library is organized into several key modules:
//! - `frame`: Frame type, validation, uniform sampling and downscaling
//! - `tokenize`: Complexity estimator, budget allocator, similarity reducer
//! - `encoder`: Vision encoder capability and a deterministic patch encoder
//! - `inference`: Generation backends, requests, responses, orchestrator
//! - `core`: Response cache, worker pool, metrics
//! - `config`: TOML configuration and validation
//! - `error`: Error taxonomy and classification
//! - `logging`: Tracing subscriber setup
//!
//! ## Example
//!
//! ```rust
//! use adaptok::prelude::*;
//!
//! let orchestrator = Orchestrator::builder(PipelineConfig::default()).build()?;
//!
//! let gray = Frame::filled(64, 64, &[128, 128, 128])?;
//! let request = InferenceRequest::multimodal("what changed?", vec![gray.clone(), gray]);
//! let response = orchestrator.process(request)?;
//!
//! // The second frame is identical to the first and is dropped.
//! assert_eq!(response.metadata.input_metadata.frames_kept, vec![0]);
//! # Ok::<(), adaptok::error::PipelineError>(())
//! ```

pub mod config;
pub mod core;
pub mod encoder;
pub mod error;
pub mod frame;
pub mod inference;
pub mod logging;
pub mod tokenize;

/// Re-export error types for convenience
pub use error::{ErrorKind, HasSeverity, PipelineError, PipelineResult, Retryable};

/// Commonly used types.
pub mod prelude {
    pub use crate::config::PipelineConfig;
    pub use crate::encoder::{PatchPoolEncoder, VisionEncoder};
    pub use crate::error::{ErrorKind, PipelineError, PipelineResult};
    pub use crate::frame::Frame;
    pub use crate::inference::{
        EchoBackend, GenerationBackend, GenerationParams, InferenceRequest, ModelMode,
        Orchestrator, OutputFormat, Response,
    };
    pub use crate::tokenize::{FrameTokenSet, ReducedTokenSequence};
}
