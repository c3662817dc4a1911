//! # Responses
//!
//! Postprocessing turns a backend's [`RawOutput`] into the single structured
//! [`Response`] returned to callers and stored in the cache: the result
//! payload, a confidence figure, the end-to-end inference time and the
//! request metadata collected along the way.

use std::time::Instant;

use serde::{Deserialize, Serialize};

use crate::error::{PipelineError, PipelineResult};
use crate::inference::backend::RawOutput;
use crate::inference::params::ModelMode;

/// Shape of [`Response::result`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Structured result with every sequence
    #[default]
    Dict,
    /// First sequence's text only
    Raw,
}

/// How the confidence figure is derived from the raw output.
///
/// Every mode reports 1.0 when the backend exposes no log-probabilities.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfidenceMode {
    /// Always 1.0
    #[default]
    Constant,
    /// exp(mean log-probability) of the first sequence
    MeanTokenProbability,
    /// exp(max log-probability) of the first sequence
    MaxTokenProbability,
}

impl ConfidenceMode {
    /// Confidence in [0, 1] for `raw`.
    pub fn score(self, raw: &RawOutput) -> f64 {
        let logprobs = match raw.sequences.first().and_then(|s| s.logprobs.as_deref()) {
            Some(lp) if !lp.is_empty() => lp,
            _ => return 1.0,
        };
        let log = match self {
            ConfidenceMode::Constant => return 1.0,
            ConfidenceMode::MeanTokenProbability => {
                logprobs.iter().map(|&v| v as f64).sum::<f64>() / logprobs.len() as f64
            }
            ConfidenceMode::MaxTokenProbability => logprobs
                .iter()
                .map(|&v| v as f64)
                .fold(f64::NEG_INFINITY, f64::max),
        };
        let p = log.exp();
        if p.is_nan() { 1.0 } else { p.clamp(0.0, 1.0) }
    }
}

/// Structured result payload (`OutputFormat::Dict`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneratedResult {
    /// First sequence's text
    pub text: String,
    /// Every returned sequence
    pub sequences: Vec<String>,
    /// Generated token count per sequence
    pub token_counts: Vec<usize>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ResultPayload {
    Dict(GeneratedResult),
    Raw(String),
}

impl ResultPayload {
    /// Primary text regardless of format.
    pub fn text(&self) -> &str {
        match self {
            ResultPayload::Dict(result) => &result.text,
            ResultPayload::Raw(text) => text,
        }
    }
}

/// Request metadata stamped during preprocessing and tokenization.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InputMetadata {
    /// "text" or "multimodal"
    pub request_kind: String,
    /// Prompt length in characters before normalization
    pub original_length: usize,
    /// Prompt length in characters after normalization
    pub processed_length: usize,
    /// Unix time the request started, in seconds
    pub start_timestamp: f64,
    pub mode: ModelMode,
    pub lowercase: bool,
    pub frames_received: usize,
    /// Frames left after uniform sampling
    pub frames_sampled: usize,
    /// Indices (into the received frames) whose tokens were kept
    pub frames_kept: Vec<usize>,
    /// Token budget per sampled frame
    pub token_budgets: Vec<usize>,
    pub visual_tokens_before: usize,
    pub visual_tokens: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseMetadata {
    pub input_metadata: InputMetadata,
    pub output_format: OutputFormat,
    pub backend: String,
}

/// Final pipeline output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Response {
    pub result: ResultPayload,
    pub confidence: f64,
    /// Seconds from request start to response assembly
    pub inference_time: f64,
    pub metadata: ResponseMetadata,
}

impl Response {
    /// Postprocess `raw` into a response.
    ///
    /// Fails with `Generation` when the backend returned no sequences.
    pub fn assemble(
        raw: RawOutput,
        format: OutputFormat,
        confidence: ConfidenceMode,
        input_metadata: InputMetadata,
        backend: &str,
        started: Instant,
    ) -> PipelineResult<Self> {
        if raw.sequences.is_empty() {
            return Err(PipelineError::generation(backend, "backend returned no sequences")
                .with_stage("postprocess"));
        }
        let confidence = confidence.score(&raw);

        let result = match format {
            OutputFormat::Raw => {
                ResultPayload::Raw(raw.sequences.into_iter().next().map(|s| s.text).unwrap_or_default())
            }
            OutputFormat::Dict => {
                let token_counts = raw.sequences.iter().map(|s| s.token_ids.len()).collect();
                let sequences: Vec<String> = raw.sequences.into_iter().map(|s| s.text).collect();
                ResultPayload::Dict(GeneratedResult {
                    text: sequences[0].clone(),
                    sequences,
                    token_counts,
                })
            }
        };

        Ok(Self {
            result,
            confidence,
            inference_time: started.elapsed().as_secs_f64(),
            metadata: ResponseMetadata {
                input_metadata,
                output_format: format,
                backend: backend.to_string(),
            },
        })
    }

    /// Primary generated text.
    pub fn text(&self) -> &str {
        self.result.text()
    }
}
