//! # Generation Backends
//!
//! The text-generation model is an opaque capability behind
//! [`GenerationBackend`]. Backends are chosen when the orchestrator is built
//! and are called from worker threads, so they must be `Send + Sync` and may
//! block.
//!
//! Built-in variants:
//! - [`EchoBackend`]: deterministic local stub, useful for dry runs and tests
//! - [`HttpBackend`]: blocking JSON POST to a remote generation server
//!   (feature `http-backend`)

use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

use crate::error::{PipelineError, PipelineResult};
use crate::inference::params::GenerationParams;
use crate::tokenize::tokens::ReducedTokenSequence;

/// Everything a backend needs for one generation call.
#[derive(Debug, Clone, Copy)]
pub struct GenerationRequest<'a> {
    /// Mode-formatted, preprocessed prompt
    pub prompt: &'a str,
    /// Reduced visual tokens, when the request carried frames
    pub visual_tokens: Option<&'a ReducedTokenSequence>,
    pub params: &'a GenerationParams,
}

/// One generated sequence in backend-native form.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct GeneratedSequence {
    pub text: String,
    #[serde(default)]
    pub token_ids: Vec<u32>,
    /// Per-token log-probabilities, when the backend exposes them
    #[serde(default)]
    pub logprobs: Option<Vec<f32>>,
}

/// Raw backend output, before postprocessing.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RawOutput {
    pub sequences: Vec<GeneratedSequence>,
}

impl RawOutput {
    /// Output holding a single text-only sequence.
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            sequences: vec![GeneratedSequence {
                text: text.into(),
                ..Default::default()
            }],
        }
    }
}

/// Text-generation capability.
pub trait GenerationBackend: Send + Sync {
    /// Short backend name used in logs and errors.
    fn name(&self) -> &str;

    /// Run one generation call. May block.
    fn generate(&self, request: &GenerationRequest<'_>) -> PipelineResult<RawOutput>;
}

/// Deterministic local backend.
///
/// Produces `num_return_sequences` sequences of the form
/// `"[visual_tokens=N] <prompt>"`, truncated to `max_length` whitespace
/// separated words. Token ids are word indices.
#[derive(Debug, Default)]
pub struct EchoBackend {
    logprob: Option<f32>,
    calls: AtomicU64,
}

impl EchoBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach a constant per-token log-probability to every sequence.
    pub fn with_logprob(mut self, logprob: f32) -> Self {
        self.logprob = Some(logprob);
        self
    }

    /// Number of `generate` calls served so far.
    pub fn calls(&self) -> u64 {
        self.calls.load(Ordering::Relaxed)
    }
}

impl GenerationBackend for EchoBackend {
    fn name(&self) -> &str {
        "echo"
    }

    fn generate(&self, request: &GenerationRequest<'_>) -> PipelineResult<RawOutput> {
        self.calls.fetch_add(1, Ordering::Relaxed);

        let visual = request.visual_tokens.map_or(0, ReducedTokenSequence::len);
        let full = format!("[visual_tokens={}] {}", visual, request.prompt);
        let words: Vec<&str> = full
            .split_whitespace()
            .take(request.params.max_length as usize)
            .collect();
        let text = words.join(" ");
        let token_ids: Vec<u32> = (0..words.len() as u32).collect();
        let logprobs = self.logprob.map(|lp| vec![lp; words.len()]);

        let sequence = GeneratedSequence {
            text,
            token_ids,
            logprobs,
        };
        Ok(RawOutput {
            sequences: vec![sequence; request.params.num_return_sequences as usize],
        })
    }
}

#[cfg(feature = "http-backend")]
pub use http::HttpBackend;

#[cfg(feature = "http-backend")]
mod http {
    use std::sync::OnceLock;
    use std::time::Duration;

    use base64::{Engine as _, engine::general_purpose};
    use reqwest::blocking::Client;
    use serde::Deserialize;

    use super::{GeneratedSequence, GenerationBackend, GenerationRequest, RawOutput};
    use crate::error::{PipelineError, PipelineResult};
    use crate::tokenize::tokens::ReducedTokenSequence;

    /// Blocking HTTP client for a remote generation server.
    ///
    /// Request body:
    /// `{"prompt", "visual_tokens" (base64 of little-endian f32), "token_count",
    /// "token_dim", "params"}`.
    ///
    /// Accepted response bodies: `{"text": ..}`, `{"texts": [..]}` or
    /// `{"sequences": [{"text", "token_ids", "logprobs"}]}`.
    ///
    /// The client is built on first use, on the worker thread that issues
    /// the request, so constructing the backend inside an async runtime is
    /// fine.
    pub struct HttpBackend {
        client: OnceLock<Client>,
        endpoint: String,
        timeout: Duration,
    }

    #[derive(Deserialize)]
    struct ServerReply {
        #[serde(default)]
        text: Option<String>,
        #[serde(default)]
        texts: Option<Vec<String>>,
        #[serde(default)]
        sequences: Option<Vec<GeneratedSequence>>,
    }

    impl HttpBackend {
        pub fn new(endpoint: impl Into<String>) -> Self {
            Self {
                client: OnceLock::new(),
                endpoint: endpoint.into(),
                timeout: Duration::from_secs(30),
            }
        }

        pub fn with_timeout(mut self, timeout: Duration) -> Self {
            self.timeout = timeout;
            self
        }

        pub fn endpoint(&self) -> &str {
            &self.endpoint
        }

        fn encode_tokens(tokens: &ReducedTokenSequence) -> String {
            let mut bytes = Vec::with_capacity(tokens.len() * tokens.token_dim() * 4);
            for value in tokens.tokens().iter().flatten() {
                bytes.extend_from_slice(&value.to_le_bytes());
            }
            general_purpose::STANDARD.encode(&bytes)
        }
    }

    impl GenerationBackend for HttpBackend {
        fn name(&self) -> &str {
            "http"
        }

        fn generate(&self, request: &GenerationRequest<'_>) -> PipelineResult<RawOutput> {
            let (visual, count, dim) = match request.visual_tokens {
                Some(tokens) => (
                    Some(Self::encode_tokens(tokens)),
                    tokens.len(),
                    tokens.token_dim(),
                ),
                None => (None, 0, 0),
            };
            let body = serde_json::json!({
                "prompt": request.prompt,
                "visual_tokens": visual,
                "token_count": count,
                "token_dim": dim,
                "params": request.params,
            });

            let response = self
                .client
                .get_or_init(Client::new)
                .post(&self.endpoint)
                .json(&body)
                .timeout(self.timeout)
                .send()
                .map_err(|e| {
                    PipelineError::generation_with_source("http", "request failed", e)
                })?;

            let status = response.status();
            if !status.is_success() {
                let detail = response.text().unwrap_or_default();
                return Err(PipelineError::generation(
                    "http",
                    format!("server returned {}: {}", status, detail),
                ));
            }

            let reply: ServerReply = response.json().map_err(|e| {
                PipelineError::generation_with_source("http", "malformed response body", e)
            })?;

            let sequences = if let Some(sequences) = reply.sequences {
                sequences
            } else if let Some(texts) = reply.texts {
                texts
                    .into_iter()
                    .map(|text| GeneratedSequence {
                        text,
                        ..Default::default()
                    })
                    .collect()
            } else if let Some(text) = reply.text {
                vec![GeneratedSequence {
                    text,
                    ..Default::default()
                }]
            } else {
                return Err(PipelineError::generation(
                    "http",
                    "response carried no text",
                ));
            };

            Ok(RawOutput { sequences })
        }
    }
}

/// Backend that always fails; handy for exercising error paths.
#[derive(Debug, Clone)]
pub struct FailingBackend {
    reason: String,
}

impl FailingBackend {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

impl GenerationBackend for FailingBackend {
    fn name(&self) -> &str {
        "failing"
    }

    fn generate(&self, _request: &GenerationRequest<'_>) -> PipelineResult<RawOutput> {
        Err(PipelineError::generation("failing", self.reason.clone()))
    }
}
