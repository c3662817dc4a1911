//! Inference requests and their canonical cache keys.

use serde_json::json;

use crate::frame::Frame;
use crate::inference::params::{GenerationParams, ModelMode};

/// One request to the pipeline: prompt text plus optional frames.
///
/// Per-request `params` and `mode` override the orchestrator's defaults.
#[derive(Debug, Clone, PartialEq)]
pub struct InferenceRequest {
    pub text: String,
    pub frames: Vec<Frame>,
    pub params: Option<GenerationParams>,
    pub mode: Option<ModelMode>,
}

/// Request shape, as reported in logs and metadata.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestKind {
    Text,
    Multimodal,
}

impl RequestKind {
    pub fn as_str(self) -> &'static str {
        match self {
            RequestKind::Text => "text",
            RequestKind::Multimodal => "multimodal",
        }
    }
}

impl InferenceRequest {
    /// Text-only request.
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            frames: Vec::new(),
            params: None,
            mode: None,
        }
    }

    /// Text plus frames, in capture order.
    pub fn multimodal(text: impl Into<String>, frames: Vec<Frame>) -> Self {
        Self {
            frames,
            ..Self::text(text)
        }
    }

    pub fn with_params(mut self, params: GenerationParams) -> Self {
        self.params = Some(params);
        self
    }

    pub fn with_mode(mut self, mode: ModelMode) -> Self {
        self.mode = Some(mode);
        self
    }

    pub fn kind(&self) -> RequestKind {
        if self.frames.is_empty() {
            RequestKind::Text
        } else {
            RequestKind::Multimodal
        }
    }

    /// Short description for error context, e.g. `text(12 chars), 3 frames`.
    pub fn summary(&self) -> String {
        format!(
            "text({} chars), {} frames",
            self.text.chars().count(),
            self.frames.len()
        )
    }

    /// Canonical JSON of everything that determines the response.
    ///
    /// Frames enter by content digest. `mode` and `params` are the effective
    /// values after falling back to the given defaults.
    pub fn canonical_form(&self, mode: ModelMode, params: &GenerationParams) -> String {
        let frames: Vec<String> = self
            .frames
            .iter()
            .map(|f| f.digest().to_hex().to_string())
            .collect();
        json!({
            "text": self.text,
            "frames": frames,
            "mode": mode,
            "params": params,
        })
        .to_string()
    }

    /// Cache key: hex blake3 digest of [`canonical_form`](Self::canonical_form).
    pub fn cache_key(&self, mode: ModelMode, params: &GenerationParams) -> String {
        blake3::hash(self.canonical_form(mode, params).as_bytes())
            .to_hex()
            .to_string()
    }
}

impl From<&str> for InferenceRequest {
    fn from(text: &str) -> Self {
        Self::text(text)
    }
}

impl From<String> for InferenceRequest {
    fn from(text: String) -> Self {
        Self::text(text)
    }
}
