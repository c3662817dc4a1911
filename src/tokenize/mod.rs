//! # Adaptive Visual Tokenization
//!
//! Per-frame token budgets sized to visual complexity, followed by
//! similarity-based reduction across the frame sequence.
//!
//! ## Architecture
//!
//! ```text
//! frame ─▶ complexity::estimate ─▶ BudgetAllocator ─▶ VisionEncoder ─┐
//! frame ─▶ complexity::estimate ─▶ BudgetAllocator ─▶ VisionEncoder ─┼─▶ SimilarityReducer ─▶ ReducedTokenSequence
//! frame ─▶ ...                                                       ─┘
//! ```
//!
//! Frames are processed strictly in order; the reducer runs once over the
//! full list of per-frame token sets. Complexity is always scored on the
//! received frame. An optional [`FrameScaler`] shrinks only the encoder input.

pub mod budget;
pub mod complexity;
pub mod reducer;
pub mod tokens;

use std::sync::Arc;

use tracing::debug;

use crate::encoder::VisionEncoder;
use crate::error::{PipelineError, PipelineResult};
use crate::frame::{Frame, FrameScaler};

pub use budget::BudgetAllocator;
pub use complexity::{ComplexityScore, estimate};
pub use reducer::{SimilarityReducer, cosine_similarity, reduce, set_similarity};
pub use tokens::{FrameTokenSet, ReducedTokenSequence, TokenVector};

/// Result of tokenizing one frame sequence.
#[derive(Debug, Clone, PartialEq)]
pub struct TokenizedFrames {
    pub sequence: ReducedTokenSequence,
    /// Complexity score per input frame
    pub scores: Vec<ComplexityScore>,
    /// Token budget per input frame
    pub budgets: Vec<usize>,
}

impl TokenizedFrames {
    /// Visual tokens produced before reduction.
    pub fn tokens_before(&self) -> usize {
        self.budgets.iter().sum()
    }
}

/// Estimate → allocate → encode per frame, then reduce.
#[derive(Clone)]
pub struct FrameTokenizer {
    allocator: BudgetAllocator,
    reducer: SimilarityReducer,
    encoder: Arc<dyn VisionEncoder>,
    scaler: Option<FrameScaler>,
}

impl FrameTokenizer {
    pub fn new(
        allocator: BudgetAllocator,
        reducer: SimilarityReducer,
        encoder: Arc<dyn VisionEncoder>,
    ) -> Self {
        Self {
            allocator,
            reducer,
            encoder,
            scaler: None,
        }
    }

    /// Downscale frames before they reach the encoder.
    pub fn with_scaler(mut self, scaler: Option<FrameScaler>) -> Self {
        self.scaler = scaler;
        self
    }

    pub fn allocator(&self) -> &BudgetAllocator {
        &self.allocator
    }

    pub fn reducer(&self) -> &SimilarityReducer {
        &self.reducer
    }

    pub fn encoder(&self) -> &dyn VisionEncoder {
        self.encoder.as_ref()
    }

    /// Tokenize `frames` in order.
    ///
    /// Fails with `InvalidFrame` when a frame cannot be scored and with
    /// `Encoding` when the encoder fails or returns a set whose length is not
    /// the requested budget.
    pub fn tokenize(&self, frames: &[Frame]) -> PipelineResult<TokenizedFrames> {
        let mut sets = Vec::with_capacity(frames.len());
        let mut scores = Vec::with_capacity(frames.len());
        let mut budgets = Vec::with_capacity(frames.len());

        for (index, frame) in frames.iter().enumerate() {
            let score = estimate(frame).map_err(|e| match e {
                PipelineError::InvalidFrame { reason, .. } => {
                    PipelineError::invalid_frame(Some(index), reason)
                }
                other => other,
            })?;
            let budget = self.allocator.allocate(score);
            let encoder_input = match &self.scaler {
                Some(scaler) => scaler
                    .scale(frame)
                    .map_err(|e| e.with_metadata("frame", index.to_string()))?,
                None => frame.clone(),
            };
            let set = self
                .encoder
                .encode(&encoder_input, budget)
                .map_err(|e| e.with_metadata("frame", index.to_string()))?;
            if set.len() != budget {
                return Err(PipelineError::encoding(
                    self.encoder.name(),
                    format!("returned {} tokens for a budget of {}", set.len(), budget),
                )
                .with_metadata("frame", index.to_string()));
            }
            debug!(frame = index, score, budget, "frame tokenized");

            scores.push(score);
            budgets.push(budget);
            sets.push(set);
        }

        Ok(TokenizedFrames {
            sequence: self.reducer.reduce(sets),
            scores,
            budgets,
        })
    }
}
