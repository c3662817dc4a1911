//! # Similarity Reducer
//!
//! Drops frames whose tokens are redundant with the most recently *kept*
//! frame. The first frame is always kept; the comparison chain only advances
//! on keeps, so a slow drift across many near-identical frames still
//! produces a new keep once it has moved far enough from the last one.
//!
//! Similarity is cosine similarity between mean-pooled token vectors,
//! clamped to [0, 1]. It is symmetric and equal token sets score exactly 1.0.

use tracing::debug;

use crate::error::{PipelineError, PipelineResult};
use crate::tokenize::tokens::{FrameTokenSet, ReducedTokenSequence};

pub const DEFAULT_THRESHOLD: f32 = 0.8;

/// Cosine similarity clamped to [0, 1].
///
/// Two zero vectors are identical (1.0); a zero vector against a non-zero
/// one, or vectors of different width, share nothing (0.0).
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }
    let (mut dot, mut na, mut nb) = (0.0f64, 0.0f64, 0.0f64);
    for (&x, &y) in a.iter().zip(b) {
        let (x, y) = (x as f64, y as f64);
        dot += x * y;
        na += x * x;
        nb += y * y;
    }
    match (na == 0.0, nb == 0.0) {
        (true, true) => 1.0,
        (true, false) | (false, true) => 0.0,
        _ => (dot / (na.sqrt() * nb.sqrt())).clamp(0.0, 1.0) as f32,
    }
}

/// Similarity between two frame token sets.
pub fn set_similarity(a: &FrameTokenSet, b: &FrameTokenSet) -> f32 {
    if a == b {
        return 1.0;
    }
    cosine_similarity(&a.pooled(), &b.pooled())
}

/// Threshold-based frame deduplication.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SimilarityReducer {
    threshold: f32,
}

impl Default for SimilarityReducer {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_THRESHOLD,
        }
    }
}

impl SimilarityReducer {
    /// `threshold` must lie in [0, 1]. Higher keeps more frames.
    pub fn new(threshold: f32) -> PipelineResult<Self> {
        if !(0.0..=1.0).contains(&threshold) {
            return Err(PipelineError::config(
                "similarity_threshold",
                threshold.to_string(),
                "must be in [0, 1]",
            ));
        }
        Ok(Self { threshold })
    }

    pub fn threshold(&self) -> f32 {
        self.threshold
    }

    /// Keep/drop decision per input set.
    pub fn keep_mask(&self, sets: &[FrameTokenSet]) -> Vec<bool> {
        let mut mask = Vec::with_capacity(sets.len());
        let mut last_kept: Option<&FrameTokenSet> = None;
        for (index, set) in sets.iter().enumerate() {
            let keep = match last_kept {
                None => true,
                Some(previous) => {
                    let similarity = set_similarity(previous, set);
                    debug!(frame = index, similarity, threshold = self.threshold, "frame similarity");
                    similarity < self.threshold
                }
            };
            if keep {
                last_kept = Some(set);
            }
            mask.push(keep);
        }
        mask
    }

    /// Concatenate the kept sets in frame order.
    ///
    /// An empty input yields an empty sequence; a single set comes back
    /// unchanged.
    pub fn reduce(&self, sets: Vec<FrameTokenSet>) -> ReducedTokenSequence {
        let mask = self.keep_mask(&sets);
        sets.into_iter()
            .zip(mask)
            .enumerate()
            .filter_map(|(index, (set, keep))| keep.then_some((index, set)))
            .collect()
    }
}

/// Reduce `sets` with the given threshold.
pub fn reduce(sets: Vec<FrameTokenSet>, threshold: f32) -> PipelineResult<ReducedTokenSequence> {
    Ok(SimilarityReducer::new(threshold)?.reduce(sets))
}
