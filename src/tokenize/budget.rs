//! # Token Budget Allocator
//!
//! Maps a complexity score to a per-frame token count:
//!
//! ```text
//! budget = trunc(clamp(score * scale, floor, ceiling))
//! ```
//!
//! Every frame gets at least `floor` tokens and none exceeds `ceiling`
//! (the model's per-frame capacity). Bounds are checked once, when the
//! allocator is built.

use crate::error::{PipelineError, PipelineResult};
use crate::tokenize::complexity::ComplexityScore;

pub const DEFAULT_FLOOR: usize = 16;
pub const DEFAULT_CEILING: usize = 1024;
pub const DEFAULT_SCALE: f32 = 64.0;

/// Clamped linear score-to-budget mapping.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BudgetAllocator {
    floor: usize,
    ceiling: usize,
    scale: f64,
}

impl Default for BudgetAllocator {
    fn default() -> Self {
        Self {
            floor: DEFAULT_FLOOR,
            ceiling: DEFAULT_CEILING,
            scale: DEFAULT_SCALE as f64,
        }
    }
}

impl BudgetAllocator {
    /// Build an allocator, rejecting inconsistent bounds.
    ///
    /// `ceiling < floor` is a `Configuration` error, as are a zero floor and
    /// a non-positive or non-finite scale.
    pub fn new(floor: usize, ceiling: usize, scale: f32) -> PipelineResult<Self> {
        if floor == 0 {
            return Err(PipelineError::config(
                "budget.floor",
                "0",
                "must be at least 1",
            ));
        }
        if ceiling < floor {
            return Err(PipelineError::config(
                "max_frame_tokens",
                ceiling.to_string(),
                format!("ceiling must not be below budget floor {}", floor),
            ));
        }
        if !(scale.is_finite() && scale > 0.0) {
            return Err(PipelineError::config(
                "budget.scale",
                scale.to_string(),
                "must be finite and greater than 0",
            ));
        }
        Ok(Self {
            floor,
            ceiling,
            scale: scale as f64,
        })
    }

    pub fn floor(&self) -> usize {
        self.floor
    }

    pub fn ceiling(&self) -> usize {
        self.ceiling
    }

    /// Token budget for `score`. Always within `[floor, ceiling]`.
    pub fn allocate(&self, score: ComplexityScore) -> usize {
        let raw = score * self.scale;
        if raw.is_nan() {
            return self.floor;
        }
        raw.clamp(self.floor as f64, self.ceiling as f64) as usize
    }
}
