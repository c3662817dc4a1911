//! # Complexity Estimator
//!
//! Scores a frame's visual detail as the mean absolute luma gradient.
//!
//! Luma is the per-pixel mean over color channels. The mean absolute first
//! difference is taken along each spatial axis independently, and the score
//! is the average of the two. A flat frame scores exactly 0; no upper bound
//! is applied here (the budget allocator clamps).
//!
//! An axis with a single sample (a one-pixel-tall or one-pixel-wide frame)
//! has no differences and contributes 0.
//!
//! ## Performance Characteristics
//!
//! - O(width × height), one luma pass plus one pass per axis
//! - Allocates one `f32` buffer of width × height

use crate::error::{PipelineError, PipelineResult};
use crate::frame::Frame;

/// Visual complexity score, in [0, 255] for 8-bit frames.
pub type ComplexityScore = f64;

/// Estimate the complexity of `frame`.
///
/// Fails with `InvalidFrame` on an empty frame.
pub fn estimate(frame: &Frame) -> PipelineResult<ComplexityScore> {
    if frame.is_empty() {
        return Err(PipelineError::invalid_frame(
            None,
            format!("cannot score empty frame ({}x{})", frame.width(), frame.height()),
        ));
    }
    let luma = frame.luma();
    let (w, h) = (frame.width() as usize, frame.height() as usize);
    Ok((axis_gradient(&luma, w, h, Axis::Rows) + axis_gradient(&luma, w, h, Axis::Cols)) / 2.0)
}

#[derive(Clone, Copy)]
enum Axis {
    Rows,
    Cols,
}

fn axis_gradient(luma: &[f32], w: usize, h: usize, axis: Axis) -> f64 {
    let mut total = 0.0f64;
    let mut count = 0usize;
    match axis {
        Axis::Rows => {
            for y in 1..h {
                let (prev, cur) = (&luma[(y - 1) * w..y * w], &luma[y * w..(y + 1) * w]);
                for (a, b) in prev.iter().zip(cur) {
                    total += (b - a).abs() as f64;
                }
                count += w;
            }
        }
        Axis::Cols => {
            for row in luma.chunks_exact(w) {
                for pair in row.windows(2) {
                    total += (pair[1] - pair[0]).abs() as f64;
                }
                count += w - 1;
            }
        }
    }
    if count == 0 { 0.0 } else { total / count as f64 }
}
