//! # Vision Encoders
//!
//! A [`VisionEncoder`] turns one frame into exactly `token_count` token
//! vectors. Real encoders are neural networks living behind an adapter; the
//! pipeline only relies on the contract:
//!
//! - the returned set holds exactly `token_count` vectors
//! - identical frames and counts give identical sets
//! - malformed frames fail with an `Encoding` error
//!
//! [`PatchPoolEncoder`] is a deterministic, dependency-free encoder that
//! pools color and gradient statistics over a grid of patches. It gives the
//! reducer a meaningful embedding space without a model.

use crate::error::{PipelineError, PipelineResult};
use crate::frame::Frame;
use crate::tokenize::tokens::FrameTokenSet;

/// Frame-to-tokens capability.
pub trait VisionEncoder: Send + Sync {
    /// Short encoder name used in logs and errors.
    fn name(&self) -> &str;

    /// Encode `frame` into exactly `token_count` token vectors. May block.
    fn encode(&self, frame: &Frame, token_count: usize) -> PipelineResult<FrameTokenSet>;
}

/// Patch-pooling encoder.
///
/// The frame is split into exactly `token_count` patches laid out row-major:
/// `floor(sqrt(token_count))` bands, each band split evenly into columns so
/// every band spans the full width. Each token is
/// `[mean R, mean G, mean B, mean gradient]`, normalized to [0, 1]. Gray
/// frames replicate luma into R, G and B; alpha is ignored.
#[derive(Debug, Clone, Copy, Default)]
pub struct PatchPoolEncoder;

impl PatchPoolEncoder {
    /// Width of every token vector.
    pub const TOKEN_DIM: usize = 4;

    pub fn new() -> Self {
        Self
    }
}

/// `count` contiguous ranges covering `0..len`, each at least one wide.
fn split(len: usize, count: usize, i: usize) -> (usize, usize) {
    let start = (i * len / count).min(len - 1);
    let end = ((i + 1) * len / count).max(start + 1).min(len);
    (start, end)
}

/// Per-pixel mean of the available forward differences of luma.
fn gradient_map(luma: &[f32], w: usize, h: usize) -> Vec<f32> {
    let mut out = vec![0.0f32; w * h];
    for y in 0..h {
        for x in 0..w {
            let here = luma[y * w + x];
            let (mut sum, mut n) = (0.0f32, 0u32);
            if x + 1 < w {
                sum += (luma[y * w + x + 1] - here).abs();
                n += 1;
            }
            if y + 1 < h {
                sum += (luma[(y + 1) * w + x] - here).abs();
                n += 1;
            }
            if n > 0 {
                out[y * w + x] = sum / n as f32;
            }
        }
    }
    out
}

impl VisionEncoder for PatchPoolEncoder {
    fn name(&self) -> &str {
        "patch-pool"
    }

    fn encode(&self, frame: &Frame, token_count: usize) -> PipelineResult<FrameTokenSet> {
        if frame.is_empty() {
            return Err(PipelineError::encoding(
                self.name(),
                format!("frame is empty ({}x{})", frame.width(), frame.height()),
            ));
        }
        if token_count == 0 {
            return Err(PipelineError::encoding(self.name(), "token_count must be at least 1"));
        }

        let (w, h) = (frame.width() as usize, frame.height() as usize);
        let gradient = gradient_map(&frame.luma(), w, h);
        let gray = frame.channels() == 1;

        let bands = ((token_count as f64).sqrt() as usize).max(1);
        let mut tokens = Vec::with_capacity(token_count);
        for band in 0..bands {
            let (y0, y1) = split(h, bands, band);
            let cols = (band + 1) * token_count / bands - band * token_count / bands;
            for col in 0..cols {
                let (x0, x1) = split(w, cols, col);
                let mut sums = [0.0f64; 4];
                for y in y0..y1 {
                    for x in x0..x1 {
                        let px = frame.pixel(x as u32, y as u32);
                        let (r, g, b) = if gray {
                            (px[0], px[0], px[0])
                        } else {
                            (px[0], px[1], px[2])
                        };
                        sums[0] += r as f64;
                        sums[1] += g as f64;
                        sums[2] += b as f64;
                        sums[3] += gradient[y * w + x] as f64;
                    }
                }
                let n = ((y1 - y0) * (x1 - x0)) as f64 * 255.0;
                tokens.push(sums.iter().map(|s| (s / n) as f32).collect());
            }
        }

        debug_assert_eq!(tokens.len(), token_count);
        Ok(FrameTokenSet::new(tokens))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn checkerboard(size: u32) -> Frame {
        let mut data = Vec::new();
        for y in 0..size {
            for x in 0..size {
                let v = if (x + y) % 2 == 0 { 0 } else { 255 };
                data.extend_from_slice(&[v, v, v]);
            }
        }
        Frame::new(size, size, 3, data).unwrap()
    }

    #[test]
    fn emits_exactly_token_count() {
        let frame = Frame::filled(64, 48, &[10, 20, 30]).unwrap();
        let encoder = PatchPoolEncoder::new();
        for count in [1, 2, 3, 16, 17, 63, 64, 100, 1024] {
            let set = encoder.encode(&frame, count).unwrap();
            assert_eq!(set.len(), count, "count={count}");
            assert_eq!(set.token_dim(), PatchPoolEncoder::TOKEN_DIM);
        }
    }

    #[test]
    fn more_tokens_than_pixels() {
        let frame = Frame::filled(2, 2, &[255]).unwrap();
        let set = PatchPoolEncoder.encode(&frame, 16).unwrap();
        assert_eq!(set.len(), 16);
        assert!(set.tokens().iter().all(|t| t[0] == 1.0 && t[3] == 0.0));
    }

    #[test]
    fn solid_frame_tokens_are_uniform() {
        let frame = Frame::filled(32, 32, &[255, 0, 51]).unwrap();
        let set = PatchPoolEncoder.encode(&frame, 16).unwrap();
        for token in set.tokens() {
            assert_eq!(token, &vec![1.0, 0.0, 0.2, 0.0]);
        }
    }

    #[test]
    fn deterministic() {
        let frame = checkerboard(16);
        let a = PatchPoolEncoder.encode(&frame, 20).unwrap();
        let b = PatchPoolEncoder.encode(&frame, 20).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn checkerboard_carries_gradient() {
        let set = PatchPoolEncoder.encode(&checkerboard(16), 16).unwrap();
        let pooled = set.pooled();
        assert!(pooled[3] > 0.9, "gradient feature {}", pooled[3]);
    }

    #[test]
    fn rejects_empty_frame_and_zero_count() {
        let empty = Frame::new(0, 3, 3, Vec::new()).unwrap();
        assert_eq!(PatchPoolEncoder.encode(&empty, 4).unwrap_err().category(), "encoding");
        let frame = Frame::filled(4, 4, &[0]).unwrap();
        assert!(PatchPoolEncoder.encode(&frame, 0).is_err());
    }
}
