//! Downscaling of oversized frames through `adaptok-scale`.

use adaptok_scale::Resizer;
use adaptok_scale::cpu::scale_u8_cpu;
use adaptok_scale::presets::{AspectMode, ScaleTarget, Size, build_plan};

use super::Frame;
use crate::error::{PipelineError, PipelineResult};

/// Clamps frames to a maximum long side, aspect preserved, never upscaling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameScaler {
    max_long_side: u32,
}

impl FrameScaler {
    pub fn new(max_long_side: u32) -> Self {
        Self {
            max_long_side: max_long_side.max(1),
        }
    }

    pub fn max_long_side(&self) -> u32 {
        self.max_long_side
    }

    /// Downscale `frame` if needed. Frames already within bounds are returned
    /// as a cheap clone sharing the same pixels.
    pub fn scale(&self, frame: &Frame) -> PipelineResult<Frame> {
        let input = Size {
            w: frame.width(),
            h: frame.height(),
        };
        let plan = build_plan(
            input,
            ScaleTarget::MaxLongSide(self.max_long_side),
            AspectMode::Preserve,
        );
        if plan.is_identity() || frame.is_empty() {
            return Ok(frame.clone());
        }

        let channels = frame.channels() as usize;
        let mut dst = vec![0u8; plan.out_len(channels)];
        let mut resizer = Resizer::new();
        scale_u8_cpu(&mut resizer, frame.data(), channels, &plan, &mut dst)
            .map_err(|e| PipelineError::external("adaptok-scale", e).with_stage("preprocess"))?;

        Frame::new(plan.out.w, plan.out.h, frame.channels(), dst)
    }
}
