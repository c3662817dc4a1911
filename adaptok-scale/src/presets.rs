// SPDX-License-Identifier: MIT
//! # Scaling Presets and Plan Computation
//!
//! Computes output dimensions for a frame before it is resized. Plans never
//! upscale: a frame already within the target keeps its dimensions, and
//! [`ScalePlan::is_identity`] lets callers skip the resize entirely.

/// Represents a 2D size with width and height in pixels.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Size {
    pub w: u32,
    pub h: u32,
}

/// Defines how aspect ratio differences are handled during scaling.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AspectMode {
    /// Keep original aspect ratio; output fits entirely within target bounds.
    Preserve,
    /// Stretch/squeeze to exactly match target dimensions.
    Distort,
}

/// Defines the target size constraint for scaling operations.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ScaleTarget {
    /// Clamp the longest side to a maximum value, derive the other side proportionally.
    MaxLongSide(u32),
    /// Force output into exact dimensions.
    Exact(Size),
}

/// Complete scaling plan computed from input parameters.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ScalePlan {
    /// Original input dimensions
    pub input: Size,
    /// Target size constraint used for planning
    pub target: ScaleTarget,
    /// Aspect ratio handling strategy
    pub aspect: AspectMode,
    /// Final computed output dimensions
    pub out: Size,
}

impl ScalePlan {
    /// True when the plan leaves the frame untouched.
    pub fn is_identity(&self) -> bool {
        self.input == self.out
    }

    /// Byte length of the output buffer for `channels` 8-bit samples per pixel.
    pub fn out_len(&self, channels: usize) -> usize {
        self.out.w as usize * self.out.h as usize * channels
    }
}

/// Compute a complete scaling plan from input parameters.
///
/// # Performance
/// O(1) computation with minimal floating-point operations
pub fn build_plan(input: Size, target: ScaleTarget, aspect: AspectMode) -> ScalePlan {
    let out = match (target, aspect) {
        (ScaleTarget::MaxLongSide(max_side), AspectMode::Preserve) => {
            let (w, h) = fit_preserve(input, max_side);
            Size { w, h }
        }
        (ScaleTarget::MaxLongSide(max_side), AspectMode::Distort) => Size {
            w: max_side.max(1),
            h: max_side.max(1),
        },
        (ScaleTarget::Exact(out), AspectMode::Distort) => Size {
            w: out.w.max(1),
            h: out.h.max(1),
        },
        (ScaleTarget::Exact(out), AspectMode::Preserve) => {
            let (w, h) = fit_within(input, out);
            Size { w, h }
        }
    };
    ScalePlan {
        input,
        target,
        aspect,
        out,
    }
}

/// Fit image within max_side constraint while preserving aspect ratio.
/// Never upscales - returns original dimensions if already smaller than max_side.
fn fit_preserve(input: Size, max_long: u32) -> (u32, u32) {
    let (w, h) = (input.w as f64, input.h as f64);
    let long = w.max(h).max(1.0);
    let s = (max_long as f64 / long).min(1.0);
    (
        ((w * s).round() as u32).max(1),
        ((h * s).round() as u32).max(1),
    )
}

/// Fit image within a bounding box while preserving aspect ratio.
fn fit_within(input: Size, box_: Size) -> (u32, u32) {
    let (w, h) = (input.w.max(1) as f64, input.h.max(1) as f64);
    let (bw, bh) = (box_.w as f64, box_.h as f64);
    let s = (bw / w).min(bh / h).min(1.0);
    (
        ((w * s).round() as u32).max(1),
        ((h * s).round() as u32).max(1),
    )
}

/// Detail presets for the longest frame side handed to the vision encoder.
///
/// Higher detail keeps more pixels for the complexity estimator and encoder
/// at the cost of encode time.
#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum DetailPreset {
    /// 448px longest side
    #[clap(name = "low")]
    Low448,
    /// 672px longest side
    #[clap(name = "medium")]
    Medium672,
    /// 1024px longest side
    #[clap(name = "high")]
    High1024,
}

impl DetailPreset {
    /// Longest side in pixels for this preset.
    pub fn max_long_side(self) -> u32 {
        match self {
            DetailPreset::Low448 => 448,
            DetailPreset::Medium672 => 672,
            DetailPreset::High1024 => 1024,
        }
    }

    /// Convert preset to the corresponding ScaleTarget for plan computation.
    pub fn to_target(self) -> ScaleTarget {
        ScaleTarget::MaxLongSide(self.max_long_side())
    }
}
