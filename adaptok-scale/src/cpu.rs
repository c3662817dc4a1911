// SPDX-License-Identifier: MIT
// CPU scaler built on fast_image_resize (SIMD-accelerated).
// Tightly packed 8-bit frames in (1, 3 or 4 channels), same layout out.

use fast_image_resize as fir;
use fir::images::{TypedImage, TypedImageRef};
use fir::pixels::{U8, U8x3, U8x4};
use fir::{ResizeOptions, Resizer};

use crate::presets::ScalePlan;

#[derive(Debug)]
pub enum ScaleError {
    BufferTooSmall { needed: usize, got: usize },
    UnsupportedChannels(usize),
    Fir(fir::ResizeError),
    ImageBuf(fir::ImageBufferError),
}

impl From<fir::ResizeError> for ScaleError { fn from(e: fir::ResizeError) -> Self { Self::Fir(e) } }
impl From<fir::ImageBufferError> for ScaleError { fn from(e: fir::ImageBufferError) -> Self { Self::ImageBuf(e) } }

impl std::fmt::Display for ScaleError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ScaleError::BufferTooSmall { needed, got } => {
                write!(f, "Output buffer too small: need {} bytes, got {}", needed, got)
            }
            ScaleError::UnsupportedChannels(c) => write!(f, "Unsupported channel count: {}", c),
            ScaleError::Fir(e) => write!(f, "Fast image resize error: {}", e),
            ScaleError::ImageBuf(e) => write!(f, "Image buffer error: {}", e),
        }
    }
}

impl std::error::Error for ScaleError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ScaleError::Fir(e) => Some(e),
            ScaleError::ImageBuf(e) => Some(e),
            _ => None,
        }
    }
}

macro_rules! resize_as {
    ($pixel:ty, $resizer:expr, $src:expr, $plan:expr, $dst:expr, $opts:expr) => {{
        let src_view = TypedImageRef::<$pixel>::from_buffer($plan.input.w, $plan.input.h, $src)?;
        let mut dst_image = TypedImage::<$pixel>::from_buffer($plan.out.w, $plan.out.h, $dst)?;
        $resizer.resize_typed::<$pixel>(&src_view, &mut dst_image, $opts)?;
    }};
}

/// Main scaling entry point.
///
/// `src` must hold `plan.input.w * plan.input.h * channels` bytes, tightly packed.
/// `dst` must hold at least `plan.out_len(channels)` bytes.
pub fn scale_u8_cpu(
    resizer: &mut Resizer,
    src: &[u8],
    channels: usize,
    plan: &ScalePlan,
    dst: &mut [u8],
) -> Result<(), ScaleError> {
    let needed = plan.out_len(channels);
    if dst.len() < needed {
        return Err(ScaleError::BufferTooSmall {
            needed,
            got: dst.len(),
        });
    }
    let dst = &mut dst[..needed];

    // Frames are opaque content; alpha, when present, is carried as-is.
    let opts = ResizeOptions::new().use_alpha(false);

    match channels {
        1 => resize_as!(U8, resizer, src, plan, dst, &opts),
        3 => resize_as!(U8x3, resizer, src, plan, dst, &opts),
        4 => resize_as!(U8x4, resizer, src, plan, dst, &opts),
        other => return Err(ScaleError::UnsupportedChannels(other)),
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::presets::{build_plan, AspectMode, ScaleTarget, Size};

    #[test]
    fn solid_rgb_stays_solid() {
        let plan = build_plan(
            Size { w: 64, h: 32 },
            ScaleTarget::MaxLongSide(16),
            AspectMode::Preserve,
        );
        let src = vec![200u8; 64 * 32 * 3];
        let mut dst = vec![0u8; plan.out_len(3)];
        let mut resizer = Resizer::new();
        scale_u8_cpu(&mut resizer, &src, 3, &plan, &mut dst).unwrap();
        assert_eq!(dst.len(), 16 * 8 * 3);
        assert!(dst.iter().all(|&v| (199..=201).contains(&v)));
    }

    #[test]
    fn rejects_small_destination() {
        let plan = build_plan(
            Size { w: 8, h: 8 },
            ScaleTarget::MaxLongSide(4),
            AspectMode::Preserve,
        );
        let src = vec![0u8; 64];
        let mut dst = vec![0u8; 3];
        let mut resizer = Resizer::new();
        let err = scale_u8_cpu(&mut resizer, &src, 1, &plan, &mut dst).unwrap_err();
        assert!(matches!(err, ScaleError::BufferTooSmall { needed: 16, got: 3 }));
    }

    #[test]
    fn rejects_two_channel_frames() {
        let plan = build_plan(
            Size { w: 4, h: 4 },
            ScaleTarget::MaxLongSide(2),
            AspectMode::Preserve,
        );
        let src = vec![0u8; 32];
        let mut dst = vec![0u8; plan.out_len(2)];
        let mut resizer = Resizer::new();
        let err = scale_u8_cpu(&mut resizer, &src, 2, &plan, &mut dst).unwrap_err();
        assert!(matches!(err, ScaleError::UnsupportedChannels(2)));
    }
}
