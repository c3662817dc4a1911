//! # Frames
//!
//! A [`Frame`] is an immutable, row-major grid of 8-bit color samples
//! (height × width × channels). Pixel data sits behind an `Arc`, so cloning a
//! frame into a worker job or a downscale no-op never copies pixels.
//!
//! Supported layouts: 1 channel (gray), 3 channels (RGB), 4 channels (RGBA).
//! Alpha never contributes to luma.

pub mod sampling;
pub mod scale;

use std::path::Path;
use std::sync::Arc;

use crate::error::{PipelineError, PipelineResult};

pub use sampling::sample_indices;
pub use scale::FrameScaler;

/// Immutable image frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    data: Arc<Vec<u8>>,
    width: u32,
    height: u32,
    channels: u8,
}

impl Frame {
    /// Wrap a tightly packed buffer.
    ///
    /// Fails with `InvalidFrame` when the channel count is unsupported or the
    /// buffer length disagrees with `width * height * channels`. Zero-sized
    /// frames are representable and rejected later by [`Frame::validate`].
    pub fn new(width: u32, height: u32, channels: u8, data: Vec<u8>) -> PipelineResult<Self> {
        if !matches!(channels, 1 | 3 | 4) {
            return Err(PipelineError::invalid_frame(
                None,
                format!("unsupported channel count {}", channels),
            ));
        }
        let expected = width as usize * height as usize * channels as usize;
        if data.len() != expected {
            return Err(PipelineError::invalid_frame(
                None,
                format!(
                    "buffer holds {} bytes, {}x{}x{} needs {}",
                    data.len(),
                    width,
                    height,
                    channels,
                    expected
                ),
            ));
        }
        Ok(Self {
            data: Arc::new(data),
            width,
            height,
            channels,
        })
    }

    /// Solid-color frame; `color.len()` gives the channel count.
    pub fn filled(width: u32, height: u32, color: &[u8]) -> PipelineResult<Self> {
        let pixels = width as usize * height as usize;
        let data = color.repeat(pixels);
        Self::new(width, height, color.len() as u8, data)
    }

    /// Convert a decoded image to an RGB frame.
    pub fn from_image(image: &image::DynamicImage) -> Self {
        let rgb = image.to_rgb8();
        let (width, height) = rgb.dimensions();
        Self {
            data: Arc::new(rgb.into_raw()),
            width,
            height,
            channels: 3,
        }
    }

    /// Decode an image file into an RGB frame.
    pub fn open(path: impl AsRef<Path>) -> PipelineResult<Self> {
        let path = path.as_ref();
        let image = image::open(path).map_err(|e| {
            PipelineError::external("image", e).with_input_summary(path.display().to_string())
        })?;
        Ok(Self::from_image(&image))
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn channels(&self) -> u8 {
        self.channels
    }

    /// (height, width, channels)
    pub fn shape(&self) -> (u32, u32, u8) {
        (self.height, self.width, self.channels)
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Reject frames with no pixels.
    pub fn validate(&self) -> PipelineResult<()> {
        if self.is_empty() {
            return Err(PipelineError::invalid_frame(
                None,
                format!("frame is empty ({}x{})", self.width, self.height),
            ));
        }
        Ok(())
    }

    /// Color samples of the pixel at (x, y), alpha included.
    pub fn pixel(&self, x: u32, y: u32) -> &[u8] {
        let c = self.channels as usize;
        let start = (y as usize * self.width as usize + x as usize) * c;
        &self.data[start..start + c]
    }

    fn color_channels(&self) -> usize {
        if self.channels == 4 { 3 } else { self.channels as usize }
    }

    /// Per-pixel mean over color channels, row-major.
    pub fn luma(&self) -> Vec<f32> {
        let c = self.channels as usize;
        let colors = self.color_channels();
        self.data
            .chunks_exact(c)
            .map(|px| px[..colors].iter().map(|&v| v as f32).sum::<f32>() / colors as f32)
            .collect()
    }

    /// Content digest over shape and pixel data.
    pub fn digest(&self) -> blake3::Hash {
        let mut hasher = blake3::Hasher::new();
        hasher.update(&self.width.to_le_bytes());
        hasher.update(&self.height.to_le_bytes());
        hasher.update(&[self.channels]);
        hasher.update(&self.data);
        hasher.finalize()
    }
}

/// Validate a request's frame list: every frame non-empty, all sharing one shape.
pub fn validate_frames(frames: &[Frame]) -> PipelineResult<()> {
    let Some(first) = frames.first() else {
        return Ok(());
    };
    for (index, frame) in frames.iter().enumerate() {
        if frame.is_empty() {
            return Err(PipelineError::invalid_frame(
                Some(index),
                format!("frame is empty ({}x{})", frame.width, frame.height),
            ));
        }
        if frame.shape() != first.shape() {
            let (h0, w0, c0) = first.shape();
            let (h, w, c) = frame.shape();
            return Err(PipelineError::validation(
                format!("frames[{}]", index),
                format!("shape must match frame 0 ({}x{}x{})", h0, w0, c0),
                format!("{}x{}x{}", h, w, c),
            ));
        }
    }
    Ok(())
}
