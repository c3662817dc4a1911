// SPDX-License-Identifier: MIT
//! # adaptok-scale: Frame Downscaling Ahead of Tokenization
//!
//! Oversized frames cost encoder time without buying budget: the token budget
//! for a frame is capped by the allocator's ceiling no matter how many pixels
//! the frame carries. This crate clamps frames to a maximum long side before
//! they reach the complexity estimator and the vision encoder.
//!
//! ## Key Components
//!
//! - [`presets`]: Scaling plan computation and detail presets
//! - [`cpu`]: SIMD-accelerated CPU resize for 1, 3 and 4 channel 8-bit frames
//!
//! ## Usage Example
//!
//! ```rust
//! use adaptok_scale::cpu::scale_u8_cpu;
//! use adaptok_scale::presets::{build_plan, AspectMode, ScaleTarget, Size};
//!
//! let input = Size { w: 1920, h: 1080 };
//! let plan = build_plan(input, ScaleTarget::MaxLongSide(640), AspectMode::Preserve);
//! assert_eq!((plan.out.w, plan.out.h), (640, 360));
//!
//! let src = vec![128u8; (input.w * input.h * 3) as usize];
//! let mut dst = vec![0u8; plan.out_len(3)];
//! let mut resizer = fast_image_resize::Resizer::new();
//! scale_u8_cpu(&mut resizer, &src, 3, &plan, &mut dst).unwrap();
//! ```

pub mod cpu;
pub mod presets;

pub use fast_image_resize::Resizer;
