//! Shared frame builders and capability doubles for the integration tests.

#![allow(dead_code)]

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use adaptok::encoder::{PatchPoolEncoder, VisionEncoder};
use adaptok::error::{PipelineError, PipelineResult};
use adaptok::frame::Frame;
use adaptok::inference::{EchoBackend, GenerationBackend, GenerationRequest, RawOutput};
use adaptok::tokenize::FrameTokenSet;

/// Test frame builders
pub mod frames {
    use super::*;

    /// Uniform RGB frame with every channel set to `value`.
    pub fn solid(size: u32, value: u8) -> Frame {
        Frame::filled(size, size, &[value, value, value]).unwrap()
    }

    /// One-pixel black/white checkerboard; maximal complexity.
    pub fn checkerboard(size: u32) -> Frame {
        let mut data = Vec::with_capacity((size * size * 3) as usize);
        for y in 0..size {
            for x in 0..size {
                let v = if (x + y) % 2 == 0 { 0 } else { 255 };
                data.extend_from_slice(&[v, v, v]);
            }
        }
        Frame::new(size, size, 3, data).unwrap()
    }

    /// Horizontal gray ramp rising by `step` per column.
    pub fn gradient(size: u32, step: u8) -> Frame {
        let mut data = Vec::with_capacity((size * size) as usize);
        for _ in 0..size {
            for x in 0..size {
                data.push((x as u32 * step as u32).min(255) as u8);
            }
        }
        Frame::new(size, size, 1, data).unwrap()
    }
}

/// Patch-pool encoder that counts its calls.
#[derive(Default)]
pub struct CountingEncoder {
    inner: PatchPoolEncoder,
    calls: AtomicU64,
}

impl CountingEncoder {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn calls(&self) -> u64 {
        self.calls.load(Ordering::SeqCst)
    }
}

impl VisionEncoder for CountingEncoder {
    fn name(&self) -> &str {
        "counting"
    }

    fn encode(&self, frame: &Frame, token_count: usize) -> PipelineResult<FrameTokenSet> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inner.encode(frame, token_count)
    }
}

/// Encoder that always fails.
pub struct FailingEncoder;

impl VisionEncoder for FailingEncoder {
    fn name(&self) -> &str {
        "failing"
    }

    fn encode(&self, _frame: &Frame, _token_count: usize) -> PipelineResult<FrameTokenSet> {
        Err(PipelineError::encoding(self.name(), "device lost"))
    }
}

/// Encoder that panics mid-request.
pub struct PanickingEncoder;

impl VisionEncoder for PanickingEncoder {
    fn name(&self) -> &str {
        "panicking"
    }

    fn encode(&self, _frame: &Frame, _token_count: usize) -> PipelineResult<FrameTokenSet> {
        panic!("encoder state corrupted")
    }
}

/// Echo backend that sleeps before answering.
pub struct SlowBackend {
    inner: EchoBackend,
    delay: Duration,
}

impl SlowBackend {
    pub fn new(delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            inner: EchoBackend::new(),
            delay,
        })
    }

    pub fn calls(&self) -> u64 {
        self.inner.calls()
    }
}

impl GenerationBackend for SlowBackend {
    fn name(&self) -> &str {
        "slow"
    }

    fn generate(&self, request: &GenerationRequest<'_>) -> PipelineResult<RawOutput> {
        std::thread::sleep(self.delay);
        self.inner.generate(request)
    }
}

/// Backend that fails its first `failures` calls, then echoes.
pub struct FlakyBackend {
    inner: EchoBackend,
    failures: u64,
    attempts: AtomicU64,
}

impl FlakyBackend {
    pub fn new(failures: u64) -> Arc<Self> {
        Arc::new(Self {
            inner: EchoBackend::new(),
            failures,
            attempts: AtomicU64::new(0),
        })
    }

    pub fn attempts(&self) -> u64 {
        self.attempts.load(Ordering::SeqCst)
    }
}

impl GenerationBackend for FlakyBackend {
    fn name(&self) -> &str {
        "flaky"
    }

    fn generate(&self, request: &GenerationRequest<'_>) -> PipelineResult<RawOutput> {
        let attempt = self.attempts.fetch_add(1, Ordering::SeqCst);
        if attempt < self.failures {
            return Err(PipelineError::generation(self.name(), "upstream unavailable"));
        }
        self.inner.generate(request)
    }
}
