//! # Pipeline Configuration
//!
//! Construction-time settings for the tokenization and inference pipeline.
//! Every field has a default, so an empty TOML document is a valid
//! configuration.
//!
//! ## Configuration Parameters
//!
//! | Parameter | Type | Range | Description |
//! |-----------|------|-------|-------------|
//! | `num_workers` | `usize` | >= 1 | Worker threads executing requests |
//! | `max_frame_tokens` | `usize` | >= `budget.floor` | Per-frame token ceiling |
//! | `similarity_threshold` | `f32` | 0.0-1.0 | Drop a frame at or above this similarity |
//! | `mode` | `ModelMode` | standard/coding/technical | Prompt framing |
//! | `budget.floor` | `usize` | >= 1 | Minimum tokens per frame |
//! | `budget.scale` | `f32` | > 0 | Tokens per unit of complexity |
//! | `caching.enabled` | `bool` | | Response cache on/off |
//! | `caching.cache_size` | `usize` | >= 1 | Cached responses before FIFO eviction |
//! | `preprocessing.lowercase` | `bool` | | Case-fold prompt text |
//! | `preprocessing.max_long_side` | `Option<u32>` | >= 1 | Downscale encoder input (unset by default) |
//! | `preprocessing.max_frames` | `Option<usize>` | >= 1 | Uniformly sample longer sequences |
//! | `output.format` | `OutputFormat` | dict/raw | Result payload shape |
//! | `output.confidence` | `ConfidenceMode` | | Confidence function |
//! | `generation.*` | `GenerationParams` | | Default generation parameters |
//!
//! ## Examples
//!
//! ```rust
//! use adaptok::config::PipelineConfig;
//!
//! let config = PipelineConfig::from_toml_str(r#"
//!     num_workers = 2
//!     similarity_threshold = 0.9
//!
//!     [caching]
//!     cache_size = 8
//! "#).unwrap();
//!
//! assert_eq!(config.num_workers, 2);
//! assert_eq!(config.caching.cache_size, 8);
//! assert_eq!(config.max_frame_tokens, 1024);
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{PipelineError, PipelineResult};
use crate::inference::params::{GenerationParams, ModelMode};
use crate::inference::response::{ConfidenceMode, OutputFormat};
use crate::tokenize::budget::BudgetAllocator;

/// Token budget bounds and scale.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BudgetConfig {
    /// Minimum tokens allocated to any frame
    pub floor: usize,
    /// Tokens per unit of complexity score
    pub scale: f32,
}

impl Default for BudgetConfig {
    fn default() -> Self {
        Self {
            floor: 16,
            scale: 64.0,
        }
    }
}

/// Response cache settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CachingConfig {
    pub enabled: bool,
    pub cache_size: usize,
}

impl Default for CachingConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            cache_size: 100,
        }
    }
}

/// Request preprocessing settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PreprocessingConfig {
    /// Case-fold the prompt after trimming
    pub lowercase: bool,
    /// Encoder input is downscaled to this long side, aspect preserved.
    /// Complexity is always scored at full resolution. Off by default.
    pub max_long_side: Option<u32>,
    /// Longer frame sequences are uniformly sampled down to this many
    pub max_frames: Option<usize>,
}

impl Default for PreprocessingConfig {
    fn default() -> Self {
        Self {
            lowercase: false,
            max_long_side: None,
            max_frames: Some(16),
        }
    }
}

/// Response shaping.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub format: OutputFormat,
    pub confidence: ConfidenceMode,
}

/// Full pipeline configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Number of worker threads executing requests.
    pub num_workers: usize,

    /// Per-frame token ceiling.
    ///
    /// Also the upper clamp of the budget allocator; must not be below
    /// `budget.floor`.
    pub max_frame_tokens: usize,

    /// Similarity at or above which a frame is dropped as redundant with the
    /// last kept frame. Higher keeps more frames.
    pub similarity_threshold: f32,

    /// Prompt framing applied before generation.
    pub mode: ModelMode,

    pub budget: BudgetConfig,
    pub caching: CachingConfig,
    pub preprocessing: PreprocessingConfig,
    pub output: OutputConfig,

    /// Generation parameters used when a request does not carry its own.
    pub generation: GenerationParams,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            num_workers: 4,
            max_frame_tokens: 1024,
            similarity_threshold: 0.8,
            mode: ModelMode::default(),
            budget: BudgetConfig::default(),
            caching: CachingConfig::default(),
            preprocessing: PreprocessingConfig::default(),
            output: OutputConfig::default(),
            generation: GenerationParams::default(),
        }
    }
}

impl PipelineConfig {
    /// Parse and validate a TOML document.
    pub fn from_toml_str(source: &str) -> PipelineResult<Self> {
        let config: PipelineConfig = toml::from_str(source)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> PipelineResult<Self> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path).map_err(|e| {
            PipelineError::io("read config", Some(path.display().to_string()), e)
        })?;
        Self::from_toml_str(&source)
    }

    pub fn with_workers(mut self, num_workers: usize) -> Self {
        self.num_workers = num_workers;
        self
    }

    pub fn with_cache_size(mut self, cache_size: usize) -> Self {
        self.caching.cache_size = cache_size;
        self
    }

    pub fn with_similarity_threshold(mut self, threshold: f32) -> Self {
        self.similarity_threshold = threshold;
        self
    }

    pub fn with_mode(mut self, mode: ModelMode) -> Self {
        self.mode = mode;
        self
    }

    /// Validates the configuration parameters.
    ///
    /// Returns the first violation as a `Configuration` error.
    pub fn validate(&self) -> PipelineResult<()> {
        if self.num_workers == 0 {
            return Err(PipelineError::config(
                "num_workers",
                "0",
                "must be at least 1",
            ));
        }
        if !(0.0..=1.0).contains(&self.similarity_threshold) {
            return Err(PipelineError::config(
                "similarity_threshold",
                self.similarity_threshold.to_string(),
                "must be in [0, 1]",
            ));
        }
        if self.caching.enabled && self.caching.cache_size == 0 {
            return Err(PipelineError::config(
                "caching.cache_size",
                "0",
                "must be at least 1 when caching is enabled",
            ));
        }
        if self.preprocessing.max_long_side == Some(0) {
            return Err(PipelineError::config(
                "preprocessing.max_long_side",
                "0",
                "must be at least 1",
            ));
        }
        if self.preprocessing.max_frames == Some(0) {
            return Err(PipelineError::config(
                "preprocessing.max_frames",
                "0",
                "must be at least 1",
            ));
        }
        if let Some(v) = self.generation.violation() {
            return Err(PipelineError::config(
                format!("generation.{}", v.field),
                v.value,
                v.constraint,
            ));
        }
        self.budget_allocator().map(|_| ())
    }

    /// Budget allocator for these bounds.
    pub fn budget_allocator(&self) -> PipelineResult<BudgetAllocator> {
        BudgetAllocator::new(self.budget.floor, self.max_frame_tokens, self.budget.scale)
    }
}
