//! # Configuration Module
//!
//! Pipeline configuration loaded from TOML or built in code.

pub mod config;

pub use config::{
    BudgetConfig, CachingConfig, OutputConfig, PipelineConfig, PreprocessingConfig,
};
