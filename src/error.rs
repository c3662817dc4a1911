//! # Pipeline Error Handling
//!
//! Hierarchical error type for the tokenization and inference pipeline, with
//! an attached [`ErrorContext`] and classification traits.
//!
//! ## Error Classification
//!
//! Every error maps to an [`ErrorKind`] so callers can decide what to retry:
//!
//! - `BadInput`: empty text, malformed frames, shape mismatches, invalid
//!   generation parameters. Never worth retrying unchanged.
//! - `BackendFailure`: the vision encoder or the generation backend failed,
//!   or the request timed out. The pipeline itself never retries; the
//!   [`Retryable`] trait only reports whether a caller may.
//! - `Configuration`: invalid construction-time settings. Fatal.
//! - `Internal`: worker pool or I/O trouble inside the process.
//!
//! ## Usage
//!
//! ```rust
//! use adaptok::error::{PipelineError, ErrorKind, Retryable};
//!
//! let error = PipelineError::generation("echo", "backend unavailable")
//!     .with_stage("generate")
//!     .with_input_summary("text(12 chars), 3 frames");
//!
//! assert_eq!(error.kind(), ErrorKind::BackendFailure);
//! assert!(error.is_retryable());
//! ```

use std::{collections::HashMap, error::Error as StdError, fmt, time::SystemTime};

/// Severity levels for errors
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    /// Warnings that may indicate potential issues
    Warning,
    /// Errors that fail one request
    Error,
    /// Fatal errors that prevent the pipeline from being built
    Fatal,
}

/// Coarse classification used by callers to drive retry policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    BadInput,
    BackendFailure,
    Configuration,
    Internal,
}

/// Metadata about when and where an error occurred
#[derive(Debug, Clone)]
pub struct ErrorContext {
    /// When the error occurred
    pub timestamp: SystemTime,
    /// Pipeline stage that failed (e.g. "preprocess", "encode", "generate")
    pub stage: Option<String>,
    /// Short description of the offending input
    pub input_summary: Option<String>,
    /// Error severity level
    pub severity: ErrorSeverity,
    /// Additional metadata as key-value pairs
    pub metadata: HashMap<String, String>,
}

impl Default for ErrorContext {
    fn default() -> Self {
        Self {
            timestamp: SystemTime::now(),
            stage: None,
            input_summary: None,
            severity: ErrorSeverity::Error,
            metadata: HashMap::new(),
        }
    }
}

impl ErrorContext {
    /// Create a new error context
    pub fn new() -> Self {
        Self::default()
    }

    fn with_severity(mut self, severity: ErrorSeverity) -> Self {
        self.severity = severity;
        self
    }
}

/// Base error type for the pipeline
#[derive(Debug)]
pub enum PipelineError {
    /// Request validation failures (empty text, bad parameters, shape mismatches)
    Validation {
        field: String,
        constraint: String,
        value: String,
        context: ErrorContext,
    },
    /// A frame that is empty, not two-dimensional, or inconsistent with its buffer
    InvalidFrame {
        index: Option<usize>,
        reason: String,
        context: ErrorContext,
    },
    /// Vision encoder failures
    Encoding {
        encoder: String,
        reason: String,
        context: ErrorContext,
    },
    /// Generation backend failures
    Generation {
        backend: String,
        reason: String,
        source: Option<Box<dyn StdError + Send + Sync>>,
        context: ErrorContext,
    },
    /// Invalid construction-time configuration
    Configuration {
        field: String,
        value: String,
        reason: String,
        context: ErrorContext,
    },
    /// Worker pool failures (shut down, worker panicked)
    WorkerPool {
        reason: String,
        context: ErrorContext,
    },
    /// Timeout errors
    Timeout {
        operation: String,
        duration_ms: u64,
        context: ErrorContext,
    },
    /// I/O errors
    Io {
        operation: String,
        path: Option<String>,
        source: std::io::Error,
        context: ErrorContext,
    },
    /// External library errors
    External {
        library: String,
        source: Box<dyn StdError + Send + Sync>,
        context: ErrorContext,
    },
}

impl PipelineError {
    /// Create a validation error
    pub fn validation(
        field: impl Into<String>,
        constraint: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        Self::Validation {
            field: field.into(),
            constraint: constraint.into(),
            value: value.into(),
            context: ErrorContext::new(),
        }
    }

    /// Create an invalid frame error
    pub fn invalid_frame(index: Option<usize>, reason: impl Into<String>) -> Self {
        Self::InvalidFrame {
            index,
            reason: reason.into(),
            context: ErrorContext::new(),
        }
    }

    /// Create an encoding error
    pub fn encoding(encoder: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Encoding {
            encoder: encoder.into(),
            reason: reason.into(),
            context: ErrorContext::new(),
        }
    }

    /// Create a generation error
    pub fn generation(backend: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Generation {
            backend: backend.into(),
            reason: reason.into(),
            source: None,
            context: ErrorContext::new(),
        }
    }

    /// Create a generation error wrapping its underlying cause
    pub fn generation_with_source(
        backend: impl Into<String>,
        reason: impl Into<String>,
        source: impl StdError + Send + Sync + 'static,
    ) -> Self {
        Self::Generation {
            backend: backend.into(),
            reason: reason.into(),
            source: Some(Box::new(source)),
            context: ErrorContext::new(),
        }
    }

    /// Create a configuration error
    pub fn config(
        field: impl Into<String>,
        value: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self::Configuration {
            field: field.into(),
            value: value.into(),
            reason: reason.into(),
            context: ErrorContext::new().with_severity(ErrorSeverity::Fatal),
        }
    }

    /// Create a worker pool error
    pub fn worker_pool(reason: impl Into<String>) -> Self {
        Self::WorkerPool {
            reason: reason.into(),
            context: ErrorContext::new(),
        }
    }

    /// Create a timeout error
    pub fn timeout(operation: impl Into<String>, duration_ms: u64) -> Self {
        Self::Timeout {
            operation: operation.into(),
            duration_ms,
            context: ErrorContext::new(),
        }
    }

    /// Create an I/O error
    pub fn io(operation: impl Into<String>, path: Option<String>, source: std::io::Error) -> Self {
        Self::Io {
            operation: operation.into(),
            path,
            source,
            context: ErrorContext::new(),
        }
    }

    /// Create an external library error
    pub fn external(
        library: impl Into<String>,
        source: impl StdError + Send + Sync + 'static,
    ) -> Self {
        Self::External {
            library: library.into(),
            source: Box::new(source),
            context: ErrorContext::new(),
        }
    }

    /// Record the pipeline stage that failed
    pub fn with_stage(mut self, stage: impl Into<String>) -> Self {
        self.context_mut().stage = Some(stage.into());
        self
    }

    /// Record a short summary of the offending input
    pub fn with_input_summary(mut self, summary: impl Into<String>) -> Self {
        self.context_mut().input_summary = Some(summary.into());
        self
    }

    /// Set severity
    pub fn with_severity(mut self, severity: ErrorSeverity) -> Self {
        self.context_mut().severity = severity;
        self
    }

    /// Add metadata
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.context_mut().metadata.insert(key.into(), value.into());
        self
    }

    /// Get the error context
    pub fn context(&self) -> &ErrorContext {
        match self {
            Self::Validation { context, .. } => context,
            Self::InvalidFrame { context, .. } => context,
            Self::Encoding { context, .. } => context,
            Self::Generation { context, .. } => context,
            Self::Configuration { context, .. } => context,
            Self::WorkerPool { context, .. } => context,
            Self::Timeout { context, .. } => context,
            Self::Io { context, .. } => context,
            Self::External { context, .. } => context,
        }
    }

    fn context_mut(&mut self) -> &mut ErrorContext {
        match self {
            Self::Validation { context, .. } => context,
            Self::InvalidFrame { context, .. } => context,
            Self::Encoding { context, .. } => context,
            Self::Generation { context, .. } => context,
            Self::Configuration { context, .. } => context,
            Self::WorkerPool { context, .. } => context,
            Self::Timeout { context, .. } => context,
            Self::Io { context, .. } => context,
            Self::External { context, .. } => context,
        }
    }

    /// Get the error category as a string
    pub fn category(&self) -> &'static str {
        match self {
            Self::Validation { .. } => "validation",
            Self::InvalidFrame { .. } => "invalid_frame",
            Self::Encoding { .. } => "encoding",
            Self::Generation { .. } => "generation",
            Self::Configuration { .. } => "configuration",
            Self::WorkerPool { .. } => "worker_pool",
            Self::Timeout { .. } => "timeout",
            Self::Io { .. } => "io",
            Self::External { .. } => "external",
        }
    }

    /// Coarse classification of this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Validation { .. } | Self::InvalidFrame { .. } => ErrorKind::BadInput,
            Self::Encoding { .. } | Self::Generation { .. } | Self::Timeout { .. } => {
                ErrorKind::BackendFailure
            }
            Self::Configuration { .. } => ErrorKind::Configuration,
            Self::WorkerPool { .. } | Self::Io { .. } | Self::External { .. } => {
                ErrorKind::Internal
            }
        }
    }
}

impl fmt::Display for PipelineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PipelineError::Validation {
                field,
                constraint,
                value,
                ..
            } => write!(
                f,
                "Validation failed for '{}': {} (value: {})",
                field, constraint, value
            ),
            PipelineError::InvalidFrame { index, reason, .. } => match index {
                Some(index) => write!(f, "Invalid frame {}: {}", index, reason),
                None => write!(f, "Invalid frame: {}", reason),
            },
            PipelineError::Encoding {
                encoder, reason, ..
            } => write!(f, "Vision encoder '{}' failed: {}", encoder, reason),
            PipelineError::Generation {
                backend, reason, ..
            } => write!(f, "Inference failed in backend '{}': {}", backend, reason),
            PipelineError::Configuration {
                field,
                value,
                reason,
                ..
            } => write!(
                f,
                "Configuration error in '{}': {} (value: {})",
                field, reason, value
            ),
            PipelineError::WorkerPool { reason, .. } => {
                write!(f, "Worker pool error: {}", reason)
            }
            PipelineError::Timeout {
                operation,
                duration_ms,
                ..
            } => write!(f, "Timeout during {} after {}ms", operation, duration_ms),
            PipelineError::Io {
                operation,
                path,
                source,
                ..
            } => match path {
                Some(path) => write!(
                    f,
                    "I/O error during {} on '{}': {}",
                    operation, path, source
                ),
                None => write!(f, "I/O error during {}: {}", operation, source),
            },
            PipelineError::External {
                library, source, ..
            } => write!(f, "External library error in {}: {}", library, source),
        }
    }
}

impl StdError for PipelineError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            Self::External { source, .. } => Some(source.as_ref()),
            Self::Generation {
                source: Some(source),
                ..
            } => Some(source.as_ref()),
            _ => None,
        }
    }
}

/// Result type alias using our custom error type
pub type PipelineResult<T> = Result<T, PipelineError>;

/// Trait for errors a caller may retry
pub trait Retryable {
    /// Check if this error can be retried
    fn is_retryable(&self) -> bool;

    /// Get the recommended retry delay in milliseconds
    fn retry_delay_ms(&self) -> Option<u64> {
        None
    }
}

impl Retryable for PipelineError {
    fn is_retryable(&self) -> bool {
        self.kind() == ErrorKind::BackendFailure
    }

    fn retry_delay_ms(&self) -> Option<u64> {
        match self {
            Self::Timeout { .. } => Some(1000),
            Self::Generation { .. } => Some(500),
            Self::Encoding { .. } => Some(100),
            _ => None,
        }
    }
}

/// Trait for errors with severity levels
pub trait HasSeverity {
    /// Get the severity level of this error
    fn severity(&self) -> ErrorSeverity;
}

impl HasSeverity for PipelineError {
    fn severity(&self) -> ErrorSeverity {
        self.context().severity
    }
}

/// Error classification utilities
pub mod classify {
    use super::*;

    /// The caller sent something the pipeline will never accept as-is
    pub fn is_input_error(error: &PipelineError) -> bool {
        error.kind() == ErrorKind::BadInput
    }

    /// An inference backend (encoder or generator) failed
    pub fn is_backend_failure(error: &PipelineError) -> bool {
        error.kind() == ErrorKind::BackendFailure
    }

    /// Check if an error is fatal (cannot be recovered from)
    pub fn is_fatal(error: &PipelineError) -> bool {
        error.kind() == ErrorKind::Configuration || error.severity() == ErrorSeverity::Fatal
    }
}

impl From<serde_json::Error> for PipelineError {
    fn from(error: serde_json::Error) -> Self {
        Self::external("serde_json", error)
    }
}

impl From<toml::de::Error> for PipelineError {
    fn from(error: toml::de::Error) -> Self {
        Self::config("toml", "<document>", error.to_string())
    }
}
