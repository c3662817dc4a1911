//! Generation parameters and prompt modes.

use serde::{Deserialize, Serialize};

use crate::error::{PipelineError, PipelineResult};

/// Upper bound on `num_return_sequences`.
pub const MAX_RETURN_SEQUENCES: u32 = 64;

/// Sampling parameters handed to the generation backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationParams {
    /// Maximum generated length in tokens
    pub max_length: u32,
    /// Sampling temperature, in (0, 1]
    pub temperature: f32,
    /// Top-k cutoff; 0 disables it
    pub top_k: u32,
    /// Nucleus sampling mass, in (0, 1]
    pub top_p: f32,
    /// Penalty applied to repeated tokens, >= 1
    pub repetition_penalty: f32,
    /// Number of sequences to return, in [1, MAX_RETURN_SEQUENCES]
    pub num_return_sequences: u32,
    /// Sample instead of greedy decoding
    pub do_sample: bool,
}

impl Default for GenerationParams {
    fn default() -> Self {
        Self {
            max_length: 512,
            temperature: 0.7,
            top_k: 50,
            top_p: 0.9,
            repetition_penalty: 1.1,
            num_return_sequences: 1,
            do_sample: true,
        }
    }
}

/// A single out-of-range generation parameter.
#[derive(Debug, Clone, PartialEq)]
pub struct ParamViolation {
    pub field: &'static str,
    pub constraint: &'static str,
    pub value: String,
}

impl GenerationParams {
    /// First out-of-range parameter, if any.
    pub fn violation(&self) -> Option<ParamViolation> {
        let violation = |field, constraint, value: String| {
            Some(ParamViolation {
                field,
                constraint,
                value,
            })
        };

        if self.max_length == 0 {
            return violation("max_length", "must be at least 1", self.max_length.to_string());
        }
        if !(self.temperature > 0.0 && self.temperature <= 1.0) {
            return violation("temperature", "must be in (0, 1]", self.temperature.to_string());
        }
        if !(self.top_p > 0.0 && self.top_p <= 1.0) {
            return violation("top_p", "must be in (0, 1]", self.top_p.to_string());
        }
        if !(self.repetition_penalty >= 1.0 && self.repetition_penalty.is_finite()) {
            return violation(
                "repetition_penalty",
                "must be a finite value >= 1",
                self.repetition_penalty.to_string(),
            );
        }
        if !(1..=MAX_RETURN_SEQUENCES).contains(&self.num_return_sequences) {
            return violation(
                "num_return_sequences",
                "must be in [1, 64]",
                self.num_return_sequences.to_string(),
            );
        }
        None
    }

    /// Validate as request input.
    pub fn validate(&self) -> PipelineResult<()> {
        match self.violation() {
            Some(v) => Err(PipelineError::validation(
                format!("params.{}", v.field),
                v.constraint,
                v.value,
            )),
            None => Ok(()),
        }
    }
}

/// Prompt framing applied before generation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ModelMode {
    #[default]
    Standard,
    Coding,
    Technical,
}

impl ModelMode {
    pub fn as_str(self) -> &'static str {
        match self {
            ModelMode::Standard => "standard",
            ModelMode::Coding => "coding",
            ModelMode::Technical => "technical",
        }
    }

    fn prefix(self) -> &'static str {
        match self {
            ModelMode::Standard => "",
            ModelMode::Coding => "Write code to solve the following: ",
            ModelMode::Technical => "Provide a technical explanation for: ",
        }
    }

    /// Frame `prompt` for this mode.
    pub fn format_prompt(self, prompt: &str) -> String {
        format!("{}{}", self.prefix(), prompt)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        assert!(GenerationParams::default().validate().is_ok());
    }

    #[test]
    fn temperature_bounds() {
        let mut params = GenerationParams::default();
        params.temperature = 0.0;
        assert_eq!(params.violation().unwrap().field, "temperature");
        params.temperature = 1.0;
        assert!(params.violation().is_none());
        params.temperature = 1.5;
        assert!(params.validate().is_err());
    }

    #[test]
    fn top_k_zero_is_allowed() {
        let params = GenerationParams {
            top_k: 0,
            ..Default::default()
        };
        assert!(params.validate().is_ok());
    }

    #[test]
    fn repetition_penalty_below_one_rejected() {
        let params = GenerationParams {
            repetition_penalty: 0.9,
            ..Default::default()
        };
        let err = params.validate().unwrap_err();
        assert_eq!(err.category(), "validation");
        assert!(err.to_string().contains("params.repetition_penalty"));
    }

    #[test]
    fn zero_sequences_rejected() {
        let params = GenerationParams {
            num_return_sequences: 0,
            ..Default::default()
        };
        assert_eq!(params.violation().unwrap().field, "num_return_sequences");
    }

    #[test]
    fn sequence_count_is_capped() {
        let at_cap = GenerationParams {
            num_return_sequences: MAX_RETURN_SEQUENCES,
            ..Default::default()
        };
        assert!(at_cap.validate().is_ok());

        let huge = GenerationParams {
            num_return_sequences: u32::MAX,
            ..Default::default()
        };
        let violation = huge.violation().unwrap();
        assert_eq!(violation.field, "num_return_sequences");
        assert_eq!(violation.value, u32::MAX.to_string());
    }

    #[test]
    fn mode_prefixes() {
        assert_eq!(ModelMode::Standard.format_prompt("hi"), "hi");
        assert_eq!(
            ModelMode::Coding.format_prompt("sort a list"),
            "Write code to solve the following: sort a list"
        );
        assert_eq!(
            ModelMode::Technical.format_prompt("TCP"),
            "Provide a technical explanation for: TCP"
        );
    }

    #[test]
    fn mode_serde_is_lowercase() {
        let json = serde_json::to_string(&ModelMode::Technical).unwrap();
        assert_eq!(json, "\"technical\"");
        let mode: ModelMode = serde_json::from_str("\"coding\"").unwrap();
        assert_eq!(mode, ModelMode::Coding);
    }
}
