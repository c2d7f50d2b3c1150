// src/config.rs
//
// Decision-process configuration: episode limits, action codec choice and
// context randomisation.
//
// Presets:
//   - Default              : P = 6, 10 turns, positional codec, mild noise
//   - deterministic()      : same limits, no psychology noise
//   - appointment_booking(): P = 6, 6 turns (one turn per slot)
//
// `from_env_or_default()` applies PROMPTFORGE_* overrides on top of Default.
// Unparseable values are logged and ignored.

use std::env;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::ProcessError;

/// Which integer action encoding the process exposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CodecKind {
    /// `C * P * 2` actions: (component, position, finish).
    #[default]
    Positional,
    /// `C + 1` actions: select a component (append) or finish.
    SelectOrFinish,
}

impl CodecKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            CodecKind::Positional => "positional",
            CodecKind::SelectOrFinish => "select_or_finish",
        }
    }

    pub fn parse(s: &str) -> Option<CodecKind> {
        match s.to_lowercase().as_str() {
            "positional" | "pos" | "packed" => Some(CodecKind::Positional),
            "select_or_finish" | "select-or-finish" | "select" => Some(CodecKind::SelectOrFinish),
            _ => None,
        }
    }
}

/// Per-episode context randomisation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextRandConfig {
    /// Std-dev of the Normal noise added to each psychology weight.
    pub psychology_noise_std: f64,
    /// Noise draws are truncated to [-bound, +bound] before clamping.
    pub psychology_noise_bound: f64,
}

impl Default for ContextRandConfig {
    fn default() -> Self {
        Self {
            psychology_noise_std: 0.1,
            psychology_noise_bound: 0.3,
        }
    }
}

impl ContextRandConfig {
    /// No noise: psychology equals the catalog weights.
    pub fn deterministic() -> Self {
        Self {
            psychology_noise_std: 0.0,
            psychology_noise_bound: 0.0,
        }
    }

    pub fn is_deterministic(&self) -> bool {
        self.psychology_noise_std <= 0.0 || self.psychology_noise_bound <= 0.0
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessConfig {
    /// Maximum number of selected components (P).
    pub max_prompt_length: usize,
    /// Turn budget per episode.
    pub max_turns: usize,
    pub codec: CodecKind,
    pub context_rand: ContextRandConfig,
    /// Include the psychology vector in observations.
    pub expose_psychology: bool,
}

impl Default for ProcessConfig {
    fn default() -> Self {
        Self {
            max_prompt_length: 6,
            max_turns: 10,
            codec: CodecKind::Positional,
            context_rand: ContextRandConfig::default(),
            expose_psychology: true,
        }
    }
}

impl ProcessConfig {
    pub fn deterministic() -> Self {
        Self {
            context_rand: ContextRandConfig::deterministic(),
            ..Self::default()
        }
    }

    /// Appointment-booking limits: one turn per prompt slot.
    pub fn appointment_booking() -> Self {
        Self {
            max_prompt_length: 6,
            max_turns: 6,
            ..Self::default()
        }
    }

    pub fn with_max_prompt_length(mut self, max_prompt_length: usize) -> Self {
        self.max_prompt_length = max_prompt_length;
        self
    }

    pub fn with_max_turns(mut self, max_turns: usize) -> Self {
        self.max_turns = max_turns;
        self
    }

    pub fn with_codec(mut self, codec: CodecKind) -> Self {
        self.codec = codec;
        self
    }

    pub fn validate(&self) -> Result<(), ProcessError> {
        if self.max_prompt_length == 0 {
            return Err(ProcessError::InvalidConfig {
                field: "max_prompt_length",
                message: "must be at least 1".to_string(),
            });
        }
        if self.max_turns == 0 {
            return Err(ProcessError::InvalidConfig {
                field: "max_turns",
                message: "must be at least 1".to_string(),
            });
        }
        let sigma = self.context_rand.psychology_noise_std;
        if !sigma.is_finite() || sigma < 0.0 {
            return Err(ProcessError::InvalidConfig {
                field: "context_rand.psychology_noise_std",
                message: format!("must be finite and non-negative, got {}", sigma),
            });
        }
        let bound = self.context_rand.psychology_noise_bound;
        if !bound.is_finite() || bound < 0.0 {
            return Err(ProcessError::InvalidConfig {
                field: "context_rand.psychology_noise_bound",
                message: format!("must be finite and non-negative, got {}", bound),
            });
        }
        Ok(())
    }

    /// Default config with PROMPTFORGE_* environment overrides applied.
    pub fn from_env_or_default() -> Self {
        Self::default().with_overrides(|key| env::var(key).ok())
    }

    /// Apply overrides from an arbitrary key lookup (env vars in production).
    pub fn with_overrides<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup("PROMPTFORGE_MAX_PROMPT_LENGTH") {
            match v.trim().parse::<usize>() {
                Ok(n) if n > 0 => self.max_prompt_length = n,
                _ => warn!(value = %v, "invalid PROMPTFORGE_MAX_PROMPT_LENGTH; keeping {}", self.max_prompt_length),
            }
        }
        if let Some(v) = lookup("PROMPTFORGE_MAX_TURNS") {
            match v.trim().parse::<usize>() {
                Ok(n) if n > 0 => self.max_turns = n,
                _ => warn!(value = %v, "invalid PROMPTFORGE_MAX_TURNS; keeping {}", self.max_turns),
            }
        }
        if let Some(v) = lookup("PROMPTFORGE_CODEC") {
            match CodecKind::parse(v.trim()) {
                Some(codec) => self.codec = codec,
                None => warn!(value = %v, "unknown PROMPTFORGE_CODEC; keeping {}", self.codec.as_str()),
            }
        }
        if let Some(v) = lookup("PROMPTFORGE_PSYCHOLOGY_NOISE") {
            match v.trim().parse::<f64>() {
                Ok(sigma) if sigma.is_finite() && sigma >= 0.0 => {
                    self.context_rand.psychology_noise_std = sigma
                }
                _ => warn!(
                    value = %v,
                    "invalid PROMPTFORGE_PSYCHOLOGY_NOISE; keeping {}",
                    self.context_rand.psychology_noise_std
                ),
            }
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_default_limits() {
        let cfg = ProcessConfig::default();
        assert_eq!(cfg.max_prompt_length, 6);
        assert_eq!(cfg.max_turns, 10);
        assert_eq!(cfg.codec, CodecKind::Positional);
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn test_appointment_booking_preset() {
        let cfg = ProcessConfig::appointment_booking();
        assert_eq!(cfg.max_prompt_length, 6);
        assert_eq!(cfg.max_turns, 6);
        assert!(!cfg.context_rand.is_deterministic());
    }

    #[test]
    fn test_zero_limits_rejected() {
        let cfg = ProcessConfig::default().with_max_prompt_length(0);
        assert!(matches!(
            cfg.validate(),
            Err(ProcessError::InvalidConfig { field: "max_prompt_length", .. })
        ));
        let cfg = ProcessConfig::default().with_max_turns(0);
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_overrides_applied() {
        let cfg = ProcessConfig::default().with_overrides(lookup_from(&[
            ("PROMPTFORGE_MAX_PROMPT_LENGTH", "4"),
            ("PROMPTFORGE_MAX_TURNS", " 12 "),
            ("PROMPTFORGE_CODEC", "select_or_finish"),
            ("PROMPTFORGE_PSYCHOLOGY_NOISE", "0"),
        ]));
        assert_eq!(cfg.max_prompt_length, 4);
        assert_eq!(cfg.max_turns, 12);
        assert_eq!(cfg.codec, CodecKind::SelectOrFinish);
        assert!(cfg.context_rand.is_deterministic());
    }

    #[test]
    fn test_bad_overrides_ignored() {
        let cfg = ProcessConfig::default().with_overrides(lookup_from(&[
            ("PROMPTFORGE_MAX_PROMPT_LENGTH", "zero"),
            ("PROMPTFORGE_MAX_TURNS", "0"),
            ("PROMPTFORGE_CODEC", "morse"),
            ("PROMPTFORGE_PSYCHOLOGY_NOISE", "-1"),
        ]));
        let default = ProcessConfig::default();
        assert_eq!(cfg.max_prompt_length, default.max_prompt_length);
        assert_eq!(cfg.max_turns, default.max_turns);
        assert_eq!(cfg.codec, default.codec);
        assert_eq!(
            cfg.context_rand.psychology_noise_std,
            default.context_rand.psychology_noise_std
        );
    }
}
