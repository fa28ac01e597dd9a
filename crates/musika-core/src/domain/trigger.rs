//! Inbound generation request.

use serde::{Deserialize, Serialize};

use super::error::OrchestrationError;

/// Generation parameters carried by one inbound message.
///
/// Numbers stay `f32` because that is what arrives on the wire; keeping them
/// narrow means `0.1` renders back as `0.1` in the generation command.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trigger {
    pub model_selector: String,
    pub truncation: f32,
    pub duration_seconds: f32,
}

impl Trigger {
    pub fn new(model_selector: impl Into<String>, truncation: f32, duration_seconds: f32) -> Self {
        Trigger {
            model_selector: model_selector.into(),
            truncation,
            duration_seconds,
        }
    }

    /// Check the numeric parameters against `limits`.
    pub fn validate(&self, limits: &TriggerLimits) -> Result<(), OrchestrationError> {
        let d = self.duration_seconds;
        if !d.is_finite() || d <= 0.0 {
            return Err(OrchestrationError::InvalidTrigger(format!(
                "duration must be positive, got {d}"
            )));
        }
        if d > limits.max_seconds {
            return Err(OrchestrationError::InvalidTrigger(format!(
                "duration {d} exceeds limit {}",
                limits.max_seconds
            )));
        }

        let t = self.truncation;
        if !t.is_finite() || t <= 0.0 || t > limits.max_truncation {
            return Err(OrchestrationError::InvalidTrigger(format!(
                "truncation must be in (0, {}], got {t}",
                limits.max_truncation
            )));
        }
        Ok(())
    }
}

/// Accepted ranges for trigger parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TriggerLimits {
    /// Upper bound (inclusive) for truncation; the lower bound is exclusive 0.
    pub max_truncation: f32,
    /// Upper bound (inclusive) for requested seconds of audio.
    pub max_seconds: f32,
}

impl Default for TriggerLimits {
    fn default() -> Self {
        TriggerLimits {
            max_truncation: 4.0,
            max_seconds: 600.0,
        }
    }
}
