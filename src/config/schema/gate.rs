use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::state::HealthState;

/// Inner-feedback admission settings. The secondary feedback signal only
/// influences the trigger when `enable` is set and the noise gate passes.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct InnerFeedbackConfig {
    #[serde(default)]
    pub enable: bool,
    #[serde(default)]
    pub noise_gate: NoiseGateConfig,
}

impl Default for InnerFeedbackConfig {
    fn default() -> Self {
        Self {
            enable: false,
            noise_gate: NoiseGateConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct NoiseGateConfig {
    /// Health statuses under which feedback is admitted at all.
    #[serde(default = "default_require_health")]
    pub require_health: Vec<HealthState>,
    /// Minimum affect stability; below this the gate stays closed.
    #[serde(default = "default_min_stability")]
    pub min_stability: f64,
    /// Minimum feedback confidence for the focus hint to be taken.
    #[serde(default = "default_min_confidence")]
    pub min_confidence: f64,
    /// Ceiling on the absolute trigger bonus a feedback record may add.
    #[serde(default = "default_max_abs_bonus")]
    pub max_abs_bonus: f64,
}

fn default_require_health() -> Vec<HealthState> {
    vec![HealthState::Ok]
}

fn default_min_stability() -> f64 {
    0.35
}

fn default_min_confidence() -> f64 {
    0.60
}

fn default_max_abs_bonus() -> f64 {
    0.08
}

impl Default for NoiseGateConfig {
    fn default() -> Self {
        Self {
            require_health: default_require_health(),
            min_stability: default_min_stability(),
            min_confidence: default_min_confidence(),
            max_abs_bonus: default_max_abs_bonus(),
        }
    }
}

impl NoiseGateConfig {
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.min_stability) {
            anyhow::bail!("inner_feedback.noise_gate.min_stability must be in [0.0, 1.0]");
        }
        if !(0.0..=1.0).contains(&self.min_confidence) {
            anyhow::bail!("inner_feedback.noise_gate.min_confidence must be in [0.0, 1.0]");
        }
        if !(0.0..=0.5).contains(&self.max_abs_bonus) {
            anyhow::bail!("inner_feedback.noise_gate.max_abs_bonus must be in [0.0, 0.5]");
        }
        if self.require_health.is_empty() {
            anyhow::bail!("inner_feedback.noise_gate.require_health must not be empty");
        }
        Ok(())
    }
}
