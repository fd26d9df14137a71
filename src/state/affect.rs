use serde::{Deserialize, Serialize};

use super::{AFFECT_FILE, StateStore};

/// Snapshot of the affect model's output. Produced externally; the kernel
/// only ever reads it. Bounded fields are clamped on load so a sloppy
/// producer cannot push the pipeline outside its documented ranges.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct AffectState {
    #[serde(default)]
    pub vector: AffectVector,
    #[serde(default)]
    pub inputs: AffectInputs,
    #[serde(default = "default_label")]
    pub label: String,
    #[serde(default)]
    pub ts: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AffectVector {
    /// Hedonic tone, -1 (negative) to +1 (positive).
    #[serde(default)]
    pub valence: f64,
    #[serde(default = "default_arousal")]
    pub arousal: f64,
    #[serde(default = "default_stability")]
    pub stability: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AffectInputs {
    /// Base action trigger accumulated by the affect model.
    #[serde(default)]
    pub delta_sum: f64,
    #[serde(default = "default_focus")]
    pub focus: String,
}

fn default_label() -> String {
    "neutral".to_string()
}

fn default_arousal() -> f64 {
    0.3
}

fn default_stability() -> f64 {
    0.5
}

fn default_focus() -> String {
    "insight".to_string()
}

impl Default for AffectVector {
    fn default() -> Self {
        Self {
            valence: 0.0,
            arousal: default_arousal(),
            stability: default_stability(),
        }
    }
}

impl Default for AffectInputs {
    fn default() -> Self {
        Self {
            delta_sum: 0.0,
            focus: default_focus(),
        }
    }
}

impl AffectState {
    pub fn load(store: &StateStore) -> Self {
        store
            .load_json::<AffectState>(AFFECT_FILE)
            .or_default("affect-state")
            .clamped()
    }

    pub fn clamped(mut self) -> Self {
        self.vector.valence = self.vector.valence.clamp(-1.0, 1.0);
        self.vector.arousal = self.vector.arousal.clamp(0.0, 1.0);
        self.vector.stability = self.vector.stability.clamp(0.0, 1.0);
        self.inputs.delta_sum = self.inputs.delta_sum.max(0.0);
        if self.inputs.focus.trim().is_empty() {
            self.inputs.focus = default_focus();
        }
        self
    }
}
