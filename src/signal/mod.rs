//! Signal combiner: folds the optional inner-feedback signal into the base
//! affect trigger, subject to the policy's noise gate. Pure and
//! deterministic; identical inputs always produce identical output.

use serde::Serialize;

use crate::config::InnerFeedbackConfig;
use crate::state::{AffectState, HealthState, InnerFeedback};

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct EffectiveSignal {
    /// Post-gate trigger magnitude, floored at zero.
    pub delta: f64,
    pub focus: String,
    pub bonus_applied: f64,
    pub took_focus_hint: bool,
    /// Whether feedback influence was admitted at all.
    pub gate_open: bool,
    pub reasons: Vec<String>,
}

pub(crate) fn round3(value: f64) -> f64 {
    (value * 1000.0).round() / 1000.0
}

/// Combine affect, health, and optional inner feedback into the effective
/// signal the decision engine consumes.
///
/// The gate evaluates two independent preconditions: health membership and
/// minimum stability. If either fails, the feedback is rejected outright,
/// never attenuated. A focus hint additionally needs sufficient confidence.
pub fn combine(
    affect: &AffectState,
    health: HealthState,
    feedback: Option<&InnerFeedback>,
    cfg: &InnerFeedbackConfig,
) -> EffectiveSignal {
    let base_delta = affect.inputs.delta_sum.max(0.0);
    let base_focus = affect.inputs.focus.clone();
    let mut reasons = Vec::new();

    let rejected = |reasons: Vec<String>| EffectiveSignal {
        delta: round3(base_delta),
        focus: base_focus.clone(),
        bonus_applied: 0.0,
        took_focus_hint: false,
        gate_open: false,
        reasons,
    };

    let Some(feedback) = feedback else {
        reasons.push("inner feedback disabled or missing".to_string());
        return rejected(reasons);
    };
    if !cfg.enable {
        reasons.push("inner feedback disabled or missing".to_string());
        return rejected(reasons);
    }

    let gate = &cfg.noise_gate;
    let stability = affect.vector.stability;
    let mut gate_ok = true;

    if !gate.require_health.contains(&health) {
        let accepted: Vec<String> = gate.require_health.iter().map(ToString::to_string).collect();
        reasons.push(format!(
            "health '{health}' not in [{}]",
            accepted.join(", ")
        ));
        gate_ok = false;
    }
    if stability < gate.min_stability {
        reasons.push(format!(
            "stability {stability:.2} < {:.2}",
            gate.min_stability
        ));
        gate_ok = false;
    }

    if !gate_ok {
        return rejected(reasons);
    }

    // Gate open: apply the bonus under the policy ceiling.
    let bonus = feedback
        .delta_bonus
        .clamp(-gate.max_abs_bonus, gate.max_abs_bonus);
    let delta = round3((base_delta + bonus).max(0.0));

    let mut focus = base_focus;
    let mut took_focus_hint = false;
    if let Some(hint) = feedback.focus_hint.as_deref() {
        if feedback.confidence >= gate.min_confidence {
            focus = hint.to_string();
            took_focus_hint = true;
        } else {
            reasons.push(format!(
                "focus hint confidence {:.2} < {:.2}",
                feedback.confidence, gate.min_confidence
            ));
        }
    }

    EffectiveSignal {
        delta,
        focus,
        bonus_applied: round3(bonus),
        took_focus_hint,
        gate_open: true,
        reasons,
    }
}
