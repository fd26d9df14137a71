//! Decision engine: maps the effective trigger to IDLE / PROPOSE / APPLY.
//! Authorization is a hard veto; no trigger magnitude can bypass it.

use serde::{Deserialize, Serialize};

use crate::config::{GuardConfig, ThresholdsConfig};
use crate::signal::EffectiveSignal;

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    strum::Display,
)]
#[serde(rename_all = "UPPERCASE")]
#[strum(serialize_all = "UPPERCASE")]
pub enum Decision {
    Idle,
    Propose,
    Apply,
}

/// The observed value of a guard's environment variable, captured once at
/// the process boundary. Components compare it against the policy's
/// required value instead of reading the environment themselves, so guard
/// behavior is unit-testable without environment mutation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthToken {
    observed: Option<String>,
}

impl AuthToken {
    pub fn from_env(guard: &GuardConfig) -> Self {
        Self {
            observed: std::env::var(&guard.env_var).ok(),
        }
    }

    pub fn new(observed: Option<&str>) -> Self {
        Self {
            observed: observed.map(str::to_string),
        }
    }

    /// Exact string equality; an absent variable never satisfies a guard.
    pub fn satisfies(&self, guard: &GuardConfig) -> bool {
        self.observed.as_deref() == Some(guard.required_value.as_str())
    }

    pub fn observed(&self) -> Option<&str> {
        self.observed.as_deref()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct DecisionOutcome {
    pub decision: Decision,
    pub reasons: Vec<String>,
}

/// Re-evaluated from IDLE on every run; there are no transitions back.
pub fn decide(
    signal: &EffectiveSignal,
    thresholds: &ThresholdsConfig,
    guard: &GuardConfig,
    auth: &AuthToken,
) -> DecisionOutcome {
    let mut reasons = Vec::new();
    let delta = signal.delta;

    if delta < thresholds.propose {
        reasons.push(format!(
            "delta {delta:.3} below propose threshold {:.2}",
            thresholds.propose
        ));
        return DecisionOutcome {
            decision: Decision::Idle,
            reasons,
        };
    }
    reasons.push(format!(
        "delta {delta:.3} meets propose threshold {:.2}",
        thresholds.propose
    ));

    if delta < thresholds.apply {
        reasons.push(format!(
            "delta {delta:.3} below apply threshold {:.2}",
            thresholds.apply
        ));
        return DecisionOutcome {
            decision: Decision::Propose,
            reasons,
        };
    }
    reasons.push(format!(
        "delta {delta:.3} meets apply threshold {:.2}",
        thresholds.apply
    ));

    if !auth.satisfies(guard) {
        let observed = auth
            .observed()
            .map_or_else(|| "unset".to_string(), |v| format!("'{v}'"));
        reasons.push(format!(
            "apply guard vetoed: env {}={observed}, requires '{}'",
            guard.env_var, guard.required_value
        ));
        return DecisionOutcome {
            decision: Decision::Propose,
            reasons,
        };
    }
    reasons.push(format!("apply guard satisfied via env {}", guard.env_var));

    DecisionOutcome {
        decision: Decision::Apply,
        reasons,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn signal(delta: f64) -> EffectiveSignal {
        EffectiveSignal {
            delta,
            focus: "growth".to_string(),
            bonus_applied: 0.0,
            took_focus_hint: false,
            gate_open: false,
            reasons: Vec::new(),
        }
    }

    fn thresholds() -> ThresholdsConfig {
        ThresholdsConfig {
            propose: 0.50,
            apply: 0.70,
            daily_cap: 2,
        }
    }

    fn guard() -> GuardConfig {
        GuardConfig {
            env_var: "NOEMA_AUTONOMY".to_string(),
            required_value: "1".to_string(),
        }
    }

    #[test]
    fn below_propose_is_idle() {
        let outcome = decide(
            &signal(0.2),
            &thresholds(),
            &guard(),
            &AuthToken::new(Some("1")),
        );
        assert_eq!(outcome.decision, Decision::Idle);
    }

    #[test]
    fn between_thresholds_is_propose() {
        let outcome = decide(
            &signal(0.6),
            &thresholds(),
            &guard(),
            &AuthToken::new(Some("1")),
        );
        assert_eq!(outcome.decision, Decision::Propose);
    }

    #[test]
    fn above_apply_with_auth_is_apply() {
        let outcome = decide(
            &signal(0.8),
            &thresholds(),
            &guard(),
            &AuthToken::new(Some("1")),
        );
        assert_eq!(outcome.decision, Decision::Apply);
    }

    #[test]
    fn guard_veto_caps_at_propose_regardless_of_delta() {
        for observed in [None, Some("0"), Some("true"), Some("1 "), Some("11")] {
            let outcome = decide(
                &signal(99.0),
                &thresholds(),
                &guard(),
                &AuthToken::new(observed),
            );
            assert_eq!(outcome.decision, Decision::Propose, "observed={observed:?}");
            assert!(outcome.reasons.iter().any(|r| r.contains("vetoed")));
        }
    }

    #[test]
    fn decision_states_order_idle_propose_apply() {
        assert!(Decision::Idle < Decision::Propose);
        assert!(Decision::Propose < Decision::Apply);
    }

    #[test]
    fn reasons_trace_the_full_path() {
        let outcome = decide(
            &signal(0.8),
            &thresholds(),
            &guard(),
            &AuthToken::new(Some("1")),
        );
        assert_eq!(outcome.reasons.len(), 3);
    }
}
