//! One full kernel run: read, combine, decide, plan, persist, apply.
//! Strictly synchronous; stages execute in dependency order and nothing in
//! a run reads a record a later stage writes.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::info;

use crate::config::KernelPolicy;
use crate::decision::{AuthToken, Decision, decide};
use crate::error::Result;
use crate::executor::Executor;
use crate::planner::{PlanBuilder, PlanHistory};
use crate::signal::{EffectiveSignal, combine};
use crate::state::{
    AffectState, DIAGNOSTICS_FILE, HealthReport, InnerFeedback, StateStore, format_ts,
};

/// Structured result of a run, printed whether or not anything happened:
/// "nothing happened" must stay distinguishable from "something failed".
#[derive(Debug, Serialize)]
pub struct RunSummary {
    pub ts: String,
    pub decision: Decision,
    pub effective: EffectiveSignal,
    pub reasons: Vec<String>,
    pub plan: Option<String>,
    pub applied: bool,
    pub artifacts: Vec<String>,
}

pub fn run_once(
    policy: &KernelPolicy,
    store: &StateStore,
    auth: &AuthToken,
    now: DateTime<Utc>,
) -> Result<RunSummary> {
    let affect = AffectState::load(store);
    let health = HealthReport::load(store);
    let feedback = InnerFeedback::load(store);

    let signal = combine(&affect, health.status, feedback.as_ref(), &policy.inner_feedback);
    let outcome = decide(&signal, &policy.thresholds, &policy.apply_guard, auth);

    let mut reasons = signal.reasons.clone();
    reasons.extend(outcome.reasons.iter().cloned());

    let mut plan_path = None;
    let mut artifacts = Vec::new();
    let mut applied = false;

    if outcome.decision >= Decision::Propose {
        let history = PlanHistory::new(store);
        match PlanBuilder::new(policy, store).build(&signal, now) {
            Some(plan) => {
                let path = history.persist(&plan)?;
                history.rebuild_index(now)?;
                info!("plan proposed: {}", path.display());
                plan_path = Some(path.display().to_string());

                if outcome.decision == Decision::Apply {
                    let executor = Executor::new(store, &policy.allowed_artifacts);
                    artifacts = executor.apply(&plan)?;
                    applied = true;
                }
            }
            None => {
                reasons.push("no plan generated (daily cap reached)".to_string());
            }
        }
    }

    Ok(RunSummary {
        ts: format_ts(now),
        decision: outcome.decision,
        effective: signal,
        reasons,
        plan: plan_path,
        applied,
        artifacts,
    })
}

/// Compute the decision window without planning and persist it as the
/// internal diagnostics record.
pub fn diagnose(
    policy: &KernelPolicy,
    store: &StateStore,
    auth: &AuthToken,
    now: DateTime<Utc>,
) -> Result<serde_json::Value> {
    let affect = AffectState::load(store);
    let health = HealthReport::load(store);
    let feedback = InnerFeedback::load(store);

    let signal = combine(&affect, health.status, feedback.as_ref(), &policy.inner_feedback);
    let outcome = decide(&signal, &policy.thresholds, &policy.apply_guard, auth);

    let record = serde_json::json!({
        "ts": format_ts(now),
        "status": {
            "health": health.status.to_string(),
            "decision": outcome.decision,
        },
        "inputs": {
            "base": {
                "delta_sum": affect.inputs.delta_sum,
                "focus": affect.inputs.focus,
                "valence": affect.vector.valence,
                "arousal": affect.vector.arousal,
                "stability": affect.vector.stability,
            },
            "feedback_present": feedback.is_some(),
        },
        "policy": {
            "version": policy.version,
            "thresholds": policy.thresholds,
            "apply_guard": policy.apply_guard,
            "noise_gate": policy.inner_feedback.noise_gate,
        },
        "effective": signal,
        "decision_reasons": outcome.reasons,
        "env": {
            (policy.apply_guard.env_var.clone()): auth.observed(),
        },
    });

    store.write_json(DIAGNOSTICS_FILE, &record)?;
    Ok(record)
}
