//! Expressivity path: a continuous target curve over health, stability and
//! recent activity. Writes the meta record every run; rewrites thresholds
//! only under its own guard, through the same bounds table and commit path
//! as the suggestion auto-apply.

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde_json::json;
use tracing::info;

use super::{PolicyChange, commit_changes};
use crate::config::{KernelPolicy, bounds};
use crate::decision::AuthToken;
use crate::planner::PlanHistory;
use crate::signal::round3;
use crate::state::meta::{MetaSignals, MetaState, MetaTargets};
use crate::state::{AffectState, HealthReport, HealthState, StateStore, format_ts};

const HASH_PATTERN: &str = "{focus}-{date}-{hash}";
const PLAIN_PATTERN: &str = "{focus}-{date}";

/// Score how expressive the kernel should currently be, 0..1.
/// Health sets the tone, stability and liveliness push it up, a crowded
/// fortnight brakes it slightly.
pub fn score(health: HealthState, stability: f64, delta_sum: f64, recent_activity: u32) -> f64 {
    let mut base: f64 = 0.5;
    base += match health {
        HealthState::Ok => 0.25,
        HealthState::Healing => -0.10,
        HealthState::Degraded => -0.25,
        HealthState::Unknown => 0.0,
    };
    base += stability.clamp(0.0, 1.0) * 0.25 - 0.125;
    base += delta_sum.clamp(0.0, 2.0) * 0.10;
    base -= (f64::from(recent_activity) / 14.0).clamp(0.0, 1.0) * 0.05;
    round3(base).clamp(0.0, 1.0)
}

#[derive(Debug)]
pub struct BalanceOutcome {
    pub meta: MetaState,
    pub authorized: bool,
    pub applied: Vec<PolicyChange>,
}

pub fn balance(
    policy: &mut KernelPolicy,
    store: &StateStore,
    auth: &AuthToken,
    now: DateTime<Utc>,
) -> Result<BalanceOutcome> {
    let affect = AffectState::load(store);
    let health = HealthReport::load(store);
    let recent = PlanHistory::new(store).load_window(14, now).len().min(14) as u32;

    let expressivity = score(
        health.status,
        affect.vector.stability,
        affect.inputs.delta_sum,
        recent,
    );

    // Continuous target curves: expressive means lower thresholds and a
    // higher cap; the hash naming token switches in at 0.6.
    let target_apply = bounds::APPLY_THRESHOLD.clamp(0.60 - expressivity * (0.60 - 0.30));
    let target_propose = bounds::PROPOSE_THRESHOLD.clamp(0.45 - expressivity * (0.45 - 0.20));
    let target_cap = bounds::DAILY_CAP.clamp(3.0 + expressivity * (10.0 - 3.0)) as u32;
    let target_pattern = if expressivity >= 0.6 {
        HASH_PATTERN
    } else {
        PLAIN_PATTERN
    };

    let meta = MetaState {
        ts: format_ts(now),
        health: health.status.to_string(),
        signals: MetaSignals {
            stability: round3(affect.vector.stability),
            delta_sum: round3(affect.inputs.delta_sum),
            recent_activity: recent,
        },
        expressivity,
        targets: MetaTargets {
            apply: target_apply,
            propose: target_propose,
            daily_cap: target_cap,
            naming_pattern: target_pattern.to_string(),
        },
    };
    meta.write(store)?;

    if !auth.satisfies(&policy.meta_guard) {
        info!(
            "meta guard off (env {} does not match), targets recorded only",
            policy.meta_guard.env_var
        );
        return Ok(BalanceOutcome {
            meta,
            authorized: false,
            applied: Vec::new(),
        });
    }

    let rationale = format!("expressivity {expressivity:.3} retarget");
    let mut changes = Vec::new();
    if (target_apply - policy.thresholds.apply).abs() > f64::EPSILON {
        changes.push(PolicyChange {
            field: "thresholds.apply".to_string(),
            old: json!(policy.thresholds.apply),
            new: json!(target_apply),
            rationale: rationale.clone(),
            confidence: Some(expressivity),
        });
    }
    if (target_propose - policy.thresholds.propose).abs() > f64::EPSILON {
        changes.push(PolicyChange {
            field: "thresholds.propose".to_string(),
            old: json!(policy.thresholds.propose),
            new: json!(target_propose),
            rationale: rationale.clone(),
            confidence: Some(expressivity),
        });
    }
    if target_cap != policy.thresholds.daily_cap {
        changes.push(PolicyChange {
            field: "thresholds.daily_cap".to_string(),
            old: json!(policy.thresholds.daily_cap),
            new: json!(target_cap),
            rationale: rationale.clone(),
            confidence: Some(expressivity),
        });
    }
    if target_pattern != policy.naming.pattern {
        changes.push(PolicyChange {
            field: "naming.pattern".to_string(),
            old: json!(policy.naming.pattern),
            new: json!(target_pattern),
            rationale,
            confidence: Some(expressivity),
        });
    }

    commit_changes(policy, &changes, store, now)?;
    Ok(BalanceOutcome {
        meta,
        authorized: true,
        applied: changes,
    })
}
