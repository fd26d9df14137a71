//! Self-tuning loop: advisory suggestions from plan history, and two
//! separately authorized paths that may rewrite the policy's thresholds.
//! Every rewrite goes through one commit path: backup, clamp-validated
//! mutation, version bump, atomic save, audit append.

mod advisor;
mod auto_apply;
mod expressivity;

pub use advisor::{
    PolicySuggestions, ScheduleSuggestion, SuggestionSet, ThresholdSuggestion, WindowStats,
    reflect,
};
pub use auto_apply::{TuneOutcome, tune};
pub use expressivity::{BalanceOutcome, balance, score};

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::config::KernelPolicy;
use crate::state::{AUDIT_FILE, StateStore, format_ts};

/// One effective policy mutation, recorded verbatim in the audit log.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PolicyChange {
    pub field: String,
    pub old: serde_json::Value,
    pub new: serde_json::Value,
    pub rationale: String,
    pub confidence: Option<f64>,
}

#[derive(Debug, Serialize)]
struct AuditRecord<'a> {
    ts: String,
    field: &'a str,
    old: &'a serde_json::Value,
    new: &'a serde_json::Value,
    rationale: &'a str,
    confidence: Option<f64>,
}

/// Apply a set of already-clamped changes to the policy: backup first,
/// mutate, bump the version tag, save atomically, then append one audit
/// line per change. No-op on an empty change set.
pub(crate) fn commit_changes(
    policy: &mut KernelPolicy,
    changes: &[PolicyChange],
    store: &StateStore,
    now: DateTime<Utc>,
) -> Result<()> {
    if changes.is_empty() {
        info!("no effective policy changes");
        return Ok(());
    }

    let backup = policy.backup()?;
    info!("policy backup written: {}", backup.display());

    for change in changes {
        apply_field(policy, change)?;
    }

    // A pair of independent suggestions may cross the thresholds; keep the
    // propose threshold at or below apply.
    if policy.thresholds.propose > policy.thresholds.apply {
        warn!(
            "propose threshold {:.2} above apply {:.2} after changes, pinning to apply",
            policy.thresholds.propose, policy.thresholds.apply
        );
        policy.thresholds.propose = policy.thresholds.apply;
    }

    policy.bump_version();
    policy.validate()?;
    policy.save()?;

    for change in changes {
        store.append_jsonl(
            AUDIT_FILE,
            &AuditRecord {
                ts: format_ts(now),
                field: &change.field,
                old: &change.old,
                new: &change.new,
                rationale: &change.rationale,
                confidence: change.confidence,
            },
        )?;
        info!("policy {} -> {}", change.field, change.new);
    }
    Ok(())
}

fn apply_field(policy: &mut KernelPolicy, change: &PolicyChange) -> Result<()> {
    match change.field.as_str() {
        "thresholds.apply" => {
            policy.thresholds.apply = change
                .new
                .as_f64()
                .ok_or_else(|| anyhow::anyhow!("thresholds.apply must be numeric"))?;
        }
        "thresholds.propose" => {
            policy.thresholds.propose = change
                .new
                .as_f64()
                .ok_or_else(|| anyhow::anyhow!("thresholds.propose must be numeric"))?;
        }
        "thresholds.daily_cap" => {
            let cap = change
                .new
                .as_u64()
                .ok_or_else(|| anyhow::anyhow!("thresholds.daily_cap must be an integer"))?;
            policy.thresholds.daily_cap = u32::try_from(cap)
                .map_err(|_| anyhow::anyhow!("thresholds.daily_cap out of range"))?;
        }
        "naming.pattern" => {
            policy.naming.pattern = change
                .new
                .as_str()
                .ok_or_else(|| anyhow::anyhow!("naming.pattern must be a string"))?
                .to_string();
        }
        other => anyhow::bail!("field not rewritable by the tuning loop: {other}"),
    }
    Ok(())
}

/// Current value of a tunable numeric field.
pub(crate) fn current_value(policy: &KernelPolicy, field: &str) -> Option<f64> {
    match field {
        "thresholds.apply" => Some(policy.thresholds.apply),
        "thresholds.propose" => Some(policy.thresholds.propose),
        "thresholds.daily_cap" => Some(f64::from(policy.thresholds.daily_cap)),
        _ => None,
    }
}
