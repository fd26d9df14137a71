//! Bounded auto-apply: turns advisory suggestions into real policy edits,
//! under its own authorization, a fixed field whitelist, and hard bounds.

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde_json::json;
use tracing::{info, warn};

use super::advisor::PolicySuggestions;
use super::{PolicyChange, commit_changes, current_value};
use crate::config::{KernelPolicy, bounds};
use crate::decision::AuthToken;
use crate::state::{SUGGESTIONS_FILE, StateStore};

#[derive(Debug)]
pub struct TuneOutcome {
    pub authorized: bool,
    pub applied: Vec<PolicyChange>,
}

/// Apply the whitelisted, clamped subset of the current suggestions.
/// Schedule suggestions are deliberately never auto-applied.
pub fn tune(
    policy: &mut KernelPolicy,
    store: &StateStore,
    auth: &AuthToken,
    now: DateTime<Utc>,
) -> Result<TuneOutcome> {
    if !auth.satisfies(&policy.tuning_guard) {
        info!(
            "tuning guard off (env {} does not match), no policy changes",
            policy.tuning_guard.env_var
        );
        return Ok(TuneOutcome {
            authorized: false,
            applied: Vec::new(),
        });
    }

    let Some(suggestions) = store
        .load_json::<PolicySuggestions>(SUGGESTIONS_FILE)
        .optional("policy suggestions")
    else {
        info!("no suggestions present, nothing to do");
        return Ok(TuneOutcome {
            authorized: true,
            applied: Vec::new(),
        });
    };

    let mut changes = Vec::new();
    for suggestion in &suggestions.suggestions.thresholds {
        let Some(bound) = bounds::bound_for(&suggestion.path) else {
            warn!("suggestion for non-tunable field ignored: {}", suggestion.path);
            continue;
        };
        let Some(current) = current_value(policy, &suggestion.path) else {
            continue;
        };

        let clamped = bound.clamp(suggestion.suggested);
        if (clamped - current).abs() < f64::EPSILON {
            continue;
        }

        let (old, new) = if bound.integral {
            (json!(current as u64), json!(clamped as u64))
        } else {
            (json!(current), json!(clamped))
        };
        changes.push(PolicyChange {
            field: suggestion.path.clone(),
            old,
            new,
            rationale: suggestion.rationale.clone(),
            confidence: Some(suggestion.confidence),
        });
    }

    commit_changes(policy, &changes, store, now)?;
    Ok(TuneOutcome {
        authorized: true,
        applied: changes,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::parse_ts;
    use crate::tuning::advisor::{SuggestionSet, ThresholdSuggestion, WindowStats};
    use tempfile::TempDir;

    fn suggestions(entries: Vec<ThresholdSuggestion>) -> PolicySuggestions {
        PolicySuggestions {
            ts: "2026-08-07T11:00:00Z".to_string(),
            health: "OK".to_string(),
            stats: WindowStats {
                plans_7d: 0,
                plans_14d: 0,
                plans_30d: 2,
                avg_delta_30d: 0.4,
                max_delta_30d: 0.5,
            },
            suggestions: SuggestionSet {
                thresholds: entries,
                schedule: Vec::new(),
            },
            notes: Vec::new(),
        }
    }

    fn suggestion(path: &str, suggested: f64) -> ThresholdSuggestion {
        ThresholdSuggestion {
            path: path.to_string(),
            current: 0.0,
            suggested,
            rationale: "test".to_string(),
            confidence: 0.6,
        }
    }

    fn now() -> DateTime<Utc> {
        parse_ts("2026-08-07T12:00:00Z").unwrap()
    }

    #[test]
    fn unauthorized_tune_changes_nothing() {
        let tmp = TempDir::new().unwrap();
        let store = StateStore::new(tmp.path());
        let mut policy = KernelPolicy::load_or_init(tmp.path()).unwrap();
        store
            .write_json(
                SUGGESTIONS_FILE,
                &suggestions(vec![suggestion("thresholds.apply", 0.40)]),
            )
            .unwrap();

        let outcome = tune(&mut policy, &store, &AuthToken::new(None), now()).unwrap();
        assert!(!outcome.authorized);
        assert!(outcome.applied.is_empty());
        assert!((policy.thresholds.apply - 0.70).abs() < f64::EPSILON);
    }

    #[test]
    fn out_of_bound_suggestions_are_clamped_not_trusted() {
        let tmp = TempDir::new().unwrap();
        let store = StateStore::new(tmp.path());
        let mut policy = KernelPolicy::load_or_init(tmp.path()).unwrap();
        store
            .write_json(
                SUGGESTIONS_FILE,
                &suggestions(vec![
                    suggestion("thresholds.apply", 7.0),
                    suggestion("thresholds.propose", -3.0),
                    suggestion("thresholds.daily_cap", 500.0),
                ]),
            )
            .unwrap();

        let outcome = tune(&mut policy, &store, &AuthToken::new(Some("1")), now()).unwrap();
        assert!(outcome.authorized);
        assert_eq!(outcome.applied.len(), 3);
        assert!((policy.thresholds.apply - 0.90).abs() < f64::EPSILON);
        assert!((policy.thresholds.propose - 0.05).abs() < f64::EPSILON);
        assert_eq!(policy.thresholds.daily_cap, 20);
    }

    #[test]
    fn non_whitelisted_fields_are_ignored() {
        let tmp = TempDir::new().unwrap();
        let store = StateStore::new(tmp.path());
        let mut policy = KernelPolicy::load_or_init(tmp.path()).unwrap();
        store
            .write_json(
                SUGGESTIONS_FILE,
                &suggestions(vec![suggestion("apply_guard.required_value", 0.0)]),
            )
            .unwrap();

        let outcome = tune(&mut policy, &store, &AuthToken::new(Some("1")), now()).unwrap();
        assert!(outcome.applied.is_empty());
        assert_eq!(policy.apply_guard.required_value, "1");
    }

    #[test]
    fn repeat_tune_with_same_suggestions_is_idempotent() {
        let tmp = TempDir::new().unwrap();
        let store = StateStore::new(tmp.path());
        let mut policy = KernelPolicy::load_or_init(tmp.path()).unwrap();
        store
            .write_json(
                SUGGESTIONS_FILE,
                &suggestions(vec![suggestion("thresholds.apply", 0.65)]),
            )
            .unwrap();
        let auth = AuthToken::new(Some("1"));

        let first = tune(&mut policy, &store, &auth, now()).unwrap();
        assert_eq!(first.applied.len(), 1);
        let version_after_first = policy.version.clone();

        let second = tune(&mut policy, &store, &auth, now()).unwrap();
        assert!(second.applied.is_empty());
        assert_eq!(policy.version, version_after_first);
    }
}
