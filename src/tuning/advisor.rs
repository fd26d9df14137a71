//! Advisory stage: scans plan history and writes non-binding suggestions.
//! Always safe to run; never mutates the policy.

use std::collections::BTreeMap;

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::config::KernelPolicy;
use crate::planner::PlanHistory;
use crate::signal::round3;
use crate::state::{HealthReport, SUGGESTIONS_FILE, StateStore, format_ts};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PolicySuggestions {
    pub ts: String,
    pub health: String,
    pub stats: WindowStats,
    pub suggestions: SuggestionSet,
    pub notes: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WindowStats {
    pub plans_7d: usize,
    pub plans_14d: usize,
    pub plans_30d: usize,
    pub avg_delta_30d: f64,
    pub max_delta_30d: f64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct SuggestionSet {
    pub thresholds: Vec<ThresholdSuggestion>,
    pub schedule: Vec<ScheduleSuggestion>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ThresholdSuggestion {
    /// Dotted field path into the policy, e.g. `thresholds.apply`.
    pub path: String,
    pub current: f64,
    pub suggested: f64,
    pub rationale: String,
    pub confidence: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ScheduleSuggestion {
    pub name: String,
    pub current_minutes: u32,
    pub suggested_minutes: u32,
    pub rationale: String,
    pub confidence: f64,
}

/// Analyze the 7/14/30-day plan windows and persist advisory suggestions.
pub fn reflect(
    policy: &KernelPolicy,
    store: &StateStore,
    now: DateTime<Utc>,
) -> Result<PolicySuggestions> {
    let history = PlanHistory::new(store);
    let plans_7d = history.load_window(7, now);
    let plans_14d = history.load_window(14, now);
    let plans_30d = history.load_window(30, now);
    let health = HealthReport::load(store);

    let deltas: Vec<f64> = plans_30d.iter().map(|p| p.delta_sum).collect();
    let avg_delta = if deltas.is_empty() {
        0.0
    } else {
        deltas.iter().sum::<f64>() / deltas.len() as f64
    };
    let max_delta = deltas.iter().copied().fold(0.0, f64::max);

    let stats = WindowStats {
        plans_7d: plans_7d.len(),
        plans_14d: plans_14d.len(),
        plans_30d: plans_30d.len(),
        avg_delta_30d: round3(avg_delta),
        max_delta_30d: round3(max_delta),
    };

    let suggestions = PolicySuggestions {
        ts: format_ts(now),
        health: health.status.to_string(),
        suggestions: SuggestionSet {
            thresholds: suggest_thresholds(policy, &stats, &plans_14d),
            schedule: suggest_schedule(policy),
        },
        stats,
        notes: vec![
            "Advisory only - no policy fields were changed.".to_string(),
            "Derived from plan history and trigger statistics; conservative heuristics."
                .to_string(),
        ],
    };

    store.write_json(SUGGESTIONS_FILE, &suggestions)?;
    info!(
        "wrote {} threshold and {} schedule suggestions",
        suggestions.suggestions.thresholds.len(),
        suggestions.suggestions.schedule.len()
    );
    Ok(suggestions)
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

fn suggest_thresholds(
    policy: &KernelPolicy,
    stats: &WindowStats,
    plans_14d: &[crate::planner::Plan],
) -> Vec<ThresholdSuggestion> {
    let cur_apply = policy.thresholds.apply;
    let cur_propose = policy.thresholds.propose;
    let cur_cap = policy.thresholds.daily_cap;
    let avg = stats.avg_delta_30d;

    let mut suggestions = Vec::new();

    // Apply threshold: few events with solid deltas lower it a step; a
    // noisy month of weak deltas raises it a step. Both directions stay
    // inside a conservative corridor; the hard bounds clamp again at apply
    // time.
    let mut target_apply = cur_apply;
    let mut rationale = Vec::new();
    if stats.plans_30d < 4 && avg >= 0.35 {
        target_apply = round2(cur_apply - 0.05).max(0.30);
        rationale.push("few events but solid deltas; careful lowering favors expression");
    } else if stats.plans_30d > 20 && avg < 0.30 {
        target_apply = round2(cur_apply + 0.05).min(0.80);
        rationale.push("many events with weak deltas; raise slightly to damp noise");
    }
    if (target_apply - cur_apply).abs() > f64::EPSILON {
        suggestions.push(ThresholdSuggestion {
            path: "thresholds.apply".to_string(),
            current: cur_apply,
            suggested: target_apply,
            rationale: rationale.join("; "),
            confidence: 0.6,
        });
    }

    // Propose threshold: held a margin below the (possibly adjusted) apply
    // threshold.
    let target_propose = if avg >= 0.40 {
        round2(cur_propose.min(target_apply - 0.10)).max(0.20)
    } else {
        round2(cur_propose.min(target_apply - 0.05)).max(0.25)
    };
    if (target_propose - cur_propose).abs() > f64::EPSILON {
        suggestions.push(ThresholdSuggestion {
            path: "thresholds.propose".to_string(),
            current: cur_propose,
            suggested: target_propose,
            rationale: "kept a buffer below the apply threshold".to_string(),
            confidence: 0.55,
        });
    }

    // Daily cap: spike days push it up, a silent fortnight with real
    // deltas pulls it back down.
    let mut day_counts: BTreeMap<String, u32> = BTreeMap::new();
    for plan in plans_14d {
        let day: String = plan.ts.chars().take(10).collect();
        if !day.is_empty() {
            *day_counts.entry(day).or_insert(0) += 1;
        }
    }
    let spike_days = day_counts.values().filter(|&&c| c > cur_cap).count();

    if spike_days >= 3 {
        let target_cap = (cur_cap + 1).min(10);
        suggestions.push(ThresholdSuggestion {
            path: "thresholds.daily_cap".to_string(),
            current: f64::from(cur_cap),
            suggested: f64::from(target_cap),
            rationale: format!(
                "{spike_days} days exceeded the current cap of {cur_cap}; allow expressive peaks"
            ),
            confidence: 0.5,
        });
    } else if stats.plans_14d == 0
        && (avg >= 0.35 || stats.max_delta_30d >= 0.50)
        && cur_cap > 2
    {
        let target_cap = (cur_cap - 1).max(2);
        suggestions.push(ThresholdSuggestion {
            path: "thresholds.daily_cap".to_string(),
            current: f64::from(cur_cap),
            suggested: f64::from(target_cap),
            rationale: "no plans in 14 days despite significant deltas; tighten for focus"
                .to_string(),
            confidence: 0.45,
        });
    }

    suggestions
}

fn suggest_schedule(policy: &KernelPolicy) -> Vec<ScheduleSuggestion> {
    if !policy.schedule.enable {
        return Vec::new();
    }
    policy
        .schedule
        .targets
        .iter()
        .filter_map(|target| {
            let clamped = target
                .interval_minutes
                .clamp(target.min_interval_minutes, target.max_interval_minutes);
            (clamped != target.interval_minutes).then(|| ScheduleSuggestion {
                name: target.name.clone(),
                current_minutes: target.interval_minutes,
                suggested_minutes: clamped,
                rationale: format!(
                    "outside the configured corridor ({}..{} min)",
                    target.min_interval_minutes, target.max_interval_minutes
                ),
                confidence: 0.7,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ScheduleConfig, ScheduleTarget, ThresholdsConfig};
    use crate::planner::{GuardSnapshot, Plan, PlanAction, PlanHistory};
    use crate::state::parse_ts;
    use tempfile::TempDir;

    fn seeded_store(tmp: &TempDir, plans: &[(&str, f64)]) -> StateStore {
        let store = StateStore::new(tmp.path());
        store.ensure_layout().unwrap();
        let history = PlanHistory::new(&store);
        for (ts, delta) in plans {
            history
                .persist(&Plan {
                    ts: (*ts).to_string(),
                    delta_sum: *delta,
                    apply_guard: GuardSnapshot {
                        env: "NOEMA_AUTONOMY".to_string(),
                        required_value: "1".to_string(),
                    },
                    focus: "growth".to_string(),
                    unit: format!("growth-{}", &ts[..10]),
                    actions: vec![PlanAction::Mkdir {
                        path: "prototypes/x".to_string(),
                    }],
                })
                .unwrap();
        }
        store
    }

    fn now() -> DateTime<Utc> {
        parse_ts("2026-08-07T12:00:00Z").unwrap()
    }

    #[test]
    fn sparse_month_with_solid_deltas_lowers_apply() {
        let tmp = TempDir::new().unwrap();
        let store = seeded_store(
            &tmp,
            &[
                ("2026-07-20T10:00:00Z", 0.45),
                ("2026-07-28T10:00:00Z", 0.40),
            ],
        );
        let policy = KernelPolicy::default();

        let out = reflect(&policy, &store, now()).unwrap();
        let apply = out
            .suggestions
            .thresholds
            .iter()
            .find(|s| s.path == "thresholds.apply")
            .expect("apply suggestion");
        assert!((apply.suggested - 0.65).abs() < f64::EPSILON);
        assert!(tmp.path().join(SUGGESTIONS_FILE).exists());
    }

    #[test]
    fn noisy_month_with_weak_deltas_raises_apply() {
        let tmp = TempDir::new().unwrap();
        let plans: Vec<(String, f64)> = (10..=31)
            .map(|day| (format!("2026-07-{day:02}T10:00:00Z"), 0.15))
            .collect();
        let borrowed: Vec<(&str, f64)> =
            plans.iter().map(|(ts, d)| (ts.as_str(), *d)).collect();
        let store = seeded_store(&tmp, &borrowed);
        let policy = KernelPolicy::default();

        let out = reflect(&policy, &store, now()).unwrap();
        let apply = out
            .suggestions
            .thresholds
            .iter()
            .find(|s| s.path == "thresholds.apply")
            .expect("apply suggestion");
        assert!((apply.suggested - 0.75).abs() < f64::EPSILON);
    }

    #[test]
    fn spike_days_raise_the_daily_cap() {
        let tmp = TempDir::new().unwrap();
        // Three days in the window each produce three plans against a cap
        // of two.
        let mut plans = Vec::new();
        for day in ["2026-08-01", "2026-08-03", "2026-08-05"] {
            for hour in ["08", "12", "16"] {
                plans.push((format!("{day}T{hour}:00:00Z"), 0.6));
            }
        }
        let borrowed: Vec<(&str, f64)> =
            plans.iter().map(|(ts, d)| (ts.as_str(), *d)).collect();
        let store = seeded_store(&tmp, &borrowed);
        let policy = KernelPolicy::default();

        let out = reflect(&policy, &store, now()).unwrap();
        let cap = out
            .suggestions
            .thresholds
            .iter()
            .find(|s| s.path == "thresholds.daily_cap")
            .expect("cap suggestion");
        assert!((cap.suggested - 3.0).abs() < f64::EPSILON);
    }

    #[test]
    fn silent_fortnight_with_high_deltas_lowers_a_generous_cap() {
        let tmp = TempDir::new().unwrap();
        // Old plans outside the 14-day window, strong deltas.
        let store = seeded_store(
            &tmp,
            &[
                ("2026-07-10T10:00:00Z", 0.55),
                ("2026-07-12T10:00:00Z", 0.60),
            ],
        );
        let policy = KernelPolicy {
            thresholds: ThresholdsConfig {
                propose: 0.50,
                apply: 0.70,
                daily_cap: 5,
            },
            ..KernelPolicy::default()
        };

        let out = reflect(&policy, &store, now()).unwrap();
        let cap = out
            .suggestions
            .thresholds
            .iter()
            .find(|s| s.path == "thresholds.daily_cap")
            .expect("cap suggestion");
        assert!((cap.suggested - 4.0).abs() < f64::EPSILON);
    }

    #[test]
    fn quiet_history_suggests_nothing() {
        let tmp = TempDir::new().unwrap();
        let store = seeded_store(
            &tmp,
            &[
                ("2026-08-01T08:00:00Z", 0.55),
                ("2026-08-01T09:00:00Z", 0.55),
                ("2026-08-01T10:00:00Z", 0.55),
                ("2026-08-01T11:00:00Z", 0.55),
                ("2026-08-01T12:00:00Z", 0.55),
            ],
        );
        let policy = KernelPolicy::default();

        let out = reflect(&policy, &store, now()).unwrap();
        assert!(out.suggestions.thresholds.is_empty());
    }

    #[test]
    fn out_of_corridor_schedule_is_flagged_but_advisory() {
        let tmp = TempDir::new().unwrap();
        let store = seeded_store(&tmp, &[]);
        let policy = KernelPolicy {
            schedule: ScheduleConfig {
                enable: true,
                targets: vec![ScheduleTarget {
                    name: "kernel-run".to_string(),
                    interval_minutes: 5,
                    min_interval_minutes: 30,
                    max_interval_minutes: 120,
                }],
            },
            ..KernelPolicy::default()
        };

        let out = reflect(&policy, &store, now()).unwrap();
        assert_eq!(out.suggestions.schedule.len(), 1);
        assert_eq!(out.suggestions.schedule[0].suggested_minutes, 30);
    }
}
