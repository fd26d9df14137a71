use std::collections::BTreeSet;
use std::fs;

use chrono::{DateTime, Utc};
use tracing::{debug, info};

use super::naming::unit_name;
use super::plan::{GuardSnapshot, Plan, PlanAction};
use crate::config::{ArtifactKind, FocusTarget, KernelPolicy};
use crate::signal::{EffectiveSignal, round3};
use crate::state::{StateStore, format_ts};

/// Turns a PROPOSE/APPLY decision into a concrete, ordered action list.
/// Planning is separate from authorization: the builder never consults the
/// whitelist, and the plan it emits is persisted whether or not it is
/// applied.
pub struct PlanBuilder<'a> {
    policy: &'a KernelPolicy,
    store: &'a StateStore,
}

impl<'a> PlanBuilder<'a> {
    pub fn new(policy: &'a KernelPolicy, store: &'a StateStore) -> Self {
        Self { policy, store }
    }

    /// Build the plan for the current effective signal, or `None` when the
    /// daily creation cap is already reached (silent backpressure, not an
    /// error).
    pub fn build(&self, signal: &EffectiveSignal, now: DateTime<Utc>) -> Option<Plan> {
        let date = now.format(&self.policy.naming.date_format).to_string();

        let cap = self.policy.thresholds.daily_cap as usize;
        let created = self.created_today(&date);
        if created >= cap {
            info!("daily cap reached ({created}/{cap}), no plan generated");
            return None;
        }

        let target = self.resolve_target(&signal.focus);
        let unit = unit_name(&self.policy.naming, &signal.focus, &date, signal.delta);
        let unit_dir = format!("{}/{unit}", target.root);

        let mut actions = vec![PlanAction::Mkdir {
            path: unit_dir.clone(),
        }];
        match target.kind {
            ArtifactKind::Note | ArtifactKind::Reflection => {
                actions.push(PlanAction::Write {
                    path: format!("{unit_dir}/{}", target.template),
                    content: note_body(signal, &date),
                });
            }
            ArtifactKind::Prototype | ArtifactKind::Vision => {
                actions.push(PlanAction::Write {
                    path: format!("{unit_dir}/manifest.json"),
                    content: manifest_body(target.kind, signal, &date),
                });
                actions.push(PlanAction::Write {
                    path: format!("{unit_dir}/seed.txt"),
                    content: seed_body(target.kind, signal, &date),
                });
            }
        }
        if target.indexed {
            actions.push(PlanAction::IndexAppend {
                path: format!("{}/index.json", target.root),
                entries: vec![unit.clone()],
            });
        }

        debug!("planned unit '{unit}' with {} actions", actions.len());
        Some(Plan {
            ts: format_ts(now),
            delta_sum: round3(signal.delta),
            apply_guard: GuardSnapshot {
                env: self.policy.apply_guard.env_var.clone(),
                required_value: self.policy.apply_guard.required_value.clone(),
            },
            focus: signal.focus.clone(),
            unit,
            actions,
        })
    }

    fn resolve_target(&self, focus: &str) -> FocusTarget {
        let slug = focus.trim().to_lowercase();
        self.policy
            .focus_targets
            .get(&slug)
            .or_else(|| self.policy.focus_targets.get(focus))
            .cloned()
            .unwrap_or_else(|| FocusTarget {
                root: "notes".to_string(),
                kind: ArtifactKind::Note,
                template: "note.md".to_string(),
                indexed: false,
            })
    }

    /// Count unit directories created today: directories directly under a
    /// configured focus-target root (plus the fallback notes root) whose
    /// name contains today's date token. The cap is global across roots.
    fn created_today(&self, date: &str) -> usize {
        let mut roots: BTreeSet<&str> = self
            .policy
            .focus_targets
            .values()
            .map(|t| t.root.as_str())
            .collect();
        roots.insert("notes");

        let mut count = 0;
        for root in roots {
            let Ok(entries) = fs::read_dir(self.store.path(root)) else {
                continue;
            };
            for entry in entries.flatten() {
                let is_dir = entry.file_type().is_ok_and(|t| t.is_dir());
                if is_dir && entry.file_name().to_string_lossy().contains(date) {
                    count += 1;
                }
            }
        }
        count
    }
}

fn note_body(signal: &EffectiveSignal, date: &str) -> String {
    let slug = signal.focus.trim().to_lowercase();
    let mut body = format!(
        "# {slug} — {date}\n\nAutonomous note triggered at delta_sum ≈ {:.3} (focus={}).\n",
        signal.delta, signal.focus
    );
    if signal.bonus_applied.abs() > f64::EPSILON {
        body.push_str(&format!(
            "Inner feedback contributed {:+.3} to the trigger.\n",
            signal.bonus_applied
        ));
    }
    if signal.took_focus_hint {
        body.push_str("Focus taken from the inner feedback hint.\n");
    }
    body
}

fn manifest_body(kind: ArtifactKind, signal: &EffectiveSignal, date: &str) -> String {
    let manifest = serde_json::json!({
        "kind": kind.to_string(),
        "created": date,
        "reason": "affect_delta",
        "delta_sum": round3(signal.delta),
        "focus": signal.focus,
    });
    serde_json::to_string_pretty(&manifest).unwrap_or_default()
}

fn seed_body(kind: ArtifactKind, signal: &EffectiveSignal, date: &str) -> String {
    format!(
        "seed: {kind}\nfocus: {}\ndelta: {:.3}\ncreated: {date}\n",
        signal.focus, signal.delta
    )
}
