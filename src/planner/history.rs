use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;

use super::plan::Plan;
use crate::state::{StateStore, format_ts, parse_ts};

const INDEX_FILE: &str = "index.json";
const INDEX_LIMIT: usize = 50;

/// Append-only collection of persisted plans, the evidentiary basis for
/// self-tuning. Plans are never deleted or rewritten; the derived index is
/// the only file here that gets regenerated.
pub struct PlanHistory<'a> {
    store: &'a StateStore,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PlansIndex {
    pub updated: String,
    pub count: usize,
    pub files: Vec<String>,
    pub entries: Vec<PlanDigest>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PlanDigest {
    pub file: String,
    pub ts: String,
    pub delta_sum: f64,
    pub focus: String,
    pub unit: String,
    pub actions: usize,
}

impl<'a> PlanHistory<'a> {
    pub fn new(store: &'a StateStore) -> Self {
        Self { store }
    }

    /// Persist a plan under its timestamp-derived filename. Every planning
    /// decision stays independently reconstructable from this directory.
    pub fn persist(&self, plan: &Plan) -> Result<PathBuf> {
        let filename = format!("{}.json", compact_ts(&plan.ts));
        let path = self.store.plans_dir().join(&filename);
        let body = serde_json::to_string_pretty(plan).context("failed to serialize plan")?;
        crate::state::write_atomic(&path, &body)?;
        Ok(path)
    }

    /// Plans whose timestamp falls within the trailing `days` window.
    pub fn load_window(&self, days: i64, now: DateTime<Utc>) -> Vec<Plan> {
        let cutoff = now - Duration::days(days);
        self.load_all()
            .into_iter()
            .filter_map(|(_, plan)| {
                let ts = parse_ts(&plan.ts)?;
                (ts >= cutoff && ts <= now).then_some(plan)
            })
            .collect()
    }

    /// Regenerate the derived plans index: newest first, capped.
    pub fn rebuild_index(&self, now: DateTime<Utc>) -> Result<PathBuf> {
        let mut digests: Vec<PlanDigest> = self
            .load_all()
            .into_iter()
            .map(|(file, plan)| PlanDigest {
                file,
                ts: plan.ts.clone(),
                delta_sum: plan.delta_sum,
                focus: plan.focus,
                unit: plan.unit,
                actions: plan.actions.len(),
            })
            .collect();
        digests.sort_by(|a, b| b.ts.cmp(&a.ts));
        digests.truncate(INDEX_LIMIT);

        let index = PlansIndex {
            updated: format_ts(now),
            count: digests.len(),
            files: digests.iter().map(|d| d.file.clone()).collect(),
            entries: digests,
        };

        let path = self.store.plans_dir().join(INDEX_FILE);
        let body = serde_json::to_string_pretty(&index).context("failed to serialize index")?;
        crate::state::write_atomic(&path, &body)?;
        Ok(path)
    }

    fn load_all(&self) -> Vec<(String, Plan)> {
        let Ok(entries) = fs::read_dir(self.store.plans_dir()) else {
            return Vec::new();
        };

        let mut plans = Vec::new();
        for entry in entries.flatten() {
            let name = entry.file_name().to_string_lossy().into_owned();
            if !name.ends_with(".json") || name == INDEX_FILE {
                continue;
            }
            let Ok(raw) = fs::read_to_string(entry.path()) else {
                warn!("plan {name} unreadable, skipping");
                continue;
            };
            match serde_json::from_str::<Plan>(&raw) {
                Ok(plan) => plans.push((name, plan)),
                Err(err) => warn!("plan {name} malformed ({err}), skipping"),
            }
        }
        plans.sort_by(|a, b| a.0.cmp(&b.0));
        plans
    }
}

/// `2026-08-07T12:13:14Z` → `20260807_121314`
fn compact_ts(ts: &str) -> String {
    ts.replace(['-', ':'], "")
        .replace('T', "_")
        .trim_end_matches('Z')
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::planner::plan::{GuardSnapshot, PlanAction};
    use tempfile::TempDir;

    fn plan(ts: &str, delta: f64) -> Plan {
        Plan {
            ts: ts.to_string(),
            delta_sum: delta,
            apply_guard: GuardSnapshot {
                env: "NOEMA_AUTONOMY".to_string(),
                required_value: "1".to_string(),
            },
            focus: "growth".to_string(),
            unit: "growth-2026-08-07".to_string(),
            actions: vec![PlanAction::Mkdir {
                path: "prototypes/growth-2026-08-07".to_string(),
            }],
        }
    }

    #[test]
    fn persisted_filename_derives_from_timestamp() {
        let tmp = TempDir::new().unwrap();
        let store = StateStore::new(tmp.path());
        store.ensure_layout().unwrap();

        let path = PlanHistory::new(&store)
            .persist(&plan("2026-08-07T12:13:14Z", 0.8))
            .unwrap();
        assert!(path.ends_with("plans/20260807_121314.json"));
    }

    #[test]
    fn window_filters_by_age_and_skips_garbage() {
        let tmp = TempDir::new().unwrap();
        let store = StateStore::new(tmp.path());
        store.ensure_layout().unwrap();
        let history = PlanHistory::new(&store);

        history.persist(&plan("2026-08-05T10:00:00Z", 0.6)).unwrap();
        history.persist(&plan("2026-06-01T10:00:00Z", 0.9)).unwrap();
        fs::write(store.plans_dir().join("bogus.json"), "{{").unwrap();

        let now = parse_ts("2026-08-07T12:00:00Z").unwrap();
        let recent = history.load_window(7, now);
        assert_eq!(recent.len(), 1);
        assert!((recent[0].delta_sum - 0.6).abs() < f64::EPSILON);

        let wide = history.load_window(90, now);
        assert_eq!(wide.len(), 2);
    }

    #[test]
    fn index_lists_newest_first_and_excludes_itself() {
        let tmp = TempDir::new().unwrap();
        let store = StateStore::new(tmp.path());
        store.ensure_layout().unwrap();
        let history = PlanHistory::new(&store);

        history.persist(&plan("2026-08-05T10:00:00Z", 0.6)).unwrap();
        history.persist(&plan("2026-08-06T10:00:00Z", 0.7)).unwrap();

        let now = parse_ts("2026-08-07T12:00:00Z").unwrap();
        history.rebuild_index(now).unwrap();
        // Rebuilding with the index present must not index the index.
        history.rebuild_index(now).unwrap();

        let raw = fs::read_to_string(store.plans_dir().join(INDEX_FILE)).unwrap();
        let index: PlansIndex = serde_json::from_str(&raw).unwrap();
        assert_eq!(index.count, 2);
        assert_eq!(index.entries[0].ts, "2026-08-06T10:00:00Z");
        assert!(index.files.iter().all(|f| f != INDEX_FILE));
    }
}
