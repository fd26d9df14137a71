//! Guarded executor: applies a plan's actions, but only those whose target
//! matches the artifact whitelist, and only idempotently. The whitelist
//! check here is independent of how the plan was built — a stale or
//! hand-edited plan record gets the same vetting as a fresh one.

use std::fs;
use std::collections::BTreeSet;

use glob::Pattern;
use tracing::{info, warn};

use crate::error::PlanError;
use crate::planner::{Plan, PlanAction};
use crate::state::StateStore;

pub struct Executor<'a> {
    store: &'a StateStore,
    patterns: Vec<Pattern>,
}

impl<'a> Executor<'a> {
    pub fn new(store: &'a StateStore, allowed_artifacts: &[String]) -> Self {
        let patterns = allowed_artifacts
            .iter()
            .filter_map(|raw| match Pattern::new(raw) {
                Ok(pattern) => Some(pattern),
                Err(err) => {
                    warn!("whitelist pattern '{raw}' invalid ({err}), ignoring");
                    None
                }
            })
            .collect();
        Self { store, patterns }
    }

    /// Apply every whitelisted action. Returns the state-root-relative paths
    /// actually mutated; a rejected action is logged and skipped, never an
    /// error. The only failure that propagates is I/O on an authorized,
    /// whitelisted target.
    pub fn apply(&self, plan: &Plan) -> Result<Vec<String>, PlanError> {
        let mut mutated = Vec::new();

        for action in &plan.actions {
            let rel = action.path();
            if !self.allowed(rel) {
                warn!("skip (not allowed): {rel}");
                continue;
            }

            match action {
                PlanAction::Mkdir { path } => {
                    if self.mkdir(path)? {
                        mutated.push(path.clone());
                    }
                }
                PlanAction::Write { path, content } => {
                    if self.write(path, content)? {
                        mutated.push(path.clone());
                    }
                }
                PlanAction::IndexAppend { path, entries } => {
                    if self.index_append(path, entries)? {
                        mutated.push(path.clone());
                    }
                }
            }
        }

        if !mutated.is_empty() {
            info!("applied plan '{}': {} paths touched", plan.unit, mutated.len());
        }
        Ok(mutated)
    }

    fn allowed(&self, rel: &str) -> bool {
        self.patterns.iter().any(|p| p.matches(rel))
    }

    fn mkdir(&self, rel: &str) -> Result<bool, PlanError> {
        let path = self.store.path(rel);
        if path.is_dir() {
            return Ok(false);
        }
        fs::create_dir_all(&path).map_err(|source| PlanError::Write {
            path: rel.to_string(),
            source,
        })?;
        Ok(true)
    }

    /// Byte-for-byte comparison before writing: two runs with identical
    /// inputs produce zero additional writes on the second run.
    fn write(&self, rel: &str, content: &str) -> Result<bool, PlanError> {
        let path = self.store.path(rel);
        if let Ok(existing) = fs::read(&path)
            && existing == content.as_bytes()
        {
            return Ok(false);
        }

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|source| PlanError::Write {
                path: rel.to_string(),
                source,
            })?;
        }
        fs::write(&path, content).map_err(|source| PlanError::Write {
            path: rel.to_string(),
            source,
        })?;
        Ok(true)
    }

    /// Merge entries into the index's file set: deduplicated, sorted,
    /// idempotent. Other top-level fields of an existing index survive.
    fn index_append(&self, rel: &str, entries: &[String]) -> Result<bool, PlanError> {
        let path = self.store.path(rel);

        let mut index: serde_json::Map<String, serde_json::Value> = fs::read_to_string(&path)
            .ok()
            .and_then(|raw| serde_json::from_str(&raw).ok())
            .unwrap_or_default();

        let mut files: BTreeSet<String> = index
            .get("files")
            .and_then(|v| v.as_array())
            .map(|array| {
                array
                    .iter()
                    .filter_map(|v| v.as_str().map(str::to_string))
                    .collect()
            })
            .unwrap_or_default();

        let before = files.len();
        for entry in entries {
            files.insert(entry.clone());
        }
        if files.len() == before && index.contains_key("files") {
            return Ok(false);
        }

        index.insert(
            "files".to_string(),
            serde_json::Value::Array(
                files.into_iter().map(serde_json::Value::String).collect(),
            ),
        );
        let body = serde_json::to_string_pretty(&serde_json::Value::Object(index))
            .unwrap_or_default();

        crate::state::write_atomic(&path, &body).map_err(|err| PlanError::Persist(err.to_string()))?;
        Ok(true)
    }
}
