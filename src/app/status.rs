use anyhow::Result;

use super::pipeline::RunSummary;
use crate::config::KernelPolicy;
use crate::state::{AffectState, HealthReport, MetaState, StateStore};

/// Human-first lines followed by the machine-readable summary block.
pub fn render_run_summary(summary: &RunSummary) -> Result<String> {
    let mut out = String::from("◆ Kernel run complete\n");
    out.push_str(&format!("Decision: {}\n", summary.decision));
    out.push_str(&format!(
        "Effective delta: {:.3} (focus={})\n",
        summary.effective.delta, summary.effective.focus
    ));
    match &summary.plan {
        Some(path) => out.push_str(&format!("Plan: {path}\n")),
        None => out.push_str("Plan: none\n"),
    }
    out.push_str(&format!("Artifacts touched: {}\n", summary.artifacts.len()));
    out.push_str(&serde_json::to_string_pretty(summary)?);
    Ok(out)
}

pub fn render_status(policy: &KernelPolicy, store: &StateStore) -> String {
    let affect = AffectState::load(store);
    let health = HealthReport::load(store);
    let meta = MetaState::load(store);

    let mut out = String::from("◆ Noema kernel status\n");
    out.push_str(&format!("Policy version: {}\n", policy.version));
    out.push_str(&format!(
        "Thresholds: propose={:.2} apply={:.2} daily_cap={}\n",
        policy.thresholds.propose, policy.thresholds.apply, policy.thresholds.daily_cap
    ));
    out.push_str(&format!("Health: {}\n", health.status));
    out.push_str(&format!(
        "Affect: delta_sum={:.3} focus={} stability={:.2}\n",
        affect.inputs.delta_sum, affect.inputs.focus, affect.vector.stability
    ));
    match meta {
        Some(meta) => out.push_str(&format!("Expressivity: {:.3}\n", meta.expressivity)),
        None => out.push_str("Expressivity: not yet computed\n"),
    }
    out.push_str(&format!(
        "Apply guard: env {} (exact match required)\n",
        policy.apply_guard.env_var
    ));
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn status_renders_without_any_state_files() {
        let tmp = TempDir::new().unwrap();
        let store = StateStore::new(tmp.path());
        let policy = KernelPolicy::default();

        let rendered = render_status(&policy, &store);
        assert!(rendered.contains("Noema kernel status"));
        assert!(rendered.contains("daily_cap=2"));
        assert!(rendered.contains("Expressivity: not yet computed"));
    }
}
