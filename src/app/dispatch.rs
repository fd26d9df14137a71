use anyhow::Result;
use chrono::Utc;

use super::{pipeline, status};
use crate::cli::{Cli, Commands};
use crate::config::KernelPolicy;
use crate::decision::AuthToken;
use crate::state::StateStore;
use crate::tuning;

pub fn dispatch(cli: Cli) -> Result<()> {
    let store = StateStore::resolve(cli.root)?;
    let mut policy = KernelPolicy::load_or_init(store.root())?;
    let now = Utc::now();

    match cli.command {
        Commands::Run => {
            let auth = AuthToken::from_env(&policy.apply_guard);
            let summary = pipeline::run_once(&policy, &store, &auth, now)?;
            println!("{}", status::render_run_summary(&summary)?);
        }
        Commands::Diagnose => {
            let auth = AuthToken::from_env(&policy.apply_guard);
            let record = pipeline::diagnose(&policy, &store, &auth, now)?;
            println!("{}", serde_json::to_string_pretty(&record)?);
        }
        Commands::Reflect => {
            let out = tuning::reflect(&policy, &store, now)?;
            println!("◆ Reflection complete");
            println!(
                "Plans observed (7/14/30d): {}/{}/{}",
                out.stats.plans_7d, out.stats.plans_14d, out.stats.plans_30d
            );
            println!("Threshold suggestions: {}", out.suggestions.thresholds.len());
            println!("Schedule suggestions: {}", out.suggestions.schedule.len());
        }
        Commands::Tune => {
            let auth = AuthToken::from_env(&policy.tuning_guard);
            let outcome = tuning::tune(&mut policy, &store, &auth, now)?;
            println!("◆ Tuning complete");
            println!(
                "Mode: {}",
                if outcome.authorized {
                    "apply"
                } else {
                    "dry-run (guard off)"
                }
            );
            println!("Applied changes: {}", outcome.applied.len());
        }
        Commands::Balance => {
            let auth = AuthToken::from_env(&policy.meta_guard);
            let outcome = tuning::balance(&mut policy, &store, &auth, now)?;
            println!("◆ Balance complete");
            println!("Expressivity: {:.3}", outcome.meta.expressivity);
            println!("Applied changes: {}", outcome.applied.len());
        }
        Commands::Status => {
            println!("{}", status::render_status(&policy, &store));
        }
    }

    Ok(())
}
