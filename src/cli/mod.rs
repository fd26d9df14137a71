use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// `Noema` - A file-resident, self-regulating agent kernel.
#[derive(Parser, Debug)]
#[command(name = "noema")]
#[command(version = "0.1.0")]
#[command(about = "A file-resident, self-regulating agent kernel.", long_about = None)]
pub struct Cli {
    /// State root directory (default: ~/.noema, or $NOEMA_HOME)
    #[arg(long, global = true)]
    pub root: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the full kernel pipeline: combine, decide, plan, apply
    Run,

    /// Compute the decision window without planning, write diagnostics
    Diagnose,

    /// Analyze plan history and write advisory policy suggestions
    Reflect,

    /// Auto-apply bounded threshold suggestions (requires tuning guard)
    Tune,

    /// Recompute expressivity and retarget thresholds (requires meta guard)
    Balance,

    /// Print the current kernel state summary
    Status,
}
