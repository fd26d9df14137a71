use serde::{Deserialize, Serialize};

/// Immutable, timestamped description of the filesystem operations one run
/// would perform. Created once, persisted for audit, never mutated — only
/// applied (recorded separately) or left unapplied.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Plan {
    pub ts: String,
    pub delta_sum: f64,
    pub apply_guard: GuardSnapshot,
    pub focus: String,
    pub unit: String,
    pub actions: Vec<PlanAction>,
}

/// Snapshot of the guard the plan was built under, so an audit reader can
/// reconstruct the authorization requirements of the moment.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct GuardSnapshot {
    pub env: String,
    pub required_value: String,
}

/// One planned operation. Paths are relative to the state root and
/// slash-separated, which keeps plan records portable across machines.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PlanAction {
    Mkdir { path: String },
    Write { path: String, content: String },
    IndexAppend { path: String, entries: Vec<String> },
}

impl PlanAction {
    pub fn path(&self) -> &str {
        match self {
            Self::Mkdir { path }
            | Self::Write { path, .. }
            | Self::IndexAppend { path, .. } => path,
        }
    }
}
