use serde::{Deserialize, Serialize};

use super::{META_FILE, StateStore};

/// Derived meta record: how permissive the self-tuning loop should currently
/// be. Recomputed on every balance run; the targets are what the guarded
/// retargeting path would write into the policy.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MetaState {
    pub ts: String,
    pub health: String,
    pub signals: MetaSignals,
    /// 0 = fully conservative, 1 = fully expressive.
    pub expressivity: f64,
    pub targets: MetaTargets,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MetaSignals {
    pub stability: f64,
    pub delta_sum: f64,
    /// Plans observed in the trailing 14 days, capped at 14.
    pub recent_activity: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MetaTargets {
    pub apply: f64,
    pub propose: f64,
    pub daily_cap: u32,
    pub naming_pattern: String,
}

impl MetaState {
    pub fn write(&self, store: &StateStore) -> anyhow::Result<()> {
        store.write_json(META_FILE, self)
    }

    pub fn load(store: &StateStore) -> Option<Self> {
        store.load_json::<MetaState>(META_FILE).optional("meta state")
    }
}
