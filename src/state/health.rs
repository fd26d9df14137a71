use serde::{Deserialize, Serialize};

use super::{HEALTH_FILE, StateStore};

/// Repository health as derived by the external health updater.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, strum::Display,
)]
#[serde(rename_all = "UPPERCASE")]
#[strum(serialize_all = "UPPERCASE")]
pub enum HealthState {
    Ok,
    Healing,
    Degraded,
    /// Absent or unrecognized report. Never a member of any accepted-status
    /// set, so the noise gate stays closed under it.
    #[default]
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct HealthReport {
    #[serde(default)]
    pub status: HealthState,
    #[serde(default)]
    pub ts: String,
}

impl HealthReport {
    pub fn load(store: &StateStore) -> Self {
        store.load_json::<HealthReport>(HEALTH_FILE).or_default("health")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn known_statuses_parse_uppercase() {
        let report: HealthReport =
            serde_json::from_str(r#"{"status":"HEALING","ts":"2026-08-07T00:00:00Z"}"#).unwrap();
        assert_eq!(report.status, HealthState::Healing);
        assert_eq!(report.status.to_string(), "HEALING");
    }

    #[test]
    fn unrecognized_status_degrades_to_unknown() {
        let report: HealthReport = serde_json::from_str(r#"{"status":"SPARKLING"}"#).unwrap();
        assert_eq!(report.status, HealthState::Unknown);
    }

    #[test]
    fn absent_report_is_unknown() {
        let tmp = TempDir::new().unwrap();
        let store = StateStore::new(tmp.path());
        assert_eq!(HealthReport::load(&store).status, HealthState::Unknown);
    }
}
