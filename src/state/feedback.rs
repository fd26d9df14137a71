use serde::{Deserialize, Serialize};

use super::{FEEDBACK_FILE, StateStore};

/// Optional secondary signal from the reflective process. Only the signal
/// combiner reads it, and only through the noise gate.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct InnerFeedback {
    /// Additive trigger impulse; the combiner re-clamps it to the policy's
    /// ceiling regardless of what the producer wrote.
    #[serde(default)]
    pub delta_bonus: f64,
    #[serde(default)]
    pub focus_hint: Option<String>,
    #[serde(default)]
    pub confidence: f64,
    #[serde(default)]
    pub ts: String,
}

impl InnerFeedback {
    /// Absent is a normal state here: no feedback simply means the base
    /// signal passes through untouched.
    pub fn load(store: &StateStore) -> Option<Self> {
        store
            .load_json::<InnerFeedback>(FEEDBACK_FILE)
            .optional("inner feedback")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn absent_feedback_is_none() {
        let tmp = TempDir::new().unwrap();
        let store = StateStore::new(tmp.path());
        assert!(InnerFeedback::load(&store).is_none());
    }

    #[test]
    fn malformed_feedback_is_ignored_not_fatal() {
        let tmp = TempDir::new().unwrap();
        std::fs::create_dir_all(tmp.path().join("internal")).unwrap();
        std::fs::write(tmp.path().join(FEEDBACK_FILE), "]]").unwrap();

        let store = StateStore::new(tmp.path());
        assert!(InnerFeedback::load(&store).is_none());
    }
}
