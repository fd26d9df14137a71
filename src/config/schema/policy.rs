use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use super::bounds;
use super::gate::InnerFeedbackConfig;
use super::schedule::ScheduleConfig;
use crate::state::write_atomic;

pub const POLICY_FILE: &str = "policy.toml";
pub const POLICY_BACKUP_FILE: &str = "policy.backup.toml";

/// The single mutable configuration record governing the whole loop.
///
/// Hand-authored initially; rewritten only by the self-tuning loop, which
/// version-tags every change. Loading is strict: unknown fields and
/// out-of-range values are rejected at startup instead of silently coerced.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct KernelPolicy {
    #[serde(skip)]
    pub policy_path: PathBuf,

    pub version: String,

    /// Path globs, relative to the state root, that the executor may touch.
    #[serde(default = "default_allowed_artifacts")]
    pub allowed_artifacts: Vec<String>,

    pub thresholds: ThresholdsConfig,

    #[serde(default)]
    pub naming: NamingConfig,

    /// Gates the decision engine's APPLY outcome and the executor.
    #[serde(default = "default_apply_guard")]
    pub apply_guard: GuardConfig,

    /// Gates the bounded auto-apply of threshold suggestions.
    #[serde(default = "default_tuning_guard")]
    pub tuning_guard: GuardConfig,

    /// Gates the expressivity-driven threshold retargeting.
    #[serde(default = "default_meta_guard")]
    pub meta_guard: GuardConfig,

    #[serde(default)]
    pub inner_feedback: InnerFeedbackConfig,

    #[serde(default)]
    pub schedule: ScheduleConfig,

    #[serde(default = "default_focus_targets")]
    pub focus_targets: BTreeMap<String, FocusTarget>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct ThresholdsConfig {
    /// Effective trigger at or above which a plan is proposed.
    pub propose: f64,
    /// Effective trigger at or above which a plan may be applied.
    pub apply: f64,
    /// Maximum artifact directories created per day across all roots.
    pub daily_cap: u32,
}

impl Default for ThresholdsConfig {
    fn default() -> Self {
        Self {
            propose: 0.50,
            apply: 0.70,
            daily_cap: 2,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct NamingConfig {
    /// Unit-name pattern; supports `{focus}`, `{date}` and `{hash}` tokens.
    #[serde(default = "default_name_pattern")]
    pub pattern: String,
    #[serde(default = "default_date_format")]
    pub date_format: String,
}

fn default_name_pattern() -> String {
    "{focus}-{date}".to_string()
}

fn default_date_format() -> String {
    "%Y-%m-%d".to_string()
}

impl Default for NamingConfig {
    fn default() -> Self {
        Self {
            pattern: default_name_pattern(),
            date_format: default_date_format(),
        }
    }
}

/// An out-of-band authorization: the named environment variable must equal
/// `required_value` exactly before the guarded mutation may happen.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct GuardConfig {
    pub env_var: String,
    pub required_value: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum::Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ArtifactKind {
    Note,
    Reflection,
    Prototype,
    Vision,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct FocusTarget {
    /// Artifact root, relative to the state root.
    pub root: String,
    pub kind: ArtifactKind,
    /// Filename for note-like artifacts.
    #[serde(default = "default_template")]
    pub template: String,
    /// Whether units under this root are recorded in the root's index.json.
    #[serde(default)]
    pub indexed: bool,
}

fn default_template() -> String {
    "note.md".to_string()
}

fn default_allowed_artifacts() -> Vec<String> {
    vec![
        "notes/**".to_string(),
        "reflections/**".to_string(),
        "prototypes/**".to_string(),
    ]
}

fn default_apply_guard() -> GuardConfig {
    GuardConfig {
        env_var: "NOEMA_AUTONOMY".to_string(),
        required_value: "1".to_string(),
    }
}

fn default_tuning_guard() -> GuardConfig {
    GuardConfig {
        env_var: "NOEMA_POLICY_AUTO".to_string(),
        required_value: "1".to_string(),
    }
}

fn default_meta_guard() -> GuardConfig {
    GuardConfig {
        env_var: "NOEMA_META_AUTO".to_string(),
        required_value: "1".to_string(),
    }
}

fn default_focus_targets() -> BTreeMap<String, FocusTarget> {
    let mut targets = BTreeMap::new();
    targets.insert(
        "growth".to_string(),
        FocusTarget {
            root: "prototypes".to_string(),
            kind: ArtifactKind::Prototype,
            template: default_template(),
            indexed: true,
        },
    );
    targets.insert(
        "vision".to_string(),
        FocusTarget {
            root: "prototypes".to_string(),
            kind: ArtifactKind::Vision,
            template: default_template(),
            indexed: true,
        },
    );
    targets.insert(
        "reflection".to_string(),
        FocusTarget {
            root: "reflections".to_string(),
            kind: ArtifactKind::Reflection,
            template: default_template(),
            indexed: false,
        },
    );
    targets.insert(
        "stability".to_string(),
        FocusTarget {
            root: "notes".to_string(),
            kind: ArtifactKind::Note,
            template: default_template(),
            indexed: false,
        },
    );
    targets
}

impl Default for KernelPolicy {
    fn default() -> Self {
        Self {
            policy_path: PathBuf::new(),
            version: "0.1.0".to_string(),
            allowed_artifacts: default_allowed_artifacts(),
            thresholds: ThresholdsConfig::default(),
            naming: NamingConfig::default(),
            apply_guard: default_apply_guard(),
            tuning_guard: default_tuning_guard(),
            meta_guard: default_meta_guard(),
            inner_feedback: InnerFeedbackConfig {
                enable: true,
                ..InnerFeedbackConfig::default()
            },
            schedule: ScheduleConfig::default(),
            focus_targets: default_focus_targets(),
        }
    }
}

impl KernelPolicy {
    /// Load the policy from `<root>/policy.toml`, or write the defaults on
    /// first run. A present-but-invalid policy is a startup error, not a
    /// silent fallback: the kernel must not act on a policy it cannot trust.
    pub fn load_or_init(root: &Path) -> Result<Self> {
        let policy_path = root.join(POLICY_FILE);

        if policy_path.exists() {
            let contents = fs::read_to_string(&policy_path)
                .with_context(|| format!("failed to read policy: {}", policy_path.display()))?;
            let mut policy: KernelPolicy = toml::from_str(&contents)
                .with_context(|| format!("failed to parse policy: {}", policy_path.display()))?;
            policy.policy_path.clone_from(&policy_path);
            policy.validate()?;
            Ok(policy)
        } else {
            let policy = Self {
                policy_path: policy_path.clone(),
                ..Self::default()
            };
            policy.validate()?;
            policy.save()?;
            Ok(policy)
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.version.trim().is_empty() {
            anyhow::bail!("policy version must not be empty");
        }

        if !bounds::PROPOSE_THRESHOLD.contains(self.thresholds.propose) {
            anyhow::bail!(
                "thresholds.propose must be in [{:.2}, {:.2}]",
                bounds::PROPOSE_THRESHOLD.min,
                bounds::PROPOSE_THRESHOLD.max
            );
        }
        if !bounds::APPLY_THRESHOLD.contains(self.thresholds.apply) {
            anyhow::bail!(
                "thresholds.apply must be in [{:.2}, {:.2}]",
                bounds::APPLY_THRESHOLD.min,
                bounds::APPLY_THRESHOLD.max
            );
        }
        if self.thresholds.propose > self.thresholds.apply {
            anyhow::bail!("thresholds.propose must be <= thresholds.apply");
        }
        if !bounds::DAILY_CAP.contains(f64::from(self.thresholds.daily_cap)) {
            anyhow::bail!(
                "thresholds.daily_cap must be in [{}, {}]",
                bounds::DAILY_CAP.min as u32,
                bounds::DAILY_CAP.max as u32
            );
        }

        self.validate_naming()?;
        self.validate_guards()?;
        self.validate_artifacts()?;
        self.inner_feedback.noise_gate.validate()?;
        self.schedule.validate()?;
        Ok(())
    }

    fn validate_naming(&self) -> Result<()> {
        if !self.naming.pattern.contains("{focus}") || !self.naming.pattern.contains("{date}") {
            anyhow::bail!("naming.pattern must contain the {{focus}} and {{date}} tokens");
        }
        let invalid = chrono::format::StrftimeItems::new(&self.naming.date_format)
            .any(|item| matches!(item, chrono::format::Item::Error));
        if invalid {
            anyhow::bail!("naming.date_format is not a valid strftime string");
        }
        Ok(())
    }

    fn validate_guards(&self) -> Result<()> {
        for (label, guard) in [
            ("apply_guard", &self.apply_guard),
            ("tuning_guard", &self.tuning_guard),
            ("meta_guard", &self.meta_guard),
        ] {
            if guard.env_var.trim().is_empty() || guard.required_value.is_empty() {
                anyhow::bail!("{label} must declare env_var and required_value");
            }
        }
        Ok(())
    }

    fn validate_artifacts(&self) -> Result<()> {
        for pattern in &self.allowed_artifacts {
            glob::Pattern::new(pattern)
                .with_context(|| format!("allowed_artifacts pattern invalid: {pattern}"))?;
        }
        for (focus, target) in &self.focus_targets {
            let root = Path::new(&target.root);
            if target.root.trim().is_empty()
                || root.is_absolute()
                || root
                    .components()
                    .any(|c| matches!(c, std::path::Component::ParentDir))
            {
                anyhow::bail!(
                    "focus_targets.{focus}.root must be a relative path inside the state root"
                );
            }
        }
        Ok(())
    }

    /// Atomic rename-based write of the full policy document.
    pub fn save(&self) -> Result<()> {
        let toml_str = toml::to_string_pretty(self).context("failed to serialize policy")?;
        write_atomic(&self.policy_path, &toml_str)
    }

    /// Copy the current on-disk policy next to itself before a mutation.
    pub fn backup(&self) -> Result<PathBuf> {
        let backup_path = self
            .policy_path
            .parent()
            .unwrap_or_else(|| Path::new("."))
            .join(POLICY_BACKUP_FILE);
        fs::copy(&self.policy_path, &backup_path).with_context(|| {
            format!("failed to back up policy to {}", backup_path.display())
        })?;
        Ok(backup_path)
    }

    /// Patch-bump a semver-shaped version; otherwise tag it `+auto` once.
    pub fn bump_version(&mut self) {
        let mut parts = self.version.splitn(3, '.');
        if let (Some(major), Some(minor), Some(rest)) = (parts.next(), parts.next(), parts.next())
            && let (Ok(major), Ok(minor)) = (major.parse::<u64>(), minor.parse::<u64>())
        {
            let digits: String = rest.chars().take_while(char::is_ascii_digit).collect();
            if let Ok(patch) = digits.parse::<u64>() {
                let tail = &rest[digits.len()..];
                self.version = format!("{major}.{minor}.{}{tail}", patch + 1);
                return;
            }
        }
        if !self.version.ends_with("+auto") {
            self.version.push_str("+auto");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn default_policy_validates_and_round_trips() {
        let tmp = TempDir::new().unwrap();
        let policy = KernelPolicy::load_or_init(tmp.path()).unwrap();
        assert!(tmp.path().join(POLICY_FILE).exists());

        let reloaded = KernelPolicy::load_or_init(tmp.path()).unwrap();
        assert_eq!(reloaded.thresholds, policy.thresholds);
        assert_eq!(reloaded.focus_targets, policy.focus_targets);
    }

    #[test]
    fn unknown_fields_are_rejected() {
        let tmp = TempDir::new().unwrap();
        let doc = r#"
version = "0.1.0"
surprise = true

[thresholds]
propose = 0.5
apply = 0.7
daily_cap = 2
"#;
        fs::write(tmp.path().join(POLICY_FILE), doc).unwrap();
        assert!(KernelPolicy::load_or_init(tmp.path()).is_err());
    }

    #[test]
    fn out_of_range_threshold_is_rejected_at_load() {
        let tmp = TempDir::new().unwrap();
        let doc = r#"
version = "0.1.0"

[thresholds]
propose = 0.5
apply = 3.0
daily_cap = 2
"#;
        fs::write(tmp.path().join(POLICY_FILE), doc).unwrap();
        assert!(KernelPolicy::load_or_init(tmp.path()).is_err());
    }

    #[test]
    fn propose_above_apply_is_rejected() {
        let policy = KernelPolicy {
            thresholds: ThresholdsConfig {
                propose: 0.80,
                apply: 0.40,
                daily_cap: 2,
            },
            ..KernelPolicy::default()
        };
        assert!(policy.validate().is_err());
    }

    #[test]
    fn absolute_focus_root_is_rejected() {
        let mut policy = KernelPolicy::default();
        policy.focus_targets.insert(
            "escape".to_string(),
            FocusTarget {
                root: "/etc".to_string(),
                kind: ArtifactKind::Note,
                template: default_template(),
                indexed: false,
            },
        );
        assert!(policy.validate().is_err());
    }

    #[test]
    fn semver_version_bumps_patch() {
        let mut policy = KernelPolicy {
            version: "1.2.3-expressive".to_string(),
            ..KernelPolicy::default()
        };
        policy.bump_version();
        assert_eq!(policy.version, "1.2.4-expressive");
    }

    #[test]
    fn freeform_version_gains_auto_tag_once() {
        let mut policy = KernelPolicy {
            version: "expressive".to_string(),
            ..KernelPolicy::default()
        };
        policy.bump_version();
        policy.bump_version();
        assert_eq!(policy.version, "expressive+auto");
    }
}
