pub mod affect;
pub mod feedback;
pub mod health;
pub mod meta;

pub use affect::{AffectInputs, AffectState, AffectVector};
pub use feedback::InnerFeedback;
pub use health::{HealthReport, HealthState};
pub use meta::MetaState;

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use directories::UserDirs;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::warn;

pub const AFFECT_FILE: &str = "affect-state.json";
pub const HEALTH_FILE: &str = "health.json";
pub const FEEDBACK_FILE: &str = "internal/feedback.json";
pub const DIAGNOSTICS_FILE: &str = "internal/diagnostics.json";
pub const META_FILE: &str = "meta_state.json";
pub const SUGGESTIONS_FILE: &str = "policy_suggestions.json";
pub const AUDIT_FILE: &str = "policy_changes.jsonl";
pub const PLANS_DIR: &str = "plans";

/// Timestamp format shared by every record on disk.
pub const TS_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";

pub fn format_ts(at: DateTime<Utc>) -> String {
    at.format(TS_FORMAT).to_string()
}

pub fn parse_ts(raw: &str) -> Option<DateTime<Utc>> {
    let trimmed = raw.trim().trim_end_matches('Z');
    chrono::NaiveDateTime::parse_from_str(trimmed, "%Y-%m-%dT%H:%M:%S")
        .or_else(|_| chrono::NaiveDateTime::parse_from_str(trimmed, "%Y-%m-%dT%H:%M"))
        .ok()
        .map(|naive| naive.and_utc())
}

/// Result of loading a record: "file absent" and "file present but
/// unreadable" are distinguishable, and both recover to defaults at the
/// call site.
#[derive(Debug)]
pub enum LoadOutcome<T> {
    Present(T),
    Absent,
    Invalid(String),
}

impl<T> LoadOutcome<T> {
    /// Collapse to the record's default, logging why when the file was not
    /// usable. Missing input is never an error in this pipeline.
    pub fn or_default(self, record: &str) -> T
    where
        T: Default,
    {
        match self {
            Self::Present(value) => value,
            Self::Absent => {
                warn!("{record} absent, using defaults");
                T::default()
            }
            Self::Invalid(reason) => {
                warn!("{record} unreadable ({reason}), using defaults");
                T::default()
            }
        }
    }

    /// Collapse to `Option`, logging when a present file could not be read.
    pub fn optional(self, record: &str) -> Option<T> {
        match self {
            Self::Present(value) => Some(value),
            Self::Absent => None,
            Self::Invalid(reason) => {
                warn!("{record} unreadable ({reason}), ignoring");
                None
            }
        }
    }
}

/// The flat-file state root. Every record the kernel reads or writes lives
/// under this directory; ownership of each record is a convention enforced
/// by the authorization layer, not by locking.
#[derive(Debug, Clone)]
pub struct StateStore {
    root: PathBuf,
}

impl StateStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Resolve the state root: explicit flag, then `$NOEMA_HOME`, then
    /// `~/.noema`. Creates the skeleton directories on first use.
    pub fn resolve(cli_root: Option<PathBuf>) -> Result<Self> {
        let root = if let Some(root) = cli_root {
            root
        } else if let Ok(home) = std::env::var("NOEMA_HOME")
            && !home.is_empty()
        {
            PathBuf::from(shellexpand::tilde(&home).into_owned())
        } else {
            UserDirs::new()
                .context("could not find home directory")?
                .home_dir()
                .join(".noema")
        };

        let store = Self::new(root);
        store.ensure_layout()?;
        Ok(store)
    }

    pub fn ensure_layout(&self) -> Result<()> {
        for dir in ["internal", PLANS_DIR] {
            fs::create_dir_all(self.root.join(dir))
                .with_context(|| format!("failed to create state dir: {dir}"))?;
        }
        Ok(())
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn path(&self, rel: &str) -> PathBuf {
        self.root.join(rel)
    }

    pub fn plans_dir(&self) -> PathBuf {
        self.root.join(PLANS_DIR)
    }

    pub fn load_json<T: DeserializeOwned>(&self, rel: &str) -> LoadOutcome<T> {
        let path = self.path(rel);
        if !path.exists() {
            return LoadOutcome::Absent;
        }
        let raw = match fs::read_to_string(&path) {
            Ok(raw) => raw,
            Err(err) => return LoadOutcome::Invalid(err.to_string()),
        };
        match serde_json::from_str(&raw) {
            Ok(value) => LoadOutcome::Present(value),
            Err(err) => LoadOutcome::Invalid(err.to_string()),
        }
    }

    pub fn write_json<T: Serialize>(&self, rel: &str, value: &T) -> Result<()> {
        let path = self.path(rel);
        let body = serde_json::to_string_pretty(value)
            .with_context(|| format!("failed to serialize {rel}"))?;
        write_atomic(&path, &body)
    }

    pub fn append_jsonl<T: Serialize>(&self, rel: &str, value: &T) -> Result<()> {
        use std::io::Write;

        let path = self.path(rel);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("failed creating parent: {}", parent.display()))?;
        }
        let line = serde_json::to_string(value)
            .with_context(|| format!("failed to serialize {rel} entry"))?;
        let mut file = fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .with_context(|| format!("failed opening {}", path.display()))?;
        writeln!(file, "{line}").with_context(|| format!("failed appending to {rel}"))?;
        Ok(())
    }
}

/// Write-then-rename so readers never observe a half-written record.
pub fn write_atomic(path: &Path, content: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed creating parent: {}", parent.display()))?;
    }

    let temp_path = path.with_extension("tmp");
    fs::write(&temp_path, content)
        .with_context(|| format!("failed writing temp file: {}", temp_path.display()))?;

    if let Err(rename_error) = fs::rename(&temp_path, path) {
        let _ = fs::remove_file(&temp_path);
        return Err(rename_error)
            .with_context(|| format!("failed replacing file atomically: {}", path.display()));
    }

    Ok(())
}
