use thiserror::Error;

// ─── Top-level error hierarchy ───────────────────────────────────────────────

/// Structured error hierarchy for Noema.
///
/// Each subsystem defines its own error variant. Library callers can match on
/// these to decide recovery strategy; internal code continues to use
/// `anyhow::Result` for ad-hoc context chains.
#[derive(Debug, Error)]
pub enum NoemaError {
    // ── Policy / Config ─────────────────────────────────────────────────
    #[error("policy: {0}")]
    Policy(#[from] PolicyError),

    // ── State store ─────────────────────────────────────────────────────
    #[error("state: {0}")]
    State(#[from] StateError),

    // ── Plan / Executor ─────────────────────────────────────────────────
    #[error("plan: {0}")]
    Plan(#[from] PlanError),

    // ── Generic fallthrough (wraps anyhow for interop) ──────────────────
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

// ─── Policy errors ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum PolicyError {
    #[error("failed to load policy: {0}")]
    Load(String),

    #[error("validation failed: {0}")]
    Validation(String),

    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}

// ─── State store errors ─────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum StateError {
    #[error("record {record} unreadable: {message}")]
    Unreadable { record: String, message: String },

    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}

// ─── Plan / Executor errors ─────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum PlanError {
    #[error("plan persistence failed: {0}")]
    Persist(String),

    // The only fatal case in the core: an authorized, whitelisted write
    // that the filesystem refused.
    #[error("write failed for {path}: {source}")]
    Write {
        path: String,
        source: std::io::Error,
    },
}

// ─── Convenience re-exports ─────────────────────────────────────────────────

/// Shorthand result type for the crate.
pub type Result<T> = std::result::Result<T, NoemaError>;
