pub mod schema;

pub use schema::{
    ArtifactKind, FocusTarget, GuardConfig, InnerFeedbackConfig, KernelPolicy, NamingConfig,
    NoiseGateConfig, POLICY_BACKUP_FILE, POLICY_FILE, ScheduleConfig, ScheduleTarget,
    ThresholdsConfig,
};
pub use schema::bounds;
