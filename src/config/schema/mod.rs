pub mod bounds;
mod gate;
mod policy;
mod schedule;

pub use gate::{InnerFeedbackConfig, NoiseGateConfig};
pub use policy::{
    ArtifactKind, FocusTarget, GuardConfig, KernelPolicy, NamingConfig, POLICY_BACKUP_FILE,
    POLICY_FILE, ThresholdsConfig,
};
pub use schedule::{ScheduleConfig, ScheduleTarget};
