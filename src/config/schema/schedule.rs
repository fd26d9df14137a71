use anyhow::Result;
use serde::{Deserialize, Serialize};

/// Interval corridors for scheduled kernel invocations. The advisory stage
/// compares each target's configured interval against its corridor and
/// suggests corrections; nothing here is ever auto-applied.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct ScheduleConfig {
    #[serde(default)]
    pub enable: bool,
    #[serde(default)]
    pub targets: Vec<ScheduleTarget>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct ScheduleTarget {
    pub name: String,
    pub interval_minutes: u32,
    pub min_interval_minutes: u32,
    pub max_interval_minutes: u32,
}

impl ScheduleConfig {
    pub fn validate(&self) -> Result<()> {
        for target in &self.targets {
            if target.name.trim().is_empty() {
                anyhow::bail!("schedule.targets entries must be named");
            }
            if target.interval_minutes == 0 {
                anyhow::bail!("schedule target '{}' interval must be >= 1", target.name);
            }
            if target.min_interval_minutes == 0
                || target.min_interval_minutes > target.max_interval_minutes
            {
                anyhow::bail!(
                    "schedule target '{}' corridor must satisfy 1 <= min <= max",
                    target.name
                );
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_schedule_is_valid() {
        ScheduleConfig::default().validate().unwrap();
    }

    #[test]
    fn inverted_corridor_is_rejected() {
        let cfg = ScheduleConfig {
            enable: true,
            targets: vec![ScheduleTarget {
                name: "kernel-run".into(),
                interval_minutes: 30,
                min_interval_minutes: 60,
                max_interval_minutes: 15,
            }],
        };
        assert!(cfg.validate().is_err());
    }
}
