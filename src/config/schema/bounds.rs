//! Hard bounds for the numeric policy fields the self-tuning loop is allowed
//! to touch. Both the suggestion auto-apply path and the expressivity path
//! clamp through this table; the policy loader enforces the same ranges at
//! startup.

#[derive(Debug, Clone, Copy)]
pub struct Bound {
    pub field: &'static str,
    pub min: f64,
    pub max: f64,
    pub integral: bool,
}

pub const APPLY_THRESHOLD: Bound = Bound {
    field: "thresholds.apply",
    min: 0.10,
    max: 0.90,
    integral: false,
};

pub const PROPOSE_THRESHOLD: Bound = Bound {
    field: "thresholds.propose",
    min: 0.05,
    max: 0.85,
    integral: false,
};

pub const DAILY_CAP: Bound = Bound {
    field: "thresholds.daily_cap",
    min: 1.0,
    max: 20.0,
    integral: true,
};

pub const TUNABLE_FIELDS: [Bound; 3] = [APPLY_THRESHOLD, PROPOSE_THRESHOLD, DAILY_CAP];

pub fn bound_for(field: &str) -> Option<Bound> {
    TUNABLE_FIELDS.iter().copied().find(|b| b.field == field)
}

impl Bound {
    /// Clamp a raw suggested value into this bound. Floats are rounded to
    /// two decimals, integral fields to the nearest whole number.
    pub fn clamp(&self, value: f64) -> f64 {
        let clamped = value.clamp(self.min, self.max);
        if self.integral {
            clamped.round()
        } else {
            (clamped * 100.0).round() / 100.0
        }
    }

    pub fn contains(&self, value: f64) -> bool {
        (self.min..=self.max).contains(&value)
    }
}
