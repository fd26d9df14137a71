mod builder;
mod history;
mod naming;
mod plan;

pub use builder::PlanBuilder;
pub use history::{PlanHistory, PlansIndex};
pub use naming::unit_name;
pub use plan::{GuardSnapshot, Plan, PlanAction};
