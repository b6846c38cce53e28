pub mod employee;
pub mod plan;
pub mod stop;

pub use employee::{Employee, Shift};
pub use plan::{NewPlan, NewRoute, Plan, PlanDetail, PlanRoute, PlanSummary};
pub use stop::{Stop, WalkDistance};
