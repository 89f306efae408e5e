pub mod error;
pub mod interrupts;
pub mod plan;
pub mod serialize;

pub use error::PlannerError;
pub use interrupts::{Interrupt, schedule_interrupts};
pub use plan::{MigrationPlan, MigrationPlanner, MigrationStep};
pub use serialize::{UpgradePlanView, serialize_upgrade_plan};
