//! Plans and executes migrations across several releases at once: schema
//! migrations per release, paused wherever out-of-band data migrations must
//! finish first, behind a drift check of the live schemas.

#[doc(inline)]
pub use waypoint_config;
#[doc(inline)]
pub use waypoint_core;
#[doc(inline)]
pub use waypoint_drift;
#[doc(inline)]
pub use waypoint_loader;
#[doc(inline)]
pub use waypoint_planner;
#[doc(inline)]
pub use waypoint_runner;

// Re-export commonly used items
pub use waypoint_core::{OutOfBandMigration, PrivilegedMode, StitchedMigrationIndex, Version};
pub use waypoint_drift::{DriftChecker, DriftError};
pub use waypoint_planner::{
    Interrupt, MigrationPlan, MigrationPlanner, PlannerError, serialize_upgrade_plan,
};
pub use waypoint_runner::{ExecutorError, MigrationExecutor, RunOptions};
