pub mod drift;
pub mod init;
pub mod migrate;
pub mod oob;
pub mod plan;
pub mod status;

pub use drift::cmd_drift;
pub use init::cmd_init;
pub use migrate::{MigrateArgs, cmd_downgrade, cmd_upgrade};
pub use oob::cmd_run_out_of_band;
pub use plan::cmd_plan;
pub use status::cmd_status;
