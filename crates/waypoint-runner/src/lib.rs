pub mod authorize;
pub mod error;
pub mod executor;
#[cfg(feature = "memory")]
pub mod memory;
pub mod oob;

pub use authorize::HashAllowList;
pub use error::ExecutorError;
pub use executor::{MigrationExecutor, RunOptions};
#[cfg(feature = "memory")]
pub use memory::{MemoryBackend, MemorySchema, MemoryState};
pub use oob::{DEFAULT_POLL_INTERVAL, OutOfBandOptions, run_out_of_band_migrations};
