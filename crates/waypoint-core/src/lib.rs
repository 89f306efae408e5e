pub mod definition;
pub mod oobmigration;
pub mod schema;
pub mod stitched;
pub mod store;
pub mod version;

pub use definition::{Definition, DefinitionError, Definitions, privileged_hash};
pub use oobmigration::{MigrationErrorEntry, OutOfBandMigration};
pub use schema::{
    ColumnDescription, ConstraintDescription, DEFAULT_MIGRATION_LOG_TABLE, EnumDescription,
    FunctionDescription, IndexDescription, SchemaDescription, SequenceDescription,
    TableDescription, TriggerDescription, ViewDescription,
};
pub use stitched::{IndexError, MigrationBounds, StitchedMigration, StitchedMigrationIndex};
pub use store::{
    Authorizer, MigrationOperation, MigrationOperationType, MigrationVersions, OutOfBandRunner,
    OutOfBandStore, PrivilegedMode, Runner, RunnerOptions, SchemaStore, ServiceVersionStore,
    StoreError,
};
pub use version::{Version, VersionError};
