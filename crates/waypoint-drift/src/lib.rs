pub mod checker;
pub mod compare;
pub mod error;
pub mod expected;

pub use checker::{DriftChecker, DriftReport, SchemaDrift};
pub use compare::{Drift, DriftChange, ObjectKind, compare_schemas};
pub use error::{DriftError, SourceError};
#[cfg(feature = "remote")]
pub use expected::RemoteExpectedSchemaFactory;
pub use expected::{
    ExpectedSchema, ExpectedSchemaFactory, LocalExpectedSchemaFactory, VersionPattern,
    factories_from_config, fetch_expected_schema, schema_filename,
};
