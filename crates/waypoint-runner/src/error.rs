use thiserror::Error;
use waypoint_core::{DefinitionError, StoreError, Version, VersionError};
use waypoint_drift::DriftError;

#[derive(Debug, Error)]
pub enum ExecutorError {
    #[error("version assertion failed: {0}; re-invoke with --skip-version-check to ignore this check")]
    VersionAssertion(String),
    #[error("recorded service version is malformed: {0}")]
    MalformedVersion(#[from] VersionError),
    #[error(transparent)]
    Drift(#[from] DriftError),
    #[error("migrating schemas to {version}: {source}")]
    Runner {
        version: Version,
        #[source]
        source: StoreError,
    },
    #[error("step at {version} is invalid: {source}")]
    InvalidStep {
        version: Version,
        #[source]
        source: DefinitionError,
    },
    #[error("step at {version} targets schema {schema:?}, which the plan has no definitions for")]
    UnknownSchema { version: Version, schema: String },
    #[error("out-of-band migrations: {0}")]
    OutOfBand(#[source] StoreError),
    #[error("recording service version: {0}")]
    ServiceVersion(#[source] StoreError),
    #[error("migration cancelled")]
    Cancelled,
}
