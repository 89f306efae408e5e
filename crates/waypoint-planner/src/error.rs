use thiserror::Error;
use waypoint_core::{DefinitionError, IndexError, Version};

#[derive(Debug, Error)]
pub enum PlannerError {
    #[error(transparent)]
    Index(#[from] IndexError),
    #[error(transparent)]
    Definition(#[from] DefinitionError),
    #[error("interrupt at {version} does not follow the interrupt at {previous} in the direction of travel")]
    UnorderedInterrupts { previous: Version, version: Version },
    #[error("interrupt at {version} lies outside the plan from {from} to {to}")]
    InterruptOutOfRange {
        version: Version,
        from: Version,
        to: Version,
    },
    #[error("plan has no migration definitions for schema {0:?}")]
    UnknownSchema(String),
    #[error("no known version to plan towards")]
    NoKnownVersions,
}
