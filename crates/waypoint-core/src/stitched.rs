use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::definition::Definitions;
use crate::version::Version;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IndexError {
    #[error("unknown tag {tag}: no migration bounds for schema {schema:?}")]
    UnknownTag { schema: String, tag: String },
    #[error("bounds of schema {schema:?} at {tag} reference unknown migration {id}")]
    UnknownLeaf { schema: String, tag: String, id: i32 },
}

/// Tips of a schema's migration graph as of one release.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MigrationBounds {
    #[serde(default)]
    pub leaf_ids: Vec<i32>,
}

/// A schema's migration graph stitched across releases, with the bounds
/// reachable at every release tag.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StitchedMigration {
    pub definitions: Definitions,
    pub bounds_by_rev: BTreeMap<String, MigrationBounds>,
}

/// Stitched migrations of every managed schema. Built once at startup and
/// read-only afterwards.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(
    try_from = "BTreeMap<String, StitchedMigration>",
    into = "BTreeMap<String, StitchedMigration>"
)]
pub struct StitchedMigrationIndex {
    schemas: BTreeMap<String, StitchedMigration>,
}

impl StitchedMigrationIndex {
    pub fn new(schemas: BTreeMap<String, StitchedMigration>) -> Result<Self, IndexError> {
        for (schema, stitched) in &schemas {
            for (tag, bounds) in &stitched.bounds_by_rev {
                if let Some(&id) = bounds
                    .leaf_ids
                    .iter()
                    .find(|id| stitched.definitions.get(**id).is_none())
                {
                    return Err(IndexError::UnknownLeaf {
                        schema: schema.clone(),
                        tag: tag.clone(),
                        id,
                    });
                }
            }
        }
        Ok(Self { schemas })
    }

    pub fn schema_names(&self) -> Vec<&str> {
        self.schemas.keys().map(String::as_str).collect()
    }

    pub fn get(&self, schema: &str) -> Option<&StitchedMigration> {
        self.schemas.get(schema)
    }

    /// Restrict every schema's bounds to `tags`, keeping the full definition
    /// graph. Fails on the first tag a schema has no bounds for.
    pub fn filter_for_tags(
        &self,
        tags: &[String],
    ) -> Result<BTreeMap<String, StitchedMigration>, IndexError> {
        let mut filtered = BTreeMap::new();
        for (schema, stitched) in &self.schemas {
            let mut bounds_by_rev = BTreeMap::new();
            for tag in tags {
                let bounds =
                    stitched
                        .bounds_by_rev
                        .get(tag)
                        .ok_or_else(|| IndexError::UnknownTag {
                            schema: schema.clone(),
                            tag: tag.clone(),
                        })?;
                bounds_by_rev.insert(tag.clone(), bounds.clone());
            }

            filtered.insert(
                schema.clone(),
                StitchedMigration {
                    definitions: stitched.definitions.clone(),
                    bounds_by_rev,
                },
            );
        }
        Ok(filtered)
    }

    /// Releases every schema has bounds for, ascending. Tags that are not
    /// versions are skipped.
    pub fn known_versions(&self) -> Vec<Version> {
        let mut per_schema = self.schemas.values().map(|stitched| {
            stitched
                .bounds_by_rev
                .keys()
                .filter_map(|tag| Version::parse(tag).ok())
                .collect::<BTreeSet<Version>>()
        });

        let Some(first) = per_schema.next() else {
            return Vec::new();
        };
        per_schema
            .fold(first, |acc, next| acc.intersection(&next).copied().collect())
            .into_iter()
            .collect()
    }

    /// Known releases between `from` and `to` inclusive, ascending, whichever
    /// direction the two are given in.
    pub fn versions_between(&self, from: Version, to: Version) -> Vec<Version> {
        let (low, high) = if from <= to { (from, to) } else { (to, from) };
        self.known_versions()
            .into_iter()
            .filter(|v| *v >= low && *v <= high)
            .collect()
    }

    pub fn latest_version(&self) -> Option<Version> {
        self.known_versions().into_iter().last()
    }
}

impl TryFrom<BTreeMap<String, StitchedMigration>> for StitchedMigrationIndex {
    type Error = IndexError;

    fn try_from(value: BTreeMap<String, StitchedMigration>) -> Result<Self, Self::Error> {
        StitchedMigrationIndex::new(value)
    }
}

impl From<StitchedMigrationIndex> for BTreeMap<String, StitchedMigration> {
    fn from(value: StitchedMigrationIndex) -> Self {
        value.schemas
    }
}
