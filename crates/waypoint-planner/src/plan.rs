use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;
use waypoint_core::{Definitions, IndexError, OutOfBandMigration, StitchedMigrationIndex, Version};

use crate::error::PlannerError;
use crate::interrupts::{Interrupt, schedule_interrupts};

/// Migrate every schema to the given leaves, then wait for the listed
/// out-of-band migrations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MigrationStep {
    pub instance_version: Version,
    pub schema_migration_leaf_ids_by_schema_name: BTreeMap<String, Vec<i32>>,
    pub out_of_band_migration_ids: Vec<i32>,
}

impl fmt::Display for MigrationStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:", self.instance_version)?;
        for (schema, leaves) in &self.schema_migration_leaf_ids_by_schema_name {
            write!(f, " {schema} -> {leaves:?};")?;
        }
        if self.out_of_band_migration_ids.is_empty() {
            write!(f, " done")
        } else {
            write!(f, " then out-of-band {:?}", self.out_of_band_migration_ids)
        }
    }
}

/// An ordered multi-version migration. Built fresh per invocation and never
/// modified.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MigrationPlan {
    pub from: Version,
    pub to: Version,
    pub stitched_definitions_by_schema_name: BTreeMap<String, Definitions>,
    pub steps: Vec<MigrationStep>,
}

impl MigrationPlan {
    pub fn is_upgrade(&self) -> bool {
        self.from <= self.to
    }

    /// Every out-of-band migration the plan waits on, sorted and deduplicated.
    pub fn out_of_band_migration_ids(&self) -> Vec<i32> {
        let mut ids: Vec<i32> = self
            .steps
            .iter()
            .flat_map(|s| s.out_of_band_migration_ids.iter().copied())
            .collect();
        ids.sort_unstable();
        ids.dedup();
        ids
    }
}

pub struct MigrationPlanner<'a> {
    index: &'a StitchedMigrationIndex,
}

impl<'a> MigrationPlanner<'a> {
    pub fn new(index: &'a StitchedMigrationIndex) -> Self {
        Self { index }
    }

    /// Build a plan from `from` to `to` over the releases in `version_range`,
    /// stopping at each interrupt. Interrupts must be ordered in the direction
    /// of travel and lie between `from` (inclusive) and `to` (exclusive).
    pub fn plan(
        &self,
        from: Version,
        to: Version,
        version_range: &[Version],
        interrupts: &[Interrupt],
    ) -> Result<MigrationPlan, PlannerError> {
        validate_interrupts(from, to, interrupts)?;

        let tags: Vec<String> = version_range.iter().map(Version::git_tag).collect();
        let stitched = self.index.filter_for_tags(&tags)?;

        let mut leaf_ids_by_schema_name_by_tag: BTreeMap<String, BTreeMap<String, Vec<i32>>> =
            tags.iter().map(|tag| (tag.clone(), BTreeMap::new())).collect();
        for (schema, migration) in &stitched {
            for (tag, bounds) in &migration.bounds_by_rev {
                leaf_ids_by_schema_name_by_tag
                    .entry(tag.clone())
                    .or_default()
                    .insert(schema.clone(), bounds.leaf_ids.clone());
            }
        }

        let step_at = |version: Version, out_of_band_migration_ids: Vec<i32>| {
            let tag = version.git_tag();
            let leaves = leaf_ids_by_schema_name_by_tag.get(&tag).ok_or_else(|| {
                IndexError::UnknownTag {
                    schema: self.index.schema_names().first().unwrap_or(&"*").to_string(),
                    tag,
                }
            })?;
            Ok::<_, PlannerError>(MigrationStep {
                instance_version: version,
                schema_migration_leaf_ids_by_schema_name: leaves.clone(),
                out_of_band_migration_ids,
            })
        };

        let mut steps = Vec::with_capacity(interrupts.len() + 1);
        for interrupt in interrupts {
            steps.push(step_at(interrupt.version, interrupt.migration_ids.clone())?);
        }
        steps.push(step_at(to, Vec::new())?);

        tracing::debug!(%from, %to, steps = steps.len(), "planned migration");

        Ok(MigrationPlan {
            from,
            to,
            stitched_definitions_by_schema_name: stitched
                .into_iter()
                .map(|(schema, migration)| (schema, migration.definitions))
                .collect(),
            steps,
        })
    }

    /// Plan across every known release between `from` and `to`, scheduling
    /// interrupts for `migrations`.
    pub fn plan_between(
        &self,
        from: Version,
        to: Version,
        migrations: &[OutOfBandMigration],
    ) -> Result<MigrationPlan, PlannerError> {
        let mut version_range = self.index.versions_between(from, to);
        for endpoint in [from, to] {
            if !version_range.contains(&endpoint) {
                version_range.push(endpoint);
            }
        }
        version_range.sort();

        let interrupts = schedule_interrupts(migrations, from, to, &version_range);
        self.plan(from, to, &version_range, &interrupts)
    }

    /// The newest release every schema has migration bounds for.
    pub fn latest_version(&self) -> Result<Version, PlannerError> {
        self.index
            .latest_version()
            .ok_or(PlannerError::NoKnownVersions)
    }
}

fn validate_interrupts(
    from: Version,
    to: Version,
    interrupts: &[Interrupt],
) -> Result<(), PlannerError> {
    let upgrade = from <= to;
    let mut previous: Option<Version> = None;

    for interrupt in interrupts {
        let version = interrupt.version;
        let in_range = if upgrade {
            from <= version && version < to
        } else {
            to < version && version <= from
        };
        if !in_range {
            return Err(PlannerError::InterruptOutOfRange { version, from, to });
        }

        if let Some(previous) = previous {
            let ordered = if upgrade {
                previous < version
            } else {
                previous > version
            };
            if !ordered {
                return Err(PlannerError::UnorderedInterrupts { previous, version });
            }
        }
        previous = Some(version);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    use rstest::rstest;
    use waypoint_core::{Definition, MigrationBounds, StitchedMigration};

    fn def(id: i32, parents: &[i32]) -> Definition {
        Definition {
            id,
            name: format!("migration_{id}"),
            up_query: String::new(),
            down_query: String::new(),
            privileged: false,
            non_idempotent: false,
            parents: parents.to_vec(),
        }
    }

    fn v(minor: u32) -> Version {
        Version::new(5, minor)
    }

    /// frontend gains one migration per release v5.0..=v5.4; codeintel one
    /// every other release.
    fn index() -> StitchedMigrationIndex {
        let chain = |n: i32| {
            let definitions = (1..=n)
                .map(|id| {
                    let parents: Vec<i32> = if id == 1 { Vec::new() } else { vec![id - 1] };
                    def(id, &parents)
                })
                .collect();
            Definitions::new(definitions).unwrap()
        };
        let bounds = |leaves: &[(u32, i32)]| {
            leaves
                .iter()
                .map(|(minor, leaf)| {
                    (
                        v(*minor).git_tag(),
                        MigrationBounds {
                            leaf_ids: vec![*leaf],
                        },
                    )
                })
                .collect()
        };

        StitchedMigrationIndex::new(BTreeMap::from([
            (
                "frontend".to_string(),
                StitchedMigration {
                    definitions: chain(5),
                    bounds_by_rev: bounds(&[(0, 1), (1, 2), (2, 3), (3, 4), (4, 5)]),
                },
            ),
            (
                "codeintel".to_string(),
                StitchedMigration {
                    definitions: chain(3),
                    bounds_by_rev: bounds(&[(0, 1), (1, 1), (2, 2), (3, 2), (4, 3)]),
                },
            ),
        ]))
        .unwrap()
    }

    #[test]
    fn example_upgrade_with_one_interrupt() {
        let index = index();
        let plan = MigrationPlanner::new(&index)
            .plan(
                v(0),
                v(2),
                &[v(0), v(1), v(2)],
                &[Interrupt::new(v(1), vec![101])],
            )
            .unwrap();

        assert_eq!(plan.steps.len(), 2);
        assert_eq!(plan.steps[0].instance_version, v(1));
        assert_eq!(plan.steps[0].out_of_band_migration_ids, vec![101]);
        assert_eq!(
            plan.steps[0].schema_migration_leaf_ids_by_schema_name["frontend"],
            vec![2]
        );
        assert_eq!(plan.steps[1].instance_version, v(2));
        assert!(plan.steps[1].out_of_band_migration_ids.is_empty());
        assert_eq!(plan.stitched_definitions_by_schema_name.len(), 2);
        insta::assert_snapshot!(plan.steps[0].to_string(), @"v5.1: codeintel -> [1]; frontend -> [2]; then out-of-band [101]");
    }

    #[rstest]
    #[case::no_interrupts(vec![])]
    #[case::one(vec![Interrupt::new(v(2), vec![7])])]
    #[case::several(vec![
        Interrupt::new(v(0), vec![1]),
        Interrupt::new(v(1), vec![2, 3]),
        Interrupt::new(v(3), vec![4]),
    ])]
    fn steps_increase_and_end_at_target(#[case] interrupts: Vec<Interrupt>) {
        let index = index();
        let range: Vec<Version> = (0..=4).map(v).collect();
        let plan = MigrationPlanner::new(&index)
            .plan(v(0), v(4), &range, &interrupts)
            .unwrap();

        assert!(!plan.steps.is_empty());
        assert!(
            plan.steps
                .windows(2)
                .all(|w| w[0].instance_version < w[1].instance_version)
        );
        assert_eq!(plan.steps.last().unwrap().instance_version, v(4));
        assert!(plan.steps.last().unwrap().out_of_band_migration_ids.is_empty());

        let planned: Vec<i32> = plan
            .steps
            .iter()
            .flat_map(|s| s.out_of_band_migration_ids.iter().copied())
            .collect();
        let supplied: Vec<i32> = interrupts
            .iter()
            .flat_map(|i| i.migration_ids.iter().copied())
            .collect();
        assert_eq!(planned, supplied);
        assert_eq!(
            plan.out_of_band_migration_ids(),
            supplied.into_iter().collect::<BTreeSet<_>>().into_iter().collect::<Vec<_>>()
        );
    }

    #[rstest]
    #[case::target_missing(vec![v(0), v(1)], vec![])]
    #[case::interrupt_missing(vec![v(0), v(2)], vec![Interrupt::new(v(1), vec![101])])]
    fn unknown_tag_fails_closed(#[case] range: Vec<Version>, #[case] interrupts: Vec<Interrupt>) {
        let index = index();
        let err = MigrationPlanner::new(&index)
            .plan(v(0), v(2), &range, &interrupts)
            .unwrap_err();
        assert!(matches!(err, PlannerError::Index(IndexError::UnknownTag { .. })));
    }

    #[test]
    fn range_tag_without_metadata_fails() {
        let index = index();
        let err = MigrationPlanner::new(&index)
            .plan(v(0), v(2), &[v(0), v(2), v(9)], &[])
            .unwrap_err();
        insta::assert_snapshot!(err.to_string(), @r#"unknown tag v5.9: no migration bounds for schema "codeintel""#);
    }

    #[rstest]
    #[case::unordered(
        vec![Interrupt::new(v(2), vec![1]), Interrupt::new(v(1), vec![2])],
        "interrupt at v5.1 does not follow the interrupt at v5.2 in the direction of travel"
    )]
    #[case::duplicate_version(
        vec![Interrupt::new(v(1), vec![1]), Interrupt::new(v(1), vec![2])],
        "interrupt at v5.1 does not follow the interrupt at v5.1 in the direction of travel"
    )]
    #[case::at_target(
        vec![Interrupt::new(v(4), vec![1])],
        "interrupt at v5.4 lies outside the plan from v5.0 to v5.4"
    )]
    fn invalid_interrupts_are_rejected(#[case] interrupts: Vec<Interrupt>, #[case] message: &str) {
        let index = index();
        let range: Vec<Version> = (0..=4).map(v).collect();
        let err = MigrationPlanner::new(&index)
            .plan(v(0), v(4), &range, &interrupts)
            .unwrap_err();
        assert_eq!(err.to_string(), message);
    }

    #[test]
    fn downgrade_steps_descend() {
        let index = index();
        let range: Vec<Version> = (1..=4).map(v).collect();
        let plan = MigrationPlanner::new(&index)
            .plan(v(4), v(1), &range, &[Interrupt::new(v(3), vec![9])])
            .unwrap();

        assert!(!plan.is_upgrade());
        let versions: Vec<Version> = plan.steps.iter().map(|s| s.instance_version).collect();
        assert_eq!(versions, vec![v(3), v(1)]);
        assert_eq!(
            plan.steps[1].schema_migration_leaf_ids_by_schema_name["frontend"],
            vec![2]
        );
    }

    #[test]
    fn plan_between_schedules_interrupts() {
        let index = index();
        let migration = OutOfBandMigration {
            id: 42,
            team: String::new(),
            component: String::new(),
            description: String::new(),
            introduced: v(0),
            deprecated: Some(v(3)),
            progress: 0.0,
            non_destructive: false,
            is_enterprise: false,
            apply_reverse: false,
            errors: Vec::new(),
        };

        let planner = MigrationPlanner::new(&index);
        assert_eq!(planner.latest_version().unwrap(), v(4));

        let plan = planner.plan_between(v(0), v(4), &[migration]).unwrap();
        let versions: Vec<Version> = plan.steps.iter().map(|s| s.instance_version).collect();
        assert_eq!(versions, vec![v(2), v(4)]);
        assert_eq!(plan.steps[0].out_of_band_migration_ids, vec![42]);
    }
}
