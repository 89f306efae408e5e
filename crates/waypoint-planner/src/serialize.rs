use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::PlannerError;
use crate::plan::MigrationPlan;

/// Display form of a plan, for UIs and `--json` output.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpgradePlanView {
    pub out_of_band_migration_ids: Vec<i32>,
    /// Names of every migration leading to the final leaves, from an empty
    /// database, grouped by schema.
    pub migration_names: BTreeMap<String, Vec<String>>,
}

pub fn serialize_upgrade_plan(plan: &MigrationPlan) -> Result<UpgradePlanView, PlannerError> {
    let Some(last) = plan.steps.last() else {
        return Ok(UpgradePlanView::default());
    };

    let mut migration_names = BTreeMap::new();
    for (schema, leaf_ids) in &last.schema_migration_leaf_ids_by_schema_name {
        let definitions = plan
            .stitched_definitions_by_schema_name
            .get(schema)
            .ok_or_else(|| PlannerError::UnknownSchema(schema.clone()))?;
        let names = definitions
            .up(&[], leaf_ids)?
            .into_iter()
            .map(|d| d.name.clone())
            .collect();
        migration_names.insert(schema.clone(), names);
    }

    Ok(UpgradePlanView {
        out_of_band_migration_ids: plan.out_of_band_migration_ids(),
        migration_names,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plan::MigrationStep;
    use waypoint_core::{Definition, Definitions, Version};

    fn definitions() -> Definitions {
        Definitions::new(vec![
            Definition {
                id: 1,
                name: "init".into(),
                up_query: String::new(),
                down_query: String::new(),
                privileged: false,
                non_idempotent: false,
                parents: vec![],
            },
            Definition {
                id: 2,
                name: "add_repo_stars".into(),
                up_query: String::new(),
                down_query: String::new(),
                privileged: false,
                non_idempotent: false,
                parents: vec![1],
            },
        ])
        .unwrap()
    }

    fn step(minor: u32, leaves: Vec<i32>, oob: Vec<i32>) -> MigrationStep {
        MigrationStep {
            instance_version: Version::new(5, minor),
            schema_migration_leaf_ids_by_schema_name: BTreeMap::from([(
                "frontend".to_string(),
                leaves,
            )]),
            out_of_band_migration_ids: oob,
        }
    }

    fn plan(steps: Vec<MigrationStep>) -> MigrationPlan {
        MigrationPlan {
            from: Version::new(5, 0),
            to: Version::new(5, 2),
            stitched_definitions_by_schema_name: BTreeMap::from([(
                "frontend".to_string(),
                definitions(),
            )]),
            steps,
        }
    }

    #[test]
    fn empty_plan_serializes_to_default() {
        assert_eq!(
            serialize_upgrade_plan(&plan(vec![])).unwrap(),
            UpgradePlanView::default()
        );
    }

    #[test]
    fn lists_union_of_ids_and_names_to_final_leaves() {
        let view = serialize_upgrade_plan(&plan(vec![
            step(1, vec![1], vec![17, 3]),
            step(1, vec![1], vec![3]),
            step(2, vec![2], vec![]),
        ]))
        .unwrap();

        assert_eq!(view.out_of_band_migration_ids, vec![3, 17]);
        assert_eq!(
            view.migration_names["frontend"],
            vec!["init".to_string(), "add_repo_stars".to_string()]
        );

        let json = serde_json::to_value(&view).unwrap();
        assert_eq!(json["outOfBandMigrationIds"], serde_json::json!([3, 17]));
    }

    #[test]
    fn schema_without_definitions_is_an_error() {
        let mut broken = plan(vec![step(2, vec![2], vec![])]);
        broken.stitched_definitions_by_schema_name.clear();
        assert!(matches!(
            serialize_upgrade_plan(&broken),
            Err(PlannerError::UnknownSchema(schema)) if schema == "frontend"
        ));
    }
}
