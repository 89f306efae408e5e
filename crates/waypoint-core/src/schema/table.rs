use serde::{Deserialize, Serialize};

use crate::schema::normalize_definition;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TableDescription {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
    pub columns: Vec<ColumnDescription>,
    pub indexes: Vec<IndexDescription>,
    pub constraints: Vec<ConstraintDescription>,
    pub triggers: Vec<TriggerDescription>,
}

impl TableDescription {
    /// Sort members by name and collapse whitespace in textual definitions so
    /// two descriptions of the same table compare equal regardless of the
    /// order the catalog returned them in.
    pub fn canonicalize(&self) -> Self {
        let mut columns: Vec<ColumnDescription> =
            self.columns.iter().map(ColumnDescription::canonicalize).collect();
        columns.sort_by(|a, b| a.name.cmp(&b.name));

        let mut indexes: Vec<IndexDescription> =
            self.indexes.iter().map(IndexDescription::canonicalize).collect();
        indexes.sort_by(|a, b| a.name.cmp(&b.name));

        let mut constraints: Vec<ConstraintDescription> = self
            .constraints
            .iter()
            .map(ConstraintDescription::canonicalize)
            .collect();
        constraints.sort_by(|a, b| a.name.cmp(&b.name));

        let mut triggers: Vec<TriggerDescription> = self
            .triggers
            .iter()
            .map(|t| TriggerDescription {
                name: t.name.clone(),
                definition: normalize_definition(&t.definition),
            })
            .collect();
        triggers.sort_by(|a, b| a.name.cmp(&b.name));

        Self {
            name: self.name.clone(),
            comment: self.comment.as_deref().map(normalize_definition),
            columns,
            indexes,
            constraints,
            triggers,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ColumnDescription {
    pub name: String,
    pub type_name: String,
    pub is_nullable: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub character_maximum_length: Option<u32>,
    pub is_identity: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub identity_generation: Option<String>,
    pub is_generated: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub generation_expression: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
}

impl ColumnDescription {
    fn canonicalize(&self) -> Self {
        Self {
            type_name: normalize_definition(&self.type_name).to_lowercase(),
            default: self.default.as_deref().map(normalize_definition),
            generation_expression: self
                .generation_expression
                .as_deref()
                .map(normalize_definition),
            comment: self.comment.as_deref().map(normalize_definition),
            ..self.clone()
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct IndexDescription {
    pub name: String,
    pub is_primary_key: bool,
    pub is_unique: bool,
    pub is_exclusion: bool,
    pub is_deferrable: bool,
    pub index_definition: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub constraint_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub constraint_definition: Option<String>,
}

impl IndexDescription {
    fn canonicalize(&self) -> Self {
        Self {
            index_definition: normalize_definition(&self.index_definition),
            constraint_definition: self
                .constraint_definition
                .as_deref()
                .map(normalize_definition),
            ..self.clone()
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ConstraintDescription {
    pub name: String,
    pub constraint_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refers_to_table: Option<String>,
    pub is_deferrable: bool,
    pub constraint_definition: String,
}

impl ConstraintDescription {
    fn canonicalize(&self) -> Self {
        Self {
            constraint_definition: normalize_definition(&self.constraint_definition),
            ..self.clone()
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TriggerDescription {
    pub name: String,
    pub definition: String,
}
