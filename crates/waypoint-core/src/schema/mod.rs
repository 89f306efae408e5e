pub mod object;
pub mod table;

use serde::{Deserialize, Serialize};

pub use object::{EnumDescription, FunctionDescription, SequenceDescription, ViewDescription};
pub use table::{
    ColumnDescription, ConstraintDescription, IndexDescription, TableDescription,
    TriggerDescription,
};

/// Name of the table the migration runner records applied migrations in.
pub const DEFAULT_MIGRATION_LOG_TABLE: &str = "migration_logs";

/// Structural description of one database schema, as reported by the live
/// database or as bundled for a release.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SchemaDescription {
    pub extensions: Vec<String>,
    pub enums: Vec<EnumDescription>,
    pub functions: Vec<FunctionDescription>,
    pub sequences: Vec<SequenceDescription>,
    pub tables: Vec<TableDescription>,
    pub views: Vec<ViewDescription>,
}

impl SchemaDescription {
    /// Canonical form with the default migration log table removed.
    pub fn canonicalize(&self) -> Self {
        self.canonicalize_excluding(DEFAULT_MIGRATION_LOG_TABLE)
    }

    /// Canonical form: the bookkeeping table is dropped, every collection is
    /// sorted by name, and whitespace inside definitions is collapsed.
    /// Canonicalizing twice yields the same value.
    pub fn canonicalize_excluding(&self, bookkeeping_table: &str) -> Self {
        let mut extensions = self.extensions.clone();
        extensions.sort();
        extensions.dedup();

        let mut enums = self.enums.clone();
        enums.sort_by(|a, b| a.name.cmp(&b.name));

        let mut functions: Vec<FunctionDescription> = self
            .functions
            .iter()
            .map(|f| FunctionDescription {
                name: f.name.clone(),
                definition: normalize_definition(&f.definition),
            })
            .collect();
        functions.sort_by(|a, b| a.name.cmp(&b.name));

        let mut sequences: Vec<SequenceDescription> = self
            .sequences
            .iter()
            .map(|s| SequenceDescription {
                type_name: s.type_name.to_lowercase(),
                ..s.clone()
            })
            .collect();
        sequences.sort_by(|a, b| a.name.cmp(&b.name));

        let mut tables: Vec<TableDescription> = self
            .tables
            .iter()
            .filter(|t| t.name != bookkeeping_table)
            .map(TableDescription::canonicalize)
            .collect();
        tables.sort_by(|a, b| a.name.cmp(&b.name));

        let mut views: Vec<ViewDescription> = self
            .views
            .iter()
            .map(|v| ViewDescription {
                name: v.name.clone(),
                definition: normalize_definition(&v.definition),
            })
            .collect();
        views.sort_by(|a, b| a.name.cmp(&b.name));

        Self {
            extensions,
            enums,
            functions,
            sequences,
            tables,
            views,
        }
    }

    pub fn table(&self, name: &str) -> Option<&TableDescription> {
        self.tables.iter().find(|t| t.name == name)
    }

    pub fn is_empty(&self) -> bool {
        self.extensions.is_empty()
            && self.enums.is_empty()
            && self.functions.is_empty()
            && self.sequences.is_empty()
            && self.tables.is_empty()
            && self.views.is_empty()
    }
}

/// Collapse runs of whitespace and trim, so formatting-only differences in
/// catalog output do not register as drift.
pub(crate) fn normalize_definition(definition: &str) -> String {
    definition.split_whitespace().collect::<Vec<_>>().join(" ")
}
