use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;
use waypoint_core::{
    ColumnDescription, ConstraintDescription, EnumDescription, FunctionDescription,
    IndexDescription, SchemaDescription, SequenceDescription, TableDescription,
    TriggerDescription, ViewDescription,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ObjectKind {
    Extension,
    Enum,
    Function,
    Sequence,
    Table,
    Column,
    Index,
    Constraint,
    Trigger,
    View,
}

impl fmt::Display for ObjectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ObjectKind::Extension => "extension",
            ObjectKind::Enum => "enum",
            ObjectKind::Function => "function",
            ObjectKind::Sequence => "sequence",
            ObjectKind::Table => "table",
            ObjectKind::Column => "column",
            ObjectKind::Index => "index",
            ObjectKind::Constraint => "constraint",
            ObjectKind::Trigger => "trigger",
            ObjectKind::View => "view",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase", tag = "type")]
pub enum DriftChange {
    /// Expected but absent from the live schema.
    Missing,
    /// Present in the live schema but not expected.
    Unexpected,
    Changed { expected: String, actual: String },
}

/// One structural difference between the expected and the live schema.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Drift {
    pub kind: ObjectKind,
    /// Object name, qualified by its table for table members.
    pub name: String,
    pub change: DriftChange,
    /// SQL that would bring the live schema back in line, when one is obvious.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggestion: Option<String>,
}

impl fmt::Display for Drift {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.change {
            DriftChange::Missing => write!(f, "missing {} {:?}", self.kind, self.name),
            DriftChange::Unexpected => write!(f, "unexpected {} {:?}", self.kind, self.name),
            DriftChange::Changed { expected, actual } => write!(
                f,
                "{} {:?} differs: expected `{}`, found `{}`",
                self.kind, self.name, expected, actual
            ),
        }
    }
}

impl Drift {
    fn new(kind: ObjectKind, name: impl Into<String>, change: DriftChange) -> Self {
        Self {
            kind,
            name: name.into(),
            change,
            suggestion: None,
        }
    }

    fn suggest(mut self, sql: impl Into<String>) -> Self {
        self.suggestion = Some(sql.into());
        self
    }
}

/// Pair up same-named entries of two collections. Only names that are missing
/// on one side or whose entries differ are returned, sorted by name.
fn pair_by_name<'a, T, F>(
    expected: &'a [T],
    actual: &'a [T],
    name: F,
) -> Vec<(&'a str, Option<&'a T>, Option<&'a T>)>
where
    T: PartialEq,
    F: Fn(&'a T) -> &'a str,
{
    let mut pairs: BTreeMap<&str, (Option<&T>, Option<&T>)> = BTreeMap::new();
    for item in expected {
        pairs.entry(name(item)).or_default().0 = Some(item);
    }
    for item in actual {
        pairs.entry(name(item)).or_default().1 = Some(item);
    }

    pairs
        .into_iter()
        .filter(|(_, (e, a))| e != a)
        .map(|(n, (e, a))| (n, e, a))
        .collect()
}

/// Compare two schema descriptions. Both should already be canonicalized so
/// ordering and whitespace do not register as drift.
pub fn compare_schemas(expected: &SchemaDescription, actual: &SchemaDescription) -> Vec<Drift> {
    let mut drifts = Vec::new();
    compare_extensions(&expected.extensions, &actual.extensions, &mut drifts);
    compare_enums(&expected.enums, &actual.enums, &mut drifts);
    compare_functions(&expected.functions, &actual.functions, &mut drifts);
    compare_sequences(&expected.sequences, &actual.sequences, &mut drifts);
    compare_tables(&expected.tables, &actual.tables, &mut drifts);
    compare_views(&expected.views, &actual.views, &mut drifts);
    drifts
}

fn compare_extensions(expected: &[String], actual: &[String], drifts: &mut Vec<Drift>) {
    for (name, e, a) in pair_by_name(expected, actual, String::as_str) {
        match (e, a) {
            (Some(_), None) => drifts.push(
                Drift::new(ObjectKind::Extension, name, DriftChange::Missing)
                    .suggest(format!("CREATE EXTENSION IF NOT EXISTS {name};")),
            ),
            (None, Some(_)) => drifts.push(
                Drift::new(ObjectKind::Extension, name, DriftChange::Unexpected)
                    .suggest(format!("DROP EXTENSION IF EXISTS {name};")),
            ),
            _ => {}
        }
    }
}

fn enum_labels(e: &EnumDescription) -> String {
    e.labels
        .iter()
        .map(|l| format!("'{l}'"))
        .collect::<Vec<_>>()
        .join(", ")
}

fn compare_enums(expected: &[EnumDescription], actual: &[EnumDescription], drifts: &mut Vec<Drift>) {
    for (name, e, a) in pair_by_name(expected, actual, |e| e.name.as_str()) {
        let drift = match (e, a) {
            (Some(e), None) => Drift::new(ObjectKind::Enum, name, DriftChange::Missing)
                .suggest(format!("CREATE TYPE {name} AS ENUM ({});", enum_labels(e))),
            (None, Some(_)) => Drift::new(ObjectKind::Enum, name, DriftChange::Unexpected)
                .suggest(format!("DROP TYPE IF EXISTS {name};")),
            (Some(e), Some(a)) => Drift::new(
                ObjectKind::Enum,
                name,
                DriftChange::Changed {
                    expected: enum_labels(e),
                    actual: enum_labels(a),
                },
            ),
            (None, None) => continue,
        };
        drifts.push(drift);
    }
}

fn compare_functions(
    expected: &[FunctionDescription],
    actual: &[FunctionDescription],
    drifts: &mut Vec<Drift>,
) {
    for (name, e, a) in pair_by_name(expected, actual, |f| f.name.as_str()) {
        let drift = match (e, a) {
            (Some(e), None) => Drift::new(ObjectKind::Function, name, DriftChange::Missing)
                .suggest(format!("{};", e.definition)),
            (None, Some(_)) => Drift::new(ObjectKind::Function, name, DriftChange::Unexpected)
                .suggest(format!("DROP FUNCTION IF EXISTS {name};")),
            (Some(e), Some(a)) => Drift::new(
                ObjectKind::Function,
                name,
                DriftChange::Changed {
                    expected: e.definition.clone(),
                    actual: a.definition.clone(),
                },
            )
            .suggest(format!("{};", e.definition)),
            (None, None) => continue,
        };
        drifts.push(drift);
    }
}

fn sequence_signature(s: &SequenceDescription) -> String {
    format!(
        "{} start {} min {} max {} increment {}{}",
        s.type_name,
        s.start_value,
        s.minimum_value,
        s.maximum_value,
        s.increment,
        if s.cycle_option { " cycle" } else { "" }
    )
}

fn compare_sequences(
    expected: &[SequenceDescription],
    actual: &[SequenceDescription],
    drifts: &mut Vec<Drift>,
) {
    for (name, e, a) in pair_by_name(expected, actual, |s| s.name.as_str()) {
        let drift = match (e, a) {
            (Some(e), None) => Drift::new(ObjectKind::Sequence, name, DriftChange::Missing)
                .suggest(format!(
                    "CREATE SEQUENCE {name} AS {} INCREMENT BY {} MINVALUE {} MAXVALUE {} START WITH {}{};",
                    e.type_name,
                    e.increment,
                    e.minimum_value,
                    e.maximum_value,
                    e.start_value,
                    if e.cycle_option { " CYCLE" } else { "" }
                )),
            (None, Some(_)) => Drift::new(ObjectKind::Sequence, name, DriftChange::Unexpected)
                .suggest(format!("DROP SEQUENCE IF EXISTS {name};")),
            (Some(e), Some(a)) => Drift::new(
                ObjectKind::Sequence,
                name,
                DriftChange::Changed {
                    expected: sequence_signature(e),
                    actual: sequence_signature(a),
                },
            ),
            (None, None) => continue,
        };
        drifts.push(drift);
    }
}

fn compare_tables(expected: &[TableDescription], actual: &[TableDescription], drifts: &mut Vec<Drift>) {
    for (name, e, a) in pair_by_name(expected, actual, |t| t.name.as_str()) {
        match (e, a) {
            (Some(_), None) => {
                drifts.push(Drift::new(ObjectKind::Table, name, DriftChange::Missing))
            }
            (None, Some(_)) => drifts.push(
                Drift::new(ObjectKind::Table, name, DriftChange::Unexpected)
                    .suggest(format!("DROP TABLE IF EXISTS {name};")),
            ),
            (Some(e), Some(a)) => {
                if e.comment != a.comment {
                    drifts.push(
                        Drift::new(
                            ObjectKind::Table,
                            name,
                            DriftChange::Changed {
                                expected: e.comment.clone().unwrap_or_default(),
                                actual: a.comment.clone().unwrap_or_default(),
                            },
                        )
                        .suggest(format!(
                            "COMMENT ON TABLE {name} IS {};",
                            sql_literal_or_null(e.comment.as_deref())
                        )),
                    );
                }
                compare_columns(name, &e.columns, &a.columns, drifts);
                compare_indexes(name, &e.indexes, &a.indexes, drifts);
                compare_constraints(name, &e.constraints, &a.constraints, drifts);
                compare_triggers(name, &e.triggers, &a.triggers, drifts);
            }
            (None, None) => {}
        }
    }
}

fn sql_literal_or_null(value: Option<&str>) -> String {
    match value {
        Some(v) => format!("'{}'", v.replace('\'', "''")),
        None => "NULL".to_string(),
    }
}

fn column_type(c: &ColumnDescription) -> String {
    match c.character_maximum_length {
        Some(len) if len > 0 => format!("{}({len})", c.type_name),
        _ => c.type_name.clone(),
    }
}

fn column_signature(c: &ColumnDescription) -> String {
    let mut signature = column_type(c);
    if !c.is_nullable {
        signature.push_str(" not null");
    }
    if let Some(default) = &c.default {
        signature.push_str(&format!(" default {default}"));
    }
    if c.is_identity {
        let generation = c.identity_generation.as_deref().unwrap_or("by default");
        signature.push_str(&format!(" generated {generation} as identity"));
    }
    if let Some(expr) = c.generation_expression.as_deref().filter(|_| c.is_generated) {
        signature.push_str(&format!(" generated always as ({expr}) stored"));
    }
    if let Some(comment) = &c.comment {
        signature.push_str(&format!(" comment {comment:?}"));
    }
    signature
}

fn compare_columns(
    table: &str,
    expected: &[ColumnDescription],
    actual: &[ColumnDescription],
    drifts: &mut Vec<Drift>,
) {
    for (name, e, a) in pair_by_name(expected, actual, |c| c.name.as_str()) {
        let qualified = format!("{table}.{name}");
        let drift = match (e, a) {
            (Some(e), None) => {
                let mut sql = format!("ALTER TABLE {table} ADD COLUMN {name} {}", column_type(e));
                if let Some(default) = &e.default {
                    sql.push_str(&format!(" DEFAULT {default}"));
                }
                if !e.is_nullable {
                    sql.push_str(" NOT NULL");
                }
                sql.push(';');
                Drift::new(ObjectKind::Column, qualified, DriftChange::Missing).suggest(sql)
            }
            (None, Some(_)) => Drift::new(ObjectKind::Column, qualified, DriftChange::Unexpected)
                .suggest(format!("ALTER TABLE {table} DROP COLUMN {name};")),
            (Some(e), Some(a)) => {
                let drift = Drift::new(
                    ObjectKind::Column,
                    qualified,
                    DriftChange::Changed {
                        expected: column_signature(e),
                        actual: column_signature(a),
                    },
                );
                match column_alterations(table, name, e, a) {
                    Some(sql) => drift.suggest(sql),
                    None => drift,
                }
            }
            (None, None) => continue,
        };
        drifts.push(drift);
    }
}

/// ALTER statements for the simple column differences: type, nullability and
/// default.
fn column_alterations(
    table: &str,
    column: &str,
    expected: &ColumnDescription,
    actual: &ColumnDescription,
) -> Option<String> {
    let mut statements = Vec::new();
    if column_type(expected) != column_type(actual) {
        statements.push(format!(
            "ALTER TABLE {table} ALTER COLUMN {column} TYPE {};",
            column_type(expected)
        ));
    }
    if expected.is_nullable != actual.is_nullable {
        let action = if expected.is_nullable { "DROP" } else { "SET" };
        statements.push(format!(
            "ALTER TABLE {table} ALTER COLUMN {column} {action} NOT NULL;"
        ));
    }
    if expected.default != actual.default {
        statements.push(match &expected.default {
            Some(default) => {
                format!("ALTER TABLE {table} ALTER COLUMN {column} SET DEFAULT {default};")
            }
            None => format!("ALTER TABLE {table} ALTER COLUMN {column} DROP DEFAULT;"),
        });
    }
    (!statements.is_empty()).then(|| statements.join("\n"))
}

fn index_signature(i: &IndexDescription) -> String {
    match &i.constraint_definition {
        Some(constraint) => format!("{} ({constraint})", i.index_definition),
        None => i.index_definition.clone(),
    }
}

fn compare_indexes(
    table: &str,
    expected: &[IndexDescription],
    actual: &[IndexDescription],
    drifts: &mut Vec<Drift>,
) {
    for (name, e, a) in pair_by_name(expected, actual, |i| i.name.as_str()) {
        let qualified = format!("{table}.{name}");
        let drift = match (e, a) {
            (Some(e), None) => Drift::new(ObjectKind::Index, qualified, DriftChange::Missing)
                .suggest(format!("{};", e.index_definition)),
            (None, Some(_)) => Drift::new(ObjectKind::Index, qualified, DriftChange::Unexpected)
                .suggest(format!("DROP INDEX IF EXISTS {name};")),
            (Some(e), Some(a)) => Drift::new(
                ObjectKind::Index,
                qualified,
                DriftChange::Changed {
                    expected: index_signature(e),
                    actual: index_signature(a),
                },
            )
            .suggest(format!("DROP INDEX IF EXISTS {name};\n{};", e.index_definition)),
            (None, None) => continue,
        };
        drifts.push(drift);
    }
}

fn compare_constraints(
    table: &str,
    expected: &[ConstraintDescription],
    actual: &[ConstraintDescription],
    drifts: &mut Vec<Drift>,
) {
    for (name, e, a) in pair_by_name(expected, actual, |c| c.name.as_str()) {
        let qualified = format!("{table}.{name}");
        let drop = format!("ALTER TABLE {table} DROP CONSTRAINT IF EXISTS {name};");
        let drift = match (e, a) {
            (Some(e), None) => Drift::new(ObjectKind::Constraint, qualified, DriftChange::Missing)
                .suggest(format!(
                    "ALTER TABLE {table} ADD CONSTRAINT {name} {};",
                    e.constraint_definition
                )),
            (None, Some(_)) => {
                Drift::new(ObjectKind::Constraint, qualified, DriftChange::Unexpected).suggest(drop)
            }
            (Some(e), Some(a)) => Drift::new(
                ObjectKind::Constraint,
                qualified,
                DriftChange::Changed {
                    expected: e.constraint_definition.clone(),
                    actual: a.constraint_definition.clone(),
                },
            )
            .suggest(format!(
                "{drop}\nALTER TABLE {table} ADD CONSTRAINT {name} {};",
                e.constraint_definition
            )),
            (None, None) => continue,
        };
        drifts.push(drift);
    }
}

fn compare_triggers(
    table: &str,
    expected: &[TriggerDescription],
    actual: &[TriggerDescription],
    drifts: &mut Vec<Drift>,
) {
    for (name, e, a) in pair_by_name(expected, actual, |t| t.name.as_str()) {
        let qualified = format!("{table}.{name}");
        let drop = format!("DROP TRIGGER IF EXISTS {name} ON {table};");
        let drift = match (e, a) {
            (Some(e), None) => Drift::new(ObjectKind::Trigger, qualified, DriftChange::Missing)
                .suggest(format!("{};", e.definition)),
            (None, Some(_)) => {
                Drift::new(ObjectKind::Trigger, qualified, DriftChange::Unexpected).suggest(drop)
            }
            (Some(e), Some(a)) => Drift::new(
                ObjectKind::Trigger,
                qualified,
                DriftChange::Changed {
                    expected: e.definition.clone(),
                    actual: a.definition.clone(),
                },
            )
            .suggest(format!("{drop}\n{};", e.definition)),
            (None, None) => continue,
        };
        drifts.push(drift);
    }
}

fn compare_views(expected: &[ViewDescription], actual: &[ViewDescription], drifts: &mut Vec<Drift>) {
    for (name, e, a) in pair_by_name(expected, actual, |v| v.name.as_str()) {
        let drift = match (e, a) {
            (Some(e), None) => Drift::new(ObjectKind::View, name, DriftChange::Missing)
                .suggest(format!("CREATE VIEW {name} AS {};", e.definition)),
            (None, Some(_)) => Drift::new(ObjectKind::View, name, DriftChange::Unexpected)
                .suggest(format!("DROP VIEW IF EXISTS {name};")),
            (Some(e), Some(a)) => Drift::new(
                ObjectKind::View,
                name,
                DriftChange::Changed {
                    expected: e.definition.clone(),
                    actual: a.definition.clone(),
                },
            )
            .suggest(format!("CREATE OR REPLACE VIEW {name} AS {};", e.definition)),
            (None, None) => continue,
        };
        drifts.push(drift);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn column(name: &str, type_name: &str, nullable: bool) -> ColumnDescription {
        ColumnDescription {
            name: name.into(),
            type_name: type_name.into(),
            is_nullable: nullable,
            ..Default::default()
        }
    }

    fn repo_table() -> TableDescription {
        TableDescription {
            name: "repo".into(),
            columns: vec![column("id", "integer", false), column("name", "text", false)],
            indexes: vec![IndexDescription {
                name: "repo_name_idx".into(),
                index_definition: "CREATE UNIQUE INDEX repo_name_idx ON repo USING btree (name)"
                    .into(),
                is_unique: true,
                ..Default::default()
            }],
            constraints: vec![ConstraintDescription {
                name: "repo_pkey".into(),
                constraint_type: "p".into(),
                constraint_definition: "PRIMARY KEY (id)".into(),
                ..Default::default()
            }],
            ..Default::default()
        }
    }

    fn schema(tables: Vec<TableDescription>) -> SchemaDescription {
        SchemaDescription {
            extensions: vec!["pg_trgm".into()],
            tables,
            ..Default::default()
        }
    }

    #[test]
    fn identical_schemas_have_no_drift() {
        let s = schema(vec![repo_table()]).canonicalize();
        assert!(compare_schemas(&s, &s).is_empty());
    }

    #[test]
    fn missing_and_unexpected_tables() {
        let expected = schema(vec![repo_table()]);
        let actual = schema(vec![TableDescription {
            name: "scratch".into(),
            ..Default::default()
        }]);

        let drifts = compare_schemas(&expected, &actual);
        assert_eq!(drifts.len(), 2);
        assert_eq!(drifts[0].to_string(), "missing table \"repo\"");
        assert_eq!(drifts[0].suggestion, None);
        assert_eq!(drifts[1].change, DriftChange::Unexpected);
        assert_eq!(
            drifts[1].suggestion.as_deref(),
            Some("DROP TABLE IF EXISTS scratch;")
        );
    }

    #[rstest]
    #[case::type_change(
        column("name", "citext", false),
        "ALTER TABLE repo ALTER COLUMN name TYPE text;"
    )]
    #[case::nullability(
        column("name", "text", true),
        "ALTER TABLE repo ALTER COLUMN name SET NOT NULL;"
    )]
    #[case::default(
        ColumnDescription { default: Some("''::text".into()), ..column("name", "text", false) },
        "ALTER TABLE repo ALTER COLUMN name DROP DEFAULT;"
    )]
    fn changed_column_suggests_alteration(
        #[case] live_column: ColumnDescription,
        #[case] suggestion: &str,
    ) {
        let expected = schema(vec![repo_table()]);
        let mut live = repo_table();
        live.columns[1] = live_column;
        let actual = schema(vec![live]);

        let drifts = compare_schemas(&expected, &actual);
        assert_eq!(drifts.len(), 1);
        assert_eq!(drifts[0].kind, ObjectKind::Column);
        assert_eq!(drifts[0].name, "repo.name");
        assert_eq!(drifts[0].suggestion.as_deref(), Some(suggestion));
    }

    #[test]
    fn missing_index_suggests_its_definition() {
        let expected = schema(vec![repo_table()]);
        let mut live = repo_table();
        live.indexes.clear();

        let drifts = compare_schemas(&expected, &schema(vec![live]));
        assert_eq!(drifts.len(), 1);
        assert_eq!(
            drifts[0].suggestion.as_deref(),
            Some("CREATE UNIQUE INDEX repo_name_idx ON repo USING btree (name);")
        );
    }

    #[test]
    fn changed_constraint_is_dropped_and_readded() {
        let expected = schema(vec![repo_table()]);
        let mut live = repo_table();
        live.constraints[0].constraint_definition = "PRIMARY KEY (id, name)".into();

        let drifts = compare_schemas(&expected, &schema(vec![live]));
        assert_eq!(drifts.len(), 1);
        assert_eq!(
            drifts[0].to_string(),
            "constraint \"repo.repo_pkey\" differs: expected `PRIMARY KEY (id)`, found `PRIMARY KEY (id, name)`"
        );
        assert!(
            drifts[0]
                .suggestion
                .as_deref()
                .unwrap()
                .starts_with("ALTER TABLE repo DROP CONSTRAINT IF EXISTS repo_pkey;")
        );
    }

    #[test]
    fn extension_and_enum_drift() {
        let mut expected = schema(vec![]);
        expected.enums.push(EnumDescription {
            name: "critical_or_not".into(),
            labels: vec!["CRITICAL".into(), "NOT_CRITICAL".into()],
        });
        let actual = SchemaDescription {
            extensions: vec!["hstore".into()],
            enums: vec![EnumDescription {
                name: "critical_or_not".into(),
                labels: vec!["NOT_CRITICAL".into(), "CRITICAL".into()],
            }],
            ..Default::default()
        };

        let drifts = compare_schemas(&expected, &actual);
        let summary: Vec<(ObjectKind, &str)> =
            drifts.iter().map(|d| (d.kind, d.name.as_str())).collect();
        assert_eq!(
            summary,
            vec![
                (ObjectKind::Extension, "hstore"),
                (ObjectKind::Extension, "pg_trgm"),
                (ObjectKind::Enum, "critical_or_not"),
            ]
        );
        assert_eq!(
            drifts[1].suggestion.as_deref(),
            Some("CREATE EXTENSION IF NOT EXISTS pg_trgm;")
        );
    }
}
