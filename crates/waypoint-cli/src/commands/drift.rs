use std::path::Path;

use anyhow::{Context, Result, bail};
use colored::Colorize;
use waypoint_drift::{DriftChecker, DriftReport, factories_from_config};

use crate::utils::{load_project, parse_version, recorded_version};

pub async fn cmd_drift(config: Option<&Path>, version: Option<String>) -> Result<()> {
    let project = load_project(config)?;
    let backend = project.backend()?;

    let version = match version.as_deref() {
        Some(raw) => parse_version(raw)?,
        None => recorded_version(&backend.snapshot())?
            .context("no service version is recorded; pass --version")?,
    };
    let tag = version.git_tag_with_patch(version.patch.unwrap_or(0));

    let factories = factories_from_config(project.config.expected_schema_sources(), &project.root)?;
    let report = DriftChecker::new(backend.as_ref(), &factories)
        .with_bookkeeping_table(project.config.migration_log_table())
        .check(project.config.schema_names(), &tag)
        .await?;

    print_report(&report);
    if report.has_drift() {
        let schemas: Vec<&str> = report.drifted_schemas().collect();
        bail!("database drift detected in {}", schemas.join(", "));
    }
    Ok(())
}

fn print_report(report: &DriftReport) {
    println!(
        "{} {}",
        "Drift check against".bright_cyan().bold(),
        report.version.bright_magenta()
    );
    for schema in &report.schemas {
        if schema.drifts.is_empty() {
            println!(
                "  {} {} ({})",
                "✓".bright_green(),
                schema.schema.bright_white(),
                schema.expected_source
            );
            continue;
        }
        println!(
            "  {} {} ({}): {} {}",
            "✗".bright_red(),
            schema.schema.bright_white(),
            schema.expected_source,
            schema.drifts.len().to_string().bright_yellow(),
            "differences".bright_white()
        );
        for drift in &schema.drifts {
            println!("    {} {}", "-".bright_white(), drift);
            if let Some(suggestion) = &drift.suggestion {
                println!("      {} {}", "Suggested fix:".bright_black(), suggestion.cyan());
            }
        }
    }
    for schema in &report.skipped {
        println!(
            "  {} {} {}",
            "-".bright_black(),
            schema.bright_white(),
            "(no applied migrations; skipped)".bright_black()
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::fs;
    use std::path::Path;
    use tempfile::tempdir;

    use crate::utils::testing::{CwdGuard, write_project};

    fn write_expected(dir: &Path, tag: &str, schema_json: &str) {
        let dir = dir.join("schemas").join(tag);
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("schema.json"), schema_json).unwrap();
    }

    #[tokio::test]
    #[serial]
    async fn missing_table_is_drift() {
        let tmp = tempdir().unwrap();
        write_project(tmp.path());
        write_expected(tmp.path(), "v5.0.0", r#"{"tables": [{"name": "repo"}]}"#);
        let _guard = CwdGuard::new(tmp.path());

        let err = cmd_drift(None, None).await.unwrap_err();
        assert!(err.to_string().contains("frontend"), "{err}");
    }

    #[tokio::test]
    #[serial]
    async fn matching_schema_is_clean() {
        let tmp = tempdir().unwrap();
        write_project(tmp.path());
        write_expected(tmp.path(), "v5.0.0", "{}");
        let _guard = CwdGuard::new(tmp.path());

        cmd_drift(None, None).await.unwrap();
    }

    #[tokio::test]
    #[serial]
    async fn missing_expected_schema_names_the_version() {
        let tmp = tempdir().unwrap();
        write_project(tmp.path());
        let _guard = CwdGuard::new(tmp.path());

        let err = cmd_drift(None, Some("v5.1.2".into())).await.unwrap_err();
        assert!(err.to_string().contains("v5.1.2"), "{err}");
    }
}
