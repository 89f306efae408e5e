use thiserror::Error;
use waypoint_core::StoreError;

use crate::checker::DriftReport;

/// Failure to load one expected-schema resource.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("parse {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },
    #[cfg(feature = "remote")]
    #[error("fetch {path}: {source}")]
    Http {
        path: String,
        #[source]
        source: reqwest::Error,
    },
}

#[derive(Debug, Error)]
pub enum DriftError {
    #[error("{}", drift_message(.report))]
    DatabaseDriftDetected { report: Box<DriftReport> },
    #[error("{}", not_found_message(.filename, .version, .unmatched_patterns, .failed_paths))]
    ExpectedSchemaNotFound {
        filename: String,
        version: String,
        /// Example versions of sources whose patterns rejected `version`.
        unmatched_patterns: Vec<String>,
        /// Remote paths that matched but could not be loaded.
        failed_paths: Vec<String>,
    },
    #[error("invalid version pattern {pattern:?} in source {source_name:?}: {error}")]
    InvalidPattern {
        source_name: String,
        pattern: String,
        error: regex::Error,
    },
    #[error("source {0:?} is remote, but remote sources are not enabled in this build")]
    RemoteUnavailable(String),
    #[error(transparent)]
    Store(#[from] StoreError),
}

fn drift_message(report: &DriftReport) -> String {
    let schemas: Vec<&str> = report.drifted_schemas().collect();
    format!("database drift detected in schemas: {}", schemas.join(", "))
}

fn not_found_message(
    filename: &str,
    version: &str,
    unmatched_patterns: &[String],
    failed_paths: &[String],
) -> String {
    let mut message = format!("failed to locate expected schema {filename} for version {version}");
    if !unmatched_patterns.is_empty() {
        message.push_str(&format!(
            "; the version matched none of the known formats (for example {})",
            unmatched_patterns.join(", ")
        ));
    }
    if !failed_paths.is_empty() {
        message.push_str(&format!(
            "; could not load {}, check network and proxy access",
            failed_paths.join(", ")
        ));
    }
    message
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_lists_hints() {
        let err = DriftError::ExpectedSchemaNotFound {
            filename: "schema.json".into(),
            version: "v5.2.x".into(),
            unmatched_patterns: vec!["v5.2.0".into()],
            failed_paths: vec!["https://example.invalid/v5.2.x/schema.json".into()],
        };
        let message = err.to_string();
        assert!(message.starts_with("failed to locate expected schema schema.json for version v5.2.x"));
        assert!(message.contains("for example v5.2.0"));
        assert!(message.contains("could not load https://example.invalid/v5.2.x/schema.json"));
    }

    #[test]
    fn not_found_without_hints_is_short() {
        let err = DriftError::ExpectedSchemaNotFound {
            filename: "schema.json".into(),
            version: "v5.2.0".into(),
            unmatched_patterns: Vec::new(),
            failed_paths: Vec::new(),
        };
        assert_eq!(
            err.to_string(),
            "failed to locate expected schema schema.json for version v5.2.0"
        );
    }
}
