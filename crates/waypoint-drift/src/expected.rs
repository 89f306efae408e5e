use std::path::{Path, PathBuf};

use async_trait::async_trait;
use regex::Regex;
use waypoint_config::{SchemaSourceConfig, SourceKind};
use waypoint_core::SchemaDescription;

use crate::error::{DriftError, SourceError};

/// A version format a source can serve.
#[derive(Debug, Clone)]
pub struct VersionPattern {
    regex: Regex,
    example: String,
}

impl VersionPattern {
    pub fn new(pattern: &str, example: impl Into<String>) -> Result<Self, regex::Error> {
        Ok(Self {
            regex: Regex::new(pattern)?,
            example: example.into(),
        })
    }

    pub fn matches(&self, version: &str) -> bool {
        self.regex.is_match(version)
    }

    /// A version this pattern accepts, shown to operators as a hint.
    pub fn example(&self) -> &str {
        &self.example
    }
}

/// One place expected schemas can be loaded from.
#[async_trait]
pub trait ExpectedSchemaFactory: Send + Sync {
    fn name(&self) -> &str;

    /// Versions this source can serve. Empty means every version.
    fn version_patterns(&self) -> &[VersionPattern];

    fn resource_path(&self, filename: &str, version: &str) -> String;

    async fn create_from_path(&self, path: &str) -> Result<SchemaDescription, SourceError>;

    /// Load failures of remote sources are reported back to the operator.
    fn is_remote(&self) -> bool {
        false
    }
}

/// Expected schemas laid out on disk as `{root}/{version}/{filename}`.
pub struct LocalExpectedSchemaFactory {
    name: String,
    root: PathBuf,
    patterns: Vec<VersionPattern>,
}

impl LocalExpectedSchemaFactory {
    pub fn new(name: impl Into<String>, root: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            root: root.into(),
            patterns: Vec::new(),
        }
    }

    pub fn with_patterns(mut self, patterns: Vec<VersionPattern>) -> Self {
        self.patterns = patterns;
        self
    }
}

#[async_trait]
impl ExpectedSchemaFactory for LocalExpectedSchemaFactory {
    fn name(&self) -> &str {
        &self.name
    }

    fn version_patterns(&self) -> &[VersionPattern] {
        &self.patterns
    }

    fn resource_path(&self, filename: &str, version: &str) -> String {
        self.root.join(version).join(filename).display().to_string()
    }

    async fn create_from_path(&self, path: &str) -> Result<SchemaDescription, SourceError> {
        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|source| SourceError::Io {
                path: path.to_string(),
                source,
            })?;
        serde_json::from_str(&content).map_err(|source| SourceError::Parse {
            path: path.to_string(),
            source,
        })
    }
}

/// Expected schemas served over HTTP as `{base_url}/{version}/{filename}`.
#[cfg(feature = "remote")]
pub struct RemoteExpectedSchemaFactory {
    name: String,
    base_url: String,
    patterns: Vec<VersionPattern>,
    client: reqwest::Client,
}

#[cfg(feature = "remote")]
impl RemoteExpectedSchemaFactory {
    pub fn new(name: impl Into<String>, base_url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            patterns: Vec::new(),
            client: reqwest::Client::new(),
        }
    }

    pub fn with_patterns(mut self, patterns: Vec<VersionPattern>) -> Self {
        self.patterns = patterns;
        self
    }
}

#[cfg(feature = "remote")]
#[async_trait]
impl ExpectedSchemaFactory for RemoteExpectedSchemaFactory {
    fn name(&self) -> &str {
        &self.name
    }

    fn version_patterns(&self) -> &[VersionPattern] {
        &self.patterns
    }

    fn resource_path(&self, filename: &str, version: &str) -> String {
        format!("{}/{version}/{filename}", self.base_url)
    }

    async fn create_from_path(&self, path: &str) -> Result<SchemaDescription, SourceError> {
        let http = |source| SourceError::Http {
            path: path.to_string(),
            source,
        };
        self.client
            .get(path)
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(http)?
            .json()
            .await
            .map_err(http)
    }

    fn is_remote(&self) -> bool {
        true
    }
}

/// Build the configured sources in order. Relative local locations are
/// resolved against `root`.
pub fn factories_from_config(
    sources: &[SchemaSourceConfig],
    root: &Path,
) -> Result<Vec<Box<dyn ExpectedSchemaFactory>>, DriftError> {
    let mut factories: Vec<Box<dyn ExpectedSchemaFactory>> = Vec::with_capacity(sources.len());
    for source in sources {
        let patterns = source
            .patterns
            .iter()
            .map(|p| {
                VersionPattern::new(&p.pattern, p.example.clone()).map_err(|error| {
                    DriftError::InvalidPattern {
                        source_name: source.name.clone(),
                        pattern: p.pattern.clone(),
                        error,
                    }
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        match source.kind {
            SourceKind::Local => {
                let location = Path::new(&source.location);
                let location = if location.is_absolute() {
                    location.to_path_buf()
                } else {
                    root.join(location)
                };
                factories.push(Box::new(
                    LocalExpectedSchemaFactory::new(&source.name, location)
                        .with_patterns(patterns),
                ));
            }
            #[cfg(feature = "remote")]
            SourceKind::Remote => factories.push(Box::new(
                RemoteExpectedSchemaFactory::new(&source.name, &source.location)
                    .with_patterns(patterns),
            )),
            #[cfg(not(feature = "remote"))]
            SourceKind::Remote => return Err(DriftError::RemoteUnavailable(source.name.clone())),
        }
    }
    Ok(factories)
}

/// File the expected schema of `schema` is stored under.
pub fn schema_filename(schema: &str) -> String {
    if schema == "frontend" {
        "schema.json".to_string()
    } else {
        format!("schema.{schema}.json")
    }
}

/// An expected schema together with where it came from and why earlier
/// sources were passed over.
#[derive(Debug, Clone)]
pub struct ExpectedSchema {
    pub schema: SchemaDescription,
    pub source: String,
    pub path: String,
    pub notes: Vec<String>,
}

/// Try each source in order and return the first schema that loads.
pub async fn fetch_expected_schema(
    factories: &[Box<dyn ExpectedSchemaFactory>],
    filename: &str,
    version: &str,
) -> Result<ExpectedSchema, DriftError> {
    let mut notes = Vec::new();
    let mut unmatched_patterns = Vec::new();
    let mut failed_paths = Vec::new();

    for factory in factories {
        let patterns = factory.version_patterns();
        if !patterns.is_empty() && !patterns.iter().any(|p| p.matches(version)) {
            unmatched_patterns.extend(patterns.iter().map(|p| p.example().to_string()));
            notes.push(format!(
                "skipped {}: version {version} does not match its version patterns",
                factory.name()
            ));
            continue;
        }

        let path = factory.resource_path(filename, version);
        match factory.create_from_path(&path).await {
            Ok(schema) => {
                notes.push(format!("loaded {} from {path}", factory.name()));
                for note in &notes {
                    tracing::info!(filename, version, "{note}");
                }
                return Ok(ExpectedSchema {
                    schema,
                    source: factory.name().to_string(),
                    path,
                    notes,
                });
            }
            Err(err) => {
                notes.push(format!("failed to load {}: {err}", factory.name()));
                if factory.is_remote() {
                    failed_paths.push(path);
                }
            }
        }
    }

    for note in &notes {
        tracing::warn!(filename, version, "{note}");
    }
    Err(DriftError::ExpectedSchemaNotFound {
        filename: filename.to_string(),
        version: version.to_string(),
        unmatched_patterns,
        failed_paths,
    })
}
