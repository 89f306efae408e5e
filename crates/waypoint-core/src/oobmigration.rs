use serde::{Deserialize, Serialize};

use crate::version::Version;

/// A long-running background data migration tracked independently of schema
/// migrations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutOfBandMigration {
    pub id: i32,
    #[serde(default)]
    pub team: String,
    #[serde(default)]
    pub component: String,
    #[serde(default)]
    pub description: String,
    /// First release that runs this migration.
    pub introduced: Version,
    /// First release that no longer reads the unmigrated data.
    #[serde(default)]
    pub deprecated: Option<Version>,
    /// Fraction of the data migrated, `0.0..=1.0`.
    #[serde(default)]
    pub progress: f64,
    /// Safe to leave partially applied during a downgrade.
    #[serde(default)]
    pub non_destructive: bool,
    #[serde(default)]
    pub is_enterprise: bool,
    /// Run backwards, towards zero progress.
    #[serde(default)]
    pub apply_reverse: bool,
    #[serde(default)]
    pub errors: Vec<MigrationErrorEntry>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MigrationErrorEntry {
    pub message: String,
}

impl OutOfBandMigration {
    /// Finished in its current direction.
    pub fn complete(&self) -> bool {
        if self.apply_reverse {
            self.progress <= 0.0
        } else {
            self.progress >= 1.0
        }
    }

    /// Nothing blocks on it: either finished, or being reversed while
    /// non-destructive, so leaving it partially applied is harmless.
    pub fn acceptable(&self) -> bool {
        self.complete() || (self.apply_reverse && self.non_destructive)
    }

    /// Whether the migration's code exists in `version`.
    pub fn exists_at(&self, version: Version) -> bool {
        self.introduced <= version && self.deprecated.is_none_or(|d| version < d)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn migration(progress: f64, apply_reverse: bool, non_destructive: bool) -> OutOfBandMigration {
        OutOfBandMigration {
            id: 1,
            team: "search".into(),
            component: "repo".into(),
            description: "backfill".into(),
            introduced: Version::new(5, 0),
            deprecated: Some(Version::new(5, 3)),
            progress,
            non_destructive,
            is_enterprise: false,
            apply_reverse,
            errors: Vec::new(),
        }
    }

    #[rstest]
    #[case::forward_done(1.0, false, false, true, true)]
    #[case::forward_partial(0.4, false, false, false, false)]
    #[case::reverse_done(0.0, true, false, true, true)]
    #[case::reverse_partial_destructive(0.4, true, false, false, false)]
    #[case::reverse_partial_non_destructive(0.4, true, true, false, true)]
    #[case::forward_partial_non_destructive(0.4, false, true, false, false)]
    fn completion(
        #[case] progress: f64,
        #[case] apply_reverse: bool,
        #[case] non_destructive: bool,
        #[case] complete: bool,
        #[case] acceptable: bool,
    ) {
        let m = migration(progress, apply_reverse, non_destructive);
        assert_eq!(m.complete(), complete);
        assert_eq!(m.acceptable(), acceptable);
    }

    #[test]
    fn exists_between_introduction_and_deprecation() {
        let m = migration(0.0, false, false);
        assert!(!m.exists_at(Version::new(4, 5)));
        assert!(m.exists_at(Version::new(5, 0)));
        assert!(m.exists_at(Version::new(5, 2)));
        assert!(!m.exists_at(Version::new(5, 3)));

        let open_ended = OutOfBandMigration {
            deprecated: None,
            ..m
        };
        assert!(open_ended.exists_at(Version::new(9, 0)));
    }
}
