pub mod config;
pub mod file_format;

pub use config::{
    SchemaSourceConfig, SourceKind, VersionPatternConfig, WaypointConfig, default_schema_names,
};
pub use file_format::FileFormat;
pub use waypoint_core::PrivilegedMode;

#[cfg(test)]
mod tests {
    use std::path::{Path, PathBuf};

    use super::*;

    #[test]
    fn default_values_are_standard_paths() {
        let cfg = WaypointConfig::default();
        assert_eq!(cfg.stitched_migrations, PathBuf::from("stitched-migrations.json"));
        assert_eq!(cfg.schema_names(), default_schema_names().as_slice());
        assert_eq!(
            FileFormat::from_path(cfg.out_of_band_migrations()),
            Some(FileFormat::Yaml)
        );
    }

    #[test]
    fn overrides_work_via_struct_update() {
        let cfg = WaypointConfig {
            stitched_migrations: PathBuf::from("bundle/stitched.yaml"),
            state_file: PathBuf::from("tmp/state.json"),
            migration_log_table: "schema_migrations".into(),
            ..Default::default()
        };

        assert_eq!(cfg.stitched_migrations(), Path::new("bundle/stitched.yaml"));
        assert_eq!(cfg.state_file(), Path::new("tmp/state.json"));
        assert_eq!(cfg.migration_log_table(), "schema_migrations");
    }
}
