pub mod config;
pub mod documents;

pub use config::{CONFIG_FILE, load_config, load_config_from_path};
pub use documents::{
    load_out_of_band_migrations, load_stitched_index, read_document, write_document,
};
