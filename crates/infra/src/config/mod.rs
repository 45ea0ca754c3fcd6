//! Configuration loading
//!
//! Layers file, environment and defaults into an `AppConfig`.

pub mod loader;

pub use loader::{
    apply_env_overrides, default_data_dir, load, load_from_file, probe_config_paths,
};
