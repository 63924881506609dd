//! Configuration system for the Tessera workflow engine.
//!
//! Provides TOML-based configuration with:
//! - Sections for the application paths, HTTP server, OIDC client, pipeline
//!   launcher, object storage and task-execution backend
//! - A `[[datasets]]` table routing specific datasets to another backend
//! - Config file layering (XDG user config + project-local overrides)
//!
//! The loaded [`TesseraConfig`] is passed by reference into the components
//! that need it; nothing reads configuration from global state.

pub mod discovery;
pub mod error;
pub mod types;

pub use discovery::{
    LoadedConfig, load_config, load_config_file, load_config_with_options, xdg_config_dir,
    xdg_config_path,
};
pub use error::{ConfigError, Result};
pub use types::*;
