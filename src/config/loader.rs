//! ConfigLoader: composes config sources and deserializes to IndexConfig.

use super::IndexConfig;
use crate::error::IndexError;
use config::builder::DefaultState;
use config::{Config, ConfigBuilder, ConfigError, Environment, File};
use std::path::{Path, PathBuf};

/// Workspace-local config file, relative to the workspace root
pub const WORKSPACE_CONFIG: &str = ".pagepaths/config.toml";

/// Configuration loader facade.
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load config from standard sources.
    /// Precedence: defaults (lowest) -> user file -> workspace file -> environment (highest).
    pub fn load(workspace_root: &Path) -> Result<IndexConfig, IndexError> {
        let mut builder = builder_with_defaults()?;
        if let Some(user_file) = Self::user_config_path() {
            builder = builder.add_source(File::from(user_file).required(false));
        }
        let builder = builder
            .add_source(File::from(workspace_root.join(WORKSPACE_CONFIG)).required(false));
        finish(with_environment(builder))
    }

    /// Load config from a specific file with environment overlay.
    pub fn load_from_file(path: &Path) -> Result<IndexConfig, IndexError> {
        let builder = builder_with_defaults()?.add_source(File::from(path).required(true));
        finish(with_environment(builder))
    }

    /// `<config dir>/config.toml` under the platform's per-user config directory.
    pub fn user_config_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("", "pagepaths", "pagepaths")
            .map(|dirs| dirs.config_dir().join("config.toml"))
    }
}

fn builder_with_defaults() -> Result<ConfigBuilder<DefaultState>, ConfigError> {
    let defaults = IndexConfig::default();
    Config::builder()
        .set_default("default_root_name", defaults.default_root_name)?
        .set_default("root_id", defaults.root_id as i64)?
        .set_default("display_encoding", "ascii")
}

/// Environment overlay: PAGEPATHS__ prefix with __ as the nesting separator.
fn with_environment(builder: ConfigBuilder<DefaultState>) -> ConfigBuilder<DefaultState> {
    builder.add_source(
        Environment::with_prefix("PAGEPATHS")
            .separator("__")
            .try_parsing(true),
    )
}

fn finish(builder: ConfigBuilder<DefaultState>) -> Result<IndexConfig, IndexError> {
    let config: IndexConfig = builder.build()?.try_deserialize()?;
    config.validate()?;
    Ok(config)
}
