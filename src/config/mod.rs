//! Configuration
//!
//! `IndexConfig` is layered by [`ConfigLoader`]: built-in defaults, the user config file,
//! the workspace `.pagepaths/config.toml`, then `PAGEPATHS__*` environment variables.

mod loader;

pub use loader::ConfigLoader;

use crate::error::IndexError;
use crate::logging::LoggingConfig;
use crate::sanitize::Encoding;
use crate::types::NodeId;
use serde::{Deserialize, Serialize};
use std::path::{Component, Path, PathBuf};

/// Root name that never prefixes paths or counts as a root segment
pub const DEFAULT_ROOT_NAME: &str = "home";

fn default_database_path() -> PathBuf {
    PathBuf::from("site.db")
}

fn default_segments_path() -> PathBuf {
    PathBuf::from(".pagepaths/module_config")
}

fn default_root_name() -> String {
    DEFAULT_ROOT_NAME.to_string()
}

fn default_root_id() -> NodeId {
    1
}

fn default_estimate_us_per_node() -> u64 {
    250
}

/// Storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// SQLite database holding the node tables and the path index (relative to workspace root)
    #[serde(default = "default_database_path")]
    pub database_path: PathBuf,

    /// Module-config store for the root-segment cache (relative to workspace root)
    #[serde(default = "default_segments_path")]
    pub segments_path: PathBuf,
}

impl StorageConfig {
    /// Resolve storage paths to filesystem locations.
    ///
    /// The default segments path lives in the per-user data directory, scoped by workspace.
    pub fn resolve_paths(&self, workspace_root: &Path) -> Result<(PathBuf, PathBuf), IndexError> {
        let database_path = workspace_root.join(&self.database_path);
        let segments_path = if self.segments_path == default_segments_path() {
            workspace_data_dir(workspace_root)?.join("module_config")
        } else {
            workspace_root.join(&self.segments_path)
        };
        Ok((database_path, segments_path))
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            segments_path: default_segments_path(),
        }
    }
}

/// Rebuild tuning
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RebuildConfig {
    /// Expected cost per node, used for the rebuild-time estimate
    #[serde(default = "default_estimate_us_per_node")]
    pub estimate_us_per_node: u64,
}

impl Default for RebuildConfig {
    fn default() -> Self {
        Self {
            estimate_us_per_node: default_estimate_us_per_node(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexConfig {
    #[serde(default)]
    pub storage: StorageConfig,

    /// Encoding paths are returned in
    #[serde(default)]
    pub display_encoding: Encoding,

    #[serde(default = "default_root_name")]
    pub default_root_name: String,

    /// Id of the tree root in the host node table
    #[serde(default = "default_root_id")]
    pub root_id: NodeId,

    #[serde(default)]
    pub rebuild: RebuildConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            storage: StorageConfig::default(),
            display_encoding: Encoding::default(),
            default_root_name: default_root_name(),
            root_id: default_root_id(),
            rebuild: RebuildConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl IndexConfig {
    pub fn validate(&self) -> Result<(), IndexError> {
        if self.root_id == 0 {
            return Err(IndexError::ConfigError(
                "root_id must be a positive node id".to_string(),
            ));
        }
        if self.default_root_name.trim().is_empty() {
            return Err(IndexError::ConfigError(
                "default_root_name must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}

/// Per-user data directory for a workspace: `<data dir>/<canonical workspace path>`.
pub fn workspace_data_dir(workspace_root: &Path) -> Result<PathBuf, IndexError> {
    let project_dirs = directories::ProjectDirs::from("", "pagepaths", "pagepaths").ok_or_else(|| {
        IndexError::ConfigError("Could not determine platform data directory".to_string())
    })?;
    scoped_dir(project_dirs.data_dir(), workspace_root)
}

/// `base` joined with the normal components of the canonical workspace path.
pub(crate) fn scoped_dir(base: &Path, workspace_root: &Path) -> Result<PathBuf, IndexError> {
    let canonical = workspace_root.canonicalize().map_err(|e| {
        IndexError::ConfigError(format!("Failed to canonicalize workspace path: {}", e))
    })?;
    let mut dir = base.to_path_buf();
    for component in canonical.components() {
        if let Component::Normal(name) = component {
            dir = dir.join(name);
        }
    }
    Ok(dir)
}
