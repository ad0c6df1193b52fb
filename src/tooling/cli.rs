//! CLI Tooling
//!
//! Command-line interface for path index maintenance and lookups. Every command works on
//! the workspace's configured database and module-config store.

use crate::config::{ConfigLoader, IndexConfig};
use crate::db::Database;
use crate::error::{IndexError, StorageError};
use crate::index::PathIndex;
use crate::logging::LoggingConfig;
use crate::notice::{Notifier, TracingNotifier};
use crate::query::{Operator, PathCondition};
use crate::segments::SledModuleConfig;
use crate::store::PathIndexStore;
use crate::tooling::format::{
    format_info_json, format_info_text, format_node_ids, format_paths_json, format_paths_text,
    format_report_json, format_report_text, format_resolved_json, format_resolved_text,
    format_segments_text, format_stats_json, format_stats_text,
};
use crate::tree::SqliteTree;
use crate::types::{Locale, LocaleId, NodeId};
use clap::{Parser, Subcommand, ValueEnum};
use serde_json::{json, Value};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

/// pagepaths - Per-locale path index for site trees
#[derive(Parser)]
#[command(name = "pagepaths")]
#[command(about = "Maintain and query the denormalized path index of a site tree")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Workspace root directory
    #[arg(long, default_value = ".")]
    pub workspace: PathBuf,

    /// Configuration file path (overrides default config loading)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error, off)
    #[arg(long)]
    pub log_level: Option<String>,

    /// Log format (json, text)
    #[arg(long)]
    pub log_format: Option<String>,

    /// Log output (stdout, stderr, file, file+stderr, both)
    #[arg(long)]
    pub log_output: Option<String>,

    /// Log file path (if output includes "file")
    #[arg(long)]
    pub log_file: Option<PathBuf>,
}

impl Cli {
    /// Logging config with command-line overrides applied.
    pub fn logging_config(&self, base: &LoggingConfig) -> LoggingConfig {
        let mut config = base.clone();
        if let Some(level) = &self.log_level {
            config.level = level.clone();
        }
        if let Some(format) = &self.log_format {
            config.format = format.clone();
        }
        if let Some(output) = &self.log_output {
            config.output = output.clone();
        }
        if let Some(file) = &self.log_file {
            config.file = Some(file.clone());
        }
        config
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Rebuild the whole index, or one node's subtree
    Rebuild {
        /// Node whose subtree is rebuilt; omit for a full rebuild
        #[arg(long)]
        node: Option<NodeId>,
        #[arg(long, value_enum, default_value = "text")]
        format: OutputFormat,
    },
    /// Print a node's path in one locale
    Path {
        node: NodeId,
        /// Locale id; 0 is the default locale
        #[arg(long, default_value_t = 0)]
        locale: LocaleId,
    },
    /// List every stored locale path of a node
    Paths {
        node: NodeId,
        #[arg(long, value_enum, default_value = "text")]
        format: OutputFormat,
    },
    /// Find the node owning the first indexed candidate path
    Lookup {
        /// Candidate paths, tried in order
        #[arg(required = true)]
        paths: Vec<String>,
    },
    /// Show the page indexed at a path with its node attributes
    Info {
        path: String,
        #[arg(long, value_enum, default_value = "text")]
        format: OutputFormat,
    },
    /// Resolve a URL path, honoring a leading locale segment
    Resolve {
        url: String,
        #[arg(long, value_enum, default_value = "text")]
        format: OutputFormat,
    },
    /// Report which node owns a root-level segment
    RootSegment { segment: String },
    /// List the root segment cache
    Segments {
        /// Recompute the cache from the tree first
        #[arg(long)]
        rebuild: bool,
        #[arg(long, value_enum, default_value = "text")]
        format: OutputFormat,
    },
    /// Select nodes by a path condition
    Find {
        /// Operator: =, !=, >, <, >=, <=, *=, ~=, %=, ^=, $=
        operator: String,
        /// One or more values; several are OR'd together
        #[arg(required = true)]
        values: Vec<String>,
        #[arg(long)]
        negate: bool,
        /// Locale id; 0 is the default locale
        #[arg(long, default_value_t = 0)]
        locale: LocaleId,
    },
    /// Show index counters and the rebuild estimate
    Stats {
        #[arg(long, value_enum, default_value = "text")]
        format: OutputFormat,
    },
}

fn command_name(command: &Commands) -> &'static str {
    match command {
        Commands::Rebuild { .. } => "rebuild",
        Commands::Path { .. } => "path",
        Commands::Paths { .. } => "paths",
        Commands::Lookup { .. } => "lookup",
        Commands::Info { .. } => "info",
        Commands::Resolve { .. } => "resolve",
        Commands::RootSegment { .. } => "root-segment",
        Commands::Segments { .. } => "segments",
        Commands::Find { .. } => "find",
        Commands::Stats { .. } => "stats",
    }
}

/// CLI context wiring the workspace's storage to a path index
pub struct CliContext {
    workspace_root: PathBuf,
    config: IndexConfig,
    tree: Arc<SqliteTree>,
    index: PathIndex,
}

impl CliContext {
    /// Load configuration and open the workspace's stores.
    pub fn new(workspace_root: PathBuf, config_path: Option<PathBuf>) -> Result<Self, IndexError> {
        let config = match &config_path {
            Some(path) => ConfigLoader::load_from_file(path)?,
            None => ConfigLoader::load(&workspace_root)?,
        };
        Self::with_config(workspace_root, config)
    }

    pub fn with_config(workspace_root: PathBuf, config: IndexConfig) -> Result<Self, IndexError> {
        let (database_path, segments_path) = config.storage.resolve_paths(&workspace_root)?;
        let db = Arc::new(Database::open(&database_path)?);
        let tree = Arc::new(SqliteTree::new(db.clone(), config.root_id)?);
        let notifier: Arc<dyn Notifier> = Arc::new(TracingNotifier);
        let store = Arc::new(PathIndexStore::open(db, notifier.clone())?);
        let persistence = Arc::new(SledModuleConfig::open(&segments_path)?);
        let index = PathIndex::new(tree.clone(), store, persistence, notifier, &config);
        Ok(Self {
            workspace_root,
            config,
            tree,
            index,
        })
    }

    pub fn config(&self) -> &IndexConfig {
        &self.config
    }

    pub fn workspace_root(&self) -> &PathBuf {
        &self.workspace_root
    }

    /// Host tree backing this workspace.
    pub fn tree(&self) -> &Arc<SqliteTree> {
        &self.tree
    }

    pub fn index(&self) -> &PathIndex {
        &self.index
    }

    /// Execute a CLI command
    pub fn execute(&self, command: &Commands) -> Result<String, IndexError> {
        info!(command = command_name(command), "Executing command");
        match command {
            Commands::Rebuild { node, format } => {
                let report = self.index.rebuild(*node)?;
                Ok(match format {
                    OutputFormat::Text => format_report_text(&report),
                    OutputFormat::Json => to_json(&format_report_json(&report))?,
                })
            }
            Commands::Path { node, locale } => {
                match self.index.get_path(*node, Locale::from_id(*locale))? {
                    Some(path) => Ok(path),
                    None => Ok(format!(
                        "Node {} has no path in locale {}",
                        node,
                        Locale::from_id(*locale)
                    )),
                }
            }
            Commands::Paths { node, format } => {
                let paths = self.index.get_paths(*node)?;
                Ok(match format {
                    OutputFormat::Text => format_paths_text(*node, &paths),
                    OutputFormat::Json => to_json(&format_paths_json(*node, &paths))?,
                })
            }
            Commands::Lookup { paths } => {
                let candidates: Vec<&str> = paths.iter().map(String::as_str).collect();
                match self.index.get_page_and_locale_id(&candidates)? {
                    Some((node_id, locale)) => Ok(format!("{}\t{}", node_id, locale)),
                    None => Ok("No page indexed at the given paths".to_string()),
                }
            }
            Commands::Info { path, format } => match self.index.get_page_info(path)? {
                Some(info) => Ok(match format {
                    OutputFormat::Text => format_info_text(&info),
                    OutputFormat::Json => to_json(&format_info_json(&info))?,
                }),
                None => Ok(format!("No page indexed at '{}'", path)),
            },
            Commands::Resolve { url, format } => match self.index.resolve_url(url)? {
                Some(resolved) => Ok(match format {
                    OutputFormat::Text => format_resolved_text(&resolved),
                    OutputFormat::Json => to_json(&format_resolved_json(&resolved))?,
                }),
                None => Ok(format!("No page indexed at '{}'", url)),
            },
            Commands::RootSegment { segment } => match self.index.is_root_segment(segment)? {
                Some(node_id) => Ok(node_id.to_string()),
                None => Ok(format!("'{}' is not a root segment", segment)),
            },
            Commands::Segments { rebuild, format } => {
                let segments = self.index.root_segments(*rebuild)?;
                Ok(match format {
                    OutputFormat::Text => format_segments_text(&segments),
                    OutputFormat::Json => to_json(&json!(segments))?,
                })
            }
            Commands::Find {
                operator,
                values,
                negate,
                locale,
            } => {
                let mut condition = PathCondition::any_of(operator.parse::<Operator>()?, values.iter().cloned())
                    .in_locale(Locale::from_id(*locale));
                if *negate {
                    condition = condition.negated();
                }
                let ids = self.index.find(&[condition])?;
                Ok(format_node_ids(&ids))
            }
            Commands::Stats { format } => {
                let diagnostics = self.index.diagnostics()?;
                Ok(match format {
                    OutputFormat::Text => format_stats_text(&diagnostics),
                    OutputFormat::Json => to_json(&format_stats_json(&diagnostics))?,
                })
            }
        }
    }
}

fn to_json(value: &Value) -> Result<String, IndexError> {
    Ok(serde_json::to_string_pretty(value).map_err(StorageError::from)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StorageConfig;

    fn context() -> (tempfile::TempDir, CliContext) {
        let temp = tempfile::tempdir().unwrap();
        let config = IndexConfig {
            storage: StorageConfig {
                database_path: PathBuf::from("site.db"),
                segments_path: PathBuf::from("segments"),
            },
            ..IndexConfig::default()
        };
        let ctx = CliContext::with_config(temp.path().to_path_buf(), config).unwrap();
        ctx.tree().insert_node(1, None, "home", 1).unwrap();
        ctx.tree().insert_node(10, Some(1), "About", 2).unwrap();
        ctx.tree().insert_node(11, Some(10), "Team", 2).unwrap();
        (temp, ctx)
    }

    #[test]
    fn test_rebuild_then_lookup() {
        let (_temp, ctx) = context();
        let out = ctx
            .execute(&Commands::Rebuild {
                node: None,
                format: OutputFormat::Json,
            })
            .unwrap();
        let value: Value = serde_json::from_str(&out).unwrap();
        assert_eq!(value["written"], 3);

        let out = ctx
            .execute(&Commands::Path {
                node: 11,
                locale: 0,
            })
            .unwrap();
        assert_eq!(out, "about/team");

        let out = ctx
            .execute(&Commands::Lookup {
                paths: vec!["missing".to_string(), "/about/".to_string()],
            })
            .unwrap();
        assert_eq!(out, "10\tdefault");

        let out = ctx
            .execute(&Commands::RootSegment {
                segment: "about".to_string(),
            })
            .unwrap();
        assert_eq!(out, "10");
    }

    #[test]
    fn test_find_reports_usage_errors() {
        let (_temp, ctx) = context();
        ctx.index().rebuild(None).unwrap();
        let out = ctx
            .execute(&Commands::Find {
                operator: "=".to_string(),
                values: vec!["about/team".to_string()],
                negate: false,
                locale: 0,
            })
            .unwrap();
        assert_eq!(out, "11");

        let err = ctx
            .execute(&Commands::Find {
                operator: "~=".to_string(),
                values: vec!["a".to_string(), "b".to_string()],
                negate: false,
                locale: 0,
            })
            .unwrap_err();
        assert!(matches!(err, IndexError::QueryError(_)));
    }

    #[test]
    fn test_logging_overrides() {
        let cli = Cli::parse_from(["pagepaths", "--log-level", "debug", "stats"]);
        let config = cli.logging_config(&LoggingConfig::default());
        assert_eq!(config.level, "debug");
        assert_eq!(config.output, "file");
        assert!(matches!(cli.command, Commands::Stats { format: OutputFormat::Text }));
    }
}
