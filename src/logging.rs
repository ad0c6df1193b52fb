//! Logging System
//!
//! Structured logging through `tracing`. Level, format and destination come from
//! [`LoggingConfig`], overridden by the `PAGEPATHS_LOG*` environment variables.

use crate::error::IndexError;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;
use tracing_subscriber::filter::Directive;
use tracing_subscriber::fmt::time::ChronoUtc;
use tracing_subscriber::fmt::writer::{BoxMakeWriter, MakeWriterExt};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Registry};

const ENV_FILTER: &str = "PAGEPATHS_LOG";
const ENV_MODULES: &str = "PAGEPATHS_LOG_MODULES";
const ENV_FORMAT: &str = "PAGEPATHS_LOG_FORMAT";
const ENV_OUTPUT: &str = "PAGEPATHS_LOG_OUTPUT";
const ENV_FILE: &str = "PAGEPATHS_LOG_FILE";

/// Logging configuration, as read from the `[logging]` table
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// trace, debug, info, warn, error or off
    #[serde(default = "default_log_level")]
    pub level: String,

    /// json or text
    #[serde(default = "default_format")]
    pub format: String,

    /// stdout, stderr, file, file+stderr or both
    #[serde(default = "default_output")]
    pub output: String,

    /// Log file when the output includes a file; unset means the per-workspace state dir
    #[serde(default)]
    pub file: Option<PathBuf>,

    /// ANSI colors for text written to a terminal
    #[serde(default = "default_true")]
    pub color: bool,

    /// Per-module levels, e.g. `pagepaths::rebuild = "debug"`
    #[serde(default)]
    pub modules: HashMap<String, String>,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_format() -> String {
    "text".to_string()
}

fn default_output() -> String {
    "file".to_string()
}

fn default_true() -> bool {
    true
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            enabled: default_true(),
            level: default_log_level(),
            format: default_format(),
            output: default_output(),
            file: None,
            color: default_true(),
            modules: HashMap::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Text,
    Json,
}

impl FromStr for LogFormat {
    type Err = IndexError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "text" => Ok(LogFormat::Text),
            "json" => Ok(LogFormat::Json),
            other => Err(IndexError::ConfigError(format!(
                "Invalid log format: {} (expected json or text)",
                other
            ))),
        }
    }
}

/// Where log lines go
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogOutput {
    Stdout,
    Stderr,
    File,
    FileAndStderr,
    /// stdout and stderr
    Both,
}

impl LogOutput {
    pub fn writes_file(self) -> bool {
        matches!(self, LogOutput::File | LogOutput::FileAndStderr)
    }
}

impl FromStr for LogOutput {
    type Err = IndexError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "stdout" => Ok(LogOutput::Stdout),
            "stderr" => Ok(LogOutput::Stderr),
            "file" => Ok(LogOutput::File),
            "file+stderr" => Ok(LogOutput::FileAndStderr),
            "both" => Ok(LogOutput::Both),
            other => Err(IndexError::ConfigError(format!(
                "Invalid log output: {} (expected stdout, stderr, file, file+stderr or both)",
                other
            ))),
        }
    }
}

/// Log file location. Precedence: explicit path, `PAGEPATHS_LOG_FILE`, configured path,
/// then `pagepaths.log` in the platform state dir, scoped by workspace when one is given.
pub fn resolve_log_file_path(
    explicit: Option<PathBuf>,
    configured: Option<PathBuf>,
    workspace: Option<&Path>,
) -> Result<PathBuf, IndexError> {
    let from_env = std::env::var_os(ENV_FILE).map(PathBuf::from);
    let chosen = [explicit, from_env, configured]
        .into_iter()
        .flatten()
        .find(|p| !p.as_os_str().is_empty());
    if let Some(path) = chosen {
        return Ok(path);
    }

    let dirs = directories::ProjectDirs::from("", "pagepaths", "pagepaths").ok_or_else(|| {
        IndexError::ConfigError("Could not determine platform directories for log file".to_string())
    })?;
    let base = dirs.state_dir().unwrap_or_else(|| dirs.data_local_dir());
    let dir = match workspace {
        Some(ws) => crate::config::scoped_dir(base, ws)?,
        None => base.to_path_buf(),
    };
    Ok(dir.join("pagepaths.log"))
}

/// Install the global subscriber.
///
/// Environment variables win over `config`; a disabled config installs an `off` filter.
/// Fails if a subscriber is already installed.
pub fn init_logging(config: Option<&LoggingConfig>, workspace: Option<&Path>) -> Result<(), IndexError> {
    let defaults = LoggingConfig::default();
    let config = config.unwrap_or(&defaults);
    let installed = if !config.enabled {
        Registry::default().with(EnvFilter::new("off")).try_init()
    } else {
        let filter = env_filter(config)?;
        let format = env_or(ENV_FORMAT, &config.format).parse::<LogFormat>()?;
        let output = env_or(ENV_OUTPUT, &config.output).parse::<LogOutput>()?;
        let writer = make_writer(output, || {
            open_log_file(&resolve_log_file_path(None, config.file.clone(), workspace)?)
        })?;

        let subscriber = Registry::default().with(filter);
        match format {
            LogFormat::Json => subscriber
                .with(
                    fmt::layer()
                        .json()
                        .with_target(true)
                        .with_timer(ChronoUtc::rfc_3339())
                        .with_writer(writer),
                )
                .try_init(),
            LogFormat::Text => subscriber
                .with(
                    fmt::layer()
                        .with_target(true)
                        .with_timer(ChronoUtc::rfc_3339())
                        .with_ansi(config.color && !output.writes_file())
                        .with_writer(writer),
                )
                .try_init(),
        }
    };
    installed.map_err(|e| IndexError::ConfigError(format!("Failed to install logger: {}", e)))
}

fn env_or(var: &str, configured: &str) -> String {
    std::env::var(var).unwrap_or_else(|_| configured.to_string())
}

fn open_log_file(path: &Path) -> Result<File, IndexError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| {
            IndexError::ConfigError(format!("Failed to create log directory {:?}: {}", parent, e))
        })?;
    }
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|e| IndexError::ConfigError(format!("Failed to open log file {:?}: {}", path, e)))
}

fn make_writer<F>(output: LogOutput, open_file: F) -> Result<BoxMakeWriter, IndexError>
where
    F: FnOnce() -> Result<File, IndexError>,
{
    Ok(match output {
        LogOutput::Stdout => BoxMakeWriter::new(std::io::stdout),
        LogOutput::Stderr => BoxMakeWriter::new(std::io::stderr),
        LogOutput::Both => BoxMakeWriter::new(std::io::stdout.and(std::io::stderr)),
        LogOutput::File => BoxMakeWriter::new(Arc::new(open_file()?)),
        LogOutput::FileAndStderr => {
            BoxMakeWriter::new(Arc::new(open_file()?).and(std::io::stderr))
        }
    })
}

/// `PAGEPATHS_LOG` replaces the whole filter. Otherwise the configured level plus
/// per-module directives from the config and `PAGEPATHS_LOG_MODULES` (`a=debug,b=warn`).
fn env_filter(config: &LoggingConfig) -> Result<EnvFilter, IndexError> {
    if let Ok(filter) = EnvFilter::try_from_env(ENV_FILTER) {
        return Ok(filter);
    }
    if config.level == "off" {
        return Ok(EnvFilter::new("off"));
    }

    let from_env = std::env::var(ENV_MODULES).unwrap_or_default();
    let env_modules = from_env
        .split(',')
        .filter_map(|pair| pair.split_once('='))
        .map(|(module, level)| (module.trim(), level.trim()));
    let config_modules = config
        .modules
        .iter()
        .map(|(module, level)| (module.as_str(), level.as_str()));

    let mut filter = EnvFilter::new(&config.level);
    for (module, level) in config_modules.chain(env_modules) {
        filter = filter.add_directive(directive(module, level)?);
    }
    Ok(filter)
}

fn directive(module: &str, level: &str) -> Result<Directive, IndexError> {
    format!("{}={}", module, level)
        .parse()
        .map_err(|e| IndexError::ConfigError(format!("Invalid log directive {}={}: {}", module, level, e)))
}
