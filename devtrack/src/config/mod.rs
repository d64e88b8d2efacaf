//! Configuration system for the `devtrack` client.
//!
//! Supports layered configuration with the following priority (highest first):
//! 1. CLI arguments
//! 2. Environment variables (via clap `env` attribute)
//! 3. TOML config file (`~/.config/devtrack/config.toml`)
//! 4. Compiled defaults
//!
//! Missing config file is not an error (defaults are used). An explicit
//! `--config` path that doesn't exist is an error.

use std::path::{Path, PathBuf};
use std::time::Duration;

use url::Url;

use crate::app::Command;
use crate::auth::FileTokenStore;

/// Errors that can occur when loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read the configuration file.
    #[error("failed to read config file {path}: {source}")]
    ReadFile {
        /// Path that was attempted.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// Failed to parse the TOML configuration.
    #[error("failed to parse config file: {0}")]
    ParseToml(#[from] toml::de::Error),

    /// The API base URL is not a valid absolute URL.
    #[error("invalid API base URL {url:?}: {source}")]
    InvalidUrl {
        /// Value that was rejected.
        url: String,
        /// Parse failure.
        source: url::ParseError,
    },

    /// The API base URL cannot carry path segments (e.g. `mailto:`).
    #[error("API base URL {url:?} cannot be used as a base for request paths")]
    CannotBeBase {
        /// Value that was rejected.
        url: String,
    },

    /// A page size was configured as zero.
    #[error("{key} must be at least 1")]
    ZeroPageSize {
        /// Config key holding the zero.
        key: &'static str,
    },
}

// ---------------------------------------------------------------------------
// TOML file structs (all fields Option for partial overrides)
// ---------------------------------------------------------------------------

/// Top-level TOML config file structure.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
struct ConfigFile {
    api: ApiFileConfig,
    session: SessionFileConfig,
    ui: UiFileConfig,
}

/// `[api]` section of the config file.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
struct ApiFileConfig {
    base_url: Option<String>,
    timeout_secs: Option<u64>,
    projects_page_size: Option<u32>,
    dashboard_page_size: Option<u32>,
}

/// `[session]` section of the config file.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
struct SessionFileConfig {
    token_file: Option<PathBuf>,
}

/// `[ui]` section of the config file.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
struct UiFileConfig {
    date_format: Option<String>,
}

// ---------------------------------------------------------------------------
// Resolved configuration (concrete types, all fields populated)
// ---------------------------------------------------------------------------

/// Default API root.
pub const DEFAULT_BASE_URL: &str = "http://localhost:5000/api";

/// Fully resolved client configuration.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    // -- API --
    /// Root URL of the REST API.
    pub base_url: Url,
    /// Per-request timeout.
    pub timeout: Duration,
    /// Page size of the projects view fetch.
    pub projects_page_size: u32,
    /// Page size of the dashboard and task-form project picker fetch.
    pub dashboard_page_size: u32,

    // -- Session --
    /// File holding the session token.
    pub token_file: PathBuf,

    // -- UI --
    /// Date display format string (chrono).
    pub date_format: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            timeout: Duration::from_secs(30),
            projects_page_size: 50,
            dashboard_page_size: 100,
            token_file: default_token_file(),
            date_format: "%d/%m/%Y".to_string(),
        }
    }
}

impl ClientConfig {
    /// Load configuration by merging CLI args, env vars, and a TOML file.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the explicit config file cannot be read
    /// or parsed, if the resolved base URL is invalid or cannot be a base,
    /// or if a page size is zero.
    pub fn load(cli: &CliArgs) -> Result<Self, ConfigError> {
        let file = load_config_file(cli.config.as_deref())?;
        Self::resolve(cli, &file)
    }

    /// Resolve a `ClientConfig` from CLI args and a parsed config file.
    ///
    /// Priority: CLI > file > default.
    fn resolve(cli: &CliArgs, file: &ConfigFile) -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let base_url = match cli.api_url.as_ref().or(file.api.base_url.as_ref()) {
            Some(raw) => parse_base_url(raw)?,
            None => defaults.base_url,
        };

        Ok(Self {
            base_url,
            timeout: file
                .api
                .timeout_secs
                .map_or(defaults.timeout, Duration::from_secs),
            projects_page_size: page_size(
                "projects_page_size",
                file.api.projects_page_size,
                defaults.projects_page_size,
            )?,
            dashboard_page_size: page_size(
                "dashboard_page_size",
                file.api.dashboard_page_size,
                defaults.dashboard_page_size,
            )?,
            token_file: cli
                .token_file
                .clone()
                .or_else(|| file.session.token_file.clone())
                .unwrap_or(defaults.token_file),
            date_format: cli
                .date_format
                .clone()
                .or_else(|| file.ui.date_format.clone())
                .unwrap_or(defaults.date_format),
        })
    }
}

/// CLI arguments parsed by clap.
#[derive(clap::Parser, Debug, Default)]
#[command(version, about = "Project and task tracking client")]
pub struct CliArgs {
    /// Root URL of the REST API.
    #[arg(long, env = "DEVTRACK_API_URL", global = true)]
    pub api_url: Option<String>,

    /// Path to config file (default: `~/.config/devtrack/config.toml`).
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// File holding the session token.
    #[arg(long, env = "DEVTRACK_TOKEN_FILE", global = true)]
    pub token_file: Option<PathBuf>,

    /// Date display format (chrono format string).
    #[arg(long, global = true)]
    pub date_format: Option<String>,

    /// Answer yes to confirmation prompts.
    #[arg(short, long, global = true)]
    pub yes: bool,

    /// Log level filter (trace, debug, info, warn, error).
    #[arg(long, default_value = "info", env = "DEVTRACK_LOG", global = true)]
    pub log_level: String,

    /// Path to log file (default: `$TMPDIR/devtrack.log`).
    #[arg(long, global = true)]
    pub log_file: Option<PathBuf>,

    /// What to do. Shows the dashboard when omitted.
    #[command(subcommand)]
    pub command: Option<Command>,
}

// ---------------------------------------------------------------------------
// Internal helpers
// ---------------------------------------------------------------------------

fn default_base_url() -> Url {
    Url::parse(DEFAULT_BASE_URL).unwrap_or_else(|_| unreachable!("default base URL is valid"))
}

fn default_token_file() -> PathBuf {
    FileTokenStore::default_path().unwrap_or_else(|| std::env::temp_dir().join("devtrack-token"))
}

fn parse_base_url(raw: &str) -> Result<Url, ConfigError> {
    let url = Url::parse(raw).map_err(|source| ConfigError::InvalidUrl {
        url: raw.to_string(),
        source,
    })?;
    if url.cannot_be_a_base() {
        return Err(ConfigError::CannotBeBase {
            url: raw.to_string(),
        });
    }
    Ok(url)
}

fn page_size(key: &'static str, value: Option<u32>, default: u32) -> Result<u32, ConfigError> {
    match value {
        Some(0) => Err(ConfigError::ZeroPageSize { key }),
        Some(size) => Ok(size),
        None => Ok(default),
    }
}

/// Load and parse a TOML config file.
///
/// If `explicit_path` is `Some`, the file must exist (error if not).
/// If `explicit_path` is `None`, the default path is tried and missing file
/// is treated as empty config.
fn load_config_file(explicit_path: Option<&Path>) -> Result<ConfigFile, ConfigError> {
    let path = if let Some(p) = explicit_path {
        let contents = std::fs::read_to_string(p).map_err(|e| ConfigError::ReadFile {
            path: p.to_path_buf(),
            source: e,
        })?;
        return Ok(toml::from_str(&contents)?);
    } else {
        let Some(config_dir) = dirs::config_dir() else {
            return Ok(ConfigFile::default());
        };
        config_dir.join("devtrack").join("config.toml")
    };

    match std::fs::read_to_string(&path) {
        Ok(contents) => Ok(toml::from_str(&contents)?),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(ConfigFile::default()),
        Err(e) => Err(ConfigError::ReadFile { path, source: e }),
    }
}
