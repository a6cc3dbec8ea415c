//! Configuration loading and root folder resolution
//!
//! Bootstrap settings come from a small TOML file; everything that may
//! change at runtime lives in the `settings` table (see [`crate::db::settings`]).

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Environment variable overriding the root folder
pub const ROOT_FOLDER_ENV: &str = "CGM_ROOT_FOLDER";

/// Database file name inside the root folder
pub const DATABASE_FILE_NAME: &str = "cgm.db";

pub const DEFAULT_PORT: u16 = 5780;
pub const DEFAULT_BIND_ADDRESS: &str = "127.0.0.1";

/// Bootstrap configuration loaded from `<config dir>/cgm/<module>.toml`
///
/// Every field is optional in the file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TomlConfig {
    #[serde(default)]
    pub root_folder: Option<PathBuf>,

    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_bind_address")]
    pub bind_address: String,

    #[serde(default)]
    pub logging: LoggingConfig,

    #[serde(default)]
    pub workbook: WorkbookConfig,
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_bind_address() -> String {
    DEFAULT_BIND_ADDRESS.to_string()
}

impl Default for TomlConfig {
    fn default() -> Self {
        Self {
            root_folder: None,
            port: DEFAULT_PORT,
            bind_address: default_bind_address(),
            logging: LoggingConfig::default(),
            workbook: WorkbookConfig::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// `tracing` filter directive, e.g. `info` or `cgm_ui=debug`
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

/// Proxy that fetches a target URL passed as a query parameter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProxyConfig {
    pub base: String,
    #[serde(default = "default_proxy_param")]
    pub param: String,
}

fn default_proxy_param() -> String {
    "url".to_string()
}

/// Meeting workbook scraper settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkbookConfig {
    #[serde(default = "default_workbook_base_url")]
    pub base_url: String,

    /// Language path segment between the host and the workbook path
    #[serde(default = "default_workbook_language")]
    pub language: String,

    /// Tried in order after the direct request fails
    #[serde(default)]
    pub proxies: Vec<ProxyConfig>,

    #[serde(default = "default_workbook_timeout")]
    pub timeout_secs: u64,
}

fn default_workbook_base_url() -> String {
    "https://wol.jw.org".to_string()
}

fn default_workbook_language() -> String {
    "en/wol/meetings/r1/lp-e".to_string()
}

fn default_workbook_timeout() -> u64 {
    10
}

impl Default for WorkbookConfig {
    fn default() -> Self {
        Self {
            base_url: default_workbook_base_url(),
            language: default_workbook_language(),
            proxies: Vec::new(),
            timeout_secs: default_workbook_timeout(),
        }
    }
}

/// Platform defaults used when nothing else is configured
#[derive(Debug, Clone)]
pub struct CompiledDefaults {
    pub root_folder: PathBuf,
    pub log_level: String,
}

impl CompiledDefaults {
    pub fn for_current_platform() -> Self {
        let root_folder = dirs::data_local_dir()
            .map(|d| d.join("cgm"))
            .unwrap_or_else(|| PathBuf::from("./cgm_data"));
        Self {
            root_folder,
            log_level: default_log_level(),
        }
    }
}

/// Path of the TOML file for `module_name`, if the platform has a config dir
pub fn config_file_path(module_name: &str) -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("cgm").join(format!("{}.toml", module_name)))
}

/// Load a TOML config file
///
/// A missing file is not an error: a warning is logged and defaults are
/// returned. A file that exists but does not parse is [`Error::Config`].
pub fn load_toml_config(path: &Path) -> Result<TomlConfig> {
    match read_config_file(path)? {
        ConfigFile::Loaded(config) => Ok(config),
        ConfigFile::Missing => {
            warn!("Config file {} not found, using defaults", path.display());
            Ok(TomlConfig::default())
        }
    }
}

/// A config file lookup, kept apart from logging so callers can report it
/// once tracing is up
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigFile {
    Loaded(TomlConfig),
    Missing,
}

impl ConfigFile {
    pub fn into_config(self) -> TomlConfig {
        match self {
            ConfigFile::Loaded(config) => config,
            ConfigFile::Missing => TomlConfig::default(),
        }
    }
}

/// Read and parse `path` without logging; a missing file is not an error
pub fn read_config_file(path: &Path) -> Result<ConfigFile> {
    let content = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(ConfigFile::Missing),
        Err(e) => return Err(e.into()),
    };

    toml::from_str(&content)
        .map(ConfigFile::Loaded)
        .map_err(|e| Error::Config(format!("Invalid config file {}: {}", path.display(), e)))
}

/// Resolves the root folder: CLI argument, then `CGM_ROOT_FOLDER`, then the
/// module's TOML file, then the platform default
#[derive(Debug, Clone)]
pub struct RootFolderResolver {
    module_name: String,
    cli_arg: Option<PathBuf>,
    config_path: Option<PathBuf>,
}

impl RootFolderResolver {
    pub fn new(module_name: &str) -> Self {
        Self {
            module_name: module_name.to_string(),
            cli_arg: None,
            config_path: None,
        }
    }

    pub fn with_cli_arg(mut self, path: Option<PathBuf>) -> Self {
        self.cli_arg = path;
        self
    }

    /// Use this TOML file instead of the module's default location
    pub fn with_config_path(mut self, path: Option<PathBuf>) -> Self {
        self.config_path = path;
        self
    }

    fn toml_root_folder(&self) -> Option<PathBuf> {
        let path = self
            .config_path
            .clone()
            .or_else(|| config_file_path(&self.module_name))?;
        let content = std::fs::read_to_string(&path).ok()?;
        match toml::from_str::<TomlConfig>(&content) {
            Ok(config) => config.root_folder,
            Err(e) => {
                warn!("Ignoring unparseable config {}: {}", path.display(), e);
                None
            }
        }
    }

    /// Never fails; falls through to [`CompiledDefaults`]
    pub fn resolve(&self) -> PathBuf {
        if let Some(path) = &self.cli_arg {
            debug!("Root folder from command line: {}", path.display());
            return path.clone();
        }

        if let Ok(path) = std::env::var(ROOT_FOLDER_ENV) {
            if !path.trim().is_empty() {
                debug!("Root folder from {}: {}", ROOT_FOLDER_ENV, path);
                return PathBuf::from(path);
            }
        }

        if let Some(path) = self.toml_root_folder() {
            debug!("Root folder from config file: {}", path.display());
            return path;
        }

        CompiledDefaults::for_current_platform().root_folder
    }
}

/// Creates the root folder and locates the database within it
#[derive(Debug, Clone)]
pub struct RootFolderInitializer {
    root_folder: PathBuf,
}

impl RootFolderInitializer {
    pub fn new(root_folder: PathBuf) -> Self {
        Self { root_folder }
    }

    pub fn root_folder(&self) -> &Path {
        &self.root_folder
    }

    /// Idempotent; creates intermediate directories
    pub fn ensure_directory_exists(&self) -> Result<()> {
        std::fs::create_dir_all(&self.root_folder)?;
        Ok(())
    }

    pub fn database_path(&self) -> PathBuf {
        self.root_folder.join(DATABASE_FILE_NAME)
    }

    pub fn database_exists(&self) -> bool {
        self.database_path().exists()
    }
}
