//! Configuration loading and resolution
//!
//! Every setting is resolved in the same priority order:
//! 1. Command-line argument (highest priority)
//! 2. Environment variable
//! 3. TOML config file
//! 4. Compiled default (fallback)

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Default Pl@ntNet v2 identify endpoint (project name is appended)
pub const DEFAULT_PLANTNET_BASE_URL: &str = "https://my-api.plantnet.org/v2/identify";

/// Default Pl@ntNet project ("all" floras)
pub const DEFAULT_PLANTNET_PROJECT: &str = "all";

/// Default HTTP listen port
pub const DEFAULT_PORT: u16 = 8000;

/// Default HTTP listen address
pub const DEFAULT_HOST: &str = "0.0.0.0";

/// File name of the knowledge document inside the data directory
pub const STORE_FILE_NAME: &str = "plants.json";

pub const ENV_API_KEY: &str = "PLANTNET_API_KEY";
pub const ENV_PROJECT: &str = "PLANTNET_PROJECT";
pub const ENV_MOCK_MODE: &str = "MOCK_MODE";
pub const ENV_BASE_URL: &str = "PLANTNET_BASE_URL";
pub const ENV_DATA_DIR: &str = "AYUR_DATA_DIR";
pub const ENV_HOST: &str = "AYUR_HOST";
pub const ENV_PORT: &str = "AYUR_PORT";

/// Contents of the optional TOML config file
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct TomlConfig {
    pub plantnet_api_key: Option<String>,
    pub plantnet_project: Option<String>,
    pub plantnet_base_url: Option<String>,
    pub mock_mode: Option<bool>,
    pub data_dir: Option<PathBuf>,
    pub host: Option<String>,
    pub port: Option<u16>,
}

/// Values supplied on the command line; `None` defers to lower tiers
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    pub plantnet_api_key: Option<String>,
    pub plantnet_project: Option<String>,
    pub plantnet_base_url: Option<String>,
    /// `--mock` forces mock mode; absence defers to env/TOML
    pub mock_mode: bool,
    pub data_dir: Option<PathBuf>,
    pub host: Option<String>,
    pub port: Option<u16>,
}

/// Fully resolved service configuration
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// Pl@ntNet credential; `None` when absent or blank
    pub plantnet_api_key: Option<String>,
    pub plantnet_project: String,
    pub plantnet_base_url: String,
    /// Explicit offline toggle
    pub mock_mode: bool,
    pub data_dir: PathBuf,
    pub host: String,
    pub port: u16,
}

impl ServiceConfig {
    /// Resolve configuration from CLI overrides, the process environment and TOML
    pub fn resolve(cli: &CliOverrides, toml_config: &TomlConfig) -> Result<Self> {
        let plantnet_api_key = non_blank(cli.plantnet_api_key.clone())
            .or_else(|| env_value(ENV_API_KEY))
            .or_else(|| non_blank(toml_config.plantnet_api_key.clone()));

        let plantnet_project = non_blank(cli.plantnet_project.clone())
            .or_else(|| env_value(ENV_PROJECT))
            .or_else(|| non_blank(toml_config.plantnet_project.clone()))
            .unwrap_or_else(|| DEFAULT_PLANTNET_PROJECT.to_string());

        let plantnet_base_url = non_blank(cli.plantnet_base_url.clone())
            .or_else(|| env_value(ENV_BASE_URL))
            .or_else(|| non_blank(toml_config.plantnet_base_url.clone()))
            .unwrap_or_else(|| DEFAULT_PLANTNET_BASE_URL.to_string());

        let mock_mode = if cli.mock_mode {
            true
        } else if let Ok(raw) = std::env::var(ENV_MOCK_MODE) {
            parse_flag(&raw)
        } else {
            toml_config.mock_mode.unwrap_or(false)
        };

        let data_dir = cli
            .data_dir
            .clone()
            .or_else(|| env_value(ENV_DATA_DIR).map(PathBuf::from))
            .or_else(|| toml_config.data_dir.clone())
            .unwrap_or_else(default_data_dir);

        let host = non_blank(cli.host.clone())
            .or_else(|| env_value(ENV_HOST))
            .or_else(|| non_blank(toml_config.host.clone()))
            .unwrap_or_else(|| DEFAULT_HOST.to_string());

        let port = match cli.port {
            Some(port) => port,
            None => match env_value(ENV_PORT) {
                Some(raw) => raw.parse::<u16>().map_err(|e| {
                    Error::Config(format!("{} must be a port number, got {:?}: {}", ENV_PORT, raw, e))
                })?,
                None => toml_config.port.unwrap_or(DEFAULT_PORT),
            },
        };

        Ok(Self {
            plantnet_api_key,
            plantnet_project,
            plantnet_base_url,
            mock_mode,
            data_dir,
            host,
            port,
        })
    }

    /// True when identification runs offline: explicit flag or no credential
    pub fn use_mock(&self) -> bool {
        self.mock_mode || self.plantnet_api_key.is_none()
    }

    /// Path of the knowledge document
    pub fn store_path(&self) -> PathBuf {
        self.data_dir.join(STORE_FILE_NAME)
    }
}

/// Load the TOML config file
///
/// An explicit path must exist and parse. Without one, the per-user default
/// location is tried and a missing file yields an empty config.
pub fn load_toml_config(explicit: Option<&Path>) -> Result<TomlConfig> {
    let path = match explicit {
        Some(path) => path.to_path_buf(),
        None => match default_config_path() {
            Some(path) if path.exists() => path,
            _ => {
                debug!("No TOML config file found, using environment and defaults");
                return Ok(TomlConfig::default());
            }
        },
    };

    let content = std::fs::read_to_string(&path)
        .map_err(|e| Error::Config(format!("Read {} failed: {}", path.display(), e)))?;
    let config = toml::from_str(&content)
        .map_err(|e| Error::Config(format!("Parse {} failed: {}", path.display(), e)))?;

    info!("Loaded config file: {}", path.display());
    Ok(config)
}

/// `~/.config/ayurdrishti/config.toml` (platform equivalent elsewhere)
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("ayurdrishti").join("config.toml"))
}

/// OS-dependent default data directory
fn default_data_dir() -> PathBuf {
    dirs::data_local_dir()
        .map(|d| d.join("ayurdrishti"))
        .unwrap_or_else(|| PathBuf::from("./data"))
}

/// `MOCK_MODE` is on only for a case-insensitive "true"
pub fn parse_flag(raw: &str) -> bool {
    raw.trim().eq_ignore_ascii_case("true")
}

fn env_value(name: &str) -> Option<String> {
    non_blank(std::env::var(name).ok())
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
