//! Configuration loading and analysis service resolution
//!
//! Settings resolve in priority order:
//! 1. Command-line argument (highest priority)
//! 2. Environment variable
//! 3. TOML config file
//! 4. Compiled default (fallback)
//!
//! A missing TOML file is never fatal when it was not explicitly requested;
//! the client logs the fact and continues with compiled defaults.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Default analysis service base URL (the analysis backend binds port 5001)
pub const DEFAULT_SERVICE_URL: &str = "http://localhost:5001";

/// Primary analysis endpoint path
pub const DEFAULT_UPLOAD_PATH: &str = "/upload";

/// Training-storage endpoint path
pub const DEFAULT_TRAINING_PATH: &str = "/store_for_training";

/// Matches the analysis backend's worker timeout
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 120;

/// Hard ceiling on accepted video size (100 MiB)
pub const MAX_UPLOAD_BYTES: u64 = 100 * 1024 * 1024;

/// Environment variable overriding the service URL
pub const SERVICE_URL_ENV: &str = "DFD_SERVICE_URL";

/// Environment variable pointing at a TOML config file
pub const CONFIG_PATH_ENV: &str = "DFD_CONFIG";

/// Configuration file contents
///
/// Every field is optional; absent values fall through to the next tier.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TomlConfig {
    /// Base URL of the analysis service, e.g. `http://localhost:5001`
    #[serde(default)]
    pub service_url: Option<String>,

    /// Path of the analysis endpoint (default `/upload`)
    #[serde(default)]
    pub upload_path: Option<String>,

    /// Path of the training-storage endpoint (default `/store_for_training`)
    #[serde(default)]
    pub training_path: Option<String>,

    /// Whole-request timeout in seconds
    #[serde(default)]
    pub request_timeout_secs: Option<u64>,

    /// Lower size limit for uploads; values above 100 MiB are ignored
    #[serde(default)]
    pub max_file_size_bytes: Option<u64>,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log file path (optional, logs to stderr if not specified)
    #[serde(default)]
    pub file: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file: None,
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Fully resolved client configuration
#[derive(Debug, Clone, PartialEq)]
pub struct ClientConfig {
    /// Base URL without trailing slash
    pub service_url: String,
    pub upload_path: String,
    pub training_path: String,
    pub request_timeout: Duration,
    /// Effective upload size limit, never above [`MAX_UPLOAD_BYTES`]
    pub max_file_size_bytes: u64,
    pub logging: LoggingConfig,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            service_url: DEFAULT_SERVICE_URL.to_string(),
            upload_path: DEFAULT_UPLOAD_PATH.to_string(),
            training_path: DEFAULT_TRAINING_PATH.to_string(),
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
            max_file_size_bytes: MAX_UPLOAD_BYTES,
            logging: LoggingConfig::default(),
        }
    }
}

impl ClientConfig {
    /// Full URL of the analysis endpoint
    pub fn upload_url(&self) -> String {
        join_url(&self.service_url, &self.upload_path)
    }

    /// Full URL of the training-storage endpoint
    pub fn training_url(&self) -> String {
        join_url(&self.service_url, &self.training_path)
    }

    /// Absolute URL for a resource the service referenced by path
    ///
    /// Frame images come back as service-relative paths such as
    /// `/static/frames/frame_0.jpg`; absolute URLs are returned unchanged.
    pub fn resource_url(&self, reference: &str) -> String {
        if reference.starts_with("http://") || reference.starts_with("https://") {
            return reference.to_string();
        }
        if reference.starts_with('/') {
            join_url(&self.service_url, reference)
        } else {
            join_url(&self.service_url, &format!("/{}", reference))
        }
    }

    /// Merge a TOML config over compiled defaults
    pub fn from_toml(toml_config: &TomlConfig) -> Result<Self> {
        let mut config = Self::default();

        if let Some(url) = &toml_config.service_url {
            config.service_url = normalize_service_url(url)?;
        }
        if let Some(path) = &toml_config.upload_path {
            config.upload_path = normalize_endpoint_path(path)?;
        }
        if let Some(path) = &toml_config.training_path {
            config.training_path = normalize_endpoint_path(path)?;
        }
        if let Some(secs) = toml_config.request_timeout_secs {
            if secs == 0 {
                return Err(Error::Config(
                    "request_timeout_secs must be greater than zero".to_string(),
                ));
            }
            config.request_timeout = Duration::from_secs(secs);
        }
        if let Some(limit) = toml_config.max_file_size_bytes {
            if limit > MAX_UPLOAD_BYTES {
                warn!(
                    requested = limit,
                    ceiling = MAX_UPLOAD_BYTES,
                    "max_file_size_bytes above the 100 MiB ceiling, keeping the ceiling"
                );
            } else {
                config.max_file_size_bytes = limit;
            }
        }
        config.logging = toml_config.logging.clone();

        Ok(config)
    }
}

/// Resolves [`ClientConfig`] from CLI, environment, TOML and defaults
#[derive(Debug, Clone, Default)]
pub struct ConfigResolver {
    cli_service_url: Option<String>,
    cli_config_path: Option<PathBuf>,
}

impl ConfigResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Service URL given on the command line
    pub fn with_service_url(mut self, url: Option<String>) -> Self {
        self.cli_service_url = url;
        self
    }

    /// Config file given on the command line
    pub fn with_config_path(mut self, path: Option<PathBuf>) -> Self {
        self.cli_config_path = path;
        self
    }

    /// Resolve the effective configuration
    ///
    /// An explicitly requested config file (CLI or `DFD_CONFIG`) must exist
    /// and parse. The per-user default file is optional.
    pub fn resolve(&self) -> Result<ClientConfig> {
        let toml_config = self.load_toml()?;
        let mut config = ClientConfig::from_toml(&toml_config)?;

        // Priority 1: Command-line argument
        if let Some(url) = &self.cli_service_url {
            config.service_url = normalize_service_url(url)?;
            info!(service_url = %config.service_url, "Service URL from command line");
            return Ok(config);
        }

        // Priority 2: Environment variable
        if let Ok(url) = std::env::var(SERVICE_URL_ENV) {
            if !url.trim().is_empty() {
                config.service_url = normalize_service_url(&url)?;
                info!(service_url = %config.service_url, "Service URL from {}", SERVICE_URL_ENV);
                return Ok(config);
            }
        }

        // Priority 3/4: TOML value already merged, otherwise compiled default
        debug!(service_url = %config.service_url, "Service URL from config file or default");
        Ok(config)
    }

    fn load_toml(&self) -> Result<TomlConfig> {
        if let Some(path) = &self.cli_config_path {
            return load_toml_config(path);
        }

        if let Ok(path) = std::env::var(CONFIG_PATH_ENV) {
            if !path.trim().is_empty() {
                return load_toml_config(Path::new(&path));
            }
        }

        match default_config_path() {
            Some(path) if path.exists() => load_toml_config(&path),
            Some(path) => {
                debug!(path = %path.display(), "No config file found, using defaults");
                Ok(TomlConfig::default())
            }
            None => {
                warn!("Could not determine config directory, using defaults");
                Ok(TomlConfig::default())
            }
        }
    }
}

/// Per-user config file location (`~/.config/dfd/config.toml` on Linux)
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("dfd").join("config.toml"))
}

/// Read and parse a TOML config file
pub fn load_toml_config(path: &Path) -> Result<TomlConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        Error::Config(format!("Read config {} failed: {}", path.display(), e))
    })?;
    let config = toml::from_str(&content).map_err(|e| {
        Error::Config(format!("Parse config {} failed: {}", path.display(), e))
    })?;
    info!(path = %path.display(), "Loaded config file");
    Ok(config)
}

/// Validate scheme and strip trailing slashes
pub fn normalize_service_url(url: &str) -> Result<String> {
    let trimmed = url.trim();
    let host = trimmed
        .strip_prefix("http://")
        .or_else(|| trimmed.strip_prefix("https://"))
        .ok_or_else(|| {
            Error::Config(format!(
                "Service URL must start with http:// or https://, got '{}'",
                url
            ))
        })?;
    if host.trim_end_matches('/').is_empty() {
        return Err(Error::Config(format!("Service URL has no host: '{}'", url)));
    }
    Ok(trimmed.trim_end_matches('/').to_string())
}

fn normalize_endpoint_path(path: &str) -> Result<String> {
    let trimmed = path.trim();
    if trimmed.is_empty() {
        return Err(Error::Config("Endpoint path must not be empty".to_string()));
    }
    if trimmed.starts_with('/') {
        Ok(trimmed.to_string())
    } else {
        Ok(format!("/{}", trimmed))
    }
}

fn join_url(base: &str, path: &str) -> String {
    format!("{}{}", base.trim_end_matches('/'), path)
}
