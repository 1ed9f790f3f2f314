//! Configuration file loading for dataverse-batch.
//!
//! The file is TOML, read from `$DATAVERSE_BATCH_CONFIG` or
//! `~/.dataverse-batch/config.toml`:
//!
//! ```toml
//! [environment]
//! url = "https://contoso.crm.dynamics.com"
//! tenant_id = "00000000-0000-0000-0000-000000000000"
//! client_id = "11111111-1111-1111-1111-111111111111"
//! client_secret = "${DATAVERSE_CLIENT_SECRET}"
//!
//! [batch]
//! batch_size = 200
//! parallel = true
//! workers = 4
//!
//! [logging]
//! level = "debug"
//! file = "/var/log/dataverse-batch.log"
//! ```
//!
//! String values may reference environment variables as `${NAME}`; unknown
//! variables expand to the empty string. An empty reference `${}` is kept
//! literally, and an unterminated `${` is left as written.

use std::path::{Path, PathBuf};
use std::{env, fs};

use dataverse_types::{
    ClientCredentials, ClientSecret, DEFAULT_API_VERSION, DEFAULT_AUTHORITY_HOST,
};
use serde::Deserialize;

/// Environment variable that overrides the config file location.
pub const CONFIG_PATH_ENV: &str = "DATAVERSE_BATCH_CONFIG";

pub const DEFAULT_BATCH_SIZE: usize = 100;
pub const DEFAULT_WORKERS: usize = 10;
pub const DEFAULT_PAUSE_MS: u64 = 1000;
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_LOG_LEVEL: &str = "info";

const fn default_batch_size() -> usize {
    DEFAULT_BATCH_SIZE
}

const fn default_workers() -> usize {
    DEFAULT_WORKERS
}

const fn default_pause_ms() -> u64 {
    DEFAULT_PAUSE_MS
}

const fn default_request_timeout_secs() -> u64 {
    DEFAULT_REQUEST_TIMEOUT_SECS
}

#[derive(Debug, Default, Deserialize)]
pub struct DataverseConfig {
    pub environment: Option<EnvironmentConfig>,
    #[serde(default)]
    pub batch: BatchConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config at {}: {source}", path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse config at {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
    #[error("missing required config value `{field}`")]
    Missing { field: &'static str },
}

#[derive(Default, Deserialize)]
pub struct EnvironmentConfig {
    /// Environment URL, e.g. `https://contoso.crm.dynamics.com`.
    pub url: Option<String>,
    pub tenant_id: Option<String>,
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    /// Identity host. Default: `https://login.microsoftonline.com`.
    pub authority_host: Option<String>,
    /// Web API version segment. Default: `v9.2`.
    pub api_version: Option<String>,
}

// Manual Debug impl to prevent leaking the client secret in logs.
impl std::fmt::Debug for EnvironmentConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EnvironmentConfig")
            .field("url", &self.url)
            .field("tenant_id", &self.tenant_id)
            .field("client_id", &self.client_id)
            .field(
                "client_secret",
                &if self.client_secret.is_some() {
                    "[REDACTED]"
                } else {
                    "None"
                },
            )
            .field("authority_host", &self.authority_host)
            .field("api_version", &self.api_version)
            .finish()
    }
}

impl EnvironmentConfig {
    /// Environment URL with env vars expanded and any trailing `/` removed.
    pub fn resource_url(&self) -> Result<String, ConfigError> {
        let url = required(self.url.as_deref(), "environment.url")?;
        Ok(url.trim_end_matches('/').to_string())
    }

    pub fn credentials(&self) -> Result<ClientCredentials, ConfigError> {
        Ok(ClientCredentials::new(
            required(self.tenant_id.as_deref(), "environment.tenant_id")?,
            required(self.client_id.as_deref(), "environment.client_id")?,
            ClientSecret::new(required(
                self.client_secret.as_deref(),
                "environment.client_secret",
            )?),
        ))
    }

    #[must_use]
    pub fn authority_host(&self) -> String {
        optional(self.authority_host.as_deref())
            .unwrap_or_else(|| DEFAULT_AUTHORITY_HOST.to_string())
            .trim_end_matches('/')
            .to_string()
    }

    #[must_use]
    pub fn api_version(&self) -> String {
        optional(self.api_version.as_deref()).unwrap_or_else(|| DEFAULT_API_VERSION.to_string())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct BatchConfig {
    /// Records per `$batch` request. Default: 100.
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    /// Send chunks concurrently. Default: false.
    #[serde(default)]
    pub parallel: bool,
    /// Concurrent workers when `parallel` is set. Default: 10.
    #[serde(default = "default_workers")]
    pub workers: usize,
    /// Pause between sequential chunks. Default: 1000ms, 0 disables.
    #[serde(default = "default_pause_ms")]
    pub pause_ms: u64,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            parallel: false,
            workers: DEFAULT_WORKERS,
            pause_ms: DEFAULT_PAUSE_MS,
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct LoggingConfig {
    /// Filter directive (`info`, `debug`, `dataverse_client=trace`, ...).
    pub level: Option<String>,
    /// Append logs to this file instead of stderr.
    pub file: Option<PathBuf>,
}

impl LoggingConfig {
    #[must_use]
    pub fn level(&self) -> String {
        optional(self.level.as_deref()).unwrap_or_else(|| DEFAULT_LOG_LEVEL.to_string())
    }
}

fn optional(value: Option<&str>) -> Option<String> {
    value
        .map(expand_env_vars)
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn required(value: Option<&str>, field: &'static str) -> Result<String, ConfigError> {
    optional(value).ok_or(ConfigError::Missing { field })
}

pub fn expand_env_vars(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut rest = value;

    while let Some(start) = rest.find("${") {
        let after = &rest[start + 2..];
        let Some(end) = after.find('}') else {
            break;
        };
        out.push_str(&rest[..start]);
        let var = &after[..end];
        if var.is_empty() {
            out.push_str("${}");
        } else {
            out.push_str(&env::var(var).unwrap_or_default());
        }
        rest = &after[end + 1..];
    }

    out.push_str(rest);
    out
}

impl DataverseConfig {
    /// Load from the default location. `Ok(None)` when no file exists.
    pub fn load() -> Result<Option<Self>, ConfigError> {
        let Some(path) = config_path() else {
            return Ok(None);
        };
        if !path.exists() {
            return Ok(None);
        }
        Self::load_from(&path).map(Some)
    }

    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let content = match fs::read_to_string(path) {
            Ok(content) => content,
            Err(err) => {
                tracing::warn!("Failed to read config at {:?}: {}", path, err);
                return Err(ConfigError::Read {
                    path: path.to_path_buf(),
                    source: err,
                });
            }
        };

        Self::parse(&content).map_err(|err| {
            tracing::warn!("Failed to parse config at {:?}: {}", path, err);
            ConfigError::Parse {
                path: path.to_path_buf(),
                source: err,
            }
        })
    }

    pub fn parse(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    pub fn environment(&self) -> Result<&EnvironmentConfig, ConfigError> {
        self.environment.as_ref().ok_or(ConfigError::Missing {
            field: "environment",
        })
    }
}

#[must_use]
pub fn config_path() -> Option<PathBuf> {
    if let Some(path) = env::var_os(CONFIG_PATH_ENV).filter(|p| !p.is_empty()) {
        return Some(PathBuf::from(path));
    }
    dirs::home_dir().map(|home| home.join(".dataverse-batch").join("config.toml"))
}
