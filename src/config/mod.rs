//! Configuration values consumed by the orchestrator.
//!
//! The core only ever sees already-parsed [`GlobalConfig`] and [`SiteConfig`]
//! values. [`AppConfig`] bundles them with the notification settings and knows
//! how to load the whole document from the `CONFIG` environment variable or a
//! JSON file on disk.

use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

const DEFAULT_TIMEOUT_SECS: f64 = 30.0;
const DEFAULT_CONFIG_PATH: &str = "config.json";

/// Environment variable holding the full JSON document.
pub const CONFIG_ENV: &str = "CONFIG";
/// Environment variable pointing at the JSON file used when [`CONFIG_ENV`] is unset.
pub const CONFIG_PATH_ENV: &str = "CONFIG_PATH";

/// Errors raised while loading or interpreting configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("configuration file {path:?} could not be read: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("configuration is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("missing required option '{0}'")]
    MissingOption(String),
    #[error("invalid option '{key}': {reason}")]
    InvalidOption { key: String, reason: String },
}

/// Settings shared by every site for the duration of a run.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GlobalConfig {
    /// Per-request timeout in seconds.
    pub timeout: f64,
    /// Headers layered on top of the canonical browser header set.
    pub headers: HashMap<String, String>,
    pub log_level: Option<String>,
}

impl Default for GlobalConfig {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT_SECS,
            headers: HashMap::new(),
            log_level: None,
        }
    }
}

impl GlobalConfig {
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout.as_secs_f64();
        self
    }

    /// Request timeout; falls back to 30s when the configured value is not a
    /// positive, finite number of seconds.
    pub fn timeout(&self) -> Duration {
        Duration::try_from_secs_f64(self.timeout)
            .ok()
            .filter(|timeout| !timeout.is_zero())
            .unwrap_or_else(|| Duration::from_secs_f64(DEFAULT_TIMEOUT_SECS))
    }
}

/// One configured site: which plugin to use and its private options.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SiteConfig {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Plugin-specific options (credentials, cookies, OCR tuning...).
    #[serde(default)]
    pub config: Map<String, Value>,
}

impl SiteConfig {
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            name: None,
            config: Map::new(),
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_option(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.config.insert(key.into(), value.into());
        self
    }

    /// Name reported in results; defaults to the site type.
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.kind)
    }

    /// String option, if present and a string.
    pub fn option_str(&self, key: &str) -> Option<&str> {
        self.config.get(key).and_then(Value::as_str)
    }

    pub fn require_str(&self, key: &str) -> Result<&str, ConfigError> {
        self.option_str(key)
            .filter(|value| !value.is_empty())
            .ok_or_else(|| ConfigError::MissingOption(key.to_string()))
    }

    /// Deserialize a nested option section, `None` when absent.
    pub fn section<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, ConfigError> {
        match self.config.get(key) {
            None | Some(Value::Null) => Ok(None),
            Some(value) => serde_json::from_value(value.clone())
                .map(Some)
                .map_err(|err| ConfigError::InvalidOption {
                    key: key.to_string(),
                    reason: err.to_string(),
                }),
        }
    }

    /// Pre-supplied session cookies from the `cookies` mapping. Non-string
    /// values are rendered as JSON text.
    pub fn cookies(&self) -> Vec<(String, String)> {
        let Some(Value::Object(cookies)) = self.config.get("cookies") else {
            return Vec::new();
        };

        cookies
            .iter()
            .map(|(name, value)| {
                let value = match value {
                    Value::String(text) => text.clone(),
                    other => other.to_string(),
                };
                (name.clone(), value)
            })
            .collect()
    }
}

/// Telegram delivery credentials.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TelegramConfig {
    pub bot_token: Option<String>,
    pub chat_id: Option<String>,
}

/// Recipient list, either a JSON array or one comma-separated string.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Recipients {
    List(Vec<String>),
    Joined(String),
}

impl Recipients {
    pub fn parse(joined: &str) -> Self {
        Self::Joined(joined.to_string())
    }

    /// Non-empty, trimmed addresses in order.
    pub fn addresses(&self) -> Vec<String> {
        let raw: Vec<&str> = match self {
            Self::List(list) => list.iter().map(String::as_str).collect(),
            Self::Joined(joined) => joined.split(',').collect(),
        };
        raw.into_iter()
            .map(str::trim)
            .filter(|address| !address.is_empty())
            .map(str::to_string)
            .collect()
    }
}

/// SMTP delivery settings. Unset fields fall back to the `EMAIL_*`
/// environment variables.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EmailConfig {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub user: Option<String>,
    pub password: Option<String>,
    pub recipients: Option<Recipients>,
}

/// Which result sinks are enabled.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct NotificationConfig {
    pub email_enabled: bool,
    pub email: EmailConfig,
    pub telegram_enabled: bool,
    pub telegram: TelegramConfig,
}

/// Full configuration document.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub global: GlobalConfig,
    pub sites: Vec<SiteConfig>,
    pub notification: NotificationConfig,
}

/// Where the configuration document is read from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigSource {
    /// The JSON text held in [`CONFIG_ENV`].
    Inline,
    File(PathBuf),
}

impl ConfigSource {
    /// `CONFIG` when set, otherwise the file named by `CONFIG_PATH`
    /// (default `config.json`).
    pub fn from_env() -> Self {
        Self::select(
            std::env::var_os(CONFIG_ENV).is_some(),
            std::env::var(CONFIG_PATH_ENV).ok(),
        )
    }

    fn select(inline: bool, path: Option<String>) -> Self {
        if inline {
            Self::Inline
        } else {
            Self::File(path.unwrap_or_else(|| DEFAULT_CONFIG_PATH.into()).into())
        }
    }
}

impl fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Inline => write!(f, "${CONFIG_ENV}"),
            Self::File(path) => write!(f, "{}", path.display()),
        }
    }
}

impl AppConfig {
    pub fn from_json(text: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&contents)
    }

    pub fn load(source: &ConfigSource) -> Result<Self, ConfigError> {
        match source {
            ConfigSource::Inline => {
                let inline = std::env::var(CONFIG_ENV).map_err(|err| ConfigError::InvalidOption {
                    key: CONFIG_ENV.to_string(),
                    reason: err.to_string(),
                })?;
                Self::from_json(&inline)
            }
            ConfigSource::File(path) => Self::from_path(path),
        }
    }

    /// Load from wherever [`ConfigSource::from_env`] points.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::load(&ConfigSource::from_env())
    }
}
