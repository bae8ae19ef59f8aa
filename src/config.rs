use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::attachment::DEFAULT_EXTENSION;
use crate::gmail::client::DEFAULT_API_BASE_URL;
use crate::processor::{ExtractConfig, DEFAULT_CONTENT_TYPE};

#[derive(Debug, Clone)]
pub struct AccountConfig {
    pub user_id: String,
    pub token_command: String,
    pub api_base_url: String,
}

#[derive(Debug, Clone)]
pub struct FetchConfig {
    pub query: Option<String>,
    pub content_type: String,
    pub extension: String,
    pub output_dir: PathBuf,
    pub mark_read: bool,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub account: AccountConfig,
    pub fetch: FetchConfig,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config file: {0}")]
    Parse(String),
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawConfig {
    #[serde(default)]
    account: Option<RawAccountConfig>,
    #[serde(default)]
    fetch: RawFetchConfig,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawAccountConfig {
    #[serde(default = "default_user_id")]
    user_id: String,
    token_command: Option<String>,
    #[serde(default = "default_api_base_url")]
    api_base_url: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawFetchConfig {
    #[serde(default)]
    query: Option<String>,
    #[serde(default = "default_content_type")]
    content_type: String,
    #[serde(default = "default_extension")]
    extension: String,
    #[serde(default = "default_output_dir")]
    output_dir: PathBuf,
    #[serde(default = "default_mark_read")]
    mark_read: bool,
}

impl Default for RawFetchConfig {
    fn default() -> Self {
        Self {
            query: None,
            content_type: default_content_type(),
            extension: default_extension(),
            output_dir: default_output_dir(),
            mark_read: default_mark_read(),
        }
    }
}

fn default_user_id() -> String {
    "me".to_string()
}

fn default_api_base_url() -> String {
    DEFAULT_API_BASE_URL.to_string()
}

fn default_content_type() -> String {
    DEFAULT_CONTENT_TYPE.to_string()
}

fn default_extension() -> String {
    DEFAULT_EXTENSION.to_string()
}

fn default_output_dir() -> PathBuf {
    PathBuf::from(".")
}

fn default_mark_read() -> bool {
    true
}

impl Config {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path)?;
        Self::parse(&contents)
    }

    fn parse(contents: &str) -> Result<Self, ConfigError> {
        let raw: RawConfig =
            toml::from_str(contents).map_err(|e| ConfigError::Parse(e.to_string()))?;

        let account = raw
            .account
            .ok_or_else(|| ConfigError::Parse("missing [account] section".to_string()))?;
        let token_command = require_field(
            account.token_command,
            "missing token_command in [account]",
        )?;
        if account.user_id.is_empty() {
            return Err(ConfigError::Parse(
                "user_id in [account] must not be empty".to_string(),
            ));
        }

        let config = Config {
            account: AccountConfig {
                user_id: account.user_id,
                token_command,
                api_base_url: account.api_base_url,
            },
            fetch: FetchConfig {
                query: raw.fetch.query.filter(|q| !q.trim().is_empty()),
                content_type: raw.fetch.content_type,
                extension: raw.fetch.extension,
                output_dir: raw.fetch.output_dir,
                mark_read: raw.fetch.mark_read,
            },
        };
        config.fetch.validate()?;
        Ok(config)
    }

    /// Pipeline settings for a run. A run without a query would match the
    /// whole mailbox, so one is required.
    /// Rechecks the fetch settings, which command line overrides may have
    /// changed since loading.
    pub fn extract_config(&self) -> Result<ExtractConfig, ConfigError> {
        self.fetch.validate()?;
        let query = self
            .fetch
            .query
            .clone()
            .filter(|q| !q.trim().is_empty())
            .ok_or_else(|| {
                ConfigError::Parse(
                    "missing query (set query in [fetch] or pass --query)".to_string(),
                )
            })?;
        Ok(ExtractConfig {
            query,
            content_type: self.fetch.content_type.clone(),
            extension: self.fetch.extension.clone(),
            mark_read: self.fetch.mark_read,
        })
    }
}

impl FetchConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        if self.content_type.trim().is_empty() {
            return Err(ConfigError::Parse(
                "content_type in [fetch] must not be empty".to_string(),
            ));
        }
        if self.extension.is_empty() || self.extension.contains(['/', '\\', '.']) {
            return Err(ConfigError::Parse(format!(
                "invalid extension '{}' in [fetch]",
                self.extension
            )));
        }
        Ok(())
    }
}

fn require_field(value: Option<String>, err: &str) -> Result<String, ConfigError> {
    value
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| ConfigError::Parse(err.to_string()))
}

pub fn default_config_path() -> PathBuf {
    if let Ok(xdg) = std::env::var("XDG_CONFIG_HOME") {
        PathBuf::from(xdg)
            .join("gmail-attachments")
            .join("config.toml")
    } else if let Ok(home) = std::env::var("HOME") {
        PathBuf::from(home)
            .join(".config")
            .join("gmail-attachments")
            .join("config.toml")
    } else {
        PathBuf::from("config.toml")
    }
}
