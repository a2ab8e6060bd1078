//! YAML configuration loading for Thane.
//!
//! Discovery order, recognized top-level keys, and validation rules are
//! defined here. Sections whose internal shape is never consumed
//! by the Router/Scheduler/Metacognitive Loop/MQTT Publisher
//! (`ollama_api`, `homeassistant`, `anthropic`, `embeddings`, `workspace`,
//! `shell_exec`, `talents_dir`, `persona_file`, `context`, `archive`,
//! `extraction`, `search`, `episodic`, `agent`) are carried as opaque
//! `serde_yaml::Value` so they round-trip without this crate needing to
//! understand them.

mod env_expand;
#[cfg(feature = "tracing-init")]
pub mod tracing_init;
mod validate;

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thane_core::ModelDescriptor;
use thiserror::Error;

pub use validate::ValidationError;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("no config file found in any discovery location")]
    NotFound,
    #[error("read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("parse config YAML: {0}")]
    Parse(#[from] serde_yaml::Error),
    #[error("invalid config: {0}")]
    Invalid(#[from] ValidationError),
}

/// `listen` top-level key: the OpenAI/Ollama-compatible HTTP ingress address.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListenConfig {
    #[serde(default = "default_host")]
    pub host: String,
    pub port: u16,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

/// `mqtt` top-level key.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MqttConfig {
    pub broker_url: String,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    pub device_name: String,
    #[serde(default = "default_discovery_prefix")]
    pub discovery_prefix: String,
    #[serde(default = "default_publish_interval")]
    pub publish_interval: u64,
    #[serde(default)]
    pub subscriptions: Vec<String>,
}

fn default_discovery_prefix() -> String {
    "homeassistant".to_string()
}

fn default_publish_interval() -> u64 {
    30
}

/// Top-level config document.
///
/// Fields the Router, Scheduler, Metacognitive Loop, and MQTT Publisher
/// consume directly are fully typed; everything else round-trips as an
/// opaque `serde_yaml::Value` under `extra`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub listen: ListenConfig,
    #[serde(default)]
    pub models: Vec<ModelDescriptor>,
    #[serde(default)]
    pub mqtt: Option<MqttConfig>,
    pub data_dir: PathBuf,
    #[serde(default = "default_timezone")]
    pub timezone: String,
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default = "default_log_format")]
    pub log_format: String,

    /// Opaque passthrough for out-of-scope sections: `ollama_api`, `homeassistant`, `anthropic`,
    /// `embeddings`, `workspace`, `shell_exec`, `talents_dir`,
    /// `persona_file`, `context`, `archive`, `extraction`, `search`,
    /// `episodic`, `agent`.
    #[serde(flatten)]
    pub extra: HashMap<String, serde_yaml::Value>,
}

fn default_timezone() -> String {
    "UTC".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

/// Discovery order: explicit path, then a fixed sequence of
/// well-known locations, first one that exists wins.
pub fn discover_path(explicit: Option<&Path>) -> Option<PathBuf> {
    if let Some(p) = explicit {
        return Some(p.to_path_buf());
    }

    let mut candidates: Vec<PathBuf> = vec![PathBuf::from("./config.yaml")];
    if let Some(home) = dirs::home_dir() {
        candidates.push(home.join("Thane/config.yaml"));
    }
    if let Some(config_dir) = dirs::config_dir() {
        candidates.push(config_dir.join("thane/config.yaml"));
    }
    candidates.push(PathBuf::from("/config/config.yaml"));
    candidates.push(PathBuf::from("/usr/local/etc/thane/config.yaml"));
    candidates.push(PathBuf::from("/etc/thane/config.yaml"));

    candidates.into_iter().find(|p| p.exists())
}

/// Loads, expands, parses, and validates the config file found via
/// `discover_path`. Environment-variable expansion (`${VAR}`) is applied to
/// the raw file text before YAML parsing.
pub fn load(explicit: Option<&Path>) -> Result<Config, ConfigError> {
    let path = discover_path(explicit).ok_or(ConfigError::NotFound)?;
    load_from_path(&path)
}

/// Loads a config from an exact path, skipping discovery. Used by callers
/// (and tests) that already know the path.
pub fn load_from_path(path: &Path) -> Result<Config, ConfigError> {
    let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let expanded = env_expand::expand(&raw);
    let config: Config = serde_yaml::from_str(&expanded)?;
    validate::validate(&config)?;
    Ok(config)
}
