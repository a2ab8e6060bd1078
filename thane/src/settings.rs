//! Typed views over the opaque config sections this binary actually reads.
//! `thane_config::Config` carries `agent` and the Signal subprocess block
//! only as passthrough `serde_yaml::Value` (neither is a shape the shared
//! config crate pins down), so the binary deserializes the pieces it needs
//! here with conservative defaults.

use serde::Deserialize;

/// `agent:` section — the Router's construction-time tunables.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AgentSettings {
    pub default_model: String,
    pub local_first: bool,
    pub max_audit: usize,
}

impl Default for AgentSettings {
    fn default() -> Self {
        Self {
            default_model: "default".to_string(),
            local_first: false,
            max_audit: router::DEFAULT_MAX_AUDIT,
        }
    }
}

/// Signal subprocess settings. Not among the shared config's typed
/// top-level keys; resolved from an opaque `signal:` block when present,
/// matching how the rest of `config.extra` is treated as passthrough.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SignalSettings {
    pub enabled: bool,
    pub binary: String,
    pub args: Vec<String>,
    pub rate_limit: u32,
    pub idle_timeout_secs: u64,
    pub attachments_src_dir: std::path::PathBuf,
    pub attachments_dest_dir: std::path::PathBuf,
    pub max_attachment_bytes: u64,
}

impl Default for SignalSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            binary: "signal-cli".to_string(),
            args: vec!["jsonRpc".to_string()],
            rate_limit: 20,
            idle_timeout_secs: 30 * 60,
            attachments_src_dir: std::path::PathBuf::from("/var/lib/signal-cli/attachments"),
            attachments_dest_dir: std::path::PathBuf::from("attachments"),
            max_attachment_bytes: 25 * 1024 * 1024,
        }
    }
}

/// Metacognitive Loop settings. Like `signal`, not among the shared
/// config's typed top-level keys; resolved the same opaque-section way.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MetacognitiveSettings {
    pub enabled: bool,
    pub state_file: std::path::PathBuf,
    pub min_sleep: String,
    pub max_sleep: String,
    pub default_sleep: String,
    pub jitter: f64,
    pub supervisor_probability: f64,
    pub quality_floor: u8,
    pub supervisor_quality_floor: u8,
}

impl Default for MetacognitiveSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            state_file: std::path::PathBuf::from("metacognitive.md"),
            min_sleep: "2m".to_string(),
            max_sleep: "30m".to_string(),
            default_sleep: "10m".to_string(),
            jitter: 0.2,
            supervisor_probability: 0.1,
            quality_floor: 5,
            supervisor_quality_floor: 8,
        }
    }
}

/// Pulls a named opaque section out of `extra`, falling back to `T::default`
/// when absent or malformed rather than failing startup over a section this
/// binary merely consumes best-effort.
pub fn section<T: for<'de> Deserialize<'de> + Default>(
    extra: &std::collections::HashMap<String, serde_yaml::Value>,
    key: &str,
) -> T {
    extra
        .get(key)
        .and_then(|v| serde_yaml::from_value(v.clone()).ok())
        .unwrap_or_default()
}
