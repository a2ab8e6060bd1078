//! External collaborator interfaces.
//!
//! Everything in this module is a trait boundary only: concrete
//! implementations (the real agent runtime, the contact book, the
//! various persistent stores, the web dashboard) live outside this
//! repository's scope. Subsystems depend on `Arc<dyn Trait>` so tests
//! can substitute stubs.

use std::collections::HashMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// A request handed to the agent runtime by any ingress (HTTP handler,
/// Signal bridge, Metacognitive Loop).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentRequest {
    pub conversation_id: String,
    pub content: String,
    /// Routing hints, forwarded to the Router via the caller's own request construction.
    pub hints: HashMap<String, String>,
}

/// Response from one agent turn.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AgentResponse {
    pub content: String,
    pub model: String,
    /// tool_name -> invocation count, used by the Signal Bridge to dedupe
    /// agent-sent replies.
    pub tools_used: HashMap<String, u32>,
}

/// `Run(ctx, request, stream_cb?) -> response`.
///
/// `stream_cb` is an optional channel for incremental output; callers
/// that don't need streaming pass `None`.
#[async_trait]
pub trait AgentRunner: Send + Sync {
    async fn run(
        &self,
        request: AgentRequest,
        stream_cb: Option<tokio::sync::mpsc::Sender<String>>,
    ) -> Result<AgentResponse, AgentRunnerError>;
}

#[derive(Debug, thiserror::Error)]
#[error("agent runner failed: {0}")]
pub struct AgentRunnerError(pub String);

/// `RotateIdleSession(convID) -> bool`; idempotent, `false` if no active
/// session.
#[async_trait]
pub trait SessionRotator: Send + Sync {
    async fn rotate_idle_session(&self, conversation_id: &str) -> bool;
}

/// `ResolvePhone(phone) -> (name, bool)`.
#[async_trait]
pub trait ContactResolver: Send + Sync {
    async fn resolve_phone(&self, phone: &str) -> (Option<String>, bool);
}

/// `Uptime`, `Version`, `DefaultModel`, `LastRequestTime`,
/// consumed by the MQTT Publisher's static sensors.
pub trait StatsSource: Send + Sync {
    fn uptime(&self) -> std::time::Duration;
    fn version(&self) -> String;
    fn default_model(&self) -> String;
    fn last_request_time(&self) -> Option<chrono::DateTime<chrono::Utc>>;
}

/// Minimal in-process `StatsSource`. No metrics backend is in scope for this
/// repository, so the `thane` binary wires this straight to the MQTT
/// Publisher; `record_request` is called wherever an `AgentRequest` is
/// dispatched.
pub struct RuntimeStats {
    started_at: std::time::Instant,
    version: String,
    default_model: String,
    last_request: std::sync::Mutex<Option<chrono::DateTime<chrono::Utc>>>,
}

impl RuntimeStats {
    pub fn new(version: impl Into<String>, default_model: impl Into<String>) -> Self {
        Self {
            started_at: std::time::Instant::now(),
            version: version.into(),
            default_model: default_model.into(),
            last_request: std::sync::Mutex::new(None),
        }
    }

    pub fn record_request(&self) {
        *self.last_request.lock().expect("last_request mutex poisoned") = Some(chrono::Utc::now());
    }
}

impl StatsSource for RuntimeStats {
    fn uptime(&self) -> std::time::Duration {
        self.started_at.elapsed()
    }

    fn version(&self) -> String {
        self.version.clone()
    }

    fn default_model(&self) -> String {
        self.default_model.clone()
    }

    fn last_request_time(&self) -> Option<chrono::DateTime<chrono::Utc>> {
        *self.last_request.lock().expect("last_request mutex poisoned")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn runtime_stats_reports_no_request_until_recorded() {
        let stats = RuntimeStats::new("0.1.0", "local");
        assert!(stats.last_request_time().is_none());
        stats.record_request();
        assert!(stats.last_request_time().is_some());
    }

    #[test]
    fn runtime_stats_reports_configured_version_and_model() {
        let stats = RuntimeStats::new("1.2.3", "qwen-local");
        assert_eq!(stats.version(), "1.2.3");
        assert_eq!(stats.default_model(), "qwen-local");
    }
}
