//! Routing request/decision data model.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::model::Complexity;

/// Caller-declared urgency; `Interactive` biases toward faster models (§4.1.2).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Interactive,
    Background,
}

/// Closed set of recognized hint keys. Unrecognized
/// keys in a request's `hints` map are preserved but ignored by scoring.
pub mod hints {
    pub const CHANNEL: &str = "channel";
    pub const QUALITY_FLOOR: &str = "quality_floor";
    pub const MISSION: &str = "mission";
    pub const MODEL_PREFERENCE: &str = "model_preference";
    pub const LOCAL_ONLY: &str = "local_only";
    pub const PREFER_SPEED: &str = "prefer_speed";
}

/// One routing request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoutingRequest {
    pub query: String,
    pub context_size: u32,
    pub needs_tools: bool,
    pub tool_count: u32,
    pub priority: Priority,
    pub hints: HashMap<String, String>,
}

impl RoutingRequest {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            context_size: 0,
            needs_tools: false,
            tool_count: 0,
            priority: Priority::Interactive,
            hints: HashMap::new(),
        }
    }

    pub fn hint(&self, key: &str) -> Option<&str> {
        self.hints.get(key).map(|s| s.as_str())
    }
}

/// Decision written once per `Route` call.
///
/// Post-execution fields are `None` until `RecordOutcome` fills them in.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoutingDecision {
    pub request_id: Uuid,
    pub timestamp: DateTime<Utc>,

    pub query: String,
    pub context_size: u32,
    pub needs_tools: bool,
    pub tool_count: u32,
    pub priority: Priority,
    pub hints: HashMap<String, String>,

    pub complexity: Complexity,
    pub intent: String,

    /// Names of rules evaluated against every eligible candidate.
    pub rules_evaluated: Vec<String>,
    /// Names of rules that actually fired for the chosen model.
    pub rules_matched: Vec<String>,
    /// Integer score per eligible candidate, keyed by model name.
    pub scores: HashMap<String, i32>,

    pub chosen_model: String,
    pub reasoning: String,

    pub latency_ms: Option<u64>,
    pub tokens_used: Option<u32>,
    pub success: Option<bool>,
}
