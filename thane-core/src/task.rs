//! Scheduler data model: Task, Schedule, Payload, Execution.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// `schedule.kind`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Schedule {
    /// One-shot: fire once at `at`.
    At { at: DateTime<Utc> },
    /// Recurring every `every`, anchored to the task's `created_at`.
    Every {
        #[serde(with = "duration_seconds")]
        every: chrono::Duration,
    },
    /// Cron expression. May legitimately have no future run.
    Cron { expr: String },
}

mod duration_seconds {
    use chrono::Duration;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_i64(d.num_seconds())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        let secs = i64::deserialize(d)?;
        Ok(Duration::seconds(secs))
    }
}

/// `payload.kind`. `data` is arbitrary and interpreted externally.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Payload {
    pub kind: PayloadKind,
    #[serde(default)]
    pub data: HashMap<String, serde_json::Value>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PayloadKind {
    Wake,
    Service,
    Automation,
    Webhook,
}

/// A scheduled unit of work.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub id: String,
    pub name: String,
    pub schedule: Schedule,
    pub payload: Payload,
    pub enabled: bool,
    pub created_at: DateTime<Utc>,
    pub created_by: String,
    pub updated_at: DateTime<Utc>,
}

/// Lifecycle status of one `Execution`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionStatus {
    Pending,
    Running,
    Completed,
    Failed,
    Skipped,
}

/// One run of a `Task`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Execution {
    pub id: String,
    pub task_id: String,
    pub scheduled_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub status: ExecutionStatus,
    pub result: Option<String>,
}

/// Generates a UUIDv7 string, used for both `Task::id` and `Execution::id`
/// so ids sort lexicographically by creation time.
pub fn new_id() -> String {
    uuid::Uuid::now_v7().to_string()
}
