//! Signal envelope and sender-state data model.

use std::collections::VecDeque;
use std::time::Instant;

use serde::{Deserialize, Serialize};

/// Top-level inbound frame from the signal-cli JSON-RPC daemon.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope {
    pub source: String,
    #[serde(default)]
    pub source_name: Option<String>,
    #[serde(default)]
    pub source_device: Option<u32>,
    pub timestamp: i64,
    #[serde(default)]
    pub data_message: Option<DataMessage>,
    #[serde(default)]
    pub typing: Option<serde_json::Value>,
    #[serde(default)]
    pub receipt: Option<serde_json::Value>,
    #[serde(default)]
    pub sync: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataMessage {
    pub timestamp: i64,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub expires_in: Option<u32>,
    #[serde(default)]
    pub view_once: bool,
    #[serde(default)]
    pub group_info: Option<GroupInfo>,
    #[serde(default)]
    pub reaction: Option<Reaction>,
    #[serde(default)]
    pub attachments: Vec<Attachment>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroupInfo {
    #[serde(rename = "groupId")]
    pub group_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Reaction {
    pub emoji: String,
    #[serde(rename = "targetAuthor")]
    pub target_author: String,
    #[serde(rename = "targetSentTimestamp")]
    pub target_sent_timestamp: i64,
    #[serde(default)]
    pub is_remove: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Attachment {
    pub id: String,
    #[serde(rename = "contentType", default)]
    pub content_type: Option<String>,
    #[serde(default)]
    pub filename: Option<String>,
    #[serde(default)]
    pub size: u64,
}

impl Envelope {
    /// Exactly one of message text, a non-empty attachment list, or a
    /// reaction makes an envelope actionable.
    pub fn is_actionable(&self) -> bool {
        match &self.data_message {
            None => false,
            Some(dm) => !dm.message.is_empty() || !dm.attachments.is_empty() || dm.reaction.is_some(),
        }
    }
}

/// Last inbound message seen from a sender, used for idle-session rotation
/// and reaction target resolution.
#[derive(Debug, Clone)]
pub struct LastInbound {
    pub signal_timestamp: i64,
    pub received_at: Instant,
}

/// Per-sender sliding-window admission record for rate limiting.
#[derive(Debug, Default)]
pub struct SenderState {
    /// Admission timestamps within roughly the last minute, oldest first.
    pub admissions: VecDeque<Instant>,
    pub last_inbound: Option<LastInbound>,
}
