//! Message handling: rate limiting,
//! the actionable filter, read receipts, idle-session rotation, typing
//! refresh, attachment staging, and reaction handling.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use thane_core::{
    AgentRequest, AgentRunner, Attachment, ContactResolver, DataMessage, Envelope, SessionRotator,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::client::SignalClient;
use crate::rate_limit::{RateLimiter, SWEEP_INTERVAL};
use crate::sanitize::sanitize;

/// Hard cap on one message-handling call.
const HANDLER_TIMEOUT: Duration = Duration::from_secs(5 * 60);
/// Typing indicator re-send cadence.
const TYPING_REFRESH_INTERVAL: Duration = Duration::from_secs(10);
/// Detached context budget for the typing-stop cleanup call.
const TYPING_STOP_BUDGET: Duration = Duration::from_secs(2);

const ATTACHMENT_DIR_PERMS: u32 = 0o750;
const ATTACHMENT_FILE_PERMS: u32 = 0o644;

/// Configuration for the message-handling side of the bridge.
#[derive(Debug, Clone)]
pub struct BridgeConfig {
    /// Admissions per sender per minute; 0 = unlimited.
    pub rate_limit: u32,
    /// Idle threshold past which a new message triggers session rotation;
    /// zero disables rotation.
    pub idle_timeout: Duration,
    pub attachments_src_dir: PathBuf,
    pub attachments_dest_dir: PathBuf,
    pub max_attachment_bytes: u64,
}

/// The Signal Bridge. Wraps a `SignalClient` with message
/// handling: rate limiting, actionable filtering, agent dispatch, replies.
pub struct SignalBridge {
    client: SignalClient,
    runner: Arc<dyn AgentRunner>,
    rotator: Option<Arc<dyn SessionRotator>>,
    contacts: Option<Arc<dyn ContactResolver>>,
    rate_limiter: RateLimiter,
    config: BridgeConfig,
}

impl SignalBridge {
    pub fn new(
        client: SignalClient,
        runner: Arc<dyn AgentRunner>,
        rotator: Option<Arc<dyn SessionRotator>>,
        contacts: Option<Arc<dyn ContactResolver>>,
        config: BridgeConfig,
    ) -> Self {
        Self {
            client,
            runner,
            rotator,
            contacts,
            rate_limiter: RateLimiter::new(config.rate_limit),
            config,
        }
    }

    /// Drains the inbound channel, spawning one handler per envelope, until
    /// the channel closes or `cancel` fires. Also runs the periodic sweep of
    /// stale sender bookkeeping.
    pub async fn run(
        self: Arc<Self>,
        mut inbound: tokio::sync::mpsc::Receiver<Envelope>,
        cancel: CancellationToken,
    ) {
        let sweeper = {
            let bridge = self.clone();
            let cancel = cancel.clone();
            tokio::spawn(async move {
                loop {
                    tokio::select! {
                        _ = tokio::time::sleep(SWEEP_INTERVAL) => bridge.rate_limiter.sweep().await,
                        _ = cancel.cancelled() => return,
                    }
                }
            })
        };

        loop {
            tokio::select! {
                envelope = inbound.recv() => {
                    let Some(envelope) = envelope else {
                        info!("signal bridge: inbound channel closed");
                        break;
                    };
                    let bridge = self.clone();
                    let handler_cancel = cancel.child_token();
                    tokio::spawn(async move {
                        let outcome = tokio::time::timeout(
                            HANDLER_TIMEOUT,
                            bridge.handle_envelope(envelope, handler_cancel),
                        )
                        .await;
                        if outcome.is_err() {
                            warn!("signal bridge: message handling exceeded 5 minute budget");
                        }
                    });
                }
                _ = cancel.cancelled() => {
                    info!("signal bridge: cancelled, stopping inbound loop");
                    break;
                }
            }
        }

        sweeper.abort();
    }

    async fn handle_envelope(&self, envelope: Envelope, cancel: CancellationToken) {
        if !envelope.is_actionable() {
            debug!("signal bridge: envelope not actionable, dropping");
            return;
        }

        let sender = envelope.source.clone();
        if !self.rate_limiter.admit(&sender).await {
            warn!(%sender, "signal bridge: rate limited, dropping message");
            return;
        }

        let Some(dm) = envelope.data_message.clone() else {
            return;
        };

        self.send_read_receipt(&sender, &dm, envelope.timestamp, &cancel).await;

        if let Some(reaction) = dm.reaction.clone() {
            if reaction.is_remove {
                debug!(%sender, "signal bridge: reaction removal, ignoring");
                return;
            }
            self.handle_reaction(&envelope, &dm, &cancel).await;
            return;
        }

        self.handle_message(&envelope, &dm, &cancel).await;
    }

    async fn send_read_receipt(&self, sender: &str, dm: &DataMessage, envelope_ts: i64, cancel: &CancellationToken) {
        let target_ts = if dm.timestamp != 0 { dm.timestamp } else { envelope_ts };
        let params = json!({
            "recipient": sender,
            "targetTimestamps": [target_ts],
            "type": "read",
        });
        if let Err(e) = self.client.call(cancel, "sendReceipt", params).await {
            debug!(%sender, error = %e, "signal bridge: best-effort read receipt failed");
        }
    }

    async fn handle_message(&self, envelope: &Envelope, dm: &DataMessage, cancel: &CancellationToken) {
        let sender = &envelope.source;
        let conversation_id = conversation_id_for(sender);

        if self.config.idle_timeout > Duration::ZERO {
            if let Some(rotator) = &self.rotator {
                if let Some(previous) = self.rate_limiter.last_inbound(sender).await {
                    if previous.received_at.elapsed() > self.config.idle_timeout {
                        let rotated = rotator.rotate_idle_session(&conversation_id).await;
                        debug!(%conversation_id, rotated, "signal bridge: idle rotation check");
                    }
                }
            }
        }
        self.rate_limiter.record_inbound(sender, dm.timestamp).await;

        let typing = self.start_typing_refresh(sender.clone(), cancel.clone());

        let display = self.display_name(sender, envelope.source_name.as_deref()).await;
        let group_id = dm.group_info.as_ref().map(|g| g.group_id.as_str());
        let attachment_lines = self.stage_attachments(&dm.attachments, dm.view_once);
        let content = format_message(
            &display,
            group_id,
            resolve_timestamp(dm.timestamp, envelope.timestamp),
            &attachment_lines,
            &dm.message,
        );

        let request = AgentRequest {
            conversation_id: conversation_id.clone(),
            content,
            hints: HashMap::new(),
        };

        let response = self.runner.run(request, None).await;
        typing.stop(sender.clone()).await;

        match response {
            Ok(response) => {
                if agent_already_sent(&response.tools_used) {
                    debug!(%conversation_id, "signal bridge: agent already replied, skipping bridge send");
                    return;
                }
                self.send_reply(sender, &response.content, cancel).await;
            }
            Err(e) => {
                warn!(%conversation_id, error = %e, "signal bridge: agent run failed, suppressing reply");
            }
        }
    }

    async fn handle_reaction(&self, envelope: &Envelope, dm: &DataMessage, cancel: &CancellationToken) {
        let sender = &envelope.source;
        let conversation_id = conversation_id_for(sender);
        let reaction = dm.reaction.as_ref().expect("checked by caller");

        let content = reaction_prompt(
            sender,
            &reaction.emoji,
            reaction.target_sent_timestamp,
            &reaction.target_author,
        );

        let mut hints = HashMap::new();
        hints.insert("event_type".to_string(), "reaction".to_string());
        hints.insert("reaction_emoji".to_string(), reaction.emoji.clone());
        hints.insert(
            "target_sent_timestamp".to_string(),
            reaction.target_sent_timestamp.to_string(),
        );

        let request = AgentRequest {
            conversation_id: conversation_id.clone(),
            content,
            hints,
        };

        match self.runner.run(request, None).await {
            Ok(response) => {
                if !agent_already_sent(&response.tools_used) {
                    self.send_reply(sender, &response.content, cancel).await;
                }
            }
            Err(e) => {
                warn!(%conversation_id, error = %e, "signal bridge: reaction handling failed");
            }
        }
    }

    async fn send_reply(&self, sender: &str, content: &str, cancel: &CancellationToken) {
        if content.is_empty() {
            return;
        }
        let params = json!({ "recipient": sender, "message": content });
        if let Err(e) = self.client.call(cancel, "send", params).await {
            warn!(%sender, error = %e, "signal bridge: failed to send reply");
        }
    }

    async fn display_name(&self, sender: &str, source_name: Option<&str>) -> String {
        if let Some(name) = source_name {
            return display_name_for(sender, Some(name));
        }
        if let Some(contacts) = &self.contacts {
            let (name, _known) = contacts.resolve_phone(sender).await;
            return display_name_for(sender, name.as_deref());
        }
        display_name_for(sender, None)
    }

    /// Copies each non-view-once, within-budget attachment from the source
    /// dir to the dest dir, returning description
    /// lines for the assembled message body. `view_once` is the containing
    /// message's flag, not a per-attachment one.
    fn stage_attachments(&self, attachments: &[Attachment], view_once: bool) -> Vec<String> {
        attachments
            .iter()
            .map(|a| self.stage_attachment(a, view_once))
            .collect()
    }

    fn stage_attachment(&self, attachment: &Attachment, view_once: bool) -> String {
        if view_once {
            return "[attachment not available: view-once]".to_string();
        }
        if attachment.size > self.config.max_attachment_bytes {
            return format!("[attachment skipped: {} exceeds size limit]", attachment_label(attachment));
        }

        let src = self.config.attachments_src_dir.join(&attachment.id);
        if !src.exists() {
            return format!("[attachment missing on disk: {}]", attachment_label(attachment));
        }

        let dest_dir = &self.config.attachments_dest_dir;
        if let Err(e) = ensure_dest_dir(dest_dir) {
            warn!(error = %e, "signal bridge: could not create attachment dest dir");
            return format!("[attachment copy failed: {}]", attachment_label(attachment));
        }

        let dest = dest_dir.join(attachment_filename(attachment));
        match std::fs::copy(&src, &dest) {
            Ok(_) => {
                set_file_perms(&dest);
                format!("[attachment: {}]", dest.display())
            }
            Err(e) => {
                warn!(error = %e, "signal bridge: attachment copy failed");
                format!("[attachment copy failed: {}]", attachment_label(attachment))
            }
        }
    }

    fn start_typing_refresh(&self, sender: String, cancel: CancellationToken) -> TypingRefreshHandle {
        let client = self.client.clone();
        let refresh_cancel = CancellationToken::new();
        let task_cancel = refresh_cancel.clone();
        tokio::spawn(async move {
            send_typing(&client, &sender, true, &cancel).await;
            loop {
                tokio::select! {
                    _ = tokio::time::sleep(TYPING_REFRESH_INTERVAL) => {
                        send_typing(&client, &sender, true, &cancel).await;
                    }
                    _ = task_cancel.cancelled() => return,
                }
            }
        });
        TypingRefreshHandle {
            cancel: refresh_cancel,
            client: self.client.clone(),
        }
    }
}

/// Handle returned by `start_typing_refresh`; `stop` cancels the refresh
/// loop and issues a typing-stop on a detached, short-budget context.
struct TypingRefreshHandle {
    cancel: CancellationToken,
    client: SignalClient,
}

impl TypingRefreshHandle {
    async fn stop(self, sender: String) {
        self.cancel.cancel();
        let detached = CancellationToken::new();
        let _ = tokio::time::timeout(
            TYPING_STOP_BUDGET,
            send_typing(&self.client, &sender, false, &detached),
        )
        .await;
    }
}

async fn send_typing(client: &SignalClient, sender: &str, start: bool, cancel: &CancellationToken) {
    let params = json!({ "recipient": sender, "stop": !start });
    if let Err(e) = client.call(cancel, "sendTyping", params).await {
        debug!(%sender, error = %e, "signal bridge: typing indicator call failed");
    }
}

fn ensure_dest_dir(dir: &Path) -> std::io::Result<()> {
    std::fs::create_dir_all(dir)?;
    set_dir_perms(dir);
    Ok(())
}

#[cfg(unix)]
fn set_dir_perms(dir: &Path) {
    use std::os::unix::fs::PermissionsExt;
    let _ = std::fs::set_permissions(dir, std::fs::Permissions::from_mode(ATTACHMENT_DIR_PERMS));
}

#[cfg(not(unix))]
fn set_dir_perms(_dir: &Path) {}

#[cfg(unix)]
fn set_file_perms(path: &Path) {
    use std::os::unix::fs::PermissionsExt;
    let _ = std::fs::set_permissions(path, std::fs::Permissions::from_mode(ATTACHMENT_FILE_PERMS));
}

#[cfg(not(unix))]
fn set_file_perms(_path: &Path) {}

fn attachment_filename(attachment: &Attachment) -> String {
    attachment
        .filename
        .clone()
        .unwrap_or_else(|| attachment.id.clone())
}

fn attachment_label(attachment: &Attachment) -> String {
    attachment
        .filename
        .clone()
        .unwrap_or_else(|| attachment.id.clone())
}

/// `"signal-"+sanitize(sender)`.
pub fn conversation_id_for(sender: &str) -> String {
    format!("signal-{}", sanitize(sender))
}

/// `sender` or `name (sender)` when a source name is present.
fn display_name_for(sender: &str, name: Option<&str>) -> String {
    match name {
        Some(name) if !name.is_empty() => format!("{name} ({sender})"),
        _ => sender.to_string(),
    }
}

fn resolve_timestamp(data_message_ts: i64, envelope_ts: i64) -> i64 {
    if data_message_ts != 0 {
        data_message_ts
    } else {
        envelope_ts
    }
}

/// Assembles the agent-facing message body: `"Signal message from <display> [ts:<ts>]:\n\n<attachment
/// lines>\n<text>"`, with `in group <gid>` prepended for group messages.
pub fn format_message(
    display: &str,
    group_id: Option<&str>,
    timestamp: i64,
    attachment_lines: &[String],
    text: &str,
) -> String {
    let group_prefix = match group_id {
        Some(gid) => format!("in group {gid} "),
        None => String::new(),
    };
    let attachments_block = attachment_lines.join("\n");
    format!("Signal message {group_prefix}from {display} [ts:{timestamp}]:\n\n{attachments_block}\n{text}")
}

/// Synthetic prompt for a reaction event.
pub fn reaction_prompt(sender: &str, emoji: &str, target_ts: i64, target_author: &str) -> String {
    format!("Signal reaction from {sender}: {emoji} on message [ts:{target_ts}] from {target_author}")
}

/// True if any tool name in `tools_used` ends in `signal_send_message` with
/// a non-zero count.
pub fn agent_already_sent(tools_used: &HashMap<String, u32>) -> bool {
    tools_used
        .iter()
        .any(|(name, count)| name.ends_with("signal_send_message") && *count > 0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn conversation_id_sanitizes_sender() {
        assert_eq!(conversation_id_for("+1 (555) 123-4567"), "signal-15551234567");
    }

    #[test]
    fn format_message_includes_timestamp_exactly_once() {
        let msg = format_message("alice", None, 123, &[], "hi there");
        assert_eq!(msg.matches("[ts:123]").count(), 1);
        assert!(msg.contains("from alice"));
        assert!(msg.ends_with("hi there"));
    }

    #[test]
    fn format_message_prefers_data_message_timestamp() {
        let ts = resolve_timestamp(42, 99);
        assert_eq!(ts, 42);
    }

    #[test]
    fn format_message_falls_back_to_envelope_timestamp() {
        let ts = resolve_timestamp(0, 99);
        assert_eq!(ts, 99);
    }

    #[test]
    fn format_message_prepends_group_marker() {
        let msg = format_message("alice", Some("grp1"), 1, &[], "hi");
        assert!(msg.contains("in group grp1"));
    }

    #[test]
    fn display_name_uses_name_and_sender_when_present() {
        assert_eq!(display_name_for("+15551234567", Some("Alice")), "Alice (+15551234567)");
    }

    #[test]
    fn display_name_falls_back_to_sender() {
        assert_eq!(display_name_for("+15551234567", None), "+15551234567");
    }

    #[test]
    fn agent_already_sent_matches_bare_tool_name() {
        let mut tools = HashMap::new();
        tools.insert("signal_send_message".to_string(), 1);
        assert!(agent_already_sent(&tools));
    }

    #[test]
    fn agent_already_sent_matches_prefixed_tool_name() {
        let mut tools = HashMap::new();
        tools.insert("mcp_signal_send_message".to_string(), 1);
        assert!(agent_already_sent(&tools));
    }

    #[test]
    fn agent_already_sent_false_when_count_zero() {
        let mut tools = HashMap::new();
        tools.insert("signal_send_message".to_string(), 0);
        assert!(!agent_already_sent(&tools));
    }

    #[test]
    fn agent_already_sent_false_when_absent() {
        assert!(!agent_already_sent(&HashMap::new()));
    }

    #[test]
    fn reaction_prompt_shape() {
        let prompt = reaction_prompt("+15551234567", "👍", 42, "+15550009999");
        assert!(prompt.contains("👍"));
        assert!(prompt.contains("[ts:42]"));
        assert!(prompt.contains("+15550009999"));
    }
}
