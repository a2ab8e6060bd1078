//! Stub implementations of the external collaborator traits.
//!
//! The real agent runtime, contact book, and session store live outside
//! this repository's scope. These stand in until a concrete implementation
//! is wired in.

use std::sync::Arc;

use async_trait::async_trait;
use thane_core::{
    AgentRequest, AgentResponse, AgentRunner, AgentRunnerError, ContactResolver, RuntimeStats, SessionRotator,
};
use tracing::debug;

/// Echoes the request content back as the response. Exercises every
/// subsystem's dispatch path without a real model behind it.
pub struct EchoAgentRunner {
    stats: Arc<RuntimeStats>,
}

impl EchoAgentRunner {
    pub fn new(stats: Arc<RuntimeStats>) -> Self {
        Self { stats }
    }
}

#[async_trait]
impl AgentRunner for EchoAgentRunner {
    async fn run(
        &self,
        request: AgentRequest,
        stream_cb: Option<tokio::sync::mpsc::Sender<String>>,
    ) -> Result<AgentResponse, AgentRunnerError> {
        debug!(conversation_id = %request.conversation_id, "echo agent runner invoked");
        self.stats.record_request();
        if let Some(cb) = stream_cb {
            let _ = cb.send(request.content.clone()).await;
        }
        Ok(AgentResponse {
            content: request.content,
            model: "stub-echo".to_string(),
            tools_used: Default::default(),
        })
    }
}

/// No session store is wired in; every rotation request reports "nothing to
/// rotate".
pub struct NullSessionRotator;

#[async_trait]
impl SessionRotator for NullSessionRotator {
    async fn rotate_idle_session(&self, _conversation_id: &str) -> bool {
        false
    }
}

/// No contact book is wired in; every phone number resolves unnamed.
pub struct NullContactResolver;

#[async_trait]
impl ContactResolver for NullContactResolver {
    async fn resolve_phone(&self, _phone: &str) -> (Option<String>, bool) {
        (None, false)
    }
}
