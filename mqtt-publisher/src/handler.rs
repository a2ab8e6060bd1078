//! Inbound message dispatch: a
//! replaceable handler, rate limited at 100 msg/s, wrapped with panic
//! recovery.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::{debug, error};

/// Callback invoked for each inbound message admitted past the rate
/// limiter. Replace the default via `MqttPublisher::set_message_handler`.
pub trait MessageHandler: Send + Sync {
    fn handle(&self, topic: &str, payload: &[u8]);
}

/// Logs at debug level; the default installed when any subscription
/// filters are configured.
pub struct DefaultMessageHandler;

impl MessageHandler for DefaultMessageHandler {
    fn handle(&self, topic: &str, payload: &[u8]) {
        debug!(topic, bytes = payload.len(), "mqtt publisher: inbound message (no handler installed)");
    }
}

/// Swappable handler slot.
#[derive(Clone)]
pub struct HandlerSlot {
    handler: Arc<RwLock<Arc<dyn MessageHandler>>>,
}

impl HandlerSlot {
    pub fn new() -> Self {
        Self {
            handler: Arc::new(RwLock::new(Arc::new(DefaultMessageHandler))),
        }
    }

    pub async fn set(&self, handler: Arc<dyn MessageHandler>) {
        *self.handler.write().await = handler;
    }

    /// Dispatches to the current handler, recovering from any panic it
    /// raises.
    pub async fn dispatch(&self, topic: &str, payload: &[u8]) {
        let handler = self.handler.read().await.clone();
        let topic_owned = topic.to_string();
        let payload_owned = payload.to_vec();
        let result = std::panic::catch_unwind(AssertUnwindSafe(|| {
            handler.handle(&topic_owned, &payload_owned);
        }));
        if result.is_err() {
            error!(topic, "mqtt publisher: inbound message handler panicked, recovered");
        }
    }
}

impl Default for HandlerSlot {
    fn default() -> Self {
        Self::new()
    }
}
