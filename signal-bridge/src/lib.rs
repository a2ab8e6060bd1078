//! The Signal Bridge and Client: a long-lived JSON-RPC client
//! to the signal-cli daemon, plus the message-handling layer (rate
//! limiting, idle rotation, typing refresh, attachment staging, reactions).

mod bridge;
mod client;
mod rate_limit;
mod sanitize;
mod wire;

pub use bridge::{
    agent_already_sent, conversation_id_for, format_message, reaction_prompt, BridgeConfig,
    SignalBridge,
};
pub use client::{ClientError, SignalClient};
pub use rate_limit::RateLimiter;
pub use sanitize::{sanitize, sanitize_phone};
