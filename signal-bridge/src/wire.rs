//! JSON-RPC 2.0 wire shapes for the signal-cli stdio daemon.

use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Serialize)]
pub struct RpcRequest {
    pub jsonrpc: &'static str,
    pub id: i64,
    pub method: String,
    pub params: Value,
}

impl RpcRequest {
    pub fn new(id: i64, method: impl Into<String>, params: Value) -> Self {
        Self {
            jsonrpc: "2.0",
            id,
            method: method.into(),
            params,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct RpcError {
    pub code: i64,
    pub message: String,
}

impl std::fmt::Display for RpcError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "rpc error {}: {}", self.code, self.message)
    }
}

/// One line of newline-delimited JSON from the subprocess's stdout. May be a
/// response (carries `id`) or a notification (carries `method`, no `id`).
#[derive(Debug, Deserialize)]
pub struct RpcFrame {
    #[serde(default)]
    pub id: Option<i64>,
    #[serde(default)]
    pub method: Option<String>,
    #[serde(default)]
    pub params: Option<Value>,
    #[serde(default)]
    pub result: Option<Value>,
    #[serde(default)]
    pub error: Option<RpcError>,
}

pub const NOTIFICATION_RECEIVE: &str = "receive";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_with_id_parses_as_response() {
        let raw = r#"{"jsonrpc":"2.0","id":3,"result":{"ok":true}}"#;
        let frame: RpcFrame = serde_json::from_str(raw).unwrap();
        assert_eq!(frame.id, Some(3));
        assert!(frame.method.is_none());
    }

    #[test]
    fn frame_with_method_parses_as_notification() {
        let raw = r#"{"jsonrpc":"2.0","method":"receive","params":{}}"#;
        let frame: RpcFrame = serde_json::from_str(raw).unwrap();
        assert!(frame.id.is_none());
        assert_eq!(frame.method.as_deref(), Some("receive"));
    }
}
