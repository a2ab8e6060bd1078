//! Subprocess JSON-RPC client for the signal-cli daemon.

use std::collections::HashMap;
use std::process::Stdio;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use thane_core::Envelope;
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::{mpsc, oneshot, Mutex};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::wire::{RpcError, RpcFrame, RpcRequest, NOTIFICATION_RECEIVE};

/// Read buffer for the subprocess's stdout.
const STDOUT_BUFFER_BYTES: usize = 1024 * 1024;
/// Inbound notification channel capacity.
const INBOUND_CHANNEL_CAPACITY: usize = 64;
/// Grace period before SIGKILL on shutdown.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("spawn signal-cli subprocess: {0}")]
    Spawn(std::io::Error),
    #[error("serialize request: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error(transparent)]
    Rpc(RpcError),
    #[error("subprocess exited")]
    SubprocessExited,
    #[error("call cancelled")]
    Cancelled,
}

struct ClientInner {
    stdin_tx: Mutex<Option<mpsc::Sender<Vec<u8>>>>,
    pending: Mutex<HashMap<i64, oneshot::Sender<Result<Value, RpcError>>>>,
    next_id: AtomicI64,
    /// Cancelled once the read loop observes EOF or a read error.
    exited: CancellationToken,
    child: Mutex<Child>,
}

/// Long-lived JSON-RPC client wrapping a signal-cli subprocess.
#[derive(Clone)]
pub struct SignalClient {
    inner: Arc<ClientInner>,
}

impl SignalClient {
    /// Spawns `binary args...` in JSON-RPC stdio mode and returns the client
    /// plus the receiving half of the inbound-notification channel.
    pub fn spawn(binary: &str, args: &[String]) -> Result<(Self, mpsc::Receiver<Envelope>), ClientError> {
        let mut cmd = Command::new(binary);
        cmd.args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        let mut child = cmd.spawn().map_err(ClientError::Spawn)?;
        let stdin = child.stdin.take().expect("piped stdin");
        let stdout = child.stdout.take().expect("piped stdout");
        let stderr = child.stderr.take().expect("piped stderr");

        let pending: Arc<Mutex<HashMap<i64, oneshot::Sender<Result<Value, RpcError>>>>> =
            Arc::new(Mutex::new(HashMap::new()));
        let exited = CancellationToken::new();
        let (inbound_tx, inbound_rx) = mpsc::channel(INBOUND_CHANNEL_CAPACITY);
        let (stdin_tx, mut stdin_rx) = mpsc::channel::<Vec<u8>>(64);

        // Writer task: serializes writes to the subprocess's stdin.
        tokio::spawn(async move {
            let mut stdin = stdin;
            while let Some(bytes) = stdin_rx.recv().await {
                if let Err(e) = stdin.write_all(&bytes).await {
                    warn!(error = %e, "signal client: stdin write failed");
                    break;
                }
                if let Err(e) = stdin.flush().await {
                    warn!(error = %e, "signal client: stdin flush failed");
                    break;
                }
            }
            let _ = stdin.shutdown().await;
        });

        // Reader task: demultiplexes responses and `receive` notifications.
        {
            let pending = pending.clone();
            let exited = exited.clone();
            tokio::spawn(async move {
                let mut lines = BufReader::with_capacity(STDOUT_BUFFER_BYTES, stdout).lines();
                loop {
                    match lines.next_line().await {
                        Ok(Some(line)) => {
                            if line.trim().is_empty() {
                                continue;
                            }
                            handle_frame(&line, &pending, &inbound_tx).await;
                        }
                        Ok(None) => {
                            info!("signal client: stdout closed, subprocess exited");
                            break;
                        }
                        Err(e) => {
                            warn!(error = %e, "signal client: stdout read error");
                            break;
                        }
                    }
                }
                fail_all_pending(&pending).await;
                exited.cancel();
            });
        }

        // Stderr drain.
        tokio::spawn(async move {
            let mut lines = BufReader::new(stderr).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                if !line.trim().is_empty() {
                    debug!(target: "signal_cli_stderr", "{line}");
                }
            }
        });

        let client = Self {
            inner: Arc::new(ClientInner {
                stdin_tx: Mutex::new(Some(stdin_tx)),
                pending,
                next_id: AtomicI64::new(1),
                exited,
                child: Mutex::new(child),
            }),
        };

        Ok((client, inbound_rx))
    }

    /// `call(ctx, method, params)`. Returns early if `cancel` is
    /// already cancelled; otherwise races the reply, caller cancellation, and
    /// subprocess exit.
    pub async fn call(
        &self,
        cancel: &CancellationToken,
        method: &str,
        params: Value,
    ) -> Result<Value, ClientError> {
        if cancel.is_cancelled() {
            return Err(ClientError::Cancelled);
        }
        if self.inner.exited.is_cancelled() {
            return Err(ClientError::SubprocessExited);
        }

        let id = self.inner.next_id.fetch_add(1, Ordering::SeqCst);
        let (tx, rx) = oneshot::channel();

        {
            // Registers the reply channel while writing so request issuance
            // stays serialized.
            let mut pending = self.inner.pending.lock().await;
            let request = RpcRequest::new(id, method, params);
            let mut bytes = serde_json::to_vec(&request)?;
            bytes.push(b'\n');

            let stdin_tx = self.inner.stdin_tx.lock().await;
            let Some(stdin_tx) = stdin_tx.as_ref() else {
                return Err(ClientError::SubprocessExited);
            };
            pending.insert(id, tx);
            if stdin_tx.send(bytes).await.is_err() {
                pending.remove(&id);
                return Err(ClientError::SubprocessExited);
            }
        }

        tokio::select! {
            _ = cancel.cancelled() => {
                self.inner.pending.lock().await.remove(&id);
                Err(ClientError::Cancelled)
            }
            _ = self.inner.exited.cancelled() => {
                self.inner.pending.lock().await.remove(&id);
                Err(ClientError::SubprocessExited)
            }
            result = rx => {
                match result {
                    Ok(Ok(value)) => Ok(value),
                    Ok(Err(e)) => Err(ClientError::Rpc(e)),
                    Err(_) => Err(ClientError::SubprocessExited),
                }
            }
        }
    }

    pub fn is_exited(&self) -> bool {
        self.inner.exited.is_cancelled()
    }

    /// Closes stdin and waits up to 5s for the subprocess to exit, otherwise
    /// kills it.
    pub async fn shutdown(&self) {
        *self.inner.stdin_tx.lock().await = None;

        let waited = tokio::time::timeout(SHUTDOWN_GRACE, self.inner.exited.cancelled()).await;
        if waited.is_err() {
            warn!("signal client: subprocess did not exit within grace period, killing");
            let mut child = self.inner.child.lock().await;
            let _ = child.kill().await;
        }
    }
}

async fn handle_frame(
    line: &str,
    pending: &Arc<Mutex<HashMap<i64, oneshot::Sender<Result<Value, RpcError>>>>>,
    inbound_tx: &mpsc::Sender<Envelope>,
) {
    let frame: RpcFrame = match serde_json::from_str(line) {
        Ok(f) => f,
        Err(e) => {
            warn!(error = %e, "signal client: malformed frame, ignoring");
            return;
        }
    };

    if let Some(id) = frame.id {
        let mut pending = pending.lock().await;
        if let Some(tx) = pending.remove(&id) {
            let result = match frame.error {
                Some(e) => Err(e),
                None => Ok(frame.result.unwrap_or(Value::Null)),
            };
            let _ = tx.send(result);
        }
        return;
    }

    if frame.method.as_deref() == Some(NOTIFICATION_RECEIVE) {
        let Some(params) = frame.params else { return };
        let envelope = match params.get("envelope").cloned() {
            Some(v) => v,
            None => params,
        };
        match serde_json::from_value::<Envelope>(envelope) {
            Ok(envelope) => {
                if inbound_tx.try_send(envelope).is_err() {
                    warn!("signal client: inbound channel full, dropping notification");
                }
            }
            Err(e) => warn!(error = %e, "signal client: malformed receive envelope"),
        }
    }
}

async fn fail_all_pending(pending: &Arc<Mutex<HashMap<i64, oneshot::Sender<Result<Value, RpcError>>>>>) {
    let mut pending = pending.lock().await;
    for (_, tx) in pending.drain() {
        let _ = tx.send(Err(RpcError {
            code: -1,
            message: "subprocess exited".to_string(),
        }));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn call_against_nonexistent_binary_fails_to_spawn() {
        let result = SignalClient::spawn("definitely-not-a-real-binary-xyz", &[]);
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn call_after_shutdown_reports_subprocess_exited() {
        // `cat` echoes stdin to stdout; no valid JSON-RPC frames will ever
        // arrive, but the process itself is real, letting us exercise
        // shutdown without depending on signal-cli being installed.
        let (client, _rx) = SignalClient::spawn("cat", &[]).unwrap();
        client.shutdown().await;

        tokio::time::sleep(Duration::from_millis(50)).await;
        let cancel = CancellationToken::new();
        let result = client.call(&cancel, "send", Value::Null).await;
        assert!(matches!(result, Err(ClientError::SubprocessExited)));
    }

    #[tokio::test]
    async fn call_with_already_cancelled_token_returns_immediately() {
        let (client, _rx) = SignalClient::spawn("cat", &[]).unwrap();
        let cancel = CancellationToken::new();
        cancel.cancel();
        let result = client.call(&cancel, "send", Value::Null).await;
        assert!(matches!(result, Err(ClientError::Cancelled)));
        client.shutdown().await;
    }
}
