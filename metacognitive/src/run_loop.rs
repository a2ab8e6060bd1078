//! The perpetual background loop itself.

use std::path::PathBuf;
use std::sync::Arc;

use chrono::Utc;
use thane_core::{AgentRequest, AgentRunner};
use tokio::sync::{Mutex, Notify};
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::config::MetacognitiveConfig;
use crate::sleep::{compute_sleep, roll_dice};
use crate::state_file::read_capped;
use crate::tools::{MetacognitiveTools, NextSleepRegister};

const HINT_SOURCE: &str = "source";
const HINT_SUPERVISOR: &str = "supervisor";
const HINT_LOCAL_ONLY: &str = "local_only";
const HINT_QUALITY_FLOOR: &str = "quality_floor";
const HINT_MISSION: &str = "mission";
const HINT_DELEGATION_GATING: &str = "delegation_gating";

struct Inner {
    config: MetacognitiveConfig,
    runner: Arc<dyn AgentRunner>,
    register: NextSleepRegister,
    running: Mutex<bool>,
    handle: Mutex<Option<JoinHandle<()>>>,
    notify: Notify,
}

/// The Metacognitive Loop. `Start` launches a background task;
/// `Stop` cancels it and waits for it to drain. Both are idempotent and safe
/// to call in any order.
#[derive(Clone)]
pub struct MetacognitiveLoop {
    inner: Arc<Inner>,
}

impl MetacognitiveLoop {
    pub fn new(config: MetacognitiveConfig, runner: Arc<dyn AgentRunner>) -> Self {
        Self {
            inner: Arc::new(Inner {
                config,
                runner,
                register: NextSleepRegister::new(),
                running: Mutex::new(false),
                handle: Mutex::new(None),
                notify: Notify::new(),
            }),
        }
    }

    /// The tool handle to wire into the concrete agent runtime's tool
    /// registry before `start` is called, scoped to this loop via closure.
    pub fn tools(&self) -> MetacognitiveTools {
        MetacognitiveTools::new(
            self.inner.register.clone(),
            self.inner.config.state_file.clone(),
            self.inner.config.min_sleep,
            self.inner.config.max_sleep,
        )
    }

    /// Launches the background task. Idempotent.
    pub async fn start(&self) {
        if !self.inner.config.enabled {
            info!("metacognitive loop disabled by config, not starting");
            return;
        }

        let mut running = self.inner.running.lock().await;
        if *running {
            return;
        }
        *running = true;

        let loop_self = self.clone();
        let handle = tokio::spawn(async move {
            loop_self.run().await;
        });
        *self.inner.handle.lock().await = Some(handle);
        info!("metacognitive loop started");
    }

    async fn run(&self) {
        loop {
            if !*self.inner.running.lock().await {
                return;
            }

            self.run_iteration().await;

            if !*self.inner.running.lock().await {
                return;
            }

            let sleep_for = self.next_sleep().await;
            tokio::select! {
                _ = tokio::time::sleep(sleep_for) => {}
                _ = self.inner.notify.notified() => {
                    return;
                }
            }
        }
    }

    /// One iteration of the protocol.
    async fn run_iteration(&self) {
        self.inner.register.clear().await;

        let is_supervisor = roll_dice(self.inner.config.supervisor_probability);

        let state_content = match read_capped(&self.inner.config.state_file) {
            Ok(c) => c,
            Err(e) => {
                warn!(error = %e, "metacognitive: state file read failed, treating as empty");
                String::new()
            }
        };

        let prompt = build_prompt(&state_content, is_supervisor);
        let hints = build_hints(&self.inner.config, is_supervisor);
        let conversation_id = format!("metacog-{}", Utc::now().timestamp_millis());

        let request = AgentRequest {
            conversation_id: conversation_id.clone(),
            content: prompt,
            hints,
        };

        match self.inner.runner.run(request, None).await {
            Ok(response) => {
                info!(%conversation_id, model = %response.model, is_supervisor, "metacognitive iteration completed");
            }
            Err(e) => {
                warn!(%conversation_id, error = %e, "metacognitive iteration failed");
            }
        }
    }

    /// Sleep computation for the next cycle.
    async fn next_sleep(&self) -> std::time::Duration {
        let config = &self.inner.config;
        let chosen = self
            .inner
            .register
            .get()
            .await
            .unwrap_or(config.default_sleep);

        let rand_val: f64 = rand::random();
        let d = compute_sleep(chosen, config.min_sleep, config.max_sleep, config.jitter, rand_val);
        d.to_std().unwrap_or(std::time::Duration::from_secs(60))
    }

    /// Cancels the background task and waits for it to finish. Safe to call
    /// repeatedly or before `start`.
    pub async fn stop(&self) {
        {
            let mut running = self.inner.running.lock().await;
            if !*running {
                return;
            }
            *running = false;
        }
        self.inner.notify.notify_waiters();

        let handle = self.inner.handle.lock().await.take();
        if let Some(handle) = handle {
            let _ = handle.await;
        }
        info!("metacognitive loop stopped");
    }
}

/// Prompt template is stable text external to this spec; this is the
/// minimal shape that carries state and the supervisor/normal variant flag.
fn build_prompt(state_content: &str, is_supervisor: bool) -> String {
    let variant = if is_supervisor { "supervisor" } else { "normal" };
    format!(
        "You are Thane's metacognitive attention cycle ({variant} pass).\n\n\
         Current state:\n{state_content}\n\n\
         Reflect, act if warranted, and call update_metacognitive_state and \
         set_next_sleep as appropriate before ending the turn."
    )
}

fn build_hints(config: &MetacognitiveConfig, is_supervisor: bool) -> std::collections::HashMap<String, String> {
    let quality_floor = if is_supervisor {
        config.supervisor_quality_floor
    } else {
        config.quality_floor
    };

    let mut hints = std::collections::HashMap::new();
    hints.insert(HINT_SOURCE.to_string(), "metacognitive".to_string());
    hints.insert(HINT_SUPERVISOR.to_string(), is_supervisor.to_string());
    hints.insert(
        HINT_LOCAL_ONLY.to_string(),
        (!is_supervisor).to_string(),
    );
    hints.insert(HINT_QUALITY_FLOOR.to_string(), quality_floor.to_string());
    hints.insert(HINT_MISSION.to_string(), "metacognitive".to_string());
    hints.insert(HINT_DELEGATION_GATING.to_string(), "disabled".to_string());
    hints
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use thane_core::{AgentResponse, AgentRunnerError};

    struct CountingRunner {
        calls: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl AgentRunner for CountingRunner {
        async fn run(
            &self,
            _request: AgentRequest,
            _stream_cb: Option<tokio::sync::mpsc::Sender<String>>,
        ) -> Result<AgentResponse, AgentRunnerError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(AgentResponse::default())
        }
    }

    fn test_config(dir: &std::path::Path) -> MetacognitiveConfig {
        MetacognitiveConfig {
            enabled: true,
            state_file: dir.join("state.md"),
            min_sleep: chrono::Duration::milliseconds(10),
            max_sleep: chrono::Duration::milliseconds(20),
            default_sleep: chrono::Duration::milliseconds(15),
            jitter: 0.0,
            supervisor_probability: 0.0,
            quality_floor: 5,
            supervisor_quality_floor: 8,
        }
    }

    #[tokio::test]
    async fn start_is_idempotent_and_runs_iterations() {
        let dir = tempfile::tempdir().unwrap();
        let calls = Arc::new(AtomicUsize::new(0));
        let runner = Arc::new(CountingRunner { calls: calls.clone() });
        let loop_ = MetacognitiveLoop::new(test_config(dir.path()), runner);

        loop_.start().await;
        loop_.start().await; // idempotent

        tokio::time::sleep(std::time::Duration::from_millis(80)).await;
        loop_.stop().await;

        assert!(calls.load(Ordering::SeqCst) >= 1);
    }

    #[tokio::test]
    async fn stop_before_start_is_noop() {
        let dir = tempfile::tempdir().unwrap();
        let runner = Arc::new(CountingRunner {
            calls: Arc::new(AtomicUsize::new(0)),
        });
        let loop_ = MetacognitiveLoop::new(test_config(dir.path()), runner);
        loop_.stop().await;
        loop_.stop().await;
    }

    #[tokio::test]
    async fn disabled_config_never_runs() {
        let dir = tempfile::tempdir().unwrap();
        let calls = Arc::new(AtomicUsize::new(0));
        let runner = Arc::new(CountingRunner { calls: calls.clone() });
        let mut config = test_config(dir.path());
        config.enabled = false;
        let loop_ = MetacognitiveLoop::new(config, runner);

        loop_.start().await;
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        loop_.stop().await;

        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn hints_reflect_supervisor_flag() {
        let dir = tempfile::tempdir().unwrap();
        let config = test_config(dir.path());
        let normal = build_hints(&config, false);
        assert_eq!(normal.get(HINT_LOCAL_ONLY).unwrap(), "true");
        assert_eq!(normal.get(HINT_QUALITY_FLOOR).unwrap(), "5");

        let supervisor = build_hints(&config, true);
        assert_eq!(supervisor.get(HINT_LOCAL_ONLY).unwrap(), "false");
        assert_eq!(supervisor.get(HINT_QUALITY_FLOOR).unwrap(), "8");
    }
}
