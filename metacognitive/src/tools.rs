//! Tools injected into the runner for the duration of one loop.
//!
//! Source behavior is ambiguous when `set_next_sleep` is called twice in one
//! iteration; we preserve the observed behavior of keeping the last write
//!.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{Duration, Utc};
use thiserror::Error;
use tokio::sync::Mutex;

use crate::duration_parse::parse_duration;
use crate::sleep::clamp;
use crate::state_file::{self, StateFileError};

#[derive(Debug, Error)]
pub enum SetNextSleepError {
    #[error("could not parse duration {0:?}")]
    InvalidDuration(String),
}

/// Holds the next-iteration sleep duration chosen by the LLM's
/// `set_next_sleep` tool call, if any. Cleared at the start of every
/// iteration.
#[derive(Clone)]
pub struct NextSleepRegister {
    value: Arc<Mutex<Option<Duration>>>,
}

impl NextSleepRegister {
    pub fn new() -> Self {
        Self {
            value: Arc::new(Mutex::new(None)),
        }
    }

    pub async fn clear(&self) {
        *self.value.lock().await = None;
    }

    /// `set_next_sleep(duration, reason?)`: parses, clamps to `[min, max]`,
    /// and stores. A second call in the same iteration overwrites the first.
    pub async fn set_next_sleep(
        &self,
        duration: &str,
        min: Duration,
        max: Duration,
    ) -> Result<Duration, SetNextSleepError> {
        let parsed =
            parse_duration(duration).ok_or_else(|| SetNextSleepError::InvalidDuration(duration.to_string()))?;
        let clamped = clamp(parsed, min, max);
        *self.value.lock().await = Some(clamped);
        Ok(clamped)
    }

    pub async fn get(&self) -> Option<Duration> {
        *self.value.lock().await
    }
}

impl Default for NextSleepRegister {
    fn default() -> Self {
        Self::new()
    }
}

/// The two tools scoped to one loop via closure over its register and state
/// file path. The surrounding
/// binary registers these with the concrete agent runtime's tool registry;
/// `AgentRunner` itself is an external collaborator and does not prescribe
/// how tool functions are wired in, so this struct is the handle the loop
/// hands outward.
#[derive(Clone)]
pub struct MetacognitiveTools {
    register: NextSleepRegister,
    state_path: PathBuf,
    min_sleep: Duration,
    max_sleep: Duration,
}

impl MetacognitiveTools {
    pub fn new(register: NextSleepRegister, state_path: PathBuf, min_sleep: Duration, max_sleep: Duration) -> Self {
        Self {
            register,
            state_path,
            min_sleep,
            max_sleep,
        }
    }

    /// `set_next_sleep(duration, reason?)`. `reason` is accepted and logged
    /// by callers but does not affect behavior.
    pub async fn set_next_sleep(&self, duration: &str) -> Result<Duration, SetNextSleepError> {
        self.register
            .set_next_sleep(duration, self.min_sleep, self.max_sleep)
            .await
    }

    /// `update_metacognitive_state(content)`.
    pub fn update_metacognitive_state(
        &self,
        content: &str,
        conversation_id: &str,
    ) -> Result<(), StateFileError> {
        state_file::update(&self.state_path, content, conversation_id, Utc::now())
    }

    pub fn state_path(&self) -> &Path {
        &self.state_path
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn clamps_tool_value_below_min() {
        let register = NextSleepRegister::new();
        let min = Duration::minutes(2);
        let max = Duration::minutes(30);
        let stored = register.set_next_sleep("30s", min, max).await.unwrap();
        assert_eq!(stored, min);
        assert_eq!(register.get().await, Some(min));
    }

    #[tokio::test]
    async fn clamps_tool_value_above_max() {
        let register = NextSleepRegister::new();
        let min = Duration::minutes(2);
        let max = Duration::minutes(30);
        let stored = register.set_next_sleep("1h", min, max).await.unwrap();
        assert_eq!(stored, max);
    }

    #[tokio::test]
    async fn second_call_in_same_iteration_overwrites_first() {
        let register = NextSleepRegister::new();
        let min = Duration::seconds(1);
        let max = Duration::hours(1);
        register.set_next_sleep("5m", min, max).await.unwrap();
        register.set_next_sleep("10m", min, max).await.unwrap();
        assert_eq!(register.get().await, Some(Duration::minutes(10)));
    }

    #[tokio::test]
    async fn clear_resets_to_none() {
        let register = NextSleepRegister::new();
        let min = Duration::seconds(1);
        let max = Duration::hours(1);
        register.set_next_sleep("5m", min, max).await.unwrap();
        register.clear().await;
        assert_eq!(register.get().await, None);
    }
}
