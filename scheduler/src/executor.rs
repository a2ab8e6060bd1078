//! `ExecuteFunc(ctx, task, execution)`.

use async_trait::async_trait;
use thane_core::{Execution, Task};

/// Caller-supplied execution callback. `Err` becomes the Execution's
/// `result` string.
#[async_trait]
pub trait Executor: Send + Sync {
    async fn execute(&self, task: &Task, execution: &Execution) -> Result<(), ExecutorError>;
}

#[derive(Debug, thiserror::Error)]
#[error("{0}")]
pub struct ExecutorError(pub String);
