//! Store contract.

use async_trait::async_trait;
use thane_core::{Execution, Task};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("serialize: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("task name already in use: {0}")]
    DuplicateTaskName(String),
    #[error("blocking task join: {0}")]
    Join(#[from] tokio::task::JoinError),
}

/// Persistent key-value tier backing the Scheduler.
///
/// `GetTaskByName` returns `Ok(None)` when absent and errors when two tasks
/// share the name (structurally prevented by a `UNIQUE` constraint in the
/// SQLite implementation, but the trait surface still allows a backend to
/// return the error explicitly).
#[async_trait]
pub trait Store: Send + Sync {
    async fn create_task(&self, task: &Task) -> Result<(), StoreError>;
    async fn get_task(&self, id: &str) -> Result<Option<Task>, StoreError>;
    async fn get_task_by_name(&self, name: &str) -> Result<Option<Task>, StoreError>;
    async fn list_tasks(&self, enabled_only: bool) -> Result<Vec<Task>, StoreError>;
    async fn update_task(&self, task: &Task) -> Result<(), StoreError>;
    /// Deletes the task; cascades to its `Executions`.
    async fn delete_task(&self, id: &str) -> Result<(), StoreError>;

    async fn create_execution(&self, execution: &Execution) -> Result<(), StoreError>;
    async fn update_execution(&self, execution: &Execution) -> Result<(), StoreError>;
    async fn list_executions(&self, task_id: &str, limit: u32) -> Result<Vec<Execution>, StoreError>;
    async fn get_pending_executions(&self) -> Result<Vec<Execution>, StoreError>;
}
