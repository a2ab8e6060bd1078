//! Fire-handler wiring: turns a fired `Task` into an `AgentRequest` and runs
//! it through the agent runtime.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use scheduler::{Executor, ExecutorError};
use thane_core::{AgentRequest, AgentRunner, Execution, Task};
use tracing::debug;

pub struct AgentExecutor {
    runner: Arc<dyn AgentRunner>,
}

impl AgentExecutor {
    pub fn new(runner: Arc<dyn AgentRunner>) -> Self {
        Self { runner }
    }
}

#[async_trait]
impl Executor for AgentExecutor {
    async fn execute(&self, task: &Task, execution: &Execution) -> Result<(), ExecutorError> {
        let mut hints = HashMap::new();
        hints.insert("source".to_string(), "scheduler".to_string());
        hints.insert("task_id".to_string(), task.id.clone());
        hints.insert("payload_kind".to_string(), format!("{:?}", task.payload.kind).to_lowercase());

        let content = serde_json::to_string(&task.payload.data).unwrap_or_default();
        let request = AgentRequest {
            conversation_id: format!("scheduler-{}", task.id),
            content,
            hints,
        };

        debug!(task_id = %task.id, execution_id = %execution.id, "dispatching scheduled task to agent runner");
        self.runner
            .run(request, None)
            .await
            .map(|_| ())
            .map_err(|e| ExecutorError(e.to_string()))
    }
}
