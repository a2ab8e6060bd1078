//! End-to-end scenario 2: recurring fire.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{Duration, Utc};
use scheduler::{Executor, ExecutorError, Scheduler, SqliteStore};
use thane_core::{new_id, Execution, Payload, PayloadKind, Schedule, Task};

struct CountingExecutor {
    count: AtomicUsize,
}

#[async_trait]
impl Executor for CountingExecutor {
    async fn execute(&self, _task: &Task, _execution: &Execution) -> Result<(), ExecutorError> {
        self.count.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[tokio::test]
async fn recurring_task_fires_and_completes_repeatedly() {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(SqliteStore::open(dir.path().join("sched.db")).unwrap());
    let executor = Arc::new(CountingExecutor {
        count: AtomicUsize::new(0),
    });
    let scheduler = Scheduler::new(store.clone(), executor.clone());

    let now = Utc::now();
    let task = Task {
        id: new_id(),
        name: "every-second-wake".to_string(),
        schedule: Schedule::Every {
            every: Duration::seconds(1),
        },
        payload: Payload {
            kind: PayloadKind::Wake,
            data: HashMap::new(),
        },
        enabled: true,
        created_at: now,
        created_by: "test".to_string(),
        updated_at: now,
    };

    let task = scheduler.create_task(task).await.unwrap();
    scheduler.start().await.unwrap();

    tokio::time::sleep(std::time::Duration::from_millis(3500)).await;
    scheduler.stop().await;

    let executions = scheduler.list_executions(&task.id, 100).await.unwrap();
    assert!(
        executions.len() >= 3,
        "expected at least 3 executions, got {}",
        executions.len()
    );
    assert!(executions
        .iter()
        .all(|e| e.status == thane_core::ExecutionStatus::Completed));

    // scheduled_at values are monotonic across executions.
    let mut sorted = executions.clone();
    sorted.sort_by_key(|e| e.scheduled_at);
    for pair in sorted.windows(2) {
        assert!(pair[1].scheduled_at >= pair[0].scheduled_at);
    }
}
