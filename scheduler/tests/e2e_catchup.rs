//! End-to-end scenario 3: missed-execution catch-up.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{Duration, Utc};
use scheduler::{Executor, ExecutorError, Scheduler, SqliteStore, Store};
use thane_core::{new_id, Execution, ExecutionStatus, Payload, PayloadKind, Schedule, Task};

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
async fn catch_up_skips_stale_and_replays_recent() {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(SqliteStore::open(dir.path().join("sched.db")).unwrap());
    let executor = Arc::new(CountingExecutor {
        count: AtomicUsize::new(0),
    });

    let now = Utc::now();
    let task = Task {
        id: new_id(),
        name: "catchup-task".to_string(),
        schedule: Schedule::Every {
            every: Duration::hours(1),
        },
        payload: Payload {
            kind: PayloadKind::Wake,
            data: HashMap::new(),
        },
        enabled: true,
        created_at: now - Duration::hours(48),
        created_by: "test".to_string(),
        updated_at: now,
    };
    store.create_task(&task).await.unwrap();

    let stale = Execution {
        id: new_id(),
        task_id: task.id.clone(),
        scheduled_at: now - Duration::hours(25),
        started_at: None,
        completed_at: None,
        status: ExecutionStatus::Pending,
        result: None,
    };
    let recent = Execution {
        id: new_id(),
        task_id: task.id.clone(),
        scheduled_at: now - Duration::hours(1),
        started_at: None,
        completed_at: None,
        status: ExecutionStatus::Pending,
        result: None,
    };
    store.create_execution(&stale).await.unwrap();
    store.create_execution(&recent).await.unwrap();

    let scheduler = Scheduler::new(store.clone(), executor.clone());
    scheduler.start().await.unwrap();
    // Give the catch-up sweep (awaited inside start()) a moment to settle store writes.
    tokio::time::sleep(std::time::Duration::from_millis(50)).await;
    scheduler.stop().await;

    let executions = scheduler.list_executions(&task.id, 100).await.unwrap();

    let stale_after = executions.iter().find(|e| e.id == stale.id).unwrap();
    assert_eq!(stale_after.status, ExecutionStatus::Skipped);
    assert!(stale_after
        .result
        .as_ref()
        .unwrap()
        .contains(">24h"));

    let recent_after = executions.iter().find(|e| e.id == recent.id).unwrap();
    assert_eq!(recent_after.status, ExecutionStatus::Skipped);
    assert_eq!(
        recent_after.result.as_deref(),
        Some("replaced by catch-up execution")
    );

    let replay = executions
        .iter()
        .find(|e| e.id != stale.id && e.id != recent.id)
        .expect("a fresh catch-up execution should exist");
    assert_eq!(replay.status, ExecutionStatus::Completed);
    assert_eq!(replay.scheduled_at, recent.scheduled_at);

    assert_eq!(executor.count.load(Ordering::SeqCst), 1);
}
