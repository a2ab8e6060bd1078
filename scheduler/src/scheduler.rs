//! The Scheduler.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use thane_core::{new_id, Execution, ExecutionStatus, Schedule, Task};
use tokio::sync::{oneshot, Mutex, RwLock};
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use crate::executor::Executor;
use crate::next_run::next_run;
use crate::store::{Store, StoreError};

/// Hard cap on one execution's wall-clock budget.
const EXECUTION_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(5 * 60);

/// Catch-up threshold past which a pending execution is skipped outright
/// rather than replayed.
const MISSED_WINDOW: Duration = Duration::hours(24);

#[derive(Debug, thiserror::Error)]
pub enum SchedulerError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("task {0} not found")]
    TaskNotFound(String),
}

struct ArmedTimer {
    cancel: oneshot::Sender<()>,
}

struct SchedulerInner {
    store: Arc<dyn Store>,
    executor: Arc<dyn Executor>,
    running: RwLock<bool>,
    timers: Mutex<HashMap<String, ArmedTimer>>,
    in_flight: Mutex<JoinSet<()>>,
}

/// The Scheduler. Cheaply cloneable; every clone shares the same
/// armed-timer map and store handle.
#[derive(Clone)]
pub struct Scheduler {
    inner: Arc<SchedulerInner>,
}

impl Scheduler {
    pub fn new(store: Arc<dyn Store>, executor: Arc<dyn Executor>) -> Self {
        Self {
            inner: Arc::new(SchedulerInner {
                store,
                executor,
                running: RwLock::new(false),
                timers: Mutex::new(HashMap::new()),
                in_flight: Mutex::new(JoinSet::new()),
            }),
        }
    }

    async fn is_running(&self) -> bool {
        *self.inner.running.read().await
    }

    /// `Start(ctx)`. Idempotent: re-invoking on a
    /// running Scheduler is a no-op.
    pub async fn start(&self) -> Result<(), SchedulerError> {
        {
            let mut running = self.inner.running.write().await;
            if *running {
                return Ok(());
            }
            *running = true;
        }

        let enabled = self.inner.store.list_tasks(true).await?;
        let now = Utc::now();
        for task in &enabled {
            if let Some(at) = next_run(&task.schedule, task.created_at, now) {
                self.arm_timer(task.id.clone(), at).await;
            }
        }

        self.check_missed_executions().await?;
        info!(task_count = enabled.len(), "scheduler started");
        Ok(())
    }

    /// Catch-up sweep, run once at startup and never again.
    async fn check_missed_executions(&self) -> Result<(), SchedulerError> {
        let now = Utc::now();
        let pending = self.inner.store.get_pending_executions().await?;

        for execution in pending {
            if now - execution.scheduled_at > MISSED_WINDOW {
                let mut skipped = execution.clone();
                skipped.status = ExecutionStatus::Skipped;
                skipped.result = Some("missed execution window (>24h)".to_string());
                self.inner.store.update_execution(&skipped).await?;
                warn!(execution_id = %execution.id, "skipped missed execution window (>24h)");
                continue;
            }

            let Some(task) = self.inner.store.get_task(&execution.task_id).await? else {
                warn!(task_id = %execution.task_id, "catch-up: task no longer exists");
                continue;
            };

            let mut replaced = execution.clone();
            replaced.status = ExecutionStatus::Skipped;
            replaced.result = Some("replaced by catch-up execution".to_string());
            self.inner.store.update_execution(&replaced).await?;

            self.execute_task(&task, execution.scheduled_at).await?;
        }

        Ok(())
    }

    /// `executeTask`.
    async fn execute_task(
        &self,
        task: &Task,
        scheduled_at: DateTime<Utc>,
    ) -> Result<(), SchedulerError> {
        let mut execution = Execution {
            id: new_id(),
            task_id: task.id.clone(),
            scheduled_at,
            started_at: Some(Utc::now()),
            completed_at: None,
            status: ExecutionStatus::Running,
            result: None,
        };
        self.inner.store.create_execution(&execution).await?;

        let outcome = tokio::time::timeout(
            EXECUTION_TIMEOUT,
            self.inner.executor.execute(task, &execution),
        )
        .await;

        execution.completed_at = Some(Utc::now());
        match outcome {
            Ok(Ok(())) => {
                execution.status = ExecutionStatus::Completed;
                execution.result = Some("success".to_string());
            }
            Ok(Err(e)) => {
                execution.status = ExecutionStatus::Failed;
                execution.result = Some(e.0);
            }
            Err(_) => {
                execution.status = ExecutionStatus::Failed;
                execution.result = Some("execution timed out after 5 minutes".to_string());
            }
        }
        self.inner.store.update_execution(&execution).await?;
        Ok(())
    }

    async fn arm_timer(&self, task_id: String, at: DateTime<Utc>) {
        let (cancel_tx, cancel_rx) = oneshot::channel();
        {
            let mut timers = self.inner.timers.lock().await;
            // Dropping a previous sender (if any) implicitly cancels the old timer.
            timers.insert(task_id.clone(), ArmedTimer { cancel: cancel_tx });
        }

        let scheduler = self.clone();
        let mut in_flight = self.inner.in_flight.lock().await;
        in_flight.spawn(async move {
            let dur = (at - Utc::now()).to_std().unwrap_or(std::time::Duration::ZERO);
            tokio::select! {
                _ = tokio::time::sleep(dur) => {
                    scheduler.fire(&task_id).await;
                }
                _ = cancel_rx => {
                    debug!(%task_id, "armed timer cancelled before firing");
                }
            }
        });
    }

    /// Fire handler.
    async fn fire(&self, task_id: &str) {
        {
            let mut timers = self.inner.timers.lock().await;
            if !*self.inner.running.read().await {
                return;
            }
            timers.remove(task_id);
        }

        let task = match self.inner.store.get_task(task_id).await {
            Ok(Some(t)) => t,
            Ok(None) => {
                warn!(%task_id, "fire handler: task no longer exists");
                return;
            }
            Err(e) => {
                warn!(%task_id, error = %e, "fire handler: store error loading task");
                return;
            }
        };

        if !task.enabled {
            debug!(%task_id, "fire handler: task disabled, skipping");
            return;
        }

        let now = Utc::now();
        if let Err(e) = self.execute_task(&task, now).await {
            warn!(%task_id, error = %e, "fire handler: executeTask failed");
        }

        if !matches!(task.schedule, Schedule::At { .. }) && *self.inner.running.read().await {
            if let Some(at) = next_run(&task.schedule, task.created_at, Utc::now()) {
                self.arm_timer(task.id.clone(), at).await;
            }
        }
    }

    /// `CreateTask`.
    pub async fn create_task(&self, task: Task) -> Result<Task, SchedulerError> {
        self.inner.store.create_task(&task).await?;
        if task.enabled {
            if let Some(at) = next_run(&task.schedule, task.created_at, Utc::now()) {
                self.arm_timer(task.id.clone(), at).await;
            }
        }
        Ok(task)
    }

    /// `UpdateTask`.
    pub async fn update_task(&self, task: Task) -> Result<(), SchedulerError> {
        self.inner.store.update_task(&task).await?;
        self.cancel_timer(&task.id).await;
        if task.enabled {
            if let Some(at) = next_run(&task.schedule, task.created_at, Utc::now()) {
                self.arm_timer(task.id.clone(), at).await;
            }
        }
        Ok(())
    }

    /// `DeleteTask`.
    pub async fn delete_task(&self, id: &str) -> Result<(), SchedulerError> {
        self.cancel_timer(id).await;
        self.inner.store.delete_task(id).await?;
        Ok(())
    }

    /// `TriggerTask`: skips the timer and runs
    /// immediately with `now` as the scheduled time.
    pub async fn trigger_task(&self, id: &str) -> Result<(), SchedulerError> {
        let task = self
            .inner
            .store
            .get_task(id)
            .await?
            .ok_or_else(|| SchedulerError::TaskNotFound(id.to_string()))?;
        self.execute_task(&task, Utc::now()).await
    }

    async fn cancel_timer(&self, task_id: &str) {
        let mut timers = self.inner.timers.lock().await;
        if let Some(timer) = timers.remove(task_id) {
            let _ = timer.cancel.send(());
        }
    }

    pub async fn get_task(&self, id: &str) -> Result<Option<Task>, SchedulerError> {
        Ok(self.inner.store.get_task(id).await?)
    }

    pub async fn get_task_by_name(&self, name: &str) -> Result<Option<Task>, SchedulerError> {
        Ok(self.inner.store.get_task_by_name(name).await?)
    }

    pub async fn list_tasks(&self, enabled_only: bool) -> Result<Vec<Task>, SchedulerError> {
        Ok(self.inner.store.list_tasks(enabled_only).await?)
    }

    pub async fn list_executions(
        &self,
        task_id: &str,
        limit: u32,
    ) -> Result<Vec<Execution>, SchedulerError> {
        Ok(self.inner.store.list_executions(task_id, limit).await?)
    }

    /// Mark not running, stop and remove every armed timer, then wait for
    /// in-flight fire-handler tasks to drain.
    pub async fn stop(&self) {
        {
            let mut running = self.inner.running.write().await;
            if !*running {
                return;
            }
            *running = false;
        }

        let timers = {
            let mut timers = self.inner.timers.lock().await;
            std::mem::take(&mut *timers)
        };
        for (_, timer) in timers {
            let _ = timer.cancel.send(());
        }

        let mut in_flight = {
            let mut in_flight = self.inner.in_flight.lock().await;
            std::mem::take(&mut *in_flight)
        };
        while in_flight.join_next().await.is_some() {}
        info!("scheduler stopped");
    }
}
