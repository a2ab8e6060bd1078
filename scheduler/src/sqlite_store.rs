//! `rusqlite`-backed `Store` implementation, with `tasks` and `executions`
//! tables indexed on `task_id`, `status`, and `scheduled_at`.
//!
//! A fresh connection is opened per operation and the blocking `rusqlite`
//! calls run inside `tokio::task::spawn_blocking`.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};
use thane_core::{Execution, ExecutionStatus, Payload, Schedule, Task};

use crate::store::{Store, StoreError};

pub struct SqliteStore {
    db_path: PathBuf,
}

fn open(db_path: &Path) -> Result<Connection, StoreError> {
    let conn = Connection::open(db_path)?;
    conn.execute_batch("PRAGMA foreign_keys = ON;")?;
    Ok(conn)
}

fn init_schema(conn: &Connection) -> Result<(), StoreError> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS tasks (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL UNIQUE,
            schedule TEXT NOT NULL,
            payload TEXT NOT NULL,
            enabled INTEGER NOT NULL,
            created_at TEXT NOT NULL,
            created_by TEXT NOT NULL,
            updated_at TEXT NOT NULL
        );
        CREATE TABLE IF NOT EXISTS executions (
            id TEXT PRIMARY KEY,
            task_id TEXT NOT NULL REFERENCES tasks(id) ON DELETE CASCADE,
            scheduled_at TEXT NOT NULL,
            started_at TEXT,
            completed_at TEXT,
            status TEXT NOT NULL,
            result TEXT
        );
        CREATE INDEX IF NOT EXISTS idx_executions_task_id ON executions(task_id);
        CREATE INDEX IF NOT EXISTS idx_executions_status ON executions(status);
        CREATE INDEX IF NOT EXISTS idx_executions_scheduled_at ON executions(scheduled_at);
        "#,
    )?;
    Ok(())
}

fn status_to_str(status: ExecutionStatus) -> &'static str {
    match status {
        ExecutionStatus::Pending => "pending",
        ExecutionStatus::Running => "running",
        ExecutionStatus::Completed => "completed",
        ExecutionStatus::Failed => "failed",
        ExecutionStatus::Skipped => "skipped",
    }
}

fn str_to_status(s: &str) -> ExecutionStatus {
    match s {
        "running" => ExecutionStatus::Running,
        "completed" => ExecutionStatus::Completed,
        "failed" => ExecutionStatus::Failed,
        "skipped" => ExecutionStatus::Skipped,
        _ => ExecutionStatus::Pending,
    }
}

fn row_to_task(row: &rusqlite::Row) -> rusqlite::Result<Task> {
    let schedule_json: String = row.get("schedule")?;
    let payload_json: String = row.get("payload")?;
    let schedule: Schedule = serde_json::from_str(&schedule_json)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(0, rusqlite::types::Type::Text, Box::new(e)))?;
    let payload: Payload = serde_json::from_str(&payload_json)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(0, rusqlite::types::Type::Text, Box::new(e)))?;
    Ok(Task {
        id: row.get("id")?,
        name: row.get("name")?,
        schedule,
        payload,
        enabled: row.get::<_, i64>("enabled")? != 0,
        created_at: row.get("created_at")?,
        created_by: row.get("created_by")?,
        updated_at: row.get("updated_at")?,
    })
}

fn row_to_execution(row: &rusqlite::Row) -> rusqlite::Result<Execution> {
    let status: String = row.get("status")?;
    Ok(Execution {
        id: row.get("id")?,
        task_id: row.get("task_id")?,
        scheduled_at: row.get("scheduled_at")?,
        started_at: row.get::<_, Option<DateTime<Utc>>>("started_at")?,
        completed_at: row.get::<_, Option<DateTime<Utc>>>("completed_at")?,
        status: str_to_status(&status),
        result: row.get("result")?,
    })
}

impl SqliteStore {
    /// Opens (creating if absent) the database file at `db_path` and ensures
    /// the schema exists.
    pub fn open(db_path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let db_path = db_path.as_ref().to_path_buf();
        let conn = open(&db_path)?;
        init_schema(&conn)?;
        Ok(Self { db_path })
    }
}

macro_rules! blocking {
    ($self:ident, $body:expr) => {{
        let db_path = $self.db_path.clone();
        tokio::task::spawn_blocking(move || -> Result<_, StoreError> {
            let conn = open(&db_path)?;
            $body(conn)
        })
        .await?
    }};
}

#[async_trait]
impl Store for SqliteStore {
    async fn create_task(&self, task: &Task) -> Result<(), StoreError> {
        let task = task.clone();
        blocking!(self, |conn: Connection| {
            let schedule_json = serde_json::to_string(&task.schedule)?;
            let payload_json = serde_json::to_string(&task.payload)?;
            let result = conn.execute(
                "INSERT INTO tasks (id, name, schedule, payload, enabled, created_at, created_by, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                params![
                    task.id,
                    task.name,
                    schedule_json,
                    payload_json,
                    task.enabled as i64,
                    task.created_at,
                    task.created_by,
                    task.updated_at,
                ],
            );
            match result {
                Ok(_) => Ok(()),
                Err(rusqlite::Error::SqliteFailure(e, _))
                    if e.code == rusqlite::ErrorCode::ConstraintViolation =>
                {
                    Err(StoreError::DuplicateTaskName(task.name.clone()))
                }
                Err(e) => Err(e.into()),
            }
        })
    }

    async fn get_task(&self, id: &str) -> Result<Option<Task>, StoreError> {
        let id = id.to_string();
        blocking!(self, |conn: Connection| {
            let mut stmt = conn.prepare("SELECT * FROM tasks WHERE id = ?1")?;
            let mut rows = stmt.query(params![id])?;
            match rows.next()? {
                Some(row) => Ok(Some(row_to_task(row)?)),
                None => Ok(None),
            }
        })
    }

    async fn get_task_by_name(&self, name: &str) -> Result<Option<Task>, StoreError> {
        let name = name.to_string();
        blocking!(self, |conn: Connection| {
            let mut stmt = conn.prepare("SELECT * FROM tasks WHERE name = ?1")?;
            let mut rows = stmt.query(params![name])?;
            match rows.next()? {
                Some(row) => Ok(Some(row_to_task(row)?)),
                None => Ok(None),
            }
        })
    }

    async fn list_tasks(&self, enabled_only: bool) -> Result<Vec<Task>, StoreError> {
        blocking!(self, |conn: Connection| {
            let sql = if enabled_only {
                "SELECT * FROM tasks WHERE enabled = 1"
            } else {
                "SELECT * FROM tasks"
            };
            let mut stmt = conn.prepare(sql)?;
            let rows = stmt.query_map([], row_to_task)?;
            let mut out = Vec::new();
            for row in rows {
                out.push(row?);
            }
            Ok(out)
        })
    }

    async fn update_task(&self, task: &Task) -> Result<(), StoreError> {
        let task = task.clone();
        blocking!(self, |conn: Connection| {
            let schedule_json = serde_json::to_string(&task.schedule)?;
            let payload_json = serde_json::to_string(&task.payload)?;
            conn.execute(
                "UPDATE tasks SET name = ?2, schedule = ?3, payload = ?4, enabled = ?5,
                 created_by = ?6, updated_at = ?7 WHERE id = ?1",
                params![
                    task.id,
                    task.name,
                    schedule_json,
                    payload_json,
                    task.enabled as i64,
                    task.created_by,
                    task.updated_at,
                ],
            )?;
            Ok(())
        })
    }

    async fn delete_task(&self, id: &str) -> Result<(), StoreError> {
        let id = id.to_string();
        blocking!(self, |conn: Connection| {
            conn.execute("DELETE FROM tasks WHERE id = ?1", params![id])?;
            Ok(())
        })
    }

    async fn create_execution(&self, execution: &Execution) -> Result<(), StoreError> {
        let execution = execution.clone();
        blocking!(self, |conn: Connection| {
            conn.execute(
                "INSERT INTO executions (id, task_id, scheduled_at, started_at, completed_at, status, result)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    execution.id,
                    execution.task_id,
                    execution.scheduled_at,
                    execution.started_at,
                    execution.completed_at,
                    status_to_str(execution.status),
                    execution.result,
                ],
            )?;
            Ok(())
        })
    }

    async fn update_execution(&self, execution: &Execution) -> Result<(), StoreError> {
        let execution = execution.clone();
        blocking!(self, |conn: Connection| {
            conn.execute(
                "UPDATE executions SET started_at = ?2, completed_at = ?3, status = ?4, result = ?5
                 WHERE id = ?1",
                params![
                    execution.id,
                    execution.started_at,
                    execution.completed_at,
                    status_to_str(execution.status),
                    execution.result,
                ],
            )?;
            Ok(())
        })
    }

    async fn list_executions(&self, task_id: &str, limit: u32) -> Result<Vec<Execution>, StoreError> {
        let task_id = task_id.to_string();
        blocking!(self, |conn: Connection| {
            let mut stmt = conn.prepare(
                "SELECT * FROM executions WHERE task_id = ?1 ORDER BY scheduled_at DESC LIMIT ?2",
            )?;
            let rows = stmt.query_map(params![task_id, limit], row_to_execution)?;
            let mut out = Vec::new();
            for row in rows {
                out.push(row?);
            }
            Ok(out)
        })
    }

    async fn get_pending_executions(&self) -> Result<Vec<Execution>, StoreError> {
        blocking!(self, |conn: Connection| {
            let mut stmt = conn.prepare("SELECT * FROM executions WHERE status = 'pending'")?;
            let rows = stmt.query_map([], row_to_execution)?;
            let mut out = Vec::new();
            for row in rows {
                out.push(row?);
            }
            Ok(out)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use std::collections::HashMap;
    use thane_core::{new_id, PayloadKind};

    fn task(name: &str) -> Task {
        let now = Utc::now();
        Task {
            id: new_id(),
            name: name.to_string(),
            schedule: Schedule::Every {
                every: Duration::seconds(60),
            },
            payload: Payload {
                kind: PayloadKind::Wake,
                data: HashMap::new(),
            },
            enabled: true,
            created_at: now,
            created_by: "test".to_string(),
            updated_at: now,
        }
    }

    #[tokio::test]
    async fn round_trips_a_task() {
        let dir = tempfile::tempdir().unwrap();
        let store = SqliteStore::open(dir.path().join("sched.db")).unwrap();
        let t = task("wake-up");
        store.create_task(&t).await.unwrap();

        let fetched = store.get_task(&t.id).await.unwrap().unwrap();
        assert_eq!(fetched.name, "wake-up");
        assert!(fetched.enabled);

        let by_name = store.get_task_by_name("wake-up").await.unwrap().unwrap();
        assert_eq!(by_name.id, t.id);
    }

    #[tokio::test]
    async fn duplicate_name_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let store = SqliteStore::open(dir.path().join("sched.db")).unwrap();
        store.create_task(&task("dup")).await.unwrap();
        let err = store.create_task(&task("dup")).await.unwrap_err();
        assert!(matches!(err, StoreError::DuplicateTaskName(_)));
    }

    #[tokio::test]
    async fn delete_task_cascades_executions() {
        let dir = tempfile::tempdir().unwrap();
        let store = SqliteStore::open(dir.path().join("sched.db")).unwrap();
        let t = task("cascade");
        store.create_task(&t).await.unwrap();

        let exec = Execution {
            id: new_id(),
            task_id: t.id.clone(),
            scheduled_at: Utc::now(),
            started_at: None,
            completed_at: None,
            status: ExecutionStatus::Pending,
            result: None,
        };
        store.create_execution(&exec).await.unwrap();
        store.delete_task(&t.id).await.unwrap();

        let remaining = store.list_executions(&t.id, 10).await.unwrap();
        assert!(remaining.is_empty());
    }

    #[tokio::test]
    async fn get_pending_executions_filters_by_status() {
        let dir = tempfile::tempdir().unwrap();
        let store = SqliteStore::open(dir.path().join("sched.db")).unwrap();
        let t = task("pending-test");
        store.create_task(&t).await.unwrap();

        let pending = Execution {
            id: new_id(),
            task_id: t.id.clone(),
            scheduled_at: Utc::now(),
            started_at: None,
            completed_at: None,
            status: ExecutionStatus::Pending,
            result: None,
        };
        let mut done = pending.clone();
        done.id = new_id();
        done.status = ExecutionStatus::Completed;

        store.create_execution(&pending).await.unwrap();
        store.create_execution(&done).await.unwrap();

        let pendings = store.get_pending_executions().await.unwrap();
        assert_eq!(pendings.len(), 1);
        assert_eq!(pendings[0].id, pending.id);
    }
}
