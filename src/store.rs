//! Task store for http-dl
//!
//! The download engine treats task persistence as an external collaborator
//! behind the [`TaskStore`] trait: a query for tasks needing work and a
//! durable save of a task's mutable fields. [`SqliteTaskStore`] is the bundled
//! implementation on SQLite.

use crate::error::{DatabaseError, Error, Result};
use crate::task::{Task, TaskId, TaskStatus};
use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use sqlx::sqlite::SqlitePool;
use sqlx::FromRow;
use std::path::Path;

/// Durable task persistence used by the batch runner
///
/// Implementations must make `save` durable before returning: the runner
/// persists the `InProgress` transition before a fetch begins so a crash
/// mid-run leaves visible in-progress state.
#[async_trait]
pub trait TaskStore: Send + Sync {
    /// All tasks whose status is New, InProgress, or Failed, in creation order
    ///
    /// InProgress tasks are included because a prior run may have crashed
    /// mid-transfer; Ready and Forbidden tasks are never returned.
    async fn pending_tasks(&self) -> Result<Vec<Task>>;

    /// Durably persist a task's mutable fields
    /// (status, attempts, log, file references, timestamps)
    async fn save(&self, task: &Task) -> Result<()>;
}

/// Task record as stored in SQLite
///
/// Timestamps are unix seconds; status is the integer code from
/// [`TaskStatus::to_i32`].
#[derive(Debug, Clone, FromRow)]
struct TaskRow {
    id: i64,
    url: String,
    status: i32,
    attempts: i64,
    log: String,
    file_partial: String,
    file_completed: String,
    datetime_created: i64,
    datetime_ready: Option<i64>,
    datetime_failed: Option<i64>,
}

impl From<TaskRow> for Task {
    fn from(row: TaskRow) -> Self {
        Task {
            id: TaskId(row.id),
            url: row.url,
            status: TaskStatus::from_i32(row.status),
            attempts: row.attempts.max(0) as u32,
            log: row.log,
            file_partial: row.file_partial,
            file_completed: row.file_completed,
            datetime_created: Utc
                .timestamp_opt(row.datetime_created, 0)
                .single()
                .unwrap_or_else(Utc::now),
            datetime_ready: row
                .datetime_ready
                .and_then(|ts| Utc.timestamp_opt(ts, 0).single()),
            datetime_failed: row
                .datetime_failed
                .and_then(|ts| Utc.timestamp_opt(ts, 0).single()),
        }
    }
}

const TASK_COLUMNS: &str = "id, url, status, attempts, log, file_partial, \
     file_completed, datetime_created, datetime_ready, datetime_failed";

/// SQLite-backed task store
pub struct SqliteTaskStore {
    pool: SqlitePool,
}

impl SqliteTaskStore {
    /// Open (or create) the task database at `path` and run migrations
    pub async fn new(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(|e| {
                Error::Database(DatabaseError::ConnectionFailed(format!(
                    "Failed to create database directory: {}",
                    e
                )))
            })?;
        }

        use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode};
        use std::str::FromStr;

        let options = SqliteConnectOptions::from_str(&format!("sqlite:{}", path.display()))
            .map_err(|e| {
                Error::Database(DatabaseError::ConnectionFailed(format!(
                    "Failed to parse database path: {}",
                    e
                )))
            })?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal);

        let pool = SqlitePool::connect_with(options).await.map_err(|e| {
            Error::Database(DatabaseError::ConnectionFailed(format!(
                "Failed to connect to database: {}",
                e
            )))
        })?;

        let store = Self { pool };
        store.run_migrations().await?;
        Ok(store)
    }

    /// Create the tasks table if it does not exist
    async fn run_migrations(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS tasks (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                url TEXT NOT NULL,
                status INTEGER NOT NULL DEFAULT 0,
                attempts INTEGER NOT NULL DEFAULT 0,
                log TEXT NOT NULL DEFAULT '',
                file_partial TEXT NOT NULL DEFAULT '',
                file_completed TEXT NOT NULL DEFAULT '',
                datetime_created INTEGER NOT NULL,
                datetime_ready INTEGER,
                datetime_failed INTEGER
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| {
            Error::Database(DatabaseError::MigrationFailed(format!(
                "Failed to create tasks table: {}",
                e
            )))
        })?;

        Ok(())
    }

    /// Insert a new task for a URL, starting in the New status
    pub async fn add_task(&self, url: &str) -> Result<TaskId> {
        let now = Utc::now().timestamp();

        let result = sqlx::query(
            r#"
            INSERT INTO tasks (url, status, attempts, datetime_created)
            VALUES (?, ?, 0, ?)
            "#,
        )
        .bind(url)
        .bind(TaskStatus::New.to_i32())
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to insert task: {}",
                e
            )))
        })?;

        Ok(TaskId(result.last_insert_rowid()))
    }

    /// Get a task by ID
    pub async fn get_task(&self, id: TaskId) -> Result<Option<Task>> {
        let row = sqlx::query_as::<_, TaskRow>(&format!(
            "SELECT {TASK_COLUMNS} FROM tasks WHERE id = ?"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to get task: {}",
                e
            )))
        })?;

        Ok(row.map(Task::from))
    }

    /// List every task in creation order
    pub async fn list_tasks(&self) -> Result<Vec<Task>> {
        let rows = sqlx::query_as::<_, TaskRow>(&format!(
            "SELECT {TASK_COLUMNS} FROM tasks ORDER BY datetime_created ASC, id ASC"
        ))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to list tasks: {}",
                e
            )))
        })?;

        Ok(rows.into_iter().map(Task::from).collect())
    }
}

#[async_trait]
impl TaskStore for SqliteTaskStore {
    async fn pending_tasks(&self) -> Result<Vec<Task>> {
        let rows = sqlx::query_as::<_, TaskRow>(&format!(
            "SELECT {TASK_COLUMNS} FROM tasks \
             WHERE status IN (?, ?, ?) \
             ORDER BY datetime_created ASC, id ASC"
        ))
        .bind(TaskStatus::New.to_i32())
        .bind(TaskStatus::InProgress.to_i32())
        .bind(TaskStatus::Failed.to_i32())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to query pending tasks: {}",
                e
            )))
        })?;

        Ok(rows.into_iter().map(Task::from).collect())
    }

    async fn save(&self, task: &Task) -> Result<()> {
        let result = sqlx::query(
            r#"
            UPDATE tasks SET
                status = ?,
                attempts = ?,
                log = ?,
                file_partial = ?,
                file_completed = ?,
                datetime_ready = ?,
                datetime_failed = ?
            WHERE id = ?
            "#,
        )
        .bind(task.status.to_i32())
        .bind(i64::from(task.attempts))
        .bind(&task.log)
        .bind(&task.file_partial)
        .bind(&task.file_completed)
        .bind(task.datetime_ready.map(|dt| dt.timestamp()))
        .bind(task.datetime_failed.map(|dt| dt.timestamp()))
        .bind(task.id)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to save task: {}",
                e
            )))
        })?;

        if result.rows_affected() == 0 {
            return Err(Error::Database(DatabaseError::NotFound(format!(
                "task {}",
                task.id
            ))));
        }

        Ok(())
    }
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    async fn test_store() -> (SqliteTaskStore, tempfile::TempDir) {
        let temp_dir = tempdir().unwrap();
        let store = SqliteTaskStore::new(&temp_dir.path().join("tasks.db"))
            .await
            .unwrap();
        (store, temp_dir)
    }

    #[tokio::test]
    async fn new_task_starts_in_new_status() {
        let (store, _temp_dir) = test_store().await;
        let id = store.add_task("http://example.com/a.bin").await.unwrap();

        let task = store.get_task(id).await.unwrap().unwrap();
        assert_eq!(task.status, TaskStatus::New);
        assert_eq!(task.attempts, 0);
        assert_eq!(task.url, "http://example.com/a.bin");
        assert!(task.file_partial.is_empty());
        assert!(task.file_completed.is_empty());
        assert!(task.datetime_ready.is_none());
        assert!(task.datetime_failed.is_none());
    }

    #[tokio::test]
    async fn pending_tasks_excludes_terminal_statuses() {
        let (store, _temp_dir) = test_store().await;

        for status in [
            TaskStatus::New,
            TaskStatus::InProgress,
            TaskStatus::Ready,
            TaskStatus::Failed,
            TaskStatus::Forbidden,
        ] {
            let id = store
                .add_task(&format!("http://example.com/{status}.bin"))
                .await
                .unwrap();
            let mut task = store.get_task(id).await.unwrap().unwrap();
            task.status = status;
            task.attempts = 1;
            store.save(&task).await.unwrap();
        }

        let pending = store.pending_tasks().await.unwrap();
        let statuses: Vec<TaskStatus> = pending.iter().map(|t| t.status).collect();
        assert_eq!(
            statuses,
            vec![TaskStatus::New, TaskStatus::InProgress, TaskStatus::Failed]
        );
    }

    #[tokio::test]
    async fn save_round_trips_all_mutable_fields() {
        let (store, _temp_dir) = test_store().await;
        let id = store.add_task("http://example.com/file.iso").await.unwrap();

        let mut task = store.get_task(id).await.unwrap().unwrap();
        task.status = TaskStatus::Ready;
        task.attempts = 3;
        task.record_error("second attempt: connection reset");
        task.file_completed = "file.iso".to_string();
        task.datetime_ready = Some(Utc.timestamp_opt(1_700_000_000, 0).single().unwrap());
        store.save(&task).await.unwrap();

        let loaded = store.get_task(id).await.unwrap().unwrap();
        assert_eq!(loaded.status, TaskStatus::Ready);
        assert_eq!(loaded.attempts, 3);
        assert_eq!(loaded.log, "second attempt: connection reset");
        assert_eq!(loaded.file_completed, "file.iso");
        assert_eq!(
            loaded.datetime_ready.unwrap().timestamp(),
            1_700_000_000
        );
        assert_eq!(loaded.datetime_created, task.datetime_created);
    }

    #[tokio::test]
    async fn save_of_unknown_task_reports_not_found() {
        let (store, _temp_dir) = test_store().await;
        let id = store.add_task("http://example.com/a.bin").await.unwrap();
        let mut task = store.get_task(id).await.unwrap().unwrap();
        task.id = TaskId(9999);

        let err = store.save(&task).await.unwrap_err();
        assert!(matches!(err, Error::Database(DatabaseError::NotFound(_))));
    }

    #[tokio::test]
    async fn tasks_come_back_in_creation_order() {
        let (store, _temp_dir) = test_store().await;
        for i in 0..4 {
            store
                .add_task(&format!("http://example.com/{i}.bin"))
                .await
                .unwrap();
        }

        let tasks = store.list_tasks().await.unwrap();
        let urls: Vec<&str> = tasks.iter().map(|t| t.url.as_str()).collect();
        assert_eq!(
            urls,
            vec![
                "http://example.com/0.bin",
                "http://example.com/1.bin",
                "http://example.com/2.bin",
                "http://example.com/3.bin"
            ]
        );
    }

    #[tokio::test]
    async fn store_survives_reopening() {
        let temp_dir = tempdir().unwrap();
        let db_path = temp_dir.path().join("tasks.db");

        let store = SqliteTaskStore::new(&db_path).await.unwrap();
        let id = store.add_task("http://example.com/a.bin").await.unwrap();
        drop(store);

        let reopened = SqliteTaskStore::new(&db_path).await.unwrap();
        let task = reopened.get_task(id).await.unwrap().unwrap();
        assert_eq!(task.url, "http://example.com/a.bin");
    }
}
