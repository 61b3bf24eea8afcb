//! SQLite repository implementation.
//!
//! Uses `sqlx` with a connection pool. The schema is created on connect, and
//! file databases run in WAL journal mode.
//!
//! # Table Schema
//!
//! ```sql
//! CREATE TABLE tasks (
//!     id          TEXT PRIMARY KEY,
//!     title       TEXT NOT NULL,
//!     description TEXT NOT NULL DEFAULT '',
//!     status      TEXT NOT NULL DEFAULT 'Backlog',
//!     priority    TEXT NOT NULL DEFAULT 'Medium',
//!     assignees   TEXT NOT NULL DEFAULT '[]',   -- JSON array of strings
//!     project     TEXT NOT NULL DEFAULT '',
//!     output      TEXT NOT NULL DEFAULT '',
//!     due_date    TEXT,
//!     recurrence  TEXT,
//!     created_at  TEXT NOT NULL,
//!     updated_at  TEXT NOT NULL,
//!     version     INTEGER NOT NULL DEFAULT 1
//! );
//! ```

use std::str::FromStr;

use chrono::{DateTime, SecondsFormat, Utc};
use futures::FutureExt;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteRow};
use sqlx::{Row, SqlitePool};

use crate::domain::{DueDate, Priority, Recurrence, Task, TaskId, TaskStatus, Timestamp};
use crate::infrastructure::{RepositoryError, RepositoryFuture, TaskRepository};

const CREATE_TABLE_SQL: &str = "CREATE TABLE IF NOT EXISTS tasks (
    id TEXT PRIMARY KEY,
    title TEXT NOT NULL,
    description TEXT NOT NULL DEFAULT '',
    status TEXT NOT NULL DEFAULT 'Backlog',
    priority TEXT NOT NULL DEFAULT 'Medium',
    assignees TEXT NOT NULL DEFAULT '[]',
    project TEXT NOT NULL DEFAULT '',
    output TEXT NOT NULL DEFAULT '',
    due_date TEXT,
    recurrence TEXT,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL,
    version INTEGER NOT NULL DEFAULT 1
)";

const TASK_SELECT_SQL: &str = "SELECT
    id, title, description, status, priority, assignees, project, output,
    due_date, recurrence, created_at, updated_at, version
FROM tasks";

const TASK_INSERT_SQL: &str = "INSERT INTO tasks (
    id, title, description, status, priority, assignees, project, output,
    due_date, recurrence, created_at, updated_at, version
) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)";

const TASK_UPDATE_SQL: &str = "UPDATE tasks SET
    title = ?, description = ?, status = ?, priority = ?, assignees = ?,
    project = ?, output = ?, due_date = ?, recurrence = ?, updated_at = ?,
    version = ?
WHERE id = ?";

// =============================================================================
// SQLite Task Repository
// =============================================================================

/// SQLite implementation of `TaskRepository`.
///
/// # Example
///
/// ```ignore
/// let repository = SqliteTaskRepository::connect("sqlite://data/tasks.db").await?;
/// repository.insert(&task).await?;
/// ```
#[derive(Debug, Clone)]
pub struct SqliteTaskRepository {
    pool: SqlitePool,
}

impl SqliteTaskRepository {
    /// Opens (creating if missing) the database at `url` and ensures the schema.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::DatabaseError` if the URL is invalid, the
    /// database cannot be opened, or the schema cannot be created.
    pub async fn connect(url: &str) -> Result<Self, RepositoryError> {
        let options = SqliteConnectOptions::from_str(url)?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal);

        let pool = SqlitePoolOptions::new().connect_with(options).await?;
        Self::with_pool(pool).await
    }

    /// Opens a private in-memory database.
    ///
    /// The pool is limited to one connection, since every SQLite in-memory
    /// connection is a separate database.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::DatabaseError` if the schema cannot be created.
    pub async fn in_memory() -> Result<Self, RepositoryError> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await?;
        Self::with_pool(pool).await
    }

    /// Wraps an existing pool and ensures the schema.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::DatabaseError` if the schema cannot be created.
    pub async fn with_pool(pool: SqlitePool) -> Result<Self, RepositoryError> {
        sqlx::query(CREATE_TABLE_SQL).execute(&pool).await?;
        Ok(Self { pool })
    }

    /// Returns the underlying connection pool.
    #[must_use]
    pub const fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

impl TaskRepository for SqliteTaskRepository {
    fn find_by_id<'a>(&'a self, id: &'a TaskId) -> RepositoryFuture<'a, Option<Task>> {
        async move {
            let row = sqlx::query(&format!("{TASK_SELECT_SQL} WHERE id = ?"))
                .bind(id.as_str())
                .fetch_optional(&self.pool)
                .await?;

            row.as_ref().map(task_from_row).transpose()
        }
        .boxed()
    }

    fn insert<'a>(&'a self, task: &'a Task) -> RepositoryFuture<'a, ()> {
        async move {
            let assignees = encode_assignees(&task.assignees)?;
            execute_insert(&self.pool, task, &assignees).await
        }
        .boxed()
    }

    fn insert_many<'a>(&'a self, tasks: &'a [Task]) -> RepositoryFuture<'a, ()> {
        async move {
            let mut transaction = self.pool.begin().await?;
            for task in tasks {
                let assignees = encode_assignees(&task.assignees)?;
                execute_insert(&mut *transaction, task, &assignees).await?;
            }
            transaction.commit().await?;
            Ok(())
        }
        .boxed()
    }

    fn update<'a>(
        &'a self,
        task: &'a Task,
        successor: Option<&'a Task>,
    ) -> RepositoryFuture<'a, bool> {
        async move {
            let assignees = encode_assignees(&task.assignees)?;
            let mut transaction = self.pool.begin().await?;

            let result = sqlx::query(TASK_UPDATE_SQL)
                .bind(&task.title)
                .bind(&task.description)
                .bind(task.status.as_str())
                .bind(task.priority.as_str())
                .bind(&assignees)
                .bind(&task.project)
                .bind(&task.output)
                .bind(task.due_date.as_ref().map(DueDate::as_str))
                .bind(task.recurrence.map(Recurrence::as_str))
                .bind(encode_timestamp(&task.updated_at))
                .bind(version_to_database(task.version)?)
                .bind(task.id.as_str())
                .execute(&mut *transaction)
                .await?;

            if result.rows_affected() == 0 {
                transaction.rollback().await?;
                return Ok(false);
            }

            if let Some(successor) = successor {
                let successor_assignees = encode_assignees(&successor.assignees)?;
                execute_insert(&mut *transaction, successor, &successor_assignees).await?;
            }

            transaction.commit().await?;
            Ok(true)
        }
        .boxed()
    }

    fn delete<'a>(&'a self, id: &'a TaskId) -> RepositoryFuture<'a, bool> {
        async move {
            let result = sqlx::query("DELETE FROM tasks WHERE id = ?")
                .bind(id.as_str())
                .execute(&self.pool)
                .await?;

            Ok(result.rows_affected() > 0)
        }
        .boxed()
    }

    fn list(&self) -> RepositoryFuture<'_, Vec<Task>> {
        async move {
            let rows = sqlx::query(&format!(
                "{TASK_SELECT_SQL} ORDER BY created_at DESC, id DESC"
            ))
            .fetch_all(&self.pool)
            .await?;

            rows.iter()
                .map(task_from_row)
                .collect::<Result<Vec<_>, _>>()
        }
        .boxed()
    }

    fn count(&self) -> RepositoryFuture<'_, u64> {
        async move {
            let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM tasks")
                .fetch_one(&self.pool)
                .await?;

            u64::try_from(count).map_err(|error| RepositoryError::DatabaseError(error.to_string()))
        }
        .boxed()
    }
}

// =============================================================================
// Row Mapping
// =============================================================================

async fn execute_insert<'e, E>(
    executor: E,
    task: &Task,
    assignees: &str,
) -> Result<(), RepositoryError>
where
    E: sqlx::Executor<'e, Database = sqlx::Sqlite>,
{
    sqlx::query(TASK_INSERT_SQL)
        .bind(task.id.as_str())
        .bind(&task.title)
        .bind(&task.description)
        .bind(task.status.as_str())
        .bind(task.priority.as_str())
        .bind(assignees)
        .bind(&task.project)
        .bind(&task.output)
        .bind(task.due_date.as_ref().map(DueDate::as_str))
        .bind(task.recurrence.map(Recurrence::as_str))
        .bind(encode_timestamp(&task.created_at))
        .bind(encode_timestamp(&task.updated_at))
        .bind(version_to_database(task.version)?)
        .execute(executor)
        .await?;

    Ok(())
}

fn encode_assignees(assignees: &[String]) -> Result<String, RepositoryError> {
    serde_json::to_string(assignees)
        .map_err(|error| RepositoryError::SerializationError(error.to_string()))
}

fn encode_timestamp(timestamp: &Timestamp) -> String {
    timestamp
        .as_datetime()
        .to_rfc3339_opts(SecondsFormat::Nanos, true)
}

fn decode_timestamp(value: &str) -> Result<Timestamp, RepositoryError> {
    DateTime::parse_from_rfc3339(value)
        .map(|parsed| Timestamp::from_datetime(parsed.with_timezone(&Utc)))
        .map_err(|error| RepositoryError::SerializationError(error.to_string()))
}

fn version_to_database(version: u64) -> Result<i64, RepositoryError> {
    i64::try_from(version).map_err(|error| RepositoryError::SerializationError(error.to_string()))
}

fn task_from_row(row: &SqliteRow) -> Result<Task, RepositoryError> {
    let status: String = row.try_get("status")?;
    let priority: String = row.try_get("priority")?;
    let assignees: String = row.try_get("assignees")?;
    let due_date: Option<String> = row.try_get("due_date")?;
    let recurrence: Option<String> = row.try_get("recurrence")?;
    let created_at: String = row.try_get("created_at")?;
    let updated_at: String = row.try_get("updated_at")?;
    let version: i64 = row.try_get("version")?;

    let serialization =
        |error: &dyn std::fmt::Display| RepositoryError::SerializationError(error.to_string());

    Ok(Task {
        id: TaskId::new(row.try_get::<String, _>("id")?),
        title: row.try_get("title")?,
        description: row.try_get("description")?,
        status: TaskStatus::from_str(&status).map_err(|error| serialization(&error))?,
        priority: Priority::from_str(&priority).map_err(|error| serialization(&error))?,
        assignees: serde_json::from_str(&assignees).map_err(|error| serialization(&error))?,
        project: row.try_get("project")?,
        output: row.try_get("output")?,
        due_date: due_date.map(DueDate::new),
        recurrence: recurrence.and_then(|value| decode_recurrence(&value)),
        created_at: decode_timestamp(&created_at)?,
        updated_at: decode_timestamp(&updated_at)?,
        version: u64::try_from(version).map_err(|error| serialization(&error))?,
    })
}

/// An unrecognised stored period is read as no recurrence.
fn decode_recurrence(value: &str) -> Option<Recurrence> {
    match Recurrence::from_str(value) {
        Ok(recurrence) => Some(recurrence),
        Err(error) => {
            tracing::warn!(%error, "Ignoring unknown stored recurrence");
            None
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
