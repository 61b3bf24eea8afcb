//! Repository trait for the task store.
//!
//! Methods return boxed futures so the trait stays object safe and backends
//! can be selected at runtime behind `Arc<dyn TaskRepository>`.

use futures::future::BoxFuture;
use thiserror::Error;

use crate::domain::{Task, TaskId};

// =============================================================================
// Repository Error
// =============================================================================

/// Errors that can occur during repository operations.
#[derive(Debug, Error, Clone)]
pub enum RepositoryError {
    /// Entity was not found.
    #[error("Entity not found: {0}")]
    NotFound(String),

    /// Database connection or statement error.
    #[error("Database error: {0}")]
    DatabaseError(String),

    /// A stored row could not be encoded or decoded.
    #[error("Serialization error: {0}")]
    SerializationError(String),
}

impl From<sqlx::Error> for RepositoryError {
    fn from(error: sqlx::Error) -> Self {
        match error {
            sqlx::Error::RowNotFound => Self::NotFound("row not found".to_string()),
            sqlx::Error::ColumnDecode { .. } | sqlx::Error::Decode(_) => {
                Self::SerializationError(error.to_string())
            }
            other => Self::DatabaseError(other.to_string()),
        }
    }
}

/// Future returned by every repository operation.
pub type RepositoryFuture<'a, T> = BoxFuture<'a, Result<T, RepositoryError>>;

// =============================================================================
// Task Repository
// =============================================================================

/// The authoritative store of tasks, keyed by id.
///
/// Each method is a single atomic step of the backend. Nothing here locks
/// across calls: a read followed by a write from the same request can
/// interleave with another request, and the later write wins.
pub trait TaskRepository: Send + Sync {
    /// Finds a task by its ID.
    fn find_by_id<'a>(&'a self, id: &'a TaskId) -> RepositoryFuture<'a, Option<Task>>;

    /// Inserts a new task.
    fn insert<'a>(&'a self, task: &'a Task) -> RepositoryFuture<'a, ()>;

    /// Inserts every task in `tasks`, or none of them.
    ///
    /// A duplicate id, whether already stored or repeated within `tasks`,
    /// fails the whole batch.
    fn insert_many<'a>(&'a self, tasks: &'a [Task]) -> RepositoryFuture<'a, ()>;

    /// Overwrites an existing task and, in the same transaction, inserts the
    /// successor it spawned.
    ///
    /// Returns `Ok(false)` without writing anything when `task.id` is no
    /// longer stored.
    fn update<'a>(
        &'a self,
        task: &'a Task,
        successor: Option<&'a Task>,
    ) -> RepositoryFuture<'a, bool>;

    /// Deletes a task by its ID.
    ///
    /// Returns `Ok(true)` if the task was deleted, `Ok(false)` if it didn't exist.
    fn delete<'a>(&'a self, id: &'a TaskId) -> RepositoryFuture<'a, bool>;

    /// Lists every task, newest `created_at` first.
    fn list(&self) -> RepositoryFuture<'_, Vec<Task>>;

    /// Counts all tasks.
    fn count(&self) -> RepositoryFuture<'_, u64>;
}

/// Sorts tasks newest first, breaking `created_at` ties by id.
pub(crate) fn sort_newest_first(tasks: &mut [Task]) {
    tasks.sort_by(|left, right| {
        right
            .created_at
            .cmp(&left.created_at)
            .then_with(|| right.id.cmp(&left.id))
    });
}

// =============================================================================
// Tests
// =============================================================================
