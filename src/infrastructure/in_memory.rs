//! In-memory repository implementation.
//!
//! Suitable for tests and local development. A single write lock covers an
//! update together with its successor, so both become visible at once.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use futures::FutureExt;
use tokio::sync::RwLock;

use crate::domain::{Task, TaskId};
use crate::infrastructure::repository::sort_newest_first;
use crate::infrastructure::{RepositoryError, RepositoryFuture, TaskRepository};

/// In-memory implementation of `TaskRepository`.
///
/// # Example
///
/// ```ignore
/// use mission_control::infrastructure::InMemoryTaskRepository;
///
/// let repository = InMemoryTaskRepository::new();
/// let task = Task::new(TaskId::generate(), "My Task", Timestamp::now());
///
/// repository.insert(&task).await?;
/// let found = repository.find_by_id(&task.id).await?;
/// ```
#[derive(Debug, Clone, Default)]
pub struct InMemoryTaskRepository {
    tasks: Arc<RwLock<HashMap<TaskId, Task>>>,
}

impl InMemoryTaskRepository {
    /// Creates a new empty in-memory task repository.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[allow(clippy::significant_drop_tightening)]
impl TaskRepository for InMemoryTaskRepository {
    fn find_by_id<'a>(&'a self, id: &'a TaskId) -> RepositoryFuture<'a, Option<Task>> {
        async move {
            let guard = self.tasks.read().await;
            Ok(guard.get(id).cloned())
        }
        .boxed()
    }

    fn insert<'a>(&'a self, task: &'a Task) -> RepositoryFuture<'a, ()> {
        async move {
            let mut guard = self.tasks.write().await;
            if guard.contains_key(&task.id) {
                return Err(RepositoryError::DatabaseError(format!(
                    "Duplicate task id: {}",
                    task.id
                )));
            }
            guard.insert(task.id.clone(), task.clone());
            Ok(())
        }
        .boxed()
    }

    fn insert_many<'a>(&'a self, tasks: &'a [Task]) -> RepositoryFuture<'a, ()> {
        async move {
            let mut guard = self.tasks.write().await;
            let mut batch_ids = HashSet::with_capacity(tasks.len());
            if let Some(duplicate) = tasks
                .iter()
                .find(|task| guard.contains_key(&task.id) || !batch_ids.insert(&task.id))
            {
                return Err(RepositoryError::DatabaseError(format!(
                    "Duplicate task id: {}",
                    duplicate.id
                )));
            }

            for task in tasks {
                guard.insert(task.id.clone(), task.clone());
            }
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
            let mut guard = self.tasks.write().await;
            let Some(slot) = guard.get_mut(&task.id) else {
                return Ok(false);
            };
            *slot = task.clone();

            if let Some(successor) = successor {
                guard.insert(successor.id.clone(), successor.clone());
            }
            Ok(true)
        }
        .boxed()
    }

    fn delete<'a>(&'a self, id: &'a TaskId) -> RepositoryFuture<'a, bool> {
        async move {
            let mut guard = self.tasks.write().await;
            Ok(guard.remove(id).is_some())
        }
        .boxed()
    }

    fn list(&self) -> RepositoryFuture<'_, Vec<Task>> {
        async move {
            let guard = self.tasks.read().await;
            let mut tasks: Vec<Task> = guard.values().cloned().collect();
            drop(guard);

            sort_newest_first(&mut tasks);
            Ok(tasks)
        }
        .boxed()
    }

    fn count(&self) -> RepositoryFuture<'_, u64> {
        async move {
            let guard = self.tasks.read().await;
            Ok(guard.len() as u64)
        }
        .boxed()
    }
}

// =============================================================================
// Tests
// =============================================================================
