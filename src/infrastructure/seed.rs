//! Initial-data import for an empty store.
//!
//! The seed file holds `{ "tasks": [...] }`. Only `title` is required per
//! entry; other fields take the board defaults, a missing `id` is generated
//! and a missing `createdAt` becomes the import time.

use std::path::Path;

use serde::Deserialize;
use thiserror::Error;

use crate::domain::{DueDate, Priority, Recurrence, Task, TaskId, TaskStatus, Timestamp};
use crate::infrastructure::{RepositoryError, TaskRepository};

/// Errors that can occur while importing a seed file.
#[derive(Debug, Error)]
pub enum SeedError {
    #[error("Failed to read seed file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Malformed seed file: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Failed to store seeded task: {0}")]
    Repository(#[from] RepositoryError),
}

#[derive(Debug, Deserialize)]
struct SeedFile {
    tasks: Vec<SeedTask>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SeedTask {
    #[serde(default)]
    id: Option<TaskId>,
    title: String,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    status: Option<TaskStatus>,
    #[serde(default)]
    priority: Option<Priority>,
    #[serde(default)]
    assignees: Option<Vec<String>>,
    #[serde(default)]
    project: Option<String>,
    #[serde(default)]
    output: Option<String>,
    #[serde(default)]
    due_date: Option<DueDate>,
    #[serde(default)]
    recurrence: Option<Recurrence>,
    #[serde(default)]
    created_at: Option<Timestamp>,
}

impl SeedTask {
    fn into_task(self, now: &Timestamp) -> Task {
        let created_at = self.created_at.unwrap_or_else(|| now.clone());
        Task::new(
            self.id.unwrap_or_else(TaskId::generate),
            self.title,
            created_at,
        )
        .with_description(self.description.unwrap_or_default())
        .with_status(self.status.unwrap_or_default())
        .with_priority(self.priority.unwrap_or_default())
        .with_assignees(self.assignees.unwrap_or_default())
        .with_project(self.project.unwrap_or_default())
        .with_output(self.output.unwrap_or_default())
        .with_due_date(self.due_date)
        .with_recurrence(self.recurrence)
    }
}

/// Parses seed file contents into tasks, stamping defaults with `now`.
///
/// # Errors
///
/// Returns `SeedError::Parse` if the contents are not a valid seed document.
pub fn parse_seed(contents: &str, now: &Timestamp) -> Result<Vec<Task>, SeedError> {
    let file: SeedFile = serde_json::from_str(contents)?;
    Ok(file
        .tasks
        .into_iter()
        .map(|task| task.into_task(now))
        .collect())
}

/// Imports the tasks in `path` when `repository` holds no tasks.
///
/// Returns the number of imported tasks; `0` when the store already had data.
/// The whole file is parsed before anything is written, and the tasks are
/// stored as one batch: a file that cannot be fully imported leaves the store
/// empty, so the next start tries again.
///
/// # Errors
///
/// Returns `SeedError` if the file cannot be read or parsed, or a task cannot
/// be stored.
pub async fn seed_if_empty(
    repository: &dyn TaskRepository,
    path: &Path,
) -> Result<usize, SeedError> {
    if repository.count().await? > 0 {
        tracing::debug!("Store already populated, skipping seed");
        return Ok(0);
    }

    let contents = std::fs::read_to_string(path)?;
    let tasks = parse_seed(&contents, &Timestamp::now())?;

    repository.insert_many(&tasks).await?;

    tracing::info!(count = tasks.len(), path = %path.display(), "Seeded tasks");
    Ok(tasks.len())
}

// =============================================================================
// Tests
// =============================================================================
