//! Response bodies that are not a bare task.

use serde::{Deserialize, Serialize};

use crate::domain::Task;

/// Response of `PATCH /tasks/{id}`: the updated task, plus its successor when
/// the change completed a recurring task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatchTaskResponse {
    #[serde(flatten)]
    pub task: Task,
    #[serde(
        rename = "newRecurringTask",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub new_recurring_task: Option<Task>,
}

/// Response of `GET /health`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub status: String,
    /// RFC 3339 server time.
    pub timestamp: String,
    pub task_count: u64,
}
