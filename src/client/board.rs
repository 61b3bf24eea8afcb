//! Read-side views over a task list: columns, filters and summary numbers.

use std::collections::BTreeSet;

use chrono::TimeDelta;

use crate::domain::{Task, TaskStatus, Timestamp};

/// Narrows a column to one assignee and/or one project.
///
/// `None` matches everything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BoardFilter {
    pub assignee: Option<String>,
    pub project: Option<String>,
}

impl BoardFilter {
    #[must_use]
    pub fn matches(&self, task: &Task) -> bool {
        let assignee_matches = self
            .assignee
            .as_ref()
            .is_none_or(|assignee| task.assignees.contains(assignee));
        let project_matches = self
            .project
            .as_ref()
            .is_none_or(|project| &task.project == project);
        assignee_matches && project_matches
    }
}

/// The tasks shown in the `status` column, keeping list order.
#[must_use]
pub fn column<'a>(tasks: &'a [Task], status: TaskStatus, filter: &BoardFilter) -> Vec<&'a Task> {
    tasks
        .iter()
        .filter(|task| task.status == status && filter.matches(task))
        .collect()
}

/// Summary numbers for the board header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BoardStats {
    /// Tasks created in the seven days up to `now`.
    pub this_week: usize,
    pub in_progress: usize,
    pub total: usize,
    /// Share of `Done` tasks as a whole percentage, rounded half up.
    pub completion: u32,
}

impl BoardStats {
    #[must_use]
    pub fn compute(tasks: &[Task], now: &Timestamp) -> Self {
        let week_ago = *now.as_datetime() - TimeDelta::days(7);

        let this_week = tasks
            .iter()
            .filter(|task| *task.created_at.as_datetime() >= week_ago)
            .count();
        let in_progress = tasks
            .iter()
            .filter(|task| task.status == TaskStatus::InProgress)
            .count();
        let done = tasks.iter().filter(|task| task.status.is_done()).count();
        let total = tasks.len();

        Self {
            this_week,
            in_progress,
            total,
            completion: completion_percent(done, total),
        }
    }
}

fn completion_percent(done: usize, total: usize) -> u32 {
    if total == 0 {
        return 0;
    }
    let percent = (done * 200 + total) / (total * 2);
    u32::try_from(percent).unwrap_or(100)
}

/// Distinct non-empty project names, sorted.
#[must_use]
pub fn projects(tasks: &[Task]) -> Vec<String> {
    tasks
        .iter()
        .filter(|task| !task.project.is_empty())
        .map(|task| task.project.clone())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}
