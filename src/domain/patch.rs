//! Partial-update processor.
//!
//! A mutation arrives as a sparse change-set. Fields that cannot be cleared
//! are `Option<T>` (present or omitted); the two nullable fields, `dueDate`
//! and `recurrence`, use [`Patch`] so that omission and an explicit `null`
//! are different values at the type level.
//!
//! [`apply_patch`] computes the next state of a task from a change-set, runs
//! the spawn rule against the pre-update state, and returns the updated task
//! together with the successor it spawned, if any.

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use super::recurrence::{Effect, transition};
use super::task::{DueDate, Priority, Recurrence, Task, TaskId, TaskStatus, Timestamp};

// =============================================================================
// Patch
// =============================================================================

/// Three-way change of a nullable field.
///
/// Deserializes from a JSON field: a missing key is `Absent` (through
/// `#[serde(default)]`), `null` is `Clear`, and any value is `Set`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Patch<T> {
    /// Leave the stored value untouched.
    #[default]
    Absent,
    /// Write `null`.
    Clear,
    /// Write this value.
    Set(T),
}

impl<T> Patch<T> {
    /// Returns `true` if the field was omitted.
    #[must_use]
    pub const fn is_absent(&self) -> bool {
        matches!(self, Self::Absent)
    }

    /// Resolves the patch against the current value.
    #[must_use]
    pub fn apply(self, current: Option<T>) -> Option<T> {
        match self {
            Self::Absent => current,
            Self::Clear => None,
            Self::Set(value) => Some(value),
        }
    }
}

impl<T> From<Option<T>> for Patch<T> {
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::Clear, Self::Set)
    }
}

impl<'de, T: Deserialize<'de>> Deserialize<'de> for Patch<T> {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        Option::<T>::deserialize(deserializer).map(Self::from)
    }
}

impl<T: Serialize> Serialize for Patch<T> {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match self {
            Self::Absent | Self::Clear => serializer.serialize_none(),
            Self::Set(value) => value.serialize(serializer),
        }
    }
}

// =============================================================================
// Change-sets
// =============================================================================

/// A sparse change-set for an existing task.
///
/// Also used for full replacement: a full payload is a change-set in which
/// every field happens to be present, and any field it leaves out keeps its
/// stored value.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<TaskStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<Priority>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assignees: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,
    #[serde(default, skip_serializing_if = "Patch::is_absent")]
    pub due_date: Patch<DueDate>,
    #[serde(default, skip_serializing_if = "Patch::is_absent")]
    pub recurrence: Patch<Recurrence>,
}

impl TaskPatch {
    /// A change-set that only moves the task to `status`.
    #[must_use]
    pub fn status(status: TaskStatus) -> Self {
        Self {
            status: Some(status),
            ..Self::default()
        }
    }

    /// Builds the change-set that rewrites every field from `task`.
    #[must_use]
    pub fn replacing_with(task: &Task) -> Self {
        Self {
            title: Some(task.title.clone()),
            description: Some(task.description.clone()),
            status: Some(task.status),
            priority: Some(task.priority),
            assignees: Some(task.assignees.clone()),
            project: Some(task.project.clone()),
            output: Some(task.output.clone()),
            due_date: task.due_date.clone().into(),
            recurrence: task.recurrence.into(),
        }
    }
}

/// The payload for creating a task.
///
/// Omitted fields take the board defaults described on [`Task::new`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskDraft {
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<TaskStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<Priority>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assignees: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub due_date: Option<DueDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recurrence: Option<Recurrence>,
}

impl TaskDraft {
    /// A draft with only a title.
    #[must_use]
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            description: None,
            status: None,
            priority: None,
            assignees: None,
            project: None,
            output: None,
            due_date: None,
            recurrence: None,
        }
    }

    /// Builds the stored task. Text fields are trimmed.
    ///
    /// Creating a task never spawns a successor, whatever its status.
    #[must_use]
    pub fn into_task(self, id: TaskId, now: Timestamp) -> Task {
        Task::new(id, self.title.trim(), now)
            .with_description(trimmed(self.description))
            .with_status(self.status.unwrap_or_default())
            .with_priority(self.priority.unwrap_or_default())
            .with_assignees(self.assignees.unwrap_or_default())
            .with_project(trimmed(self.project))
            .with_output(trimmed(self.output))
            .with_due_date(self.due_date)
            .with_recurrence(self.recurrence)
    }
}

fn trimmed(value: Option<String>) -> String {
    value.map(|text| text.trim().to_string()).unwrap_or_default()
}

// =============================================================================
// Applying a change-set
// =============================================================================

/// Impure inputs to a mutation, generated at the handler boundary.
#[derive(Debug, Clone)]
pub struct MutationContext {
    /// Becomes `updated_at` of the source and the timestamps of a successor.
    pub now: Timestamp,
    /// Used only if the mutation spawns a successor.
    pub successor_id: TaskId,
}

impl MutationContext {
    /// Captures the clock and a fresh successor id.
    ///
    /// **Note**: This is an impure function.
    #[must_use]
    pub fn capture() -> Self {
        Self {
            now: Timestamp::now(),
            successor_id: TaskId::generate(),
        }
    }
}

/// Result of applying a change-set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatchOutcome {
    /// The source task as it must be written.
    pub task: Task,
    /// The next occurrence, when the mutation completed a recurring task.
    pub spawned: Option<Task>,
}

/// Applies `patch` to `existing`.
///
/// Omitted fields keep their stored values exactly; present text fields are
/// trimmed (assignees are kept verbatim). `updated_at` and `version` always
/// move, even when nothing visible changes.
///
/// The spawn rule is evaluated against `existing` before any field is
/// written. When it fires, `recurrence` on the source is forced to `None`,
/// overriding whatever the change-set said about it.
#[must_use]
pub fn apply_patch(existing: Task, patch: TaskPatch, context: MutationContext) -> PatchOutcome {
    let new_status = patch.status.unwrap_or(existing.status);
    let effect = transition(&existing, new_status, context.successor_id, &context.now);

    let recurrence = match effect {
        Effect::SpawnSuccessor(_) => None,
        Effect::NoOp => patch.recurrence.apply(existing.recurrence),
    };

    let task = Task {
        id: existing.id,
        title: patch
            .title
            .map_or(existing.title, |title| title.trim().to_string()),
        description: patch
            .description
            .map_or(existing.description, |text| text.trim().to_string()),
        status: new_status,
        priority: patch.priority.unwrap_or(existing.priority),
        assignees: patch.assignees.unwrap_or(existing.assignees),
        project: patch
            .project
            .map_or(existing.project, |text| text.trim().to_string()),
        output: patch
            .output
            .map_or(existing.output, |text| text.trim().to_string()),
        due_date: patch.due_date.apply(existing.due_date),
        recurrence,
        created_at: existing.created_at,
        updated_at: context.now,
        version: existing.version + 1,
    };

    let spawned = match effect {
        Effect::SpawnSuccessor(successor) => Some(successor),
        Effect::NoOp => None,
    };

    PatchOutcome { task, spawned }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rstest::rstest;
    use serde_json::json;

    fn context() -> MutationContext {
        MutationContext {
            now: Timestamp::now(),
            successor_id: TaskId::new("successor"),
        }
    }

    fn recurring_task() -> Task {
        Task::new(TaskId::new("source"), "Write report", Timestamp::now())
            .with_due_date(Some(DueDate::new("2024-01-01")))
            .with_recurrence(Some(Recurrence::Weekly))
    }

    #[rstest]
    fn test_patch_deserializes_three_ways() {
        let omitted: TaskPatch = serde_json::from_value(json!({})).unwrap();
        let cleared: TaskPatch = serde_json::from_value(json!({ "dueDate": null })).unwrap();
        let set: TaskPatch = serde_json::from_value(json!({ "dueDate": "2024-05-01" })).unwrap();

        assert_eq!(omitted.due_date, Patch::Absent);
        assert_eq!(cleared.due_date, Patch::Clear);
        assert_eq!(set.due_date, Patch::Set(DueDate::new("2024-05-01")));
    }

    #[rstest]
    fn test_patch_serializes_only_present_fields() {
        let patch = TaskPatch {
            recurrence: Patch::Clear,
            ..TaskPatch::status(TaskStatus::Done)
        };

        assert_eq!(
            serde_json::to_value(&patch).unwrap(),
            json!({ "status": "Done", "recurrence": null })
        );
    }

    #[rstest]
    fn test_apply_patch_leaves_omitted_fields() {
        let existing = recurring_task()
            .with_description("Numbers")
            .with_assignees(vec!["Zach".to_string()]);
        let patch = TaskPatch {
            title: Some("  Write summary  ".to_string()),
            ..TaskPatch::default()
        };

        let outcome = apply_patch(existing.clone(), patch, context());

        assert_eq!(outcome.task.title, "Write summary");
        assert_eq!(outcome.task.description, existing.description);
        assert_eq!(outcome.task.assignees, existing.assignees);
        assert_eq!(outcome.task.due_date, existing.due_date);
        assert_eq!(outcome.task.recurrence, existing.recurrence);
        assert_eq!(outcome.spawned, None);
    }

    #[rstest]
    fn test_apply_patch_clears_explicit_nulls() {
        let patch = TaskPatch {
            due_date: Patch::Clear,
            recurrence: Patch::Clear,
            ..TaskPatch::default()
        };

        let outcome = apply_patch(recurring_task(), patch, context());

        assert_eq!(outcome.task.due_date, None);
        assert_eq!(outcome.task.recurrence, None);
    }

    #[rstest]
    fn test_apply_patch_bumps_revision_on_noop() {
        let existing = recurring_task();
        let context = context();

        let outcome = apply_patch(existing.clone(), TaskPatch::default(), context.clone());

        assert_eq!(outcome.task.updated_at, context.now);
        assert_eq!(outcome.task.version, existing.version + 1);
        assert_eq!(outcome.task.created_at, existing.created_at);
    }

    #[rstest]
    fn test_completing_recurring_task_spawns_and_clears_source() {
        let outcome = apply_patch(
            recurring_task(),
            TaskPatch::status(TaskStatus::Done),
            context(),
        );

        assert_eq!(outcome.task.status, TaskStatus::Done);
        assert_eq!(outcome.task.recurrence, None);
        let spawned = outcome.spawned.expect("successor");
        assert_eq!(spawned.id, TaskId::new("successor"));
        assert_eq!(spawned.status, TaskStatus::Backlog);
        assert_eq!(spawned.due_date, Some(DueDate::new("2024-01-08")));
        assert_eq!(spawned.recurrence, Some(Recurrence::Weekly));
    }

    #[rstest]
    fn test_spawn_overrides_recurrence_in_change_set() {
        let patch = TaskPatch {
            recurrence: Patch::Set(Recurrence::Daily),
            ..TaskPatch::status(TaskStatus::Done)
        };

        let outcome = apply_patch(recurring_task(), patch, context());

        assert_eq!(outcome.task.recurrence, None);
        assert_eq!(
            outcome.spawned.map(|task| task.recurrence),
            Some(Some(Recurrence::Weekly))
        );
    }

    #[rstest]
    fn test_completing_twice_spawns_once() {
        let first = apply_patch(
            recurring_task(),
            TaskPatch::status(TaskStatus::Done),
            context(),
        );
        let second = apply_patch(first.task, TaskPatch::status(TaskStatus::Done), context());

        assert!(first.spawned.is_some());
        assert!(second.spawned.is_none());
    }

    #[rstest]
    fn test_reopened_and_recompleted_task_does_not_spawn_again() {
        let done = apply_patch(
            recurring_task(),
            TaskPatch::status(TaskStatus::Done),
            context(),
        );
        let reopened = apply_patch(done.task, TaskPatch::status(TaskStatus::Backlog), context());
        let recompleted = apply_patch(
            reopened.task,
            TaskPatch::status(TaskStatus::Done),
            context(),
        );

        assert!(reopened.spawned.is_none());
        assert!(recompleted.spawned.is_none());
    }

    #[rstest]
    fn test_draft_into_task_trims_and_defaults() {
        let draft: TaskDraft = serde_json::from_value(json!({
            "title": "  Plan sprint ",
            "description": " rough notes ",
            "project": " Apollo ",
            "assignees": [" Zach ", "Henry"],
            "dueDate": null,
        }))
        .unwrap();

        let task = draft.into_task(TaskId::new("1"), Timestamp::now());

        assert_eq!(task.title, "Plan sprint");
        assert_eq!(task.description, "rough notes");
        assert_eq!(task.project, "Apollo");
        assert_eq!(task.assignees, vec![" Zach ".to_string(), "Henry".to_string()]);
        assert_eq!(task.status, TaskStatus::Backlog);
        assert_eq!(task.priority, Priority::Medium);
        assert_eq!(task.due_date, None);
    }

    #[rstest]
    fn test_replacing_with_round_trips_every_field() {
        let source = recurring_task()
            .with_output("report.pdf")
            .with_priority(Priority::Low);
        let target = Task::new(TaskId::new("target"), "Other", Timestamp::now());

        let outcome = apply_patch(target, TaskPatch::replacing_with(&source), context());

        assert_eq!(outcome.task.title, source.title);
        assert_eq!(outcome.task.output, source.output);
        assert_eq!(outcome.task.priority, source.priority);
        assert_eq!(outcome.task.due_date, source.due_date);
        assert_eq!(outcome.task.recurrence, source.recurrence);
    }

    proptest! {
        #[test]
        fn prop_empty_change_set_preserves_visible_fields(
            title in "[a-zA-Z ]{1,40}",
            description in "[a-z ]{0,40}",
            assignees in prop::collection::vec("[A-Za-z ]{0,8}", 0..4),
            status_index in 0usize..5,
        ) {
            let existing = Task::new(TaskId::new("p"), title, Timestamp::now())
                .with_description(description)
                .with_assignees(assignees)
                .with_status(TaskStatus::ALL[status_index])
                .with_due_date(Some(DueDate::new("2024-06-01 late")));

            let outcome = apply_patch(existing.clone(), TaskPatch::default(), context());

            prop_assert_eq!(&outcome.task.title, &existing.title);
            prop_assert_eq!(&outcome.task.description, &existing.description);
            prop_assert_eq!(&outcome.task.assignees, &existing.assignees);
            prop_assert_eq!(outcome.task.status, existing.status);
            prop_assert_eq!(&outcome.task.due_date, &existing.due_date);
            prop_assert!(outcome.spawned.is_none());
        }
    }
}
