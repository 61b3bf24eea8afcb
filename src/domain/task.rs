//! Task domain model.
//!
//! This module contains the single entity of the board, `Task`, together with
//! its value objects and the closed vocabularies for status, priority and
//! recurrence.

use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

// =============================================================================
// Value Objects - Newtypes
// =============================================================================

/// Opaque unique identifier for a task.
///
/// Freshly generated ids are UUID v7 strings, so their lexical order follows
/// creation order. Ids imported from seed data may be any string.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(String);

impl TaskId {
    /// Wraps an existing identifier.
    #[must_use]
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Generates a new time-ordered identifier.
    ///
    /// **Note**: This is an impure function (side effect: time + random).
    #[must_use]
    pub fn generate() -> Self {
        Self(Uuid::now_v7().to_string())
    }

    /// Returns the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for TaskId {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(formatter, "{}", self.0)
    }
}

impl From<&str> for TaskId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// A timestamp wrapper for `DateTime<Utc>`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Timestamp(DateTime<Utc>);

impl Timestamp {
    /// Creates a `Timestamp` from a `DateTime<Utc>`.
    #[must_use]
    pub const fn from_datetime(datetime: DateTime<Utc>) -> Self {
        Self(datetime)
    }

    /// Returns the inner `DateTime<Utc>`.
    #[must_use]
    pub const fn as_datetime(&self) -> &DateTime<Utc> {
        &self.0
    }

    /// Returns the current time as a `Timestamp`.
    ///
    /// **Note**: This is an impure function (side effect: system clock).
    #[must_use]
    pub fn now() -> Self {
        Self(Utc::now())
    }
}

impl std::fmt::Display for Timestamp {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(formatter, "{}", self.0.to_rfc3339())
    }
}

/// A due date as accepted from a client.
///
/// The stored text is kept verbatim: anything following the leading
/// `YYYY-MM-DD` is preserved but ignored by date arithmetic.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DueDate(String);

impl DueDate {
    /// Wraps a due date string without checking it.
    ///
    /// Format checks belong to the validation layer.
    #[must_use]
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Formats a calendar date as `YYYY-MM-DD`.
    #[must_use]
    pub fn from_date(date: NaiveDate) -> Self {
        Self(date.format("%Y-%m-%d").to_string())
    }

    /// Returns the stored text.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Reads the leading `YYYY-MM-DD` as raw integers `(year, month, day)`.
    ///
    /// The components are not range checked, so `2024-02-30` yields
    /// `(2024, 2, 30)`.
    #[must_use]
    pub fn components(&self) -> Option<(i64, i64, i64)> {
        let bytes = self.0.as_bytes();
        if bytes.len() < 10 || bytes[4] != b'-' || bytes[7] != b'-' {
            return None;
        }

        let number = |range: std::ops::Range<usize>| -> Option<i64> {
            let digits = self.0.get(range)?;
            if digits.bytes().all(|byte| byte.is_ascii_digit()) {
                digits.parse().ok()
            } else {
                None
            }
        };

        Some((number(0..4)?, number(5..7)?, number(8..10)?))
    }
}

impl std::fmt::Display for DueDate {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(formatter, "{}", self.0)
    }
}

// =============================================================================
// Enums
// =============================================================================

/// Error returned when a wire or database value names no known variant.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Unknown {kind}: {value}")]
pub struct UnknownVariant {
    /// Which vocabulary was being parsed.
    pub kind: &'static str,
    /// The rejected value.
    pub value: String,
}

/// The workflow stage of a task.
///
/// Any stage may move to any other; only entering `Done` has a side effect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum TaskStatus {
    Recurring,
    #[default]
    Backlog,
    #[serde(rename = "In Progress")]
    InProgress,
    #[serde(rename = "In Review")]
    InReview,
    Done,
}

impl TaskStatus {
    /// All stages, in board column order.
    pub const ALL: [Self; 5] = [
        Self::Recurring,
        Self::Backlog,
        Self::InProgress,
        Self::InReview,
        Self::Done,
    ];

    /// Returns the wire and storage name of the stage.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Recurring => "Recurring",
            Self::Backlog => "Backlog",
            Self::InProgress => "In Progress",
            Self::InReview => "In Review",
            Self::Done => "Done",
        }
    }

    /// Returns `true` for the completion stage.
    #[must_use]
    pub const fn is_done(self) -> bool {
        matches!(self, Self::Done)
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter.write_str(self.as_str())
    }
}

impl FromStr for TaskStatus {
    type Err = UnknownVariant;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|status| status.as_str() == value)
            .ok_or_else(|| UnknownVariant {
                kind: "status",
                value: value.to_string(),
            })
    }
}

/// The priority level of a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum Priority {
    High,
    #[default]
    Medium,
    Low,
}

impl Priority {
    /// All priority levels, highest first.
    pub const ALL: [Self; 3] = [Self::High, Self::Medium, Self::Low];

    /// Returns the wire and storage name of the priority.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::High => "High",
            Self::Medium => "Medium",
            Self::Low => "Low",
        }
    }
}

impl std::fmt::Display for Priority {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter.write_str(self.as_str())
    }
}

impl FromStr for Priority {
    type Err = UnknownVariant;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|priority| priority.as_str() == value)
            .ok_or_else(|| UnknownVariant {
                kind: "priority",
                value: value.to_string(),
            })
    }
}

/// How often a task regenerates itself once completed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Recurrence {
    Daily,
    Weekly,
    Biweekly,
    Monthly,
}

impl Recurrence {
    /// All recurrence periods, shortest first.
    pub const ALL: [Self; 4] = [Self::Daily, Self::Weekly, Self::Biweekly, Self::Monthly];

    /// Returns the wire and storage name of the period.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Daily => "daily",
            Self::Weekly => "weekly",
            Self::Biweekly => "biweekly",
            Self::Monthly => "monthly",
        }
    }
}

impl std::fmt::Display for Recurrence {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter.write_str(self.as_str())
    }
}

impl FromStr for Recurrence {
    type Err = UnknownVariant;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|recurrence| recurrence.as_str() == value)
            .ok_or_else(|| UnknownVariant {
                kind: "recurrence",
                value: value.to_string(),
            })
    }
}

// =============================================================================
// Task
// =============================================================================

/// A work item on the board.
///
/// `id`, `created_at` are fixed at creation. `updated_at` and `version` move on
/// every accepted mutation, including ones that change no visible field.
///
/// # Examples
///
/// ```
/// use mission_control::domain::{Priority, Recurrence, Task, TaskId, Timestamp};
///
/// let task = Task::new(TaskId::generate(), "Water the plants", Timestamp::now())
///     .with_priority(Priority::High)
///     .with_recurrence(Some(Recurrence::Weekly));
///
/// assert_eq!(task.version, 1);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: TaskId,
    pub title: String,
    pub description: String,
    pub status: TaskStatus,
    pub priority: Priority,
    /// Ordered as given; duplicates are kept.
    pub assignees: Vec<String>,
    pub project: String,
    pub output: String,
    pub due_date: Option<DueDate>,
    /// Only meaningful together with `due_date`.
    pub recurrence: Option<Recurrence>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
    /// Incremented on every accepted mutation, starting at 1.
    pub version: u64,
}

impl Task {
    /// Creates a task with the board defaults.
    ///
    /// The task starts in `Backlog` with `Medium` priority, empty text fields,
    /// no assignees, no due date, no recurrence and version 1.
    #[must_use]
    pub fn new(id: TaskId, title: impl Into<String>, timestamp: Timestamp) -> Self {
        Self {
            id,
            title: title.into(),
            description: String::new(),
            status: TaskStatus::default(),
            priority: Priority::default(),
            assignees: Vec::new(),
            project: String::new(),
            output: String::new(),
            due_date: None,
            recurrence: None,
            created_at: timestamp.clone(),
            updated_at: timestamp,
            version: 1,
        }
    }

    #[must_use]
    pub fn with_description(self, description: impl Into<String>) -> Self {
        Self {
            description: description.into(),
            ..self
        }
    }

    #[must_use]
    pub fn with_status(self, status: TaskStatus) -> Self {
        Self { status, ..self }
    }

    #[must_use]
    pub fn with_priority(self, priority: Priority) -> Self {
        Self { priority, ..self }
    }

    #[must_use]
    pub fn with_assignees(self, assignees: Vec<String>) -> Self {
        Self { assignees, ..self }
    }

    #[must_use]
    pub fn with_project(self, project: impl Into<String>) -> Self {
        Self {
            project: project.into(),
            ..self
        }
    }

    #[must_use]
    pub fn with_output(self, output: impl Into<String>) -> Self {
        Self {
            output: output.into(),
            ..self
        }
    }

    #[must_use]
    pub fn with_due_date(self, due_date: Option<DueDate>) -> Self {
        Self { due_date, ..self }
    }

    #[must_use]
    pub fn with_recurrence(self, recurrence: Option<Recurrence>) -> Self {
        Self { recurrence, ..self }
    }
}

// =============================================================================
// Tests
// =============================================================================
