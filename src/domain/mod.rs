//! Domain module for the task board.
//!
//! This module contains the task entity, the recurrence engine and the
//! partial-update processor. Everything here is pure: clocks and id
//! generation are injected by the caller.

pub mod patch;
pub mod recurrence;
pub mod task;

pub use patch::{MutationContext, Patch, PatchOutcome, TaskDraft, TaskPatch, apply_patch};
pub use recurrence::{Effect, next_due_date, should_spawn, spawn_successor, transition};
pub use task::{DueDate, Priority, Recurrence, Task, TaskId, TaskStatus, Timestamp, UnknownVariant};
