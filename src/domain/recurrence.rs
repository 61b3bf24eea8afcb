//! Recurrence engine.
//!
//! Two pure pieces live here: the date arithmetic that advances a due date by
//! one recurrence period, and the status transition rule that decides whether
//! completing a task spawns its next occurrence.
//!
//! # Calendar overflow
//!
//! Dates are normalised by carrying overflow forward instead of clamping, so
//! a monthly task due on the 31st of January lands in early March:
//!
//! ```
//! use mission_control::domain::{DueDate, Recurrence, next_due_date};
//!
//! let next = next_due_date(Some(&DueDate::new("2024-01-31")), Some(Recurrence::Monthly));
//! assert_eq!(next, Some(DueDate::new("2024-03-02")));
//! ```

use chrono::{Datelike, NaiveDate, TimeDelta};

use super::task::{DueDate, Recurrence, Task, TaskId, TaskStatus, Timestamp};

// =============================================================================
// Date Arithmetic
// =============================================================================

const MIN_YEAR: i32 = 0;
const MAX_YEAR: i32 = 9999;

/// Computes the due date of the next occurrence.
///
/// Returns `None` when either input is absent, when the current due date
/// has no readable leading `YYYY-MM-DD`, or when the next date falls outside
/// the four-digit years `0000` to `9999`.
#[must_use]
pub fn next_due_date(current: Option<&DueDate>, period: Option<Recurrence>) -> Option<DueDate> {
    let (year, month, day) = current?.components()?;
    let period = period?;

    let base = normalized_date(year, month - 1, day)?;

    let next = match period {
        Recurrence::Daily => base.checked_add_signed(TimeDelta::try_days(1)?)?,
        Recurrence::Weekly => base.checked_add_signed(TimeDelta::try_days(7)?)?,
        Recurrence::Biweekly => base.checked_add_signed(TimeDelta::try_days(14)?)?,
        Recurrence::Monthly => normalized_date(
            i64::from(base.year()),
            i64::from(base.month0()) + 1,
            i64::from(base.day()),
        )?,
    };

    if !(MIN_YEAR..=MAX_YEAR).contains(&next.year()) {
        return None;
    }
    Some(DueDate::from_date(next))
}

/// Builds a date from possibly out-of-range parts.
///
/// Excess months carry into years and excess days into the following months,
/// so `(2024, 1, 30)` (zero-based month) is the 1st of March 2024.
fn normalized_date(year: i64, month_index: i64, day: i64) -> Option<NaiveDate> {
    let year = year.checked_add(month_index.div_euclid(12))?;
    let month = month_index.rem_euclid(12) + 1;

    let first_of_month =
        NaiveDate::from_ymd_opt(i32::try_from(year).ok()?, u32::try_from(month).ok()?, 1)?;

    first_of_month.checked_add_signed(TimeDelta::try_days(day.checked_sub(1)?)?)
}

// =============================================================================
// Status Transition
// =============================================================================

/// Side effect of moving a task to a new status.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    /// Nothing beyond the field writes themselves.
    NoOp,
    /// The task was completed with a recurrence set; this is its successor.
    SpawnSuccessor(Task),
}

impl Effect {
    /// Returns the spawned successor, if any.
    #[must_use]
    pub fn successor(&self) -> Option<&Task> {
        match self {
            Self::NoOp => None,
            Self::SpawnSuccessor(task) => Some(task),
        }
    }
}

/// The spawn rule: entering `Done` from another stage with a recurrence set.
#[must_use]
pub const fn should_spawn(
    old_status: TaskStatus,
    new_status: TaskStatus,
    recurrence: Option<Recurrence>,
) -> bool {
    new_status.is_done() && !old_status.is_done() && recurrence.is_some()
}

/// Decides the effect of moving `existing` to `new_status`.
///
/// `successor_id` and `now` are only used when a successor is spawned; they
/// are passed in so this stays free of clock and id generation.
#[must_use]
pub fn transition(
    existing: &Task,
    new_status: TaskStatus,
    successor_id: TaskId,
    now: &Timestamp,
) -> Effect {
    if should_spawn(existing.status, new_status, existing.recurrence) {
        Effect::SpawnSuccessor(spawn_successor(existing, successor_id, now))
    } else {
        Effect::NoOp
    }
}

/// Builds the next occurrence of `source` from its pre-transition state.
///
/// The successor starts in `Backlog` with an empty output and carries the
/// recurrence forward. Its due date is advanced by one period and is `None`
/// when the source had none.
#[must_use]
pub fn spawn_successor(source: &Task, id: TaskId, now: &Timestamp) -> Task {
    Task {
        id,
        title: source.title.clone(),
        description: source.description.clone(),
        status: TaskStatus::Backlog,
        priority: source.priority,
        assignees: source.assignees.clone(),
        project: source.project.clone(),
        output: String::new(),
        due_date: next_due_date(source.due_date.as_ref(), source.recurrence),
        recurrence: source.recurrence,
        created_at: now.clone(),
        updated_at: now.clone(),
        version: 1,
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Priority;
    use proptest::prelude::*;
    use rstest::rstest;

    fn due(value: &str) -> DueDate {
        DueDate::new(value)
    }

    #[rstest]
    #[case("2024-01-01", Recurrence::Daily, "2024-01-02")]
    #[case("2024-12-31", Recurrence::Daily, "2025-01-01")]
    #[case("2024-01-01", Recurrence::Weekly, "2024-01-08")]
    #[case("2024-02-26", Recurrence::Weekly, "2024-03-04")]
    #[case("2024-01-01", Recurrence::Biweekly, "2024-01-15")]
    #[case("2024-01-15", Recurrence::Monthly, "2024-02-15")]
    #[case("2024-12-15", Recurrence::Monthly, "2025-01-15")]
    fn test_next_due_date(
        #[case] current: &str,
        #[case] period: Recurrence,
        #[case] expected: &str,
    ) {
        assert_eq!(
            next_due_date(Some(&due(current)), Some(period)),
            Some(due(expected))
        );
    }

    #[rstest]
    #[case("2024-01-31", "2024-03-02")]
    #[case("2023-01-31", "2023-03-03")]
    #[case("2024-03-31", "2024-05-01")]
    #[case("2024-01-29", "2024-02-29")]
    fn test_monthly_rolls_over_short_months(#[case] current: &str, #[case] expected: &str) {
        assert_eq!(
            next_due_date(Some(&due(current)), Some(Recurrence::Monthly)),
            Some(due(expected))
        );
    }

    #[rstest]
    fn test_next_due_date_normalizes_invalid_day_before_advancing() {
        // 2024-02-30 is read as 2024-03-01.
        assert_eq!(
            next_due_date(Some(&due("2024-02-30")), Some(Recurrence::Monthly)),
            Some(due("2024-04-01"))
        );
        assert_eq!(
            next_due_date(Some(&due("2024-02-30")), Some(Recurrence::Daily)),
            Some(due("2024-03-02"))
        );
    }

    #[rstest]
    #[case("0000-00-01", Recurrence::Daily)]
    #[case("0000-00-10", Recurrence::Weekly)]
    #[case("9999-12-31", Recurrence::Daily)]
    #[case("9999-12-15", Recurrence::Monthly)]
    fn test_next_due_date_outside_four_digit_years_is_none(
        #[case] current: &str,
        #[case] period: Recurrence,
    ) {
        assert_eq!(next_due_date(Some(&due(current)), Some(period)), None);
    }

    #[rstest]
    #[case("0000-01-01", Recurrence::Daily, "0000-01-02")]
    #[case("9999-12-30", Recurrence::Daily, "9999-12-31")]
    fn test_next_due_date_at_year_bounds(
        #[case] current: &str,
        #[case] period: Recurrence,
        #[case] expected: &str,
    ) {
        assert_eq!(
            next_due_date(Some(&due(current)), Some(period)),
            Some(due(expected))
        );
    }

    #[rstest]
    fn test_next_due_date_ignores_trailing_text() {
        assert_eq!(
            next_due_date(Some(&due("2024-01-01T09:30:00Z")), Some(Recurrence::Weekly)),
            Some(due("2024-01-08"))
        );
    }

    #[rstest]
    fn test_next_due_date_absent_inputs() {
        assert_eq!(next_due_date(None, Some(Recurrence::Daily)), None);
        assert_eq!(next_due_date(Some(&due("2024-01-01")), None), None);
        assert_eq!(next_due_date(Some(&due("not a date")), Some(Recurrence::Daily)), None);
    }

    #[rstest]
    #[case(TaskStatus::Backlog, TaskStatus::Done, Some(Recurrence::Daily), true)]
    #[case(TaskStatus::InReview, TaskStatus::Done, Some(Recurrence::Monthly), true)]
    #[case(TaskStatus::Recurring, TaskStatus::Done, Some(Recurrence::Weekly), true)]
    #[case(TaskStatus::Done, TaskStatus::Done, Some(Recurrence::Daily), false)]
    #[case(TaskStatus::Backlog, TaskStatus::Done, None, false)]
    #[case(TaskStatus::Backlog, TaskStatus::InProgress, Some(Recurrence::Daily), false)]
    #[case(TaskStatus::Done, TaskStatus::Backlog, Some(Recurrence::Daily), false)]
    fn test_should_spawn(
        #[case] old_status: TaskStatus,
        #[case] new_status: TaskStatus,
        #[case] recurrence: Option<Recurrence>,
        #[case] expected: bool,
    ) {
        assert_eq!(should_spawn(old_status, new_status, recurrence), expected);
    }

    #[rstest]
    fn test_transition_spawns_successor_from_source() {
        let created = Timestamp::now();
        let source = Task::new(TaskId::new("source"), "Write report", created)
            .with_description("Quarterly numbers")
            .with_priority(Priority::High)
            .with_assignees(vec!["Henry".to_string()])
            .with_project("Finance")
            .with_output("draft.pdf")
            .with_status(TaskStatus::InProgress)
            .with_due_date(Some(due("2024-01-01")))
            .with_recurrence(Some(Recurrence::Weekly));
        let now = Timestamp::now();

        let effect = transition(&source, TaskStatus::Done, TaskId::new("next"), &now);

        let Effect::SpawnSuccessor(successor) = effect else {
            panic!("expected a successor");
        };
        assert_eq!(successor.id, TaskId::new("next"));
        assert_eq!(successor.title, "Write report");
        assert_eq!(successor.description, "Quarterly numbers");
        assert_eq!(successor.priority, Priority::High);
        assert_eq!(successor.assignees, vec!["Henry".to_string()]);
        assert_eq!(successor.project, "Finance");
        assert_eq!(successor.output, "");
        assert_eq!(successor.status, TaskStatus::Backlog);
        assert_eq!(successor.due_date, Some(due("2024-01-08")));
        assert_eq!(successor.recurrence, Some(Recurrence::Weekly));
        assert_eq!(successor.created_at, now);
        assert_eq!(successor.version, 1);
    }

    #[rstest]
    fn test_transition_without_due_date_still_spawns() {
        let source = Task::new(TaskId::new("source"), "Stand-up", Timestamp::now())
            .with_recurrence(Some(Recurrence::Daily));

        let effect = transition(&source, TaskStatus::Done, TaskId::new("next"), &Timestamp::now());

        let successor = effect.successor().expect("successor");
        assert_eq!(successor.due_date, None);
        assert_eq!(successor.recurrence, Some(Recurrence::Daily));
    }

    #[rstest]
    fn test_transition_is_noop_when_already_done() {
        let source = Task::new(TaskId::new("source"), "Stand-up", Timestamp::now())
            .with_status(TaskStatus::Done)
            .with_recurrence(Some(Recurrence::Daily));

        let effect = transition(&source, TaskStatus::Done, TaskId::new("next"), &Timestamp::now());

        assert_eq!(effect, Effect::NoOp);
    }

    fn any_period() -> impl Strategy<Value = Recurrence> {
        prop::sample::select(Recurrence::ALL.to_vec())
    }

    proptest! {
        #[test]
        fn prop_next_due_date_is_deterministic(
            year in 1970i64..2100,
            month in 1i64..=12,
            day in 1i64..=31,
            period in any_period(),
        ) {
            let current = due(&format!("{year:04}-{month:02}-{day:02}"));
            let first = next_due_date(Some(&current), Some(period));
            let second = next_due_date(Some(&current), Some(period));
            prop_assert!(first.is_some());
            prop_assert_eq!(first, second);
        }

        #[test]
        fn prop_next_due_date_moves_forward(
            year in 1970i64..2100,
            month in 1i64..=12,
            day in 1i64..=28,
            period in any_period(),
        ) {
            let current = format!("{year:04}-{month:02}-{day:02}");
            let next = next_due_date(Some(&due(&current)), Some(period)).unwrap();
            prop_assert!(next.as_str() > current.as_str());
        }

        #[test]
        fn prop_next_due_date_stays_in_date_format(
            year in 0i64..=9999,
            month in 0i64..=99,
            day in 0i64..=99,
            period in any_period(),
        ) {
            let current = due(&format!("{year:04}-{month:02}-{day:02}"));
            if let Some(next) = next_due_date(Some(&current), Some(period)) {
                let text = next.as_str();
                prop_assert_eq!(text.len(), 10);
                prop_assert!(next.components().is_some());
            }
        }
    }
}
