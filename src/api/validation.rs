//! Validation of task payloads.
//!
//! Payloads are checked as raw JSON before they are decoded, so that every
//! rule runs and the caller receives the whole list of violations in one
//! response. A payload that passes always decodes into a [`TaskDraft`] or
//! [`TaskPatch`].
//!
//! # Examples
//!
//! ```
//! use mission_control::api::validation::{ValidationMode, validate};
//! use serde_json::json;
//!
//! let payload = json!({ "title": "", "priority": "Urgent" });
//! let error = validate(&payload, ValidationMode::Full).unwrap_err();
//!
//! assert_eq!(error.errors.len(), 2);
//! ```

use std::sync::LazyLock;

use regex::Regex;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use super::error::{FieldError, ValidationError};
use crate::domain::{Priority, Recurrence, TaskDraft, TaskPatch, TaskStatus};

/// Maximum title length, in characters after trimming.
pub const TITLE_MAX_CHARS: usize = 500;

/// Maximum description length, in characters after trimming.
pub const DESCRIPTION_MAX_CHARS: usize = 5000;

/// Four digits, dash, two digits, dash, two digits. Anything after is kept.
#[allow(clippy::expect_used)]
static DUE_DATE_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[0-9]{4}-[0-9]{2}-[0-9]{2}").expect("due date pattern is valid")
});

/// Which rule set applies to a payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationMode {
    /// Create or full replace: `title` is required.
    Full,
    /// Sparse change-set: every field is optional.
    Partial,
}

// =============================================================================
// Validation
// =============================================================================

/// Checks `payload` against every field rule.
///
/// Fields the board does not know are ignored. `dueDate` and `recurrence`
/// accept `null` (clear); `null` for any other field is a violation.
///
/// # Errors
///
/// Returns `ValidationError` listing every violation, in field order.
pub fn validate(payload: &Value, mode: ValidationMode) -> Result<(), ValidationError> {
    let Some(object) = payload.as_object() else {
        return Err(ValidationError::single(
            "body",
            "Request body must be a JSON object",
        ));
    };

    let mut errors = Vec::new();
    check_title(object, mode, &mut errors);
    check_text(
        object,
        "description",
        "Description",
        Some(DESCRIPTION_MAX_CHARS),
        &mut errors,
    );
    check_choice(
        object,
        "status",
        "Status",
        &TaskStatus::ALL.map(TaskStatus::as_str),
        false,
        &mut errors,
    );
    check_choice(
        object,
        "priority",
        "Priority",
        &Priority::ALL.map(Priority::as_str),
        false,
        &mut errors,
    );
    check_assignees(object, &mut errors);
    check_text(object, "project", "Project", None, &mut errors);
    check_text(object, "output", "Output", None, &mut errors);
    check_due_date(object, &mut errors);
    check_choice(
        object,
        "recurrence",
        "Recurrence",
        &Recurrence::ALL.map(Recurrence::as_str),
        true,
        &mut errors,
    );

    if errors.is_empty() {
        Ok(())
    } else {
        Err(ValidationError::new(errors))
    }
}

/// Validates a creation payload and decodes it.
///
/// # Errors
///
/// Returns `ValidationError` if any rule is violated.
pub fn validated_draft(payload: Value) -> Result<TaskDraft, ValidationError> {
    validate(&payload, ValidationMode::Full)?;
    decode(payload)
}

/// Validates a change-set under `mode` and decodes it.
///
/// # Errors
///
/// Returns `ValidationError` if any rule is violated.
pub fn validated_patch(payload: Value, mode: ValidationMode) -> Result<TaskPatch, ValidationError> {
    validate(&payload, mode)?;
    decode(payload)
}

fn decode<T: DeserializeOwned>(payload: Value) -> Result<T, ValidationError> {
    serde_json::from_value(payload)
        .map_err(|error| ValidationError::single("body", error.to_string()))
}

// =============================================================================
// Field Rules
// =============================================================================

fn check_title(object: &Map<String, Value>, mode: ValidationMode, errors: &mut Vec<FieldError>) {
    match (object.get("title"), mode) {
        (None | Some(Value::Null), ValidationMode::Full) => {
            errors.push(FieldError::new("title", "Title is required"));
        }
        (None, ValidationMode::Partial) => {}
        (Some(Value::String(title)), _) => {
            let trimmed = title.trim();
            if mode == ValidationMode::Full && trimmed.is_empty() {
                errors.push(FieldError::new("title", "Title is required"));
            }
            if trimmed.chars().count() > TITLE_MAX_CHARS {
                errors.push(FieldError::new(
                    "title",
                    format!("Title must be {TITLE_MAX_CHARS} characters or fewer"),
                ));
            }
        }
        (Some(_), _) => errors.push(FieldError::new("title", "Title must be a string")),
    }
}

fn check_text(
    object: &Map<String, Value>,
    field: &'static str,
    label: &str,
    max_chars: Option<usize>,
    errors: &mut Vec<FieldError>,
) {
    match object.get(field) {
        None => {}
        Some(Value::String(text)) => {
            if let Some(max) = max_chars
                && text.trim().chars().count() > max
            {
                errors.push(FieldError::new(
                    field,
                    format!("{label} must be {max} characters or fewer"),
                ));
            }
        }
        Some(_) => errors.push(FieldError::new(field, format!("{label} must be a string"))),
    }
}

fn check_choice(
    object: &Map<String, Value>,
    field: &'static str,
    label: &str,
    allowed: &[&str],
    nullable: bool,
    errors: &mut Vec<FieldError>,
) {
    let valid = match object.get(field) {
        None => true,
        Some(Value::Null) => nullable,
        Some(Value::String(value)) => allowed.contains(&value.as_str()),
        Some(_) => false,
    };
    if !valid {
        errors.push(FieldError::new(
            field,
            format!("{label} must be one of: {}", allowed.join(", ")),
        ));
    }
}

fn check_assignees(object: &Map<String, Value>, errors: &mut Vec<FieldError>) {
    match object.get("assignees") {
        None => {}
        Some(Value::Array(items)) => {
            if !items.iter().all(Value::is_string) {
                errors.push(FieldError::new(
                    "assignees",
                    "Assignees must contain only strings",
                ));
            }
        }
        Some(_) => errors.push(FieldError::new("assignees", "Assignees must be an array")),
    }
}

fn check_due_date(object: &Map<String, Value>, errors: &mut Vec<FieldError>) {
    let valid = match object.get("dueDate") {
        None | Some(Value::Null) => true,
        Some(Value::String(value)) => DUE_DATE_PATTERN.is_match(value),
        Some(_) => false,
    };
    if !valid {
        errors.push(FieldError::new(
            "dueDate",
            "Due date must be in YYYY-MM-DD format",
        ));
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{DueDate, Patch};
    use proptest::prelude::*;
    use rstest::rstest;
    use serde_json::json;

    fn messages(payload: &Value, mode: ValidationMode) -> Vec<String> {
        validate(payload, mode)
            .err()
            .map(|error| error.messages())
            .unwrap_or_default()
    }

    #[rstest]
    fn test_minimal_full_payload_is_valid() {
        assert!(validate(&json!({ "title": "Write report" }), ValidationMode::Full).is_ok());
    }

    #[rstest]
    fn test_empty_partial_payload_is_valid() {
        assert!(validate(&json!({}), ValidationMode::Partial).is_ok());
    }

    #[rstest]
    #[case(json!({}))]
    #[case(json!({ "title": "" }))]
    #[case(json!({ "title": "   " }))]
    #[case(json!({ "title": null }))]
    fn test_full_payload_requires_title(#[case] payload: Value) {
        assert_eq!(
            messages(&payload, ValidationMode::Full),
            vec!["Title is required"]
        );
    }

    #[rstest]
    fn test_partial_payload_allows_missing_title() {
        let payload = json!({ "status": "Done" });
        assert!(validate(&payload, ValidationMode::Partial).is_ok());
    }

    #[rstest]
    fn test_title_type_and_length() {
        assert_eq!(
            messages(&json!({ "title": 42 }), ValidationMode::Partial),
            vec!["Title must be a string"]
        );

        let long = "x".repeat(TITLE_MAX_CHARS + 1);
        assert_eq!(
            messages(&json!({ "title": long }), ValidationMode::Partial),
            vec!["Title must be 500 characters or fewer"]
        );

        let padded = format!("  {}  ", "x".repeat(TITLE_MAX_CHARS));
        assert!(validate(&json!({ "title": padded }), ValidationMode::Full).is_ok());
    }

    #[rstest]
    fn test_length_counts_characters_not_bytes() {
        let title = "é".repeat(TITLE_MAX_CHARS);
        assert!(validate(&json!({ "title": title }), ValidationMode::Full).is_ok());
    }

    #[rstest]
    fn test_description_length() {
        let long = "d".repeat(DESCRIPTION_MAX_CHARS + 1);
        assert_eq!(
            messages(&json!({ "description": long }), ValidationMode::Partial),
            vec!["Description must be 5000 characters or fewer"]
        );
    }

    #[rstest]
    #[case(json!({ "status": "Archived" }), "Status must be one of: Recurring, Backlog, In Progress, In Review, Done")]
    #[case(json!({ "status": "in progress" }), "Status must be one of: Recurring, Backlog, In Progress, In Review, Done")]
    #[case(json!({ "priority": "Urgent" }), "Priority must be one of: High, Medium, Low")]
    #[case(json!({ "priority": null }), "Priority must be one of: High, Medium, Low")]
    #[case(json!({ "recurrence": "yearly" }), "Recurrence must be one of: daily, weekly, biweekly, monthly")]
    #[case(json!({ "assignees": "Henry" }), "Assignees must be an array")]
    #[case(json!({ "assignees": ["Henry", 7] }), "Assignees must contain only strings")]
    #[case(json!({ "project": 3 }), "Project must be a string")]
    #[case(json!({ "output": ["x"] }), "Output must be a string")]
    #[case(json!({ "dueDate": "01/02/2024" }), "Due date must be in YYYY-MM-DD format")]
    #[case(json!({ "dueDate": 20240101 }), "Due date must be in YYYY-MM-DD format")]
    fn test_single_field_violation(#[case] payload: Value, #[case] expected: &str) {
        assert_eq!(messages(&payload, ValidationMode::Partial), vec![expected]);
    }

    #[rstest]
    #[case(json!({ "dueDate": null }))]
    #[case(json!({ "recurrence": null }))]
    #[case(json!({ "dueDate": "2024-01-01T09:00:00Z" }))]
    #[case(json!({ "dueDate": "9999-99-99" }))]
    #[case(json!({ "assignees": [] }))]
    #[case(json!({ "unknownField": { "nested": true } }))]
    fn test_accepted_partial_payloads(#[case] payload: Value) {
        assert!(validate(&payload, ValidationMode::Partial).is_ok());
    }

    #[rstest]
    fn test_violations_are_collected_exhaustively() {
        let payload = json!({
            "title": "",
            "status": "Nope",
            "priority": "Nope",
            "assignees": {},
            "dueDate": "soon",
            "recurrence": "hourly"
        });

        assert_eq!(messages(&payload, ValidationMode::Full).len(), 6);
    }

    #[rstest]
    #[case(json!([]))]
    #[case(json!("title"))]
    #[case(Value::Null)]
    fn test_non_object_body(#[case] payload: Value) {
        assert_eq!(
            messages(&payload, ValidationMode::Partial),
            vec!["Request body must be a JSON object"]
        );
    }

    #[rstest]
    fn test_validated_patch_keeps_three_way_distinction() {
        let patch = validated_patch(
            json!({ "dueDate": null, "recurrence": "weekly" }),
            ValidationMode::Partial,
        )
        .unwrap();

        assert_eq!(patch.due_date, Patch::<DueDate>::Clear);
        assert_eq!(patch.recurrence, Patch::Set(Recurrence::Weekly));
        assert_eq!(patch.title, None);
    }

    #[rstest]
    fn test_validated_draft_decodes_wire_names() {
        let draft = validated_draft(json!({
            "title": "Write report",
            "status": "In Review",
            "dueDate": "2024-01-01"
        }))
        .unwrap();

        assert_eq!(draft.status, Some(TaskStatus::InReview));
        assert_eq!(draft.due_date, Some(DueDate::new("2024-01-01")));
    }

    proptest! {
        #[test]
        fn prop_valid_payloads_always_decode(
            title in "[a-zA-Z ]{1,40}",
            status in prop::sample::select(TaskStatus::ALL.to_vec()),
            priority in prop::sample::select(Priority::ALL.to_vec()),
        ) {
            prop_assume!(!title.trim().is_empty());
            let payload = json!({
                "title": title,
                "status": status.as_str(),
                "priority": priority.as_str(),
            });

            let draft = validated_draft(payload).unwrap();
            prop_assert_eq!(draft.status, Some(status));
            prop_assert_eq!(draft.priority, Some(priority));
        }
    }
}
