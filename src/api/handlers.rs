//! HTTP handlers for the task board API.
//!
//! Mutations follow one sequence: validate the raw body, read the stored
//! task, compute the write with [`apply_patch`], persist the task and any
//! successor in one repository call. The sequence holds no lock across its
//! steps, so concurrent writers to the same id resolve as last write wins.

use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, State, rejection::JsonRejection},
    http::StatusCode,
};
use serde_json::Value;

use super::dto::{HealthResponse, PatchTaskResponse};
use super::error::ApiErrorResponse;
use super::validation::{ValidationMode, validated_draft, validated_patch};
use crate::domain::{
    DueDate, MutationContext, PatchOutcome, Task, TaskId, TaskPatch, Timestamp, apply_patch,
};
use crate::infrastructure::TaskRepository;

// =============================================================================
// Application State
// =============================================================================

/// Shared application dependencies.
#[derive(Clone)]
pub struct AppState {
    pub task_repository: Arc<dyn TaskRepository>,
}

impl AppState {
    #[must_use]
    pub fn new(task_repository: Arc<dyn TaskRepository>) -> Self {
        Self { task_repository }
    }
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("AppState")
            .field("task_repository", &"Arc<dyn TaskRepository>")
            .finish()
    }
}

type JsonBody = Result<Json<Value>, JsonRejection>;

// =============================================================================
// Read Handlers
// =============================================================================

/// `GET /tasks`: every task, newest first.
///
/// # Errors
///
/// Returns 500 if the store cannot be read.
pub async fn list_tasks(State(state): State<AppState>) -> Result<Json<Vec<Task>>, ApiErrorResponse> {
    let tasks = state.task_repository.list().await?;
    Ok(Json(tasks))
}

/// `GET /tasks/{id}`.
///
/// # Errors
///
/// Returns 404 for an unknown id, 500 if the store cannot be read.
pub async fn get_task(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Task>, ApiErrorResponse> {
    let task = state
        .task_repository
        .find_by_id(&TaskId::new(id))
        .await?
        .ok_or_else(ApiErrorResponse::task_not_found)?;
    Ok(Json(task))
}

// =============================================================================
// Mutation Handlers
// =============================================================================

/// `POST /tasks`.
///
/// Creating a task never spawns a successor, even with status `Done`.
///
/// # Response
///
/// - **201 Created**: the stored task
/// - **400 Bad Request**: every validation violation
/// - **500 Internal Server Error**: persistence failure
///
/// # Errors
///
/// Returns [`ApiErrorResponse`] for the 400 and 500 cases above.
pub async fn create_task(
    State(state): State<AppState>,
    body: JsonBody,
) -> Result<(StatusCode, Json<Task>), ApiErrorResponse> {
    let Json(payload) = body?;
    let draft = validated_draft(payload)?;

    let task = draft.into_task(TaskId::generate(), Timestamp::now());
    state.task_repository.insert(&task).await?;

    tracing::debug!(task_id = %task.id, "Task created");
    Ok((StatusCode::CREATED, Json(task)))
}

/// `PUT /tasks/{id}`: full replacement.
///
/// The payload is validated as a full task (title required), but fields it
/// leaves out keep their stored values instead of being reset.
///
/// # Errors
///
/// Returns 400 on validation failure, 404 for an unknown id, 500 on
/// persistence failure.
pub async fn replace_task(
    State(state): State<AppState>,
    Path(id): Path<String>,
    body: JsonBody,
) -> Result<Json<PatchTaskResponse>, ApiErrorResponse> {
    let Json(payload) = body?;
    let patch = validated_patch(payload, ValidationMode::Full)?;

    let outcome = apply_change(&state, TaskId::new(id), patch).await?;
    Ok(Json(outcome.into()))
}

/// `PATCH /tasks/{id}`: sparse change-set.
///
/// When the change completes a recurring task, the response carries the
/// successor under `newRecurringTask`.
///
/// # Errors
///
/// Returns 400 on validation failure, 404 for an unknown id, 500 on
/// persistence failure.
pub async fn patch_task(
    State(state): State<AppState>,
    Path(id): Path<String>,
    body: JsonBody,
) -> Result<Json<PatchTaskResponse>, ApiErrorResponse> {
    let Json(payload) = body?;
    let patch = validated_patch(payload, ValidationMode::Partial)?;

    let outcome = apply_change(&state, TaskId::new(id), patch).await?;
    Ok(Json(outcome.into()))
}

/// `DELETE /tasks/{id}`.
///
/// # Errors
///
/// Returns 404 for an unknown id, 500 on persistence failure.
pub async fn delete_task(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiErrorResponse> {
    let id = TaskId::new(id);
    if state.task_repository.delete(&id).await? {
        tracing::debug!(task_id = %id, "Task deleted");
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiErrorResponse::task_not_found())
    }
}

async fn apply_change(
    state: &AppState,
    id: TaskId,
    patch: TaskPatch,
) -> Result<PatchOutcome, ApiErrorResponse> {
    let existing = state
        .task_repository
        .find_by_id(&id)
        .await?
        .ok_or_else(ApiErrorResponse::task_not_found)?;

    let outcome = apply_patch(existing, patch, MutationContext::capture());

    let written = state
        .task_repository
        .update(&outcome.task, outcome.spawned.as_ref())
        .await?;
    if !written {
        tracing::debug!(task_id = %id, "Task vanished before update");
        return Err(ApiErrorResponse::task_not_found());
    }

    if let Some(successor) = &outcome.spawned {
        tracing::info!(
            source_id = %outcome.task.id,
            successor_id = %successor.id,
            due_date = ?successor.due_date.as_ref().map(DueDate::as_str),
            "Spawned recurring task"
        );
    }
    Ok(outcome)
}

impl From<PatchOutcome> for PatchTaskResponse {
    fn from(outcome: PatchOutcome) -> Self {
        Self {
            task: outcome.task,
            new_recurring_task: outcome.spawned,
        }
    }
}

// =============================================================================
// GET /health Handler
// =============================================================================

/// Health check endpoint.
///
/// Always answers 200. A store that cannot be counted reports `degraded`
/// with a zero count.
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let (status, task_count) = match state.task_repository.count().await {
        Ok(count) => ("ok", count),
        Err(error) => {
            tracing::error!(%error, "Health check could not count tasks");
            ("degraded", 0)
        }
    };

    Json(HealthResponse {
        status: status.to_string(),
        timestamp: Timestamp::now().to_string(),
        task_count,
    })
}

// =============================================================================
// Tests
// =============================================================================
