//! API module for HTTP handlers.
//!
//! This module contains route definitions, request validation and
//! request/response handlers.

pub mod dto;
pub mod error;
pub mod handlers;
pub mod routes;
pub mod validation;

pub use dto::{HealthResponse, PatchTaskResponse};
pub use error::{ApiError, ApiErrorResponse, FieldError, ValidationError};
pub use handlers::{
    AppState, create_task, delete_task, get_task, health_check, list_tasks, patch_task,
    replace_task,
};
pub use routes::create_router;
pub use validation::{ValidationMode, validate};
