//! Mission Control task board.
//!
//! A REST service for a task board whose recurring tasks regenerate
//! themselves when completed, and a client sync manager that keeps an
//! optimistic cache of the board in front of that service.
//!
//! - [`domain`]: tasks, the recurrence engine and the partial-update processor
//! - [`api`]: validation, handlers and the axum router
//! - [`infrastructure`]: task stores and their runtime selection
//! - [`client`]: HTTP transport, sync manager and board views

pub mod api;
pub mod client;
pub mod domain;
pub mod infrastructure;
