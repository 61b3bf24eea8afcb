//! Client side of the task board.
//!
//! [`TaskSyncManager`] keeps an optimistic cache in front of the REST API,
//! reached through the [`TaskApi`] seam. The `board` helpers derive columns
//! and header numbers from a cache snapshot.

pub mod board;
mod error;
mod sync;
mod transport;

pub use board::{BoardFilter, BoardStats, column, projects};
pub use error::SyncError;
pub use sync::{ReconcileStrategy, TaskSyncManager};
pub use transport::{ApiFuture, HttpTaskApi, TaskApi};
