//! Infrastructure layer for the task board.
//!
//! This module provides the task store behind the `TaskRepository` trait,
//! with in-memory and SQLite backends selected at runtime by
//! `RepositoryFactory`, and the optional startup seed import.

mod factory;
mod in_memory;
pub(crate) mod repository;
mod seed;
mod sqlite;

pub use factory::{
    ConfigurationError, DEFAULT_DATABASE_URL, FactoryError, RepositoryConfig, RepositoryFactory,
    StorageMode,
};
pub use in_memory::InMemoryTaskRepository;
pub use repository::{RepositoryError, RepositoryFuture, TaskRepository};
pub use seed::{SeedError, parse_seed, seed_if_empty};
pub use sqlite::SqliteTaskRepository;
