//! Repository factory for runtime backend selection.
//!
//! # Environment Variables
//!
//! - `STORAGE_MODE`: `in_memory` (default) | `sqlite`
//! - `DATABASE_URL`: SQLite URL, defaults to `sqlite://data/tasks.db`
//! - `SEED_FILE`: optional JSON file imported into an empty store at startup
//!
//! # Example
//!
//! ```ignore
//! use mission_control::infrastructure::{RepositoryConfig, RepositoryFactory};
//!
//! let factory = RepositoryFactory::new(RepositoryConfig::from_env()?);
//! let task_repository = factory.create().await?;
//! ```

use std::env;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;

use thiserror::Error;

use super::{InMemoryTaskRepository, RepositoryError, SqliteTaskRepository, TaskRepository};

/// Used when `DATABASE_URL` is unset.
pub const DEFAULT_DATABASE_URL: &str = "sqlite://data/tasks.db";

// =============================================================================
// Configuration Types
// =============================================================================

/// Backend holding the task records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StorageMode {
    /// Process-local map. Contents are lost on restart.
    #[default]
    InMemory,
    /// File-backed SQLite database.
    Sqlite,
}

impl FromStr for StorageMode {
    type Err = ConfigurationError;

    /// Parses a storage mode from a string.
    ///
    /// # Errors
    ///
    /// Returns `ConfigurationError::InvalidStorageMode` if the string is not recognized.
    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_lowercase().as_str() {
            "in_memory" | "inmemory" | "memory" => Ok(Self::InMemory),
            "sqlite" | "sqlite3" | "file" => Ok(Self::Sqlite),
            _ => Err(ConfigurationError::InvalidStorageMode(value.to_string())),
        }
    }
}

/// Configuration for the repository factory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepositoryConfig {
    pub storage_mode: StorageMode,
    /// Only read when `storage_mode` is `Sqlite`.
    pub database_url: String,
    pub seed_file: Option<PathBuf>,
}

impl Default for RepositoryConfig {
    fn default() -> Self {
        Self {
            storage_mode: StorageMode::default(),
            database_url: DEFAULT_DATABASE_URL.to_string(),
            seed_file: None,
        }
    }
}

impl RepositoryConfig {
    /// Creates a configuration from environment variables.
    ///
    /// Empty or whitespace-only values count as unset.
    ///
    /// # Errors
    ///
    /// Returns `ConfigurationError` if `STORAGE_MODE` is invalid or
    /// `DATABASE_URL` is not a SQLite URL while SQLite storage is selected.
    pub fn from_env() -> Result<Self, ConfigurationError> {
        let storage_mode = match non_empty_var("STORAGE_MODE")? {
            Some(value) => value.parse()?,
            None => StorageMode::default(),
        };

        let config = Self {
            storage_mode,
            database_url: non_empty_var("DATABASE_URL")?
                .unwrap_or_else(|| DEFAULT_DATABASE_URL.to_string()),
            seed_file: non_empty_var("SEED_FILE")?.map(PathBuf::from),
        };

        config.validate()?;
        Ok(config)
    }

    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns `ConfigurationError::InvalidDatabaseUrl` when SQLite storage is
    /// selected with a URL that does not use the `sqlite:` scheme.
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        if self.storage_mode == StorageMode::Sqlite && !self.database_url.starts_with("sqlite:") {
            return Err(ConfigurationError::InvalidDatabaseUrl(
                self.database_url.clone(),
            ));
        }
        Ok(())
    }
}

fn non_empty_var(name: &'static str) -> Result<Option<String>, ConfigurationError> {
    match env::var(name) {
        Ok(value) => {
            let value = value.trim();
            Ok((!value.is_empty()).then(|| value.to_string()))
        }
        Err(env::VarError::NotPresent) => Ok(None),
        Err(env::VarError::NotUnicode(_)) => Err(ConfigurationError::NotUnicode(name)),
    }
}

// =============================================================================
// Error Types
// =============================================================================

/// Errors that can occur while reading configuration.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigurationError {
    #[error("Invalid storage mode: '{0}'. Expected 'in_memory' or 'sqlite'")]
    InvalidStorageMode(String),

    #[error("Invalid DATABASE_URL: '{0}'. Expected a 'sqlite:' URL when STORAGE_MODE=sqlite")]
    InvalidDatabaseUrl(String),

    #[error("{0} environment variable is not valid UTF-8")]
    NotUnicode(&'static str),
}

/// Errors that can occur during factory initialization.
#[derive(Debug, Error)]
pub enum FactoryError {
    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigurationError),

    #[error("Database connection error: {0}")]
    DatabaseConnection(String),
}

impl From<RepositoryError> for FactoryError {
    fn from(error: RepositoryError) -> Self {
        Self::DatabaseConnection(error.to_string())
    }
}

// =============================================================================
// Repository Factory
// =============================================================================

/// Creates the task repository selected by configuration.
#[derive(Debug, Clone)]
pub struct RepositoryFactory {
    config: RepositoryConfig,
}

impl RepositoryFactory {
    /// Creates a new repository factory with the given configuration.
    #[must_use]
    pub const fn new(config: RepositoryConfig) -> Self {
        Self { config }
    }

    /// Creates a new repository factory from environment variables.
    ///
    /// # Errors
    ///
    /// Returns `FactoryError::Configuration` if environment configuration is invalid.
    pub fn from_env() -> Result<Self, FactoryError> {
        Ok(Self::new(RepositoryConfig::from_env()?))
    }

    /// Returns the configuration used by this factory.
    #[must_use]
    pub const fn config(&self) -> &RepositoryConfig {
        &self.config
    }

    /// Opens the configured backend.
    ///
    /// For SQLite, the parent directory of a file database is created first.
    ///
    /// # Errors
    ///
    /// Returns `FactoryError::DatabaseConnection` if the database cannot be
    /// opened or its schema cannot be created.
    pub async fn create(&self) -> Result<Arc<dyn TaskRepository>, FactoryError> {
        match self.config.storage_mode {
            StorageMode::InMemory => {
                tracing::info!("Using in-memory task storage");
                Ok(Arc::new(InMemoryTaskRepository::new()))
            }
            StorageMode::Sqlite => {
                let url = &self.config.database_url;
                ensure_parent_directory(url)?;
                let repository = SqliteTaskRepository::connect(url).await?;
                tracing::info!(database_url = %url, "Using SQLite task storage");
                Ok(Arc::new(repository))
            }
        }
    }
}

/// Creates the directory that will hold a file database, if any.
fn ensure_parent_directory(url: &str) -> Result<(), FactoryError> {
    let Some(path) = database_path(url) else {
        return Ok(());
    };
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => std::fs::create_dir_all(parent)
            .map_err(|error| FactoryError::DatabaseConnection(error.to_string())),
        _ => Ok(()),
    }
}

/// Extracts the file path from a SQLite URL, or `None` for in-memory URLs.
fn database_path(url: &str) -> Option<&Path> {
    let rest = url.strip_prefix("sqlite:")?;
    let rest = rest.strip_prefix("//").unwrap_or(rest);
    let path = rest.split('?').next().unwrap_or_default();
    (!path.is_empty() && !path.starts_with(":memory:")).then_some(Path::new(path))
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("in_memory", StorageMode::InMemory)]
    #[case("MEMORY", StorageMode::InMemory)]
    #[case("sqlite", StorageMode::Sqlite)]
    #[case(" Sqlite3 ", StorageMode::Sqlite)]
    fn test_storage_mode_from_str_valid(#[case] input: &str, #[case] expected: StorageMode) {
        assert_eq!(input.parse::<StorageMode>().unwrap(), expected);
    }

    #[rstest]
    #[case("postgres")]
    #[case("")]
    fn test_storage_mode_from_str_invalid(#[case] input: &str) {
        let result = input.parse::<StorageMode>();
        assert!(matches!(result, Err(ConfigurationError::InvalidStorageMode(_))));
    }

    #[rstest]
    fn test_repository_config_default() {
        let config = RepositoryConfig::default();
        assert_eq!(config.storage_mode, StorageMode::InMemory);
        assert_eq!(config.database_url, DEFAULT_DATABASE_URL);
        assert_eq!(config.seed_file, None);
        assert!(config.validate().is_ok());
    }

    #[rstest]
    fn test_repository_config_rejects_foreign_url_for_sqlite() {
        let config = RepositoryConfig {
            storage_mode: StorageMode::Sqlite,
            database_url: "postgres://localhost/tasks".to_string(),
            seed_file: None,
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigurationError::InvalidDatabaseUrl(_))
        ));
    }

    #[rstest]
    fn test_repository_config_ignores_url_for_in_memory() {
        let config = RepositoryConfig {
            storage_mode: StorageMode::InMemory,
            database_url: "anything".to_string(),
            seed_file: None,
        };
        assert!(config.validate().is_ok());
    }

    #[rstest]
    #[case("sqlite://data/tasks.db", Some("data/tasks.db"))]
    #[case("sqlite:tasks.db?mode=rwc", Some("tasks.db"))]
    #[case("sqlite:///tmp/board.db", Some("/tmp/board.db"))]
    #[case("sqlite::memory:", None)]
    #[case("sqlite://:memory:", None)]
    #[case("postgres://x", None)]
    fn test_database_path(#[case] url: &str, #[case] expected: Option<&str>) {
        assert_eq!(database_path(url), expected.map(Path::new));
    }

    #[rstest]
    #[tokio::test]
    async fn test_factory_creates_in_memory_repository() {
        let factory = RepositoryFactory::new(RepositoryConfig::default());
        let repository = factory.create().await.unwrap();
        assert_eq!(repository.count().await.unwrap(), 0);
    }

    #[rstest]
    #[tokio::test]
    async fn test_factory_creates_sqlite_file_and_directory() {
        let directory = tempfile::tempdir().unwrap();
        let path = directory.path().join("nested").join("tasks.db");
        let config = RepositoryConfig {
            storage_mode: StorageMode::Sqlite,
            database_url: format!("sqlite://{}", path.display()),
            seed_file: None,
        };

        let repository = RepositoryFactory::new(config).create().await.unwrap();

        assert_eq!(repository.count().await.unwrap(), 0);
        assert!(path.exists());
    }
}
