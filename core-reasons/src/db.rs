//! # Database Connection Module
//!
//! SQLite connection setup shared by every backend.
//!
//! ## Features
//!
//! - **WAL Mode**: readers don't block the single writer
//! - **Create if missing**: the database file is created on first connect,
//!   its directory is not
//! - **Statement Caching**: prepared statements are reused per connection
//! - **Embedded Migrations**: the `Reasons` schema ships inside the binary
//!
//! ## Usage
//!
//! ```rust,ignore
//! use core_reasons::db;
//!
//! // Once at startup
//! db::migrate("sqlite:reasons.db").await?;
//!
//! // Per call (direct-command and mapped-query backends)
//! let mut conn = db::connect("sqlite:reasons.db").await?;
//! ```
//!
//! ## Testing
//!
//! Per-call connections need a file-backed database; `sqlite::memory:` gives
//! every connection its own empty database. Tests use a file in a temporary
//! directory instead.

use crate::{ReasonError, Result};
use core_runtime::logging::redact_connection_string;
use sqlx::sqlite::{
    SqliteConnectOptions, SqliteConnection, SqliteJournalMode, SqlitePoolOptions,
    SqliteSynchronous,
};
use sqlx::{ConnectOptions, Pool, Sqlite};
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, info, warn};

const DEFAULT_STATEMENT_CACHE_CAPACITY: usize = 100;

/// Pool settings for the shared-pool context lifetimes and for migration.
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    /// `sqlx` SQLite URL, e.g. `sqlite:/var/lib/app/reasons.db`
    pub database_url: String,

    pub min_connections: u32,

    pub max_connections: u32,

    /// Maximum time to wait for a connection from the pool
    pub acquire_timeout: Duration,

    pub idle_timeout: Option<Duration>,

    /// Prepared statements cached per connection
    pub statement_cache_capacity: usize,

    /// Apply the embedded migrations when the pool is created
    pub run_migrations: bool,
}

impl DatabaseConfig {
    pub fn new(database_url: impl Into<String>) -> Self {
        Self {
            database_url: database_url.into(),
            min_connections: 0,
            max_connections: 5,
            acquire_timeout: Duration::from_secs(30),
            idle_timeout: Some(Duration::from_secs(600)),
            statement_cache_capacity: DEFAULT_STATEMENT_CACHE_CAPACITY,
            run_migrations: true,
        }
    }

    pub fn min_connections(mut self, min: u32) -> Self {
        self.min_connections = min;
        self
    }

    pub fn max_connections(mut self, max: u32) -> Self {
        self.max_connections = max;
        self
    }

    pub fn acquire_timeout(mut self, timeout: Duration) -> Self {
        self.acquire_timeout = timeout;
        self
    }

    pub fn idle_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.idle_timeout = timeout;
        self
    }

    pub fn statement_cache_capacity(mut self, capacity: usize) -> Self {
        self.statement_cache_capacity = capacity;
        self
    }

    /// Skip migrations, e.g. for a pool over a database someone else owns.
    pub fn without_migrations(mut self) -> Self {
        self.run_migrations = false;
        self
    }
}

/// Parse a connection string into SQLite options with the module defaults.
pub(crate) fn connect_options(
    connection_string: &str,
    statement_cache_capacity: usize,
) -> std::result::Result<SqliteConnectOptions, sqlx::Error> {
    let options = SqliteConnectOptions::from_str(connection_string)?
        .journal_mode(SqliteJournalMode::Wal)
        .synchronous(SqliteSynchronous::Normal)
        .foreign_keys(true)
        .create_if_missing(true)
        .statement_cache_capacity(statement_cache_capacity);

    Ok(options)
}

/// Open one dedicated connection. Dropping it closes it.
pub async fn connect(connection_string: &str) -> Result<SqliteConnection> {
    let options = connect_options(connection_string, DEFAULT_STATEMENT_CACHE_CAPACITY)?;

    options.connect().await.map_err(|e| {
        warn!(
            connection = %redact_connection_string(connection_string),
            error = %e,
            "Failed to open connection"
        );
        ReasonError::Storage(e)
    })
}

/// Create a connection pool, applying migrations unless disabled.
pub async fn create_pool(config: DatabaseConfig) -> Result<Pool<Sqlite>> {
    info!(
        database_url = %redact_connection_string(&config.database_url),
        min_connections = config.min_connections,
        max_connections = config.max_connections,
        "Creating database connection pool"
    );

    let options = connect_options(&config.database_url, config.statement_cache_capacity)?;

    let pool = SqlitePoolOptions::new()
        .min_connections(config.min_connections)
        .max_connections(config.max_connections)
        .acquire_timeout(config.acquire_timeout)
        .idle_timeout(config.idle_timeout)
        .connect_with(options)
        .await
        .map_err(|e| {
            warn!(error = %e, "Failed to create connection pool");
            ReasonError::Storage(e)
        })?;

    if config.run_migrations {
        run_migrations(&pool).await?;
    }

    health_check(&pool).await?;

    Ok(pool)
}

/// Apply the embedded migrations to the database behind `connection_string`.
pub async fn migrate(connection_string: &str) -> Result<()> {
    let pool = create_pool(DatabaseConfig::new(connection_string).max_connections(1)).await?;
    pool.close().await;
    Ok(())
}

async fn run_migrations(pool: &Pool<Sqlite>) -> Result<()> {
    info!("Running database migrations");

    sqlx::migrate!("./migrations").run(pool).await.map_err(|e| {
        warn!(error = %e, "Migration failed");
        ReasonError::Migration(e.to_string())
    })?;

    info!("Database migrations completed successfully");
    Ok(())
}

/// Verify the pool can reach the database.
pub async fn health_check(pool: &Pool<Sqlite>) -> Result<()> {
    debug!("Performing database health check");

    sqlx::query("SELECT 1").fetch_one(pool).await.map_err(|e| {
        warn!(error = %e, "Database health check failed");
        ReasonError::Storage(e)
    })?;

    debug!("Database health check passed");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::Row;

    fn temp_url(dir: &tempfile::TempDir) -> String {
        format!("sqlite:{}", dir.path().join("reasons.db").display())
    }

    #[tokio::test]
    async fn test_create_pool_runs_migrations() {
        let dir = tempfile::tempdir().unwrap();
        let pool = create_pool(DatabaseConfig::new(temp_url(&dir))).await.unwrap();

        let row = sqlx::query("SELECT COUNT(*) AS n FROM Reasons")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(row.get::<i64, _>("n"), 0);
    }

    #[tokio::test]
    async fn test_migrate_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let url = temp_url(&dir);

        migrate(&url).await.unwrap();
        migrate(&url).await.unwrap();
    }

    #[tokio::test]
    async fn test_pool_without_migrations_has_no_schema() {
        let dir = tempfile::tempdir().unwrap();
        let pool = create_pool(DatabaseConfig::new(temp_url(&dir)).without_migrations())
            .await
            .unwrap();

        let result = sqlx::query("SELECT COUNT(*) FROM Reasons")
            .fetch_one(&pool)
            .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_connect_to_missing_directory_fails() {
        let dir = tempfile::tempdir().unwrap();
        let url = format!(
            "sqlite:{}",
            dir.path().join("absent").join("reasons.db").display()
        );

        let err = connect(&url).await.unwrap_err();
        assert!(err.is_storage_unavailable());
    }

    #[test]
    fn test_database_config_builder() {
        let config = DatabaseConfig::new("sqlite:reasons.db")
            .min_connections(1)
            .max_connections(10)
            .acquire_timeout(Duration::from_secs(60))
            .statement_cache_capacity(200);

        assert_eq!(config.min_connections, 1);
        assert_eq!(config.max_connections, 10);
        assert_eq!(config.acquire_timeout, Duration::from_secs(60));
        assert_eq!(config.statement_cache_capacity, 200);
        assert!(config.run_migrations);
    }
}
