//! Connection pooling over the sqlx PostgreSQL and SQLite drivers.

use std::str::FromStr;

use derive_builder::Builder;
use sqlx::postgres::PgPoolOptions;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};

use crate::error::JobError;

/// Inner pool variants
#[derive(Debug, Clone)]
pub(crate) enum PoolInner {
    Postgres(sqlx::PgPool),
    Sqlite(sqlx::SqlitePool),
}

/// Connection pool backed by either PostgreSQL or SQLite, selected by the
/// database URL scheme.
#[derive(Debug, Clone)]
pub struct Pool {
    pub(crate) inner: PoolInner,
}

#[derive(Builder)]
pub struct PoolArgs {
    #[builder(setter(into))]
    url: String,
    #[builder(default = "1")]
    min_connections: u32,
    #[builder(default = "5")]
    max_connections: u32,
}

pub async fn pool(args: PoolArgs) -> Result<Pool, JobError> {
    let PoolArgs {
        url,
        min_connections,
        max_connections,
    } = args;

    let inner = if url.starts_with("postgres://") || url.starts_with("postgresql://") {
        let pg_pool = PgPoolOptions::new()
            .min_connections(min_connections)
            .max_connections(max_connections)
            .connect(&url)
            .await?;
        PoolInner::Postgres(pg_pool)
    } else if url.starts_with("sqlite:") {
        // A plain :memory: database exists per connection; the pool must
        // stay on one never-expiring connection so every query sees the
        // same database.
        let max_connections = if url.contains(":memory:") {
            1
        } else {
            max_connections
        };
        let options = SqliteConnectOptions::from_str(&url)?.create_if_missing(true);
        let sqlite_pool = SqlitePoolOptions::new()
            .min_connections(1)
            .max_connections(max_connections)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?;
        PoolInner::Sqlite(sqlite_pool)
    } else {
        return Err(JobError::Configuration(format!(
            "unsupported database URL '{url}': expected postgres:// or sqlite:"
        )));
    };

    Ok(Pool { inner })
}

impl Pool {
    /// Create an in-memory SQLite pool for testing
    #[cfg(test)]
    pub async fn sqlite_in_memory() -> Result<Self, JobError> {
        let args = PoolArgsBuilder::default()
            .url("sqlite::memory:")
            .build()
            .map_err(|err| JobError::Configuration(err.to_string()))?;
        pool(args).await
    }

    /// Execute a statement that returns no rows (DDL, INSERT without binds)
    pub async fn execute(&self, sql: &str) -> Result<(), JobError> {
        match &self.inner {
            PoolInner::Postgres(pg_pool) => {
                sqlx::query(sql).execute(pg_pool).await?;
            }
            PoolInner::Sqlite(sqlite_pool) => {
                sqlx::query(sql).execute(sqlite_pool).await?;
            }
        }
        Ok(())
    }

    /// Check if this pool is using PostgreSQL (returns false for SQLite)
    pub fn is_postgres(&self) -> bool {
        matches!(self.inner, PoolInner::Postgres(_))
    }
}
