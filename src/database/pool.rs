//! Pooled database connections using sqlx.

use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::str::FromStr;
use std::time::Duration;
use tracing::info;

use crate::config::{StorageConfig, StorageKind};
use crate::database::cooldowns::StoreError;

/// Engine-agnostic pooled connection to the cooldown store.
///
/// The two engines differ only in upsert syntax and column typing; the
/// relation shape and transaction boundary are identical. Connection
/// acquisition is bounded so pool exhaustion fails instead of hanging.
#[derive(Debug, Clone)]
pub enum CooldownDatabase {
    Sqlite(SqlitePool),
    Postgres(PgPool),
}

impl CooldownDatabase {
    pub async fn connect(config: &StorageConfig) -> Result<Self, StoreError> {
        let acquire_timeout = Duration::from_secs(config.acquire_timeout_secs);

        match config.kind {
            StorageKind::Embedded => {
                let url = format!("sqlite:{}", config.sqlite_path);
                let options = SqliteConnectOptions::from_str(&url)
                    .map_err(|e| StoreError::Unavailable(format!("invalid SQLite path: {e}")))?
                    .create_if_missing(true);

                let pool = SqlitePoolOptions::new()
                    .max_connections(config.max_connections)
                    .acquire_timeout(acquire_timeout)
                    .connect_with(options)
                    .await
                    .map_err(|e| {
                        StoreError::Unavailable(format!("failed to open SQLite database: {e}"))
                    })?;

                info!(path = %config.sqlite_path, "Connected to SQLite");
                Ok(Self::Sqlite(pool))
            }
            StorageKind::Networked => {
                let pool = PgPoolOptions::new()
                    .max_connections(config.max_connections)
                    .acquire_timeout(acquire_timeout)
                    .connect(&config.postgres_url)
                    .await
                    .map_err(|e| {
                        StoreError::Unavailable(format!("failed to connect to PostgreSQL: {e}"))
                    })?;

                info!("Connected to PostgreSQL");
                Ok(Self::Postgres(pool))
            }
        }
    }

    /// Close the pool gracefully. In-flight acquisitions fail afterwards.
    pub async fn close(&self) {
        match self {
            Self::Sqlite(pool) => pool.close().await,
            Self::Postgres(pool) => pool.close().await,
        }
    }

    pub fn is_closed(&self) -> bool {
        match self {
            Self::Sqlite(pool) => pool.is_closed(),
            Self::Postgres(pool) => pool.is_closed(),
        }
    }
}
