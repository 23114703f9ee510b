//! Cooldown repository - dual-table transactional upserts and point reads.
//!
//! `update_both` is the only write entry point: both relations commit in a
//! single transaction or neither does, so a crash can never leave the
//! per-pair and global rows disagreeing about the last rewarded event.

use sqlx::Row;
use tracing::debug;
use uuid::Uuid;

use crate::database::pool::CooldownDatabase;

/// Errors surfaced by the cooldown store.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Connection pool exhausted or engine unreachable; transient
    #[error("store unavailable: {0}")]
    Unavailable(String),
    /// A statement or transaction failed; rolled back, never partially applied
    #[error("store transaction failed: {0}")]
    Inconsistent(String),
}

impl StoreError {
    fn from_sqlx(e: sqlx::Error) -> Self {
        match &e {
            sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => {
                Self::Unavailable(e.to_string())
            }
            _ => Self::Inconsistent(e.to_string()),
        }
    }
}

/// SQL operations for the two cooldown relations.
#[derive(Debug, Clone)]
pub struct CooldownRepository {
    db: CooldownDatabase,
    pair_table: String,
    global_table: String,
}

impl CooldownRepository {
    /// `table_prefix` must already be validated (alphanumeric/underscore);
    /// it is interpolated into statements, not bound.
    pub fn new(db: CooldownDatabase, table_prefix: &str) -> Self {
        Self {
            db,
            pair_table: format!("{table_prefix}per_pair_cooldowns"),
            global_table: format!("{table_prefix}global_cooldowns"),
        }
    }

    pub fn database(&self) -> &CooldownDatabase {
        &self.db
    }

    /// Create both relations if absent. Safe to call repeatedly; existing
    /// rows are untouched.
    pub async fn init_schema(&self) -> Result<(), StoreError> {
        match &self.db {
            CooldownDatabase::Sqlite(pool) => {
                sqlx::query(&format!(
                    "CREATE TABLE IF NOT EXISTS {} (
                        eliminator_id TEXT NOT NULL,
                        target_id TEXT NOT NULL,
                        last_event_time INTEGER NOT NULL,
                        PRIMARY KEY (eliminator_id, target_id)
                    )",
                    self.pair_table
                ))
                .execute(pool)
                .await
                .map_err(StoreError::from_sqlx)?;

                sqlx::query(&format!(
                    "CREATE TABLE IF NOT EXISTS {} (
                        eliminator_id TEXT PRIMARY KEY,
                        last_event_time INTEGER NOT NULL
                    )",
                    self.global_table
                ))
                .execute(pool)
                .await
                .map_err(StoreError::from_sqlx)?;
            }
            CooldownDatabase::Postgres(pool) => {
                sqlx::query(&format!(
                    "CREATE TABLE IF NOT EXISTS {} (
                        eliminator_id UUID NOT NULL,
                        target_id UUID NOT NULL,
                        last_event_time BIGINT NOT NULL,
                        PRIMARY KEY (eliminator_id, target_id)
                    )",
                    self.pair_table
                ))
                .execute(pool)
                .await
                .map_err(StoreError::from_sqlx)?;

                sqlx::query(&format!(
                    "CREATE TABLE IF NOT EXISTS {} (
                        eliminator_id UUID PRIMARY KEY,
                        last_event_time BIGINT NOT NULL
                    )",
                    self.global_table
                ))
                .execute(pool)
                .await
                .map_err(StoreError::from_sqlx)?;
            }
        }

        debug!(pair = %self.pair_table, global = %self.global_table, "Cooldown tables ready");
        Ok(())
    }

    /// Overwrite both cooldown rows for this event in one transaction.
    ///
    /// On any failure the transaction rolls back and both relations keep
    /// their previous values.
    pub async fn update_both(
        &self,
        eliminator: Uuid,
        target: Uuid,
        time_millis: i64,
    ) -> Result<(), StoreError> {
        match &self.db {
            CooldownDatabase::Sqlite(pool) => {
                let mut tx = pool.begin().await.map_err(StoreError::from_sqlx)?;

                sqlx::query(&format!(
                    "INSERT OR REPLACE INTO {} (eliminator_id, target_id, last_event_time)
                     VALUES (?, ?, ?)",
                    self.pair_table
                ))
                .bind(eliminator.to_string())
                .bind(target.to_string())
                .bind(time_millis)
                .execute(&mut *tx)
                .await
                .map_err(StoreError::from_sqlx)?;

                sqlx::query(&format!(
                    "INSERT OR REPLACE INTO {} (eliminator_id, last_event_time)
                     VALUES (?, ?)",
                    self.global_table
                ))
                .bind(eliminator.to_string())
                .bind(time_millis)
                .execute(&mut *tx)
                .await
                .map_err(StoreError::from_sqlx)?;

                tx.commit().await.map_err(StoreError::from_sqlx)?;
            }
            CooldownDatabase::Postgres(pool) => {
                let mut tx = pool.begin().await.map_err(StoreError::from_sqlx)?;

                sqlx::query(&format!(
                    "INSERT INTO {} (eliminator_id, target_id, last_event_time)
                     VALUES ($1, $2, $3)
                     ON CONFLICT (eliminator_id, target_id)
                     DO UPDATE SET last_event_time = EXCLUDED.last_event_time",
                    self.pair_table
                ))
                .bind(eliminator)
                .bind(target)
                .bind(time_millis)
                .execute(&mut *tx)
                .await
                .map_err(StoreError::from_sqlx)?;

                sqlx::query(&format!(
                    "INSERT INTO {} (eliminator_id, last_event_time)
                     VALUES ($1, $2)
                     ON CONFLICT (eliminator_id)
                     DO UPDATE SET last_event_time = EXCLUDED.last_event_time",
                    self.global_table
                ))
                .bind(eliminator)
                .bind(time_millis)
                .execute(&mut *tx)
                .await
                .map_err(StoreError::from_sqlx)?;

                tx.commit().await.map_err(StoreError::from_sqlx)?;
            }
        }

        debug!(
            eliminator = %eliminator,
            target = %target,
            time_millis,
            "Cooldown rows updated"
        );
        Ok(())
    }

    /// Last rewarded event time for the ordered pair, if a row exists.
    pub async fn read_pair(
        &self,
        eliminator: Uuid,
        target: Uuid,
    ) -> Result<Option<i64>, StoreError> {
        match &self.db {
            CooldownDatabase::Sqlite(pool) => {
                let row = sqlx::query(&format!(
                    "SELECT last_event_time FROM {} WHERE eliminator_id = ? AND target_id = ?",
                    self.pair_table
                ))
                .bind(eliminator.to_string())
                .bind(target.to_string())
                .fetch_optional(pool)
                .await
                .map_err(StoreError::from_sqlx)?;

                Ok(row.map(|r| r.get::<i64, _>("last_event_time")))
            }
            CooldownDatabase::Postgres(pool) => {
                let row = sqlx::query(&format!(
                    "SELECT last_event_time FROM {} WHERE eliminator_id = $1 AND target_id = $2",
                    self.pair_table
                ))
                .bind(eliminator)
                .bind(target)
                .fetch_optional(pool)
                .await
                .map_err(StoreError::from_sqlx)?;

                Ok(row.map(|r| r.get::<i64, _>("last_event_time")))
            }
        }
    }

    /// Last rewarded event time for the eliminator, regardless of target.
    pub async fn read_global(&self, eliminator: Uuid) -> Result<Option<i64>, StoreError> {
        match &self.db {
            CooldownDatabase::Sqlite(pool) => {
                let row = sqlx::query(&format!(
                    "SELECT last_event_time FROM {} WHERE eliminator_id = ?",
                    self.global_table
                ))
                .bind(eliminator.to_string())
                .fetch_optional(pool)
                .await
                .map_err(StoreError::from_sqlx)?;

                Ok(row.map(|r| r.get::<i64, _>("last_event_time")))
            }
            CooldownDatabase::Postgres(pool) => {
                let row = sqlx::query(&format!(
                    "SELECT last_event_time FROM {} WHERE eliminator_id = $1",
                    self.global_table
                ))
                .bind(eliminator)
                .fetch_optional(pool)
                .await
                .map_err(StoreError::from_sqlx)?;

                Ok(row.map(|r| r.get::<i64, _>("last_event_time")))
            }
        }
    }
}
