//! Configuration management
//!
//! Typed configuration for the reward core, loaded once from environment
//! variables and validated before anything else is constructed. The hosting
//! runtime owns its own config file format; this module only defines the
//! snapshot the core consumes.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::env;
use tracing::Level;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RewardConfig {
    /// Eligibility rules for the decision pipeline
    pub rewards: RewardRules,
    /// Cooldown store backend
    pub storage: StorageConfig,
    /// Worker pool sizing
    pub executor: ExecutorConfig,
    /// Logging configuration
    pub logging: LoggingConfig,
}

/// Eligibility rules consulted by the decision pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RewardRules {
    /// Master switch; when off, eliminations are ignored silently
    pub enabled: bool,
    /// Deny rewards when eliminator and target share a network address
    pub address_check_enabled: bool,
    /// Toggle for the per-pair cooldown check
    pub pair_cooldown_enabled: bool,
    /// Minimum seconds between rewarded eliminations of the same ordered
    /// pair; zero or negative disables the check
    pub pair_cooldown_seconds: i64,
    /// Minimum seconds between any two rewards for the same eliminator,
    /// regardless of target; zero or negative disables the check
    pub global_cooldown_seconds: i64,
    /// Reward command templates carrying %eliminator%/%target% placeholders;
    /// substitution and execution belong to the host
    pub commands: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageKind {
    /// File-backed SQLite, single process
    Embedded,
    /// PostgreSQL, shareable between server instances
    Networked,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    pub kind: StorageKind,
    /// SQLite database path; ":memory:" for an ephemeral store
    pub sqlite_path: String,
    /// PostgreSQL connection string (networked only)
    pub postgres_url: String,
    pub max_connections: u32,
    /// Bound on waiting for a pooled connection. Waits past this fail as
    /// `StoreError::Unavailable` instead of stalling a worker.
    pub acquire_timeout_secs: u64,
    /// Prepended to both table names. Alphanumeric and underscore only.
    pub table_prefix: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutorConfig {
    /// Worker tasks evaluating decisions and store writes
    pub workers: usize,
    /// Queued jobs accepted before submissions are rejected
    pub queue_depth: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (error, warn, info, debug, trace)
    pub level: String,
}

impl Default for RewardRules {
    fn default() -> Self {
        Self {
            enabled: true,
            address_check_enabled: true,
            pair_cooldown_enabled: true,
            pair_cooldown_seconds: 300,
            global_cooldown_seconds: 0,
            commands: Vec::new(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            kind: StorageKind::Embedded,
            sqlite_path: "killrewards.db".to_string(),
            postgres_url: "postgresql://localhost:5432/killrewards".to_string(),
            max_connections: 5,
            acquire_timeout_secs: 30,
            table_prefix: String::new(),
        }
    }
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            workers: 2,
            queue_depth: 64,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl Default for RewardConfig {
    fn default() -> Self {
        Self {
            rewards: RewardRules::default(),
            storage: StorageConfig::default(),
            executor: ExecutorConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl RewardConfig {
    /// Load configuration from environment variables and validate it.
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        // Reward rules
        if let Ok(v) = env::var("KILLREWARD_ENABLED") {
            config.rewards.enabled = v.parse().context("Invalid KILLREWARD_ENABLED value")?;
        }

        if let Ok(v) = env::var("KILLREWARD_ADDRESS_CHECK") {
            config.rewards.address_check_enabled =
                v.parse().context("Invalid KILLREWARD_ADDRESS_CHECK value")?;
        }

        if let Ok(v) = env::var("KILLREWARD_PAIR_COOLDOWN_ENABLED") {
            config.rewards.pair_cooldown_enabled = v
                .parse()
                .context("Invalid KILLREWARD_PAIR_COOLDOWN_ENABLED value")?;
        }

        if let Ok(v) = env::var("KILLREWARD_PAIR_COOLDOWN_SECS") {
            config.rewards.pair_cooldown_seconds = v
                .parse()
                .context("Invalid KILLREWARD_PAIR_COOLDOWN_SECS value")?;
        }

        if let Ok(v) = env::var("KILLREWARD_GLOBAL_COOLDOWN_SECS") {
            config.rewards.global_cooldown_seconds = v
                .parse()
                .context("Invalid KILLREWARD_GLOBAL_COOLDOWN_SECS value")?;
        }

        // Semicolon-separated so templates can contain spaces and commas
        if let Ok(v) = env::var("KILLREWARD_COMMANDS") {
            config.rewards.commands = v
                .split(';')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(String::from)
                .collect();
        }

        // Storage configuration
        if let Ok(v) = env::var("KILLREWARD_STORAGE_KIND") {
            config.storage.kind = match v.to_lowercase().as_str() {
                "embedded" | "sqlite" => StorageKind::Embedded,
                "networked" | "postgres" => StorageKind::Networked,
                other => {
                    return Err(anyhow::anyhow!(
                        "Invalid KILLREWARD_STORAGE_KIND value: {}",
                        other
                    ));
                }
            };
        }

        if let Ok(v) = env::var("KILLREWARD_SQLITE_PATH") {
            config.storage.sqlite_path = v;
        }

        if let Ok(v) = env::var("KILLREWARD_POSTGRES_URL") {
            config.storage.postgres_url = v;
        }

        if let Ok(v) = env::var("KILLREWARD_DB_MAX_CONNECTIONS") {
            config.storage.max_connections = v
                .parse()
                .context("Invalid KILLREWARD_DB_MAX_CONNECTIONS value")?;
        }

        if let Ok(v) = env::var("KILLREWARD_DB_ACQUIRE_TIMEOUT_SECS") {
            config.storage.acquire_timeout_secs = v
                .parse()
                .context("Invalid KILLREWARD_DB_ACQUIRE_TIMEOUT_SECS value")?;
        }

        if let Ok(v) = env::var("KILLREWARD_TABLE_PREFIX") {
            config.storage.table_prefix = v;
        }

        // Executor configuration
        if let Ok(v) = env::var("KILLREWARD_WORKERS") {
            config.executor.workers = v.parse().context("Invalid KILLREWARD_WORKERS value")?;
        }

        if let Ok(v) = env::var("KILLREWARD_QUEUE_DEPTH") {
            config.executor.queue_depth =
                v.parse().context("Invalid KILLREWARD_QUEUE_DEPTH value")?;
        }

        // Logging configuration
        if let Ok(v) = env::var("KILLREWARD_LOG_LEVEL") {
            config.logging.level = v;
        }

        config.validate()?;

        Ok(config)
    }

    /// Validate configuration for consistency.
    pub fn validate(&self) -> Result<()> {
        if self.executor.workers == 0 {
            return Err(anyhow::anyhow!("Executor worker count must be non-zero"));
        }

        if self.executor.queue_depth == 0 {
            return Err(anyhow::anyhow!("Executor queue depth must be non-zero"));
        }

        if self.storage.max_connections == 0 {
            return Err(anyhow::anyhow!("Storage pool size must be non-zero"));
        }

        if self.storage.acquire_timeout_secs == 0 {
            return Err(anyhow::anyhow!(
                "Storage acquire timeout must be non-zero; unbounded waits starve the worker pool"
            ));
        }

        match self.storage.kind {
            StorageKind::Embedded => {
                if self.storage.sqlite_path.is_empty() {
                    return Err(anyhow::anyhow!("SQLite path cannot be empty"));
                }
            }
            StorageKind::Networked => {
                if self.storage.postgres_url.is_empty() {
                    return Err(anyhow::anyhow!("PostgreSQL URL cannot be empty"));
                }
            }
        }

        // The prefix is interpolated into SQL statements, so restrict it
        if !self
            .storage
            .table_prefix
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_')
        {
            return Err(anyhow::anyhow!(
                "Table prefix may only contain alphanumeric characters and underscores: {}",
                self.storage.table_prefix
            ));
        }

        Ok(())
    }
}

/// Initialize the global tracing subscriber from config. Call once at startup.
pub fn init_tracing(config: &LoggingConfig) -> Result<()> {
    let level = match config.level.to_lowercase().as_str() {
        "error" => Level::ERROR,
        "warn" => Level::WARN,
        "info" => Level::INFO,
        "debug" => Level::DEBUG,
        "trace" => Level::TRACE,
        _ => Level::INFO,
    };

    let subscriber = tracing_subscriber::fmt().with_max_level(level).finish();

    tracing::subscriber::set_global_default(subscriber)
        .map_err(|e| anyhow::anyhow!("Failed to set logging subscriber: {}", e))?;

    Ok(())
}
