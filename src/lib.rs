//! Kill-reward decision core
//!
//! Decides, off the hosting runtime's main loop, whether an eliminator
//! qualifies for a reward. Eligibility consults two cooldown relations
//! (per ordered eliminator/target pair, and per eliminator regardless of
//! target) that are cached in memory and durable in an embedded or
//! networked SQL store shared across restarts.
//!
//! ## Module Structure
//!
//! ```text
//! src/
//! ├── lib.rs         - Crate root with re-exports
//! ├── config.rs      - Typed configuration + tracing init
//! ├── pipeline.rs    - Ordered eligibility checks -> verdict
//! ├── cache.rs       - Read-through/write-through cooldown cache
//! ├── executor.rs    - Bounded worker pool
//! ├── coordinator.rs - Async orchestration + effect channel
//! ├── database/      - SQL persistence
//! │   ├── pool.rs       - Pooled SQLite/PostgreSQL connections
//! │   └── cooldowns.rs  - Dual-table transactional repository
//! └── util/
//!     └── time.rs    - Clock source, duration formatting
//! ```

pub mod cache;
pub mod config;
pub mod coordinator;
pub mod database;
pub mod executor;
pub mod pipeline;
pub mod util;

// Re-export main types for convenience
pub use cache::CooldownCache;
pub use config::{
    ExecutorConfig, LoggingConfig, RewardConfig, RewardRules, StorageConfig, StorageKind,
};
pub use coordinator::{EffectRequest, RewardCoordinator};
pub use database::{CooldownDatabase, CooldownRepository, StoreError};
pub use executor::{ExecutorError, TaskExecutor, TaskHandle};
pub use pipeline::{DecisionPipeline, DenyReason, EliminationEvent, Verdict};
pub use util::time::{Clock, ManualClock, SystemClock};
